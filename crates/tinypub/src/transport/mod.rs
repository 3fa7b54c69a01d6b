// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport abstraction for tinypub
//!
//! The messaging core consumes the datagram primitive as an opaque service:
//! a [`Transport`] hands out bound [`DatagramSocket`]s, and sockets only send,
//! poll and join groups. Implementations:
//!
//! - [`UdpTransport`] - OS UDP sockets (socket2)
//! - [`LoopbackTransport`] - in-process bus with fault injection (host tests)
//! - [`NullTransport`] - discards everything, never receives
//!
//! ## Design Principles
//!
//! - **Non-blocking receive** - `try_recv` returns `Ok(None)` when idle
//! - **Caller-owned buffers** - sockets fill a borrowed slice
//! - **Result-based** - bind/join/send failures are `Err`, never panics

use std::net::{Ipv4Addr, SocketAddrV4};

use crate::error::{Error, Result};

pub mod loopback;
pub mod udp;

pub use loopback::{LoopbackSocket, LoopbackTransport};
pub use udp::{UdpDatagramSocket, UdpTransport};

/// Factory for bound datagram sockets
///
/// Cheap to clone: nodes hand a clone to every endpoint they create.
pub trait Transport: Clone {
    /// Socket type produced by this transport
    type Socket: DatagramSocket + 'static;

    /// Bind a socket to `port` on all interfaces (0 = ephemeral)
    fn bind(&self, port: u16) -> Result<Self::Socket>;

    /// Bind `port` and join `group` in one step.
    ///
    /// Transports without a combined primitive keep the default, and callers
    /// fall back to [`bind`](Self::bind) + [`DatagramSocket::join_multicast`].
    fn bind_multicast(&self, port: u16, group: Ipv4Addr) -> Result<Self::Socket> {
        let _ = (port, group);
        Err(Error::Unsupported("combined multicast bind"))
    }
}

/// A bound datagram endpoint
pub trait DatagramSocket {
    /// Send one datagram to `dest`
    ///
    /// # Returns
    ///
    /// Number of bytes sent
    fn send_to(&mut self, data: &[u8], dest: SocketAddrV4) -> Result<usize>;

    /// Receive one datagram without blocking
    ///
    /// Returns `Ok(None)` when nothing is pending. A datagram longer than
    /// `buf` is truncated to `buf.len()`.
    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>>;

    /// Join a multicast group on this socket
    fn join_multicast(&mut self, group: Ipv4Addr) -> Result<()>;

    /// Locally bound port
    fn local_port(&self) -> u16;
}

/// Null transport (for testing)
///
/// Discards all packets, never receives anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullTransport;

/// Socket produced by [`NullTransport`]
#[derive(Debug)]
pub struct NullSocket {
    port: u16,
}

impl Transport for NullTransport {
    type Socket = NullSocket;

    fn bind(&self, port: u16) -> Result<NullSocket> {
        Ok(NullSocket { port })
    }
}

impl DatagramSocket for NullSocket {
    fn send_to(&mut self, data: &[u8], _dest: SocketAddrV4) -> Result<usize> {
        // Discard packet
        Ok(data.len())
    }

    fn try_recv(&mut self, _buf: &mut [u8]) -> Result<Option<usize>> {
        Ok(None)
    }

    fn join_multicast(&mut self, _group: Ipv4Addr) -> Result<()> {
        Ok(())
    }

    fn local_port(&self) -> u16 {
        self.port
    }
}
