// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP transport for WiFi/Ethernet
//!
//! Sockets are created through socket2 so options can be set before bind:
//! SO_REUSEADDR (several local processes may listen on a topic port),
//! SO_BROADCAST (broadcast publishers), and non-blocking mode for
//! [`DatagramSocket::try_recv`].

use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};

use crate::config::ENV_MULTICAST_IF;
use crate::error::{Error, Result};
use crate::transport::{DatagramSocket, Transport};

/// OS UDP transport
#[derive(Clone, Copy, Debug)]
pub struct UdpTransport {
    multicast_if: Ipv4Addr,
}

impl Default for UdpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UdpTransport {
    /// Transport using the interface from `TINYPUB_MULTICAST_IF`
    /// (any interface when unset or unparseable)
    pub fn new() -> Self {
        let multicast_if = std::env::var(ENV_MULTICAST_IF)
            .ok()
            .and_then(|raw| match raw.trim().parse::<Ipv4Addr>() {
                Ok(addr) => Some(addr),
                Err(_) => {
                    log::debug!("[UDP] ignoring invalid {}='{}'", ENV_MULTICAST_IF, raw);
                    None
                }
            })
            .unwrap_or(Ipv4Addr::UNSPECIFIED);
        Self { multicast_if }
    }

    /// Transport joining multicast groups on a specific interface
    pub const fn with_multicast_interface(interface: Ipv4Addr) -> Self {
        Self {
            multicast_if: interface,
        }
    }

    /// Interface used for multicast joins
    pub const fn multicast_interface(&self) -> Ipv4Addr {
        self.multicast_if
    }

    fn open(&self, port: u16) -> io::Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;

        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        socket.bind(&bind_addr.into())?;

        Ok(socket.into())
    }
}

impl Transport for UdpTransport {
    type Socket = UdpDatagramSocket;

    fn bind(&self, port: u16) -> Result<UdpDatagramSocket> {
        let socket = self.open(port).map_err(|e| Error::Bind {
            port,
            reason: e.to_string(),
        })?;
        let local_port = socket.local_addr().map(|a| a.port()).unwrap_or(port);
        log::debug!("[UDP] bound 0.0.0.0:{}", local_port);

        Ok(UdpDatagramSocket {
            socket,
            local_port,
            multicast_if: self.multicast_if,
        })
    }

    fn bind_multicast(&self, port: u16, group: Ipv4Addr) -> Result<UdpDatagramSocket> {
        let mut socket = self.bind(port)?;
        socket.join_multicast(group)?;
        Ok(socket)
    }
}

/// Bound, non-blocking UDP socket
#[derive(Debug)]
pub struct UdpDatagramSocket {
    socket: UdpSocket,
    local_port: u16,
    multicast_if: Ipv4Addr,
}

impl DatagramSocket for UdpDatagramSocket {
    fn send_to(&mut self, data: &[u8], dest: SocketAddrV4) -> Result<usize> {
        self.socket.send_to(data, dest).map_err(|e| Error::Send {
            dest,
            reason: e.to_string(),
        })
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        match self.socket.recv_from(buf) {
            Ok((len, _src)) => Ok(Some(len)),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(Error::Receive {
                port: self.local_port,
                reason: e.to_string(),
            }),
        }
    }

    fn join_multicast(&mut self, group: Ipv4Addr) -> Result<()> {
        if !group.is_multicast() {
            return Err(Error::InvalidParameter("not a multicast address"));
        }

        self.socket
            .join_multicast_v4(&group, &self.multicast_if)
            .map_err(|e| Error::MulticastJoin {
                group,
                reason: e.to_string(),
            })?;
        // Same-host subscribers must see our own sends
        if let Err(e) = self.socket.set_multicast_loop_v4(true) {
            log::debug!("[UDP] IP_MULTICAST_LOOP failed: {}", e);
        }

        log::debug!(
            "[UDP] joined multicast group={} iface={} port={}",
            group,
            self.multicast_if,
            self.local_port
        );
        Ok(())
    }

    fn local_port(&self) -> u16 {
        self.local_port
    }
}
