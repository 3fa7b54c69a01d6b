// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publisher - typed sender bound to one topic and one delivery mode
//!
//! # Design
//!
//! - Best-effort, fire-and-forget (no history, no retransmission)
//! - One datagram per message, exactly `M::SIZE` bytes
//! - Outbound-only socket unless a local port is configured
//!
//! # Example
//!
//! ```ignore
//! let mut publisher = Publisher::<MotorCommand>::new(
//!     "/motor/cmd",
//!     DeliveryMode::Unicast(Ipv4Addr::new(192, 168, 1, 20)),
//!     6666,
//!     QosProfile::default(),
//!     UdpTransport::new(),
//!     SystemClock::new(),
//! )?;
//! publisher.init(&mut registry)?;
//! publisher.publish(&MotorCommand { target: 1.5, ..Default::default() })?;
//! ```

use core::fmt;
use core::marker::PhantomData;
use std::net::{Ipv4Addr, SocketAddrV4};

use crate::clock::{Clock, SystemClock};
use crate::config::BROADCAST_ADDR;
use crate::error::{Error, Result};
use crate::message::{check_wire_size, encode_message, Message};
use crate::qos::QosProfile;
use crate::registry::{check_topic_name, TopicRegistry, TopicRole};
use crate::transport::{DatagramSocket, Transport, UdpTransport};
use crate::MAX_PACKET_SIZE;

/// Destination addressing strategy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Point-to-point to one host
    Unicast(Ipv4Addr),
    /// Limited broadcast (255.255.255.255), subnet-local
    Broadcast,
    /// Multicast group; receivers must join it
    Multicast(Ipv4Addr),
}

impl DeliveryMode {
    /// Destination IP for this mode
    pub const fn address(&self) -> Ipv4Addr {
        match self {
            DeliveryMode::Unicast(addr) | DeliveryMode::Multicast(addr) => *addr,
            DeliveryMode::Broadcast => BROADCAST_ADDR,
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryMode::Unicast(addr) => write!(f, "unicast {}", addr),
            DeliveryMode::Broadcast => write!(f, "broadcast"),
            DeliveryMode::Multicast(group) => write!(f, "multicast {}", group),
        }
    }
}

/// Publisher counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublisherStats {
    /// Datagrams handed to the transport
    pub sent: u64,
    /// Failed publish attempts (encode or send)
    pub send_errors: u64,
    /// Clock time of the last successful send (0 = never)
    pub last_send_micros: u64,
}

/// Typed publisher
pub struct Publisher<M, X = UdpTransport, C = SystemClock>
where
    M: Message,
    X: Transport,
    C: Clock,
{
    topic: String,
    mode: DeliveryMode,
    port: u16,
    local_port: u16,
    qos: QosProfile,
    transport: X,
    clock: C,
    socket: Option<X::Socket>,
    stats: PublisherStats,
    _message: PhantomData<fn(&M)>,
}

impl<M, X, C> Publisher<M, X, C>
where
    M: Message,
    X: Transport,
    C: Clock,
{
    /// Create an uninitialized publisher
    ///
    /// # Arguments
    ///
    /// * `topic` - Topic name (1..=63 bytes)
    /// * `mode` - Destination addressing
    /// * `port` - Destination port
    /// * `qos` - Validated here (fail-fast)
    pub fn new(
        topic: &str,
        mode: DeliveryMode,
        port: u16,
        qos: QosProfile,
        transport: X,
        clock: C,
    ) -> Result<Self> {
        check_topic_name(topic)?;
        check_wire_size::<M>()?;
        qos.validate()?;
        if let DeliveryMode::Multicast(group) = mode {
            if !group.is_multicast() {
                return Err(Error::InvalidParameter("not a multicast address"));
            }
        }

        Ok(Self {
            topic: topic.to_string(),
            mode,
            port,
            local_port: 0,
            qos,
            transport,
            clock,
            socket: None,
            stats: PublisherStats::default(),
            _message: PhantomData,
        })
    }

    /// Bind a fixed local port at `init` instead of an ephemeral one
    #[must_use]
    pub fn with_local_port(mut self, port: u16) -> Self {
        self.local_port = port;
        self
    }

    /// Acquire the transport socket and register the topic.
    ///
    /// Registry exhaustion is logged, not fatal: the registry is a catalog.
    pub fn init(&mut self, registry: &mut TopicRegistry) -> Result<()> {
        if self.socket.is_some() {
            return Err(Error::AlreadyInitialized);
        }

        let socket = self.transport.bind(self.local_port)?;

        let registered = registry.register(&self.topic, self.port, M::SIZE, TopicRole::Publisher);
        if let Err(e) = registered {
            log::warn!("[Publisher] topic '{}' not registered: {}", self.topic, e);
        }

        log::debug!(
            "[Publisher] '{}' ready: {} -> {} ({} bytes, local port {})",
            self.topic,
            self.mode,
            self.destination(),
            M::SIZE,
            socket.local_port()
        );
        self.socket = Some(socket);
        Ok(())
    }

    /// Encode and send one message.
    ///
    /// Fails with `NotInitialized` before a successful `init`. A failed
    /// encode or send increments `send_errors` and leaves `sent` unchanged.
    pub fn publish(&mut self, msg: &M) -> Result<()> {
        if self.socket.is_none() {
            return Err(Error::NotInitialized);
        }

        let mut buf = [0u8; MAX_PACKET_SIZE];
        let len = match encode_message(msg, &mut buf) {
            Ok(len) => len,
            Err(e) => {
                self.stats.send_errors += 1;
                log::debug!("[Publisher] '{}' encode failed: {}", self.topic, e);
                return Err(e);
            }
        };

        self.send(&buf[..len])
    }

    /// Send preformatted bytes to the same destination.
    ///
    /// The payload is not checked against `M::SIZE`; receivers drop
    /// mismatched lengths.
    pub fn publish_raw(&mut self, payload: &[u8]) -> Result<()> {
        if self.socket.is_none() {
            return Err(Error::NotInitialized);
        }
        if payload.len() > MAX_PACKET_SIZE {
            return Err(Error::InvalidParameter(
                "payload exceeds MAX_PACKET_SIZE",
            ));
        }

        self.send(payload)
    }

    fn send(&mut self, payload: &[u8]) -> Result<()> {
        let dest = self.destination();
        let Some(socket) = self.socket.as_mut() else {
            return Err(Error::NotInitialized);
        };

        match socket.send_to(payload, dest) {
            Ok(n) if n == payload.len() => {
                self.stats.sent += 1;
                self.stats.last_send_micros = self.clock.now_micros();
                Ok(())
            }
            Ok(n) => {
                self.stats.send_errors += 1;
                log::debug!(
                    "[Publisher] '{}' short send to {} ({}/{} bytes)",
                    self.topic,
                    dest,
                    n,
                    payload.len()
                );
                Err(Error::Send {
                    dest,
                    reason: format!("short send ({} of {} bytes)", n, payload.len()),
                })
            }
            Err(e) => {
                self.stats.send_errors += 1;
                log::debug!("[Publisher] '{}' send failed: {}", self.topic, e);
                Err(e)
            }
        }
    }

    /// Resolved destination address
    pub fn destination(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.mode.address(), self.port)
    }

    /// Topic name
    pub fn topic_name(&self) -> &str {
        &self.topic
    }

    /// Delivery mode
    pub const fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Destination port
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// QoS profile
    pub const fn qos(&self) -> &QosProfile {
        &self.qos
    }

    /// Whether `init` succeeded
    pub fn is_initialized(&self) -> bool {
        self.socket.is_some()
    }

    /// Counters snapshot
    pub const fn stats(&self) -> PublisherStats {
        self.stats
    }

    /// Wire size of `M`
    pub const fn message_size(&self) -> usize {
        M::SIZE
    }
}

impl<M, X, C> fmt::Debug for Publisher<M, X, C>
where
    M: Message,
    X: Transport,
    C: Clock,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("topic", &self.topic)
            .field("mode", &self.mode)
            .field("port", &self.port)
            .field("initialized", &self.is_initialized())
            .field("stats", &self.stats)
            .finish()
    }
}
