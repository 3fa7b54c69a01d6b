// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Subscription - typed receiver bound to one topic port
//!
//! # Design
//!
//! - Non-blocking: every receive path polls the socket once
//! - Fixed-size receive buffer, reused across polls
//! - Size-checked: a datagram whose length differs from `M::SIZE` is dropped
//!   and counted in [`SubscriptionStats::dropped`], never partially decoded
//! - Bounded drain: [`Subscription::spin_all`] handles at most `qos.depth`
//!   messages per call; the rest stay queued in the transport
//!
//! # Example
//!
//! ```ignore
//! let mut sub = Subscription::<MotorCommand>::new(
//!     "/motor/cmd",
//!     6666,
//!     QosProfile::default(),
//!     UdpTransport::new(),
//!     SystemClock::new(),
//! )?
//! .with_callback(|cmd| apply(cmd));
//! sub.init(&mut registry)?;
//!
//! loop {
//!     sub.spin_all();
//!     rate.sleep();
//! }
//! ```

use core::fmt;
use std::net::Ipv4Addr;

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::message::{check_wire_size, decode_message, Message};
use crate::qos::QosProfile;
use crate::registry::{check_topic_name, TopicRegistry, TopicRole};
use crate::transport::{DatagramSocket, Transport, UdpTransport};
use crate::MAX_PACKET_SIZE;

/// One byte larger than any valid message so oversized datagrams are seen
/// as oversized instead of truncated to a plausible length.
const RX_BUFFER_SIZE: usize = MAX_PACKET_SIZE + 1;

/// Subscription counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubscriptionStats {
    /// Messages decoded and delivered
    pub received: u64,
    /// Datagrams discarded (wrong length or undecodable)
    pub dropped: u64,
    /// Clock time of the last delivered message (0 = never)
    pub last_receive_micros: u64,
}

/// Typed subscription
pub struct Subscription<M, X = UdpTransport, C = SystemClock>
where
    M: Message,
    X: Transport,
    C: Clock,
{
    topic: String,
    port: u16,
    group: Option<Ipv4Addr>,
    qos: QosProfile,
    transport: X,
    clock: C,
    socket: Option<X::Socket>,
    callback: Option<Box<dyn FnMut(&M)>>,
    stats: SubscriptionStats,
    rx_buffer: [u8; RX_BUFFER_SIZE],
}

impl<M, X, C> Subscription<M, X, C>
where
    M: Message,
    X: Transport,
    C: Clock,
{
    /// Create an uninitialized, polling-only subscription
    pub fn new(topic: &str, port: u16, qos: QosProfile, transport: X, clock: C) -> Result<Self> {
        check_topic_name(topic)?;
        check_wire_size::<M>()?;
        qos.validate()?;

        Ok(Self {
            topic: topic.to_string(),
            port,
            group: None,
            qos,
            transport,
            clock,
            socket: None,
            callback: None,
            stats: SubscriptionStats::default(),
            rx_buffer: [0u8; RX_BUFFER_SIZE],
        })
    }

    /// Attach the callback used by `spin_once` / `spin_all`
    #[must_use]
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&M) + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Replace the callback
    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&M) + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    /// Bind the topic port for unicast/broadcast reception and register
    pub fn init(&mut self, registry: &mut TopicRegistry) -> Result<()> {
        if self.socket.is_some() {
            return Err(Error::AlreadyInitialized);
        }

        let socket = self.transport.bind(self.port)?;
        self.finish_init(socket, registry);
        Ok(())
    }

    /// Bind the topic port and join `group`.
    ///
    /// Uses the transport's combined bind+join when available, otherwise
    /// binds and joins in two steps. Fails only if both paths fail.
    pub fn init_multicast(&mut self, registry: &mut TopicRegistry, group: Ipv4Addr) -> Result<()> {
        if self.socket.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        if !group.is_multicast() {
            return Err(Error::InvalidParameter("not a multicast address"));
        }

        let socket = match self.transport.bind_multicast(self.port, group) {
            Ok(socket) => socket,
            Err(e) => {
                log::debug!(
                    "[Subscription] '{}' combined multicast bind failed ({}), trying bind + join",
                    self.topic,
                    e
                );
                let mut socket = self.transport.bind(self.port)?;
                socket.join_multicast(group)?;
                socket
            }
        };

        self.group = Some(group);
        self.finish_init(socket, registry);
        Ok(())
    }

    fn finish_init(&mut self, socket: X::Socket, registry: &mut TopicRegistry) {
        let registered = registry.register(&self.topic, self.port, M::SIZE, TopicRole::Subscriber);
        if let Err(e) = registered {
            log::warn!("[Subscription] topic '{}' not registered: {}", self.topic, e);
        }

        match self.group {
            Some(group) => log::debug!(
                "[Subscription] '{}' listening on port {} group {} ({} bytes)",
                self.topic,
                socket.local_port(),
                group,
                M::SIZE
            ),
            None => log::debug!(
                "[Subscription] '{}' listening on port {} ({} bytes)",
                self.topic,
                socket.local_port(),
                M::SIZE
            ),
        }
        self.socket = Some(socket);
    }

    /// Poll one datagram; `None` if nothing valid was pending
    fn receive(&mut self) -> Option<M> {
        let socket = self.socket.as_mut()?;

        let len = match socket.try_recv(&mut self.rx_buffer) {
            Ok(Some(len)) => len,
            Ok(None) => return None,
            Err(e) => {
                log::debug!("[Subscription] '{}' receive error: {}", self.topic, e);
                return None;
            }
        };

        if len != M::SIZE {
            self.stats.dropped += 1;
            log::debug!(
                "[Subscription] '{}' dropped datagram: {} bytes, expected {}",
                self.topic,
                len,
                M::SIZE
            );
            return None;
        }

        match decode_message::<M>(&self.rx_buffer[..len]) {
            Ok(msg) => {
                self.stats.received += 1;
                self.stats.last_receive_micros = self.clock.now_micros();
                Some(msg)
            }
            Err(e) => {
                self.stats.dropped += 1;
                log::debug!("[Subscription] '{}' decode failed: {}", self.topic, e);
                None
            }
        }
    }

    /// Non-blocking single-message drain into `out`.
    ///
    /// Returns `false` without touching `out` when nothing is pending or the
    /// pending datagram was dropped. A drop does not retry within the call.
    pub fn take(&mut self, out: &mut M) -> bool {
        match self.receive() {
            Some(msg) => {
                *out = msg;
                true
            }
            None => false,
        }
    }

    /// Like [`take`](Self::take), returning the message by value
    pub fn try_take(&mut self) -> Option<M> {
        self.receive()
    }

    /// Receive one message and hand it to the callback.
    ///
    /// Returns `false` (and consumes nothing) when no callback is set.
    pub fn spin_once(&mut self) -> bool {
        if self.callback.is_none() {
            return false;
        }

        let Some(msg) = self.receive() else {
            return false;
        };
        if let Some(callback) = self.callback.as_mut() {
            callback(&msg);
        }
        true
    }

    /// Run `spin_once` until it reports nothing or `qos.depth` messages were
    /// processed. Returns the number processed.
    pub fn spin_all(&mut self) -> usize {
        let budget = self.qos.budget();
        let mut processed = 0;
        while processed < budget && self.spin_once() {
            processed += 1;
        }
        processed
    }

    /// Topic name
    pub fn topic_name(&self) -> &str {
        &self.topic
    }

    /// Bound port
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Joined multicast group, if any
    pub const fn multicast_group(&self) -> Option<Ipv4Addr> {
        self.group
    }

    /// QoS profile
    pub const fn qos(&self) -> &QosProfile {
        &self.qos
    }

    /// Whether `init` / `init_multicast` succeeded
    pub fn is_initialized(&self) -> bool {
        self.socket.is_some()
    }

    /// Whether a callback is attached
    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Counters snapshot
    pub const fn stats(&self) -> SubscriptionStats {
        self.stats
    }

    /// Wire size of `M`
    pub const fn message_size(&self) -> usize {
        M::SIZE
    }
}

impl<M, X, C> fmt::Debug for Subscription<M, X, C>
where
    M: Message,
    X: Transport,
    C: Clock,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("port", &self.port)
            .field("group", &self.group)
            .field("initialized", &self.is_initialized())
            .field("callback", &self.has_callback())
            .field("stats", &self.stats)
            .finish()
    }
}
