// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Node - bounded owner of publishers, subscriptions and timers
//!
//! # Design
//!
//! - Sole owner: endpoints live as long as the node and are released
//!   synchronously when it drops
//! - Bounded: each collection has a capacity from [`NodeConfig`]; creation
//!   past it fails with [`Error::CapacityExceeded`] and has no side effects
//! - Consistent factories: every `create_*` either returns a handle to an
//!   initialized endpoint or returns `Err` and stores nothing
//! - Cooperative: [`Node::spin_once`] fires due timers and drains every
//!   subscription once (bounded by each subscription's QoS depth)
//!
//! # Example
//!
//! ```ignore
//! let mut node = Node::new("arm", UdpTransport::new(), SystemClock::new());
//! let cmd = node.create_broadcast_publisher::<MotorCommand>("motor/cmd", None, QosProfile::default())?;
//! node.create_subscription::<Feedback, _>("motor/feedback", None, |fb| log::info!("{:?}", fb), QosProfile::sensor_data())?;
//! let mut rate = node.create_rate(100.0)?;
//!
//! loop {
//!     node.publish(cmd, &MotorCommand::default())?;
//!     node.spin_once();
//!     rate.sleep();
//! }
//! ```

use core::any::Any;
use core::fmt;
use core::marker::PhantomData;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::config::NodeConfig;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::publisher::{DeliveryMode, Publisher, PublisherStats};
use crate::qos::QosProfile;
use crate::rate::Rate;
use crate::registry::{auto_port, TopicRegistry};
use crate::subscription::{Subscription, SubscriptionStats};
use crate::timer::Timer;
use crate::transport::{Transport, UdpTransport};

// =======================================================================
// Type-erased endpoints
// =======================================================================

/// Publisher as stored by a [`Node`], independent of its message type
pub trait PublisherEntity {
    /// Topic name
    fn topic_name(&self) -> &str;

    /// Resolved destination
    fn destination(&self) -> SocketAddrV4;

    /// Counters snapshot
    fn stats(&self) -> PublisherStats;

    /// Downcast support for typed handle access
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Subscription as stored by a [`Node`], independent of its message type
pub trait SubscriptionEntity {
    /// Topic name
    fn topic_name(&self) -> &str;

    /// Drain up to the QoS depth through the callback
    fn spin_all(&mut self) -> usize;

    /// Counters snapshot
    fn stats(&self) -> SubscriptionStats;

    /// Downcast support for typed handle access
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<M, X, C> PublisherEntity for Publisher<M, X, C>
where
    M: Message + 'static,
    X: Transport + 'static,
    C: Clock + 'static,
{
    fn topic_name(&self) -> &str {
        Publisher::topic_name(self)
    }

    fn destination(&self) -> SocketAddrV4 {
        Publisher::destination(self)
    }

    fn stats(&self) -> PublisherStats {
        Publisher::stats(self)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<M, X, C> SubscriptionEntity for Subscription<M, X, C>
where
    M: Message + 'static,
    X: Transport + 'static,
    C: Clock + 'static,
{
    fn topic_name(&self) -> &str {
        Subscription::topic_name(self)
    }

    fn spin_all(&mut self) -> usize {
        Subscription::spin_all(self)
    }

    fn stats(&self) -> SubscriptionStats {
        Subscription::stats(self)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// =======================================================================
// Handles
// =======================================================================

/// Typed reference to a publisher owned by a [`Node`]
///
/// Only meaningful for the node that returned it.
pub struct PublisherHandle<M> {
    index: usize,
    _message: PhantomData<fn() -> M>,
}

/// Typed reference to a subscription owned by a [`Node`]
///
/// Only meaningful for the node that returned it.
pub struct SubscriptionHandle<M> {
    index: usize,
    _message: PhantomData<fn() -> M>,
}

/// Reference to a timer owned by a [`Node`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerHandle {
    index: usize,
}

macro_rules! typed_handle {
    ($handle:ident) => {
        impl<M> $handle<M> {
            const fn new(index: usize) -> Self {
                Self {
                    index,
                    _message: PhantomData,
                }
            }

            /// Slot index inside the owning node
            pub const fn index(&self) -> usize {
                self.index
            }
        }

        impl<M> Clone for $handle<M> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<M> Copy for $handle<M> {}

        impl<M> PartialEq for $handle<M> {
            fn eq(&self, other: &Self) -> bool {
                self.index == other.index
            }
        }

        impl<M> Eq for $handle<M> {}

        impl<M> fmt::Debug for $handle<M> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($handle), self.index)
            }
        }
    };
}

typed_handle!(PublisherHandle);
typed_handle!(SubscriptionHandle);

impl TimerHandle {
    /// Slot index inside the owning node
    pub const fn index(&self) -> usize {
        self.index
    }
}

// =======================================================================
// Node
// =======================================================================

/// Node - aggregate owner and factory
pub struct Node<X = UdpTransport, C = SystemClock>
where
    X: Transport + 'static,
    C: Clock + 'static,
{
    config: NodeConfig,
    transport: X,
    clock: C,
    registry: TopicRegistry,
    publishers: Vec<Box<dyn PublisherEntity>>,
    subscriptions: Vec<Box<dyn SubscriptionEntity>>,
    timers: Vec<Timer<C>>,
}

impl<X, C> Node<X, C>
where
    X: Transport + 'static,
    C: Clock + 'static,
{
    /// Node with default capacities
    pub fn new(name: &str, transport: X, clock: C) -> Self {
        Self::with_config(NodeConfig::new(name), transport, clock)
    }

    /// Node with explicit configuration
    pub fn with_config(config: NodeConfig, transport: X, clock: C) -> Self {
        log::info!(
            "[Node] '{}' created (namespace='{}', base_port={}, max pubs/subs/timers={}/{}/{})",
            config.name,
            config.namespace,
            config.base_port,
            config.max_publishers,
            config.max_subscriptions,
            config.max_timers
        );

        Self {
            // Capacities are limits, not allocation hints: grown on demand
            publishers: Vec::new(),
            subscriptions: Vec::new(),
            timers: Vec::new(),
            config,
            transport,
            clock,
            registry: TopicRegistry::new(),
        }
    }

    // -------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------

    /// Node name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Namespace (empty = none)
    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Fully qualified node name (`/ns/name` or `/name`)
    pub fn full_name(&self) -> String {
        self.resolve_topic_name(&self.config.name)
    }

    /// Resolve a topic name against the namespace.
    ///
    /// Absolute names (leading `/`) are kept; relative names become
    /// `/<namespace>/<topic>` or `/<topic>`.
    pub fn resolve_topic_name(&self, topic: &str) -> String {
        if topic.starts_with('/') {
            topic.to_string()
        } else if self.config.namespace.is_empty() {
            format!("/{}", topic)
        } else {
            format!("/{}/{}", self.config.namespace, topic)
        }
    }

    /// Configuration
    pub const fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Topic registry owned by this node
    pub const fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    /// Node clock
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    fn topic_port(&self, resolved: &str, port: Option<u16>) -> u16 {
        port.unwrap_or_else(|| auto_port(resolved, self.config.base_port))
    }

    fn check_capacity(&self, what: &'static str, len: usize, capacity: usize) -> Result<()> {
        if len >= capacity {
            log::warn!(
                "[Node] '{}' {} capacity exceeded (max {})",
                self.config.name,
                what,
                capacity
            );
            return Err(Error::CapacityExceeded { what, capacity });
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Publishers
    // -------------------------------------------------------------------

    /// Create a unicast publisher to `addr`.
    ///
    /// `port: None` derives the port from the resolved topic name.
    pub fn create_publisher<M>(
        &mut self,
        topic: &str,
        addr: Ipv4Addr,
        port: Option<u16>,
        qos: QosProfile,
    ) -> Result<PublisherHandle<M>>
    where
        M: Message + 'static,
    {
        self.add_publisher(topic, DeliveryMode::Unicast(addr), port, qos)
    }

    /// Create a subnet broadcast publisher
    pub fn create_broadcast_publisher<M>(
        &mut self,
        topic: &str,
        port: Option<u16>,
        qos: QosProfile,
    ) -> Result<PublisherHandle<M>>
    where
        M: Message + 'static,
    {
        self.add_publisher(topic, DeliveryMode::Broadcast, port, qos)
    }

    /// Create a multicast publisher to `group`
    pub fn create_multicast_publisher<M>(
        &mut self,
        topic: &str,
        port: Option<u16>,
        group: Ipv4Addr,
        qos: QosProfile,
    ) -> Result<PublisherHandle<M>>
    where
        M: Message + 'static,
    {
        self.add_publisher(topic, DeliveryMode::Multicast(group), port, qos)
    }

    fn add_publisher<M>(
        &mut self,
        topic: &str,
        mode: DeliveryMode,
        port: Option<u16>,
        qos: QosProfile,
    ) -> Result<PublisherHandle<M>>
    where
        M: Message + 'static,
    {
        self.check_capacity("publisher", self.publishers.len(), self.config.max_publishers)?;

        let name = self.resolve_topic_name(topic);
        let port = self.topic_port(&name, port);
        let mut publisher = Publisher::<M, X, C>::new(
            &name,
            mode,
            port,
            qos,
            self.transport.clone(),
            self.clock.clone(),
        )?;
        if let Err(e) = publisher.init(&mut self.registry) {
            log::warn!("[Node] '{}' publisher '{}' init failed: {}", self.config.name, name, e);
            return Err(e);
        }

        let index = self.publishers.len();
        self.publishers.push(Box::new(publisher));
        log::debug!("[Node] '{}' publisher #{} on '{}' ({})", self.config.name, index, name, mode);
        Ok(PublisherHandle::new(index))
    }

    /// Typed access to an owned publisher
    pub fn publisher<M>(&mut self, handle: PublisherHandle<M>) -> Option<&mut Publisher<M, X, C>>
    where
        M: Message + 'static,
    {
        self.publishers
            .get_mut(handle.index)?
            .as_any_mut()
            .downcast_mut::<Publisher<M, X, C>>()
    }

    /// Publish through an owned publisher
    pub fn publish<M>(&mut self, handle: PublisherHandle<M>, msg: &M) -> Result<()>
    where
        M: Message + 'static,
    {
        self.publisher(handle)
            .ok_or(Error::InvalidParameter("unknown publisher handle"))?
            .publish(msg)
    }

    // -------------------------------------------------------------------
    // Subscriptions
    // -------------------------------------------------------------------

    /// Create a subscription that delivers through `callback` when spun
    pub fn create_subscription<M, F>(
        &mut self,
        topic: &str,
        port: Option<u16>,
        callback: F,
        qos: QosProfile,
    ) -> Result<SubscriptionHandle<M>>
    where
        M: Message + 'static,
        F: FnMut(&M) + 'static,
    {
        let subscription = self.new_subscription::<M>(topic, port, qos)?.with_callback(callback);
        self.adopt_subscription(subscription, None)
    }

    /// Create a polling-only subscription (read with [`Node::take`])
    pub fn create_polling_subscription<M>(
        &mut self,
        topic: &str,
        port: Option<u16>,
        qos: QosProfile,
    ) -> Result<SubscriptionHandle<M>>
    where
        M: Message + 'static,
    {
        let subscription = self.new_subscription::<M>(topic, port, qos)?;
        self.adopt_subscription(subscription, None)
    }

    /// Create a subscription that joins `group`
    pub fn create_multicast_subscription<M, F>(
        &mut self,
        topic: &str,
        port: Option<u16>,
        group: Ipv4Addr,
        callback: F,
        qos: QosProfile,
    ) -> Result<SubscriptionHandle<M>>
    where
        M: Message + 'static,
        F: FnMut(&M) + 'static,
    {
        let subscription = self.new_subscription::<M>(topic, port, qos)?.with_callback(callback);
        self.adopt_subscription(subscription, Some(group))
    }

    /// Create a polling-only subscription that joins `group`
    pub fn create_polling_multicast_subscription<M>(
        &mut self,
        topic: &str,
        port: Option<u16>,
        group: Ipv4Addr,
        qos: QosProfile,
    ) -> Result<SubscriptionHandle<M>>
    where
        M: Message + 'static,
    {
        let subscription = self.new_subscription::<M>(topic, port, qos)?;
        self.adopt_subscription(subscription, Some(group))
    }

    fn new_subscription<M>(
        &self,
        topic: &str,
        port: Option<u16>,
        qos: QosProfile,
    ) -> Result<Subscription<M, X, C>>
    where
        M: Message + 'static,
    {
        self.check_capacity(
            "subscription",
            self.subscriptions.len(),
            self.config.max_subscriptions,
        )?;

        let name = self.resolve_topic_name(topic);
        let port = self.topic_port(&name, port);
        Subscription::new(&name, port, qos, self.transport.clone(), self.clock.clone())
    }

    fn adopt_subscription<M>(
        &mut self,
        mut subscription: Subscription<M, X, C>,
        group: Option<Ipv4Addr>,
    ) -> Result<SubscriptionHandle<M>>
    where
        M: Message + 'static,
    {
        let result = match group {
            Some(group) => subscription.init_multicast(&mut self.registry, group),
            None => subscription.init(&mut self.registry),
        };
        if let Err(e) = result {
            log::warn!(
                "[Node] '{}' subscription '{}' init failed: {}",
                self.config.name,
                subscription.topic_name(),
                e
            );
            return Err(e);
        }

        let index = self.subscriptions.len();
        log::debug!(
            "[Node] '{}' subscription #{} on '{}' port {}",
            self.config.name,
            index,
            subscription.topic_name(),
            subscription.port()
        );
        self.subscriptions.push(Box::new(subscription));
        Ok(SubscriptionHandle::new(index))
    }

    /// Typed access to an owned subscription
    pub fn subscription<M>(
        &mut self,
        handle: SubscriptionHandle<M>,
    ) -> Option<&mut Subscription<M, X, C>>
    where
        M: Message + 'static,
    {
        self.subscriptions
            .get_mut(handle.index)?
            .as_any_mut()
            .downcast_mut::<Subscription<M, X, C>>()
    }

    /// Non-blocking take from an owned subscription
    pub fn take<M>(&mut self, handle: SubscriptionHandle<M>, out: &mut M) -> bool
    where
        M: Message + 'static,
    {
        self.subscription(handle)
            .is_some_and(|subscription| subscription.take(out))
    }

    // -------------------------------------------------------------------
    // Timers and rates
    // -------------------------------------------------------------------

    /// Create a periodic timer driven by `spin_timers` / `spin_once`
    pub fn create_timer<F>(&mut self, period: Duration, callback: F) -> Result<TimerHandle>
    where
        F: FnMut() + 'static,
    {
        self.check_capacity("timer", self.timers.len(), self.config.max_timers)?;

        let index = self.timers.len();
        self.timers.push(Timer::new(period, callback, self.clock.clone()));
        log::debug!(
            "[Node] '{}' timer #{} every {:?}",
            self.config.name,
            index,
            period
        );
        Ok(TimerHandle { index })
    }

    /// Access an owned timer
    pub fn timer(&mut self, handle: TimerHandle) -> Option<&mut Timer<C>> {
        self.timers.get_mut(handle.index)
    }

    /// Loop pacer on the node clock (not owned by the node)
    pub fn create_rate(&self, hz: f64) -> Result<Rate<C>> {
        Rate::from_hz(hz, self.clock.clone())
    }

    // -------------------------------------------------------------------
    // Spinning
    // -------------------------------------------------------------------

    /// Poll every timer once; returns how many fired
    pub fn spin_timers(&mut self) -> usize {
        self.timers
            .iter_mut()
            .map(|timer| usize::from(timer.spin_once()))
            .sum()
    }

    /// Drain every subscription once (each bounded by its QoS depth);
    /// returns the number of messages delivered
    pub fn spin_subscriptions(&mut self) -> usize {
        self.subscriptions
            .iter_mut()
            .map(|subscription| subscription.spin_all())
            .sum()
    }

    /// One cooperative step: timers, then subscriptions.
    ///
    /// Returns the number of callbacks executed.
    pub fn spin_once(&mut self) -> usize {
        self.spin_timers() + self.spin_subscriptions()
    }

    // -------------------------------------------------------------------
    // Introspection
    // -------------------------------------------------------------------

    /// Number of owned publishers
    pub fn publisher_count(&self) -> usize {
        self.publishers.len()
    }

    /// Number of owned subscriptions
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Number of owned timers
    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    /// Log endpoints and the topic catalog at info level
    pub fn log_topics(&self) {
        log::info!("[Node] '{}' endpoints:", self.full_name());
        for publisher in &self.publishers {
            let stats = publisher.stats();
            log::info!(
                "[Node]   pub {} -> {} (sent={}, errors={})",
                publisher.topic_name(),
                publisher.destination(),
                stats.sent,
                stats.send_errors
            );
        }
        for subscription in &self.subscriptions {
            let stats = subscription.stats();
            log::info!(
                "[Node]   sub {} (received={}, dropped={})",
                subscription.topic_name(),
                stats.received,
                stats.dropped
            );
        }
        self.registry.log_topics();
    }
}

impl<X, C> fmt::Debug for Node<X, C>
where
    X: Transport + 'static,
    C: Clock + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("config", &self.config)
            .field("publishers", &self.publishers.len())
            .field("subscriptions", &self.subscriptions.len())
            .field("timers", &self.timers.len())
            .field("topics", &self.registry.len())
            .finish()
    }
}

impl<X, C> Drop for Node<X, C>
where
    X: Transport + 'static,
    C: Clock + 'static,
{
    fn drop(&mut self) {
        log::info!(
            "[Node] '{}' destroyed ({} publishers, {} subscriptions, {} timers)",
            self.config.name,
            self.publishers.len(),
            self.subscriptions.len(),
            self.timers.len()
        );
        self.timers.clear();
        self.subscriptions.clear();
        self.publishers.clear();
    }
}
