// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # tinypub - Topic-addressed publish/subscribe over UDP
//!
//! A lightweight messaging layer for modular robotics nodes exchanging
//! periodic sensor and control messages on a local network.
//!
//! ## Design Constraints
//!
//! - **Single-threaded, cooperative**: every operation is a bounded,
//!   non-blocking step except [`Rate::sleep`]
//! - **Bounded**: registry and node collections have fixed capacities
//! - **Best-effort**: one datagram per message, no acknowledgments
//! - **Fixed-size messages**: a datagram is valid iff its length equals
//!   [`Message::SIZE`]
//!
//! ## Architecture
//!
//! ```text
//! +-----------------------------------------+
//! |  Application (control loop)             |
//! +-----------------------------------------+
//!           v                    ^
//! +-----------------------------------------+
//! |  Node (owner, spin) / Timer / Rate      |
//! +-----------------------------------------+
//!           v                    ^
//! +-----------------------------------------+
//! |  Publisher<T> / Subscription<T> + QoS   |
//! +-----------------------------------------+
//!           v                    ^
//! +-----------------------------------------+
//! |  TopicRegistry | Message (fixed layout) |
//! +-----------------------------------------+
//!           v                    ^
//! +-----------------------------------------+
//! |  Transport (UDP / loopback) + Clock     |
//! +-----------------------------------------+
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tinypub::{impl_message, Node, QosProfile, SystemClock, UdpTransport};
//!
//! #[derive(Debug, Clone, Copy, Default, PartialEq)]
//! struct Point {
//!     x: f32,
//! }
//! impl_message!(Point { x: f32 });
//!
//! fn main() -> tinypub::Result<()> {
//!     let mut node = Node::new("demo", UdpTransport::new(), SystemClock::new());
//!     let publisher =
//!         node.create_broadcast_publisher::<Point>("point", Some(7100), QosProfile::default())?;
//!     node.create_subscription::<Point, _>(
//!         "point",
//!         Some(7100),
//!         |p| println!("x = {}", p.x),
//!         QosProfile::default(),
//!     )?;
//!     node.create_timer(Duration::from_secs(1), || println!("tick"))?;
//!
//!     let mut rate = node.create_rate(50.0)?;
//!     for _ in 0..100 {
//!         node.publish(publisher, &Point { x: 1.5 })?;
//!         node.spin_once();
//!         rate.sleep();
//!     }
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Clock abstraction (system and manual clocks)
pub mod clock;
/// Static constants and node configuration
pub mod config;
/// Error types for tinypub
pub mod error;
/// Fixed-layout message encoding
pub mod message;
/// Node: bounded endpoint owner and cooperative dispatcher
pub mod node;
/// Typed publisher and delivery modes
pub mod publisher;
/// QoS profiles
pub mod qos;
/// Loop pacing
pub mod rate;
/// Topic name -> port catalog
pub mod registry;
/// Typed subscription
pub mod subscription;
/// Periodic timers
pub mod timer;
/// Transport abstraction (UDP, loopback, null)
pub mod transport;

// Re-exports for convenience
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::NodeConfig;
pub use crate::error::{Error, Result};
pub use crate::message::Message;
pub use crate::node::{Node, PublisherHandle, SubscriptionHandle, TimerHandle};
pub use crate::publisher::{DeliveryMode, Publisher, PublisherStats};
pub use crate::qos::{History, QosProfile, Reliability};
pub use crate::rate::Rate;
pub use crate::registry::{auto_port, TopicEntry, TopicRegistry, TopicRole};
pub use crate::subscription::{Subscription, SubscriptionStats};
pub use crate::timer::Timer;
pub use crate::transport::{
    DatagramSocket, LoopbackTransport, NullTransport, Transport, UdpTransport,
};

/// Maximum datagram payload (Ethernet MTU minus IPv4 and UDP headers)
pub const MAX_PACKET_SIZE: usize = 1472;

/// Version of tinypub
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
