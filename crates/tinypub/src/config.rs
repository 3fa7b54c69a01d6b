// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! tinypub configuration - single source of truth for constants
//!
//! - **Static**: compile-time constants (ports, addresses, capacities)
//! - **Dynamic**: [`NodeConfig`], optionally seeded from `TINYPUB_*` env vars
//!
//! ```ignore
//! use tinypub::config::NodeConfig;
//!
//! let config = NodeConfig::new("motor_module")
//!     .with_namespace("arm")
//!     .with_max_subscriptions(4);
//! ```

use std::net::Ipv4Addr;

// =======================================================================
// Port assignment
// =======================================================================

/// Base port for topic-derived ports.
///
/// `auto_port(name) = DEFAULT_BASE_PORT + hash(name) % AUTO_PORT_SPAN`,
/// so derived ports land in `[7000, 7999]`.
pub const DEFAULT_BASE_PORT: u16 = 7000;

/// Width of the topic-derived port window
pub const AUTO_PORT_SPAN: u32 = 1000;

/// Highest base port whose whole derived window fits in `u16` (64536)
pub const MAX_BASE_PORT: u16 = u16::MAX - (AUTO_PORT_SPAN as u16 - 1);

// =======================================================================
// Addresses
// =======================================================================

/// Default multicast group (administratively scoped, same as DDS SPDP)
pub const DEFAULT_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 1);

/// Limited broadcast address (subnet-local only)
pub const BROADCAST_ADDR: Ipv4Addr = Ipv4Addr::BROADCAST;

// =======================================================================
// Capacities
// =======================================================================

/// Maximum number of topics in a [`TopicRegistry`](crate::TopicRegistry)
pub const MAX_TOPICS: usize = 32;

/// Maximum topic name length in bytes
pub const MAX_TOPIC_NAME_LEN: usize = 63;

/// Default per-node publisher capacity
pub const DEFAULT_MAX_PUBLISHERS: usize = 8;

/// Default per-node subscription capacity
pub const DEFAULT_MAX_SUBSCRIPTIONS: usize = 8;

/// Default per-node timer capacity
pub const DEFAULT_MAX_TIMERS: usize = 8;

// =======================================================================
// QoS / scheduling
// =======================================================================

/// Default drain budget per `spin_all`
pub const DEFAULT_QOS_DEPTH: u32 = 10;

/// Drain budget of the sensor-data profile
pub const SENSOR_QOS_DEPTH: u32 = 5;

/// Below this many microseconds `Rate::sleep` busy-waits instead of sleeping
pub const SPIN_THRESHOLD_MICROS: u64 = 1000;

// =======================================================================
// Environment variables
// =======================================================================

/// Overrides [`NodeConfig::base_port`]
pub const ENV_BASE_PORT: &str = "TINYPUB_BASE_PORT";
/// Overrides [`NodeConfig::namespace`]
pub const ENV_NAMESPACE: &str = "TINYPUB_NAMESPACE";
/// Overrides [`NodeConfig::max_publishers`]
pub const ENV_MAX_PUBLISHERS: &str = "TINYPUB_MAX_PUBLISHERS";
/// Overrides [`NodeConfig::max_subscriptions`]
pub const ENV_MAX_SUBSCRIPTIONS: &str = "TINYPUB_MAX_SUBSCRIPTIONS";
/// Overrides [`NodeConfig::max_timers`]
pub const ENV_MAX_TIMERS: &str = "TINYPUB_MAX_TIMERS";
/// Interface address used for multicast joins by `UdpTransport`
pub const ENV_MULTICAST_IF: &str = "TINYPUB_MULTICAST_IF";

/// Node configuration
///
/// Capacities bound the node's publisher, subscription and timer tables.
/// Creation beyond a capacity fails with
/// [`Error::CapacityExceeded`](crate::Error::CapacityExceeded).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeConfig {
    /// Node name
    pub name: String,
    /// Namespace prefix for relative topic names (empty = none)
    pub namespace: String,
    /// Base port for topic-derived ports
    pub base_port: u16,
    /// Publisher capacity
    pub max_publishers: usize,
    /// Subscription capacity
    pub max_subscriptions: usize,
    /// Timer capacity
    pub max_timers: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: String::from("node"),
            namespace: String::new(),
            base_port: DEFAULT_BASE_PORT,
            max_publishers: DEFAULT_MAX_PUBLISHERS,
            max_subscriptions: DEFAULT_MAX_SUBSCRIPTIONS,
            max_timers: DEFAULT_MAX_TIMERS,
        }
    }
}

impl NodeConfig {
    /// Default configuration for a named node
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Default configuration with `TINYPUB_*` environment overrides applied.
    ///
    /// Unparseable values are ignored (logged at debug).
    pub fn from_env(name: &str) -> Self {
        Self::new(name).apply_overrides(|key| std::env::var(key).ok())
    }

    /// Set namespace
    #[must_use]
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.trim_matches('/').to_string();
        self
    }

    /// Set base port for topic-derived ports.
    ///
    /// Values above [`MAX_BASE_PORT`] are ignored (logged at warn) and the
    /// current base port is kept.
    #[must_use]
    pub fn with_base_port(mut self, base_port: u16) -> Self {
        if base_port > MAX_BASE_PORT {
            log::warn!(
                "[config] base port {} ignored (max {}, derived ports would exceed 65535)",
                base_port,
                MAX_BASE_PORT
            );
            return self;
        }
        self.base_port = base_port;
        self
    }

    /// Set publisher capacity
    #[must_use]
    pub fn with_max_publishers(mut self, max: usize) -> Self {
        self.max_publishers = max;
        self
    }

    /// Set subscription capacity
    #[must_use]
    pub fn with_max_subscriptions(mut self, max: usize) -> Self {
        self.max_subscriptions = max;
        self
    }

    /// Set timer capacity
    #[must_use]
    pub fn with_max_timers(mut self, max: usize) -> Self {
        self.max_timers = max;
        self
    }

    /// Apply overrides from a key lookup (env vars in production, a map in tests)
    fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = parse_override::<u16>(&lookup, ENV_BASE_PORT) {
            self = self.with_base_port(port);
        }
        if let Some(ns) = lookup(ENV_NAMESPACE) {
            self = self.with_namespace(&ns);
        }
        if let Some(max) = parse_override::<usize>(&lookup, ENV_MAX_PUBLISHERS) {
            self.max_publishers = max;
        }
        if let Some(max) = parse_override::<usize>(&lookup, ENV_MAX_SUBSCRIPTIONS) {
            self.max_subscriptions = max;
        }
        if let Some(max) = parse_override::<usize>(&lookup, ENV_MAX_TIMERS) {
            self.max_timers = max;
        }
        self
    }
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => {
            log::debug!("[config] {}={} applied", key, raw);
            Some(value)
        }
        Err(_) => {
            log::debug!("[config] ignoring invalid {}='{}'", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::new("imu");
        assert_eq!(config.name, "imu");
        assert_eq!(config.base_port, 7000);
        assert_eq!(config.max_publishers, 8);
        assert_eq!(config.max_subscriptions, 8);
        assert_eq!(config.max_timers, 8);
        assert!(config.namespace.is_empty());
    }

    #[test]
    fn test_namespace_slashes_trimmed() {
        let config = NodeConfig::new("imu").with_namespace("/robot1/");
        assert_eq!(config.namespace, "robot1");
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_BASE_PORT, "9000"),
            (ENV_NAMESPACE, "leg"),
            (ENV_MAX_TIMERS, "2"),
            (ENV_MAX_PUBLISHERS, "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config =
            NodeConfig::new("knee").apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.base_port, 9000);
        assert_eq!(config.namespace, "leg");
        assert_eq!(config.max_timers, 2);
        assert_eq!(config.max_publishers, DEFAULT_MAX_PUBLISHERS);
    }

    #[test]
    fn test_base_port_window_must_fit() {
        assert_eq!(u32::from(MAX_BASE_PORT) + AUTO_PORT_SPAN - 1, 65535);

        let config = NodeConfig::new("n").with_base_port(MAX_BASE_PORT);
        assert_eq!(config.base_port, MAX_BASE_PORT);

        let config = NodeConfig::new("n").with_base_port(65000);
        assert_eq!(config.base_port, DEFAULT_BASE_PORT);

        let config = NodeConfig::new("n")
            .apply_overrides(|k| (k == ENV_BASE_PORT).then(|| "65000".to_string()));
        assert_eq!(config.base_port, DEFAULT_BASE_PORT);
    }
}
