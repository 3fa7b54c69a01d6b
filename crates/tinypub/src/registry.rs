// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic registry - topic name -> {port, payload size, role}
//!
//! A bounded catalog (at most [`MAX_TOPICS`] entries, names up to
//! [`MAX_TOPIC_NAME_LEN`] bytes) with inline storage. Each [`Node`](crate::Node)
//! owns one; isolated registries can be built for tests.
//!
//! Registration is first-writer-wins: registering a name that is already
//! present succeeds and leaves the stored entry untouched.

use core::fmt;

use heapless::{String, Vec};

use crate::config::{AUTO_PORT_SPAN, MAX_BASE_PORT, MAX_TOPICS, MAX_TOPIC_NAME_LEN};
use crate::error::{Error, Result};

/// Which side registered the topic
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TopicRole {
    /// Registered by a publisher
    Publisher,
    /// Registered by a subscription
    Subscriber,
}

impl fmt::Display for TopicRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicRole::Publisher => write!(f, "pub"),
            TopicRole::Subscriber => write!(f, "sub"),
        }
    }
}

/// One registry row
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicEntry {
    name: String<MAX_TOPIC_NAME_LEN>,
    /// Transport port
    pub port: u16,
    /// Fixed message size in bytes
    pub payload_size: usize,
    /// Role of the first registrant
    pub role: TopicRole,
}

impl TopicEntry {
    /// Topic name
    pub fn name(&self) -> &str {
        self.name.as_str()
    }
}

impl fmt::Display for TopicEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> port {} ({}, {} bytes)",
            self.name, self.port, self.role, self.payload_size
        )
    }
}

/// Bounded topic catalog
#[derive(Clone, Debug)]
pub struct TopicRegistry {
    entries: Vec<TopicEntry, MAX_TOPICS>,
    capacity: usize,
}

impl Default for TopicRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicRegistry {
    /// Registry with the full [`MAX_TOPICS`] capacity
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            capacity: MAX_TOPICS,
        }
    }

    /// Registry with a smaller capacity (clamped to [`MAX_TOPICS`])
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.min(MAX_TOPICS),
        }
    }

    /// Register a topic.
    ///
    /// - Already present: `Ok(())`, stored entry unchanged.
    /// - Table full: `Err(CapacityExceeded)`, no mutation.
    /// - Name longer than [`MAX_TOPIC_NAME_LEN`]: `Err(TopicNameTooLong)`.
    pub fn register(
        &mut self,
        name: &str,
        port: u16,
        payload_size: usize,
        role: TopicRole,
    ) -> Result<()> {
        if self.contains(name) {
            return Ok(());
        }

        if self.entries.len() >= self.capacity {
            return Err(Error::CapacityExceeded {
                what: "topic registry",
                capacity: self.capacity,
            });
        }

        let name = String::try_from(name).map_err(|()| Error::TopicNameTooLong {
            len: name.len(),
            max: MAX_TOPIC_NAME_LEN,
        })?;

        let entry = TopicEntry {
            name,
            port,
            payload_size,
            role,
        };
        self.entries
            .push(entry)
            .map_err(|_| Error::CapacityExceeded {
                what: "topic registry",
                capacity: self.capacity,
            })
    }

    /// Port registered for `name`
    pub fn port_for(&self, name: &str) -> Option<u16> {
        self.get(name).map(|entry| entry.port)
    }

    /// Entry registered for `name`
    pub fn get(&self, name: &str) -> Option<&TopicEntry> {
        self.entries.iter().find(|entry| entry.name.as_str() == name)
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of registered topics
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured capacity
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate entries in registration order
    pub fn iter(&self) -> impl Iterator<Item = &TopicEntry> {
        self.entries.iter()
    }

    /// Iterate topic names in registration order
    pub fn topic_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(TopicEntry::name)
    }

    /// Log every entry at info level
    pub fn log_topics(&self) {
        log::info!("[TopicRegistry] {} registered topic(s):", self.len());
        for entry in &self.entries {
            log::info!("[TopicRegistry]   {}", entry);
        }
    }
}

/// Validate a topic name before an endpoint is built
pub(crate) fn check_topic_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidParameter("topic name must not be empty"));
    }
    if name.len() > MAX_TOPIC_NAME_LEN {
        return Err(Error::TopicNameTooLong {
            len: name.len(),
            max: MAX_TOPIC_NAME_LEN,
        });
    }
    Ok(())
}

/// Deterministic default port for a topic name.
///
/// `base_port + (h mod 1000)` where `h = h * 31 + byte` over the name bytes
/// (wrapping 32-bit). Stable across runs and hosts, but not collision-free:
/// callers that need distinct ports must pass explicit ones.
///
/// A base above [`MAX_BASE_PORT`] is lowered to it, so the window never
/// runs past port 65535.
pub fn auto_port(name: &str, base_port: u16) -> u16 {
    let hash = name
        .bytes()
        .fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(u32::from(b)));
    base_port.min(MAX_BASE_PORT) + (hash % AUTO_PORT_SPAN) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BASE_PORT;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = TopicRegistry::new();
        registry
            .register("/motor/cmd", 6666, 16, TopicRole::Subscriber)
            .unwrap();

        assert_eq!(registry.port_for("/motor/cmd"), Some(6666));
        assert_eq!(registry.port_for("/unknown"), None);
        assert_eq!(registry.len(), 1);

        let entry = registry.get("/motor/cmd").unwrap();
        assert_eq!(entry.payload_size, 16);
        assert_eq!(entry.role, TopicRole::Subscriber);
        assert_eq!(entry.to_string(), "/motor/cmd -> port 6666 (sub, 16 bytes)");
    }

    #[test]
    fn test_reregistration_is_idempotent() {
        let mut registry = TopicRegistry::new();
        registry
            .register("/imu", 7001, 32, TopicRole::Publisher)
            .unwrap();
        registry
            .register("/imu", 7002, 64, TopicRole::Subscriber)
            .unwrap();

        assert_eq!(registry.len(), 1);
        let entry = registry.get("/imu").unwrap();
        assert_eq!(entry.port, 7001);
        assert_eq!(entry.payload_size, 32);
        assert_eq!(entry.role, TopicRole::Publisher);
    }

    #[test]
    fn test_capacity_exhaustion() {
        let mut registry = TopicRegistry::with_capacity(2);
        registry.register("a", 1, 1, TopicRole::Publisher).unwrap();
        registry.register("b", 2, 1, TopicRole::Publisher).unwrap();

        let result = registry.register("c", 3, 1, TopicRole::Publisher);
        assert_eq!(
            result,
            Err(Error::CapacityExceeded {
                what: "topic registry",
                capacity: 2
            })
        );
        assert_eq!(registry.len(), 2);
        assert!(!registry.contains("c"));

        // Existing names still succeed when full
        assert!(registry.register("a", 9, 9, TopicRole::Subscriber).is_ok());
    }

    #[test]
    fn test_full_capacity_clamped() {
        let registry = TopicRegistry::with_capacity(1000);
        assert_eq!(registry.capacity(), MAX_TOPICS);
    }

    #[test]
    fn test_name_too_long() {
        let mut registry = TopicRegistry::new();
        let long_name = "t".repeat(MAX_TOPIC_NAME_LEN + 1);
        let result = registry.register(&long_name, 1, 1, TopicRole::Publisher);
        assert_eq!(
            result,
            Err(Error::TopicNameTooLong {
                len: MAX_TOPIC_NAME_LEN + 1,
                max: MAX_TOPIC_NAME_LEN
            })
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_auto_port_known_values() {
        // h("a") = 97
        assert_eq!(auto_port("a", 7000), 7097);
        // h("ab") = 97 * 31 + 98 = 3105
        assert_eq!(auto_port("ab", 7000), 7105);
        assert_eq!(auto_port("", 7000), 7000);
    }

    #[test]
    fn test_auto_port_range_and_stability() {
        let mut rng = fastrand::Rng::with_seed(42);
        for _ in 0..200 {
            let len = rng.usize(1..40);
            let name: std::string::String =
                (0..len).map(|_| rng.alphanumeric()).collect();
            let port = auto_port(&name, DEFAULT_BASE_PORT);
            assert!((7000..8000).contains(&port));
            assert_eq!(port, auto_port(&name, DEFAULT_BASE_PORT));
        }
    }

    #[test]
    fn test_auto_port_high_base_keeps_topics_apart() {
        let names = ["/a", "/imu", "/motor/cmd", "/odom", "/status", "/joint"];

        let mut ports: std::vec::Vec<u16> =
            names.iter().map(|n| auto_port(n, MAX_BASE_PORT)).collect();
        assert!(ports.iter().all(|p| *p >= MAX_BASE_PORT));
        ports.sort_unstable();
        ports.dedup();
        assert_eq!(ports.len(), names.len());

        // Out-of-window base behaves like the highest valid one
        for name in names {
            assert_eq!(auto_port(name, 65000), auto_port(name, MAX_BASE_PORT));
            assert_eq!(auto_port(name, u16::MAX), auto_port(name, MAX_BASE_PORT));
        }
    }

    #[test]
    fn test_explicit_ports_independent() {
        let mut registry = TopicRegistry::new();
        registry.register("/x", 7100, 4, TopicRole::Publisher).unwrap();
        registry.register("/y", 7101, 4, TopicRole::Publisher).unwrap();
        assert_ne!(registry.port_for("/x"), registry.port_for("/y"));

        let names: std::vec::Vec<&str> = registry.topic_names().collect();
        assert_eq!(names, vec!["/x", "/y"]);
    }
}
