// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for tinypub
//!
//! Every failure in the messaging core degrades to "this operation did not
//! happen". Nothing here is fatal to the process. Malformed datagrams are not
//! errors at all: subscriptions drop and count them (see
//! [`SubscriptionStats::dropped`](crate::SubscriptionStats)).

use std::net::{Ipv4Addr, SocketAddrV4};

use thiserror::Error;

/// Result type for tinypub operations
pub type Result<T> = core::result::Result<T, Error>;

/// Error type for tinypub
///
/// OS-level failures are carried as strings so the enum stays `Clone` and
/// `PartialEq` (tests assert on exact variants).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A bounded table (registry, node collection) is full
    #[error("{what} capacity exceeded (max {capacity})")]
    CapacityExceeded {
        /// Which collection overflowed
        what: &'static str,
        /// Configured capacity
        capacity: usize,
    },

    /// Operation requires a successful `init()` first
    #[error("endpoint not initialized")]
    NotInitialized,

    /// `init()` called twice on the same endpoint
    #[error("endpoint already initialized")]
    AlreadyInitialized,

    /// Transport could not bind the requested port
    #[error("failed to bind port {port}: {reason}")]
    Bind {
        /// Requested local port (0 = ephemeral)
        port: u16,
        /// Underlying cause
        reason: String,
    },

    /// Transport could not join the multicast group
    #[error("failed to join multicast group {group}: {reason}")]
    MulticastJoin {
        /// Multicast group address
        group: Ipv4Addr,
        /// Underlying cause
        reason: String,
    },

    /// Transport send failed
    #[error("send to {dest} failed: {reason}")]
    Send {
        /// Destination address
        dest: SocketAddrV4,
        /// Underlying cause
        reason: String,
    },

    /// Transport receive failed (other than "nothing pending")
    #[error("receive on port {port} failed: {reason}")]
    Receive {
        /// Local port
        port: u16,
        /// Underlying cause
        reason: String,
    },

    /// Invalid parameter
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// Topic name does not fit the registry's fixed-size name slot
    #[error("topic name too long ({len} bytes, max {max})")]
    TopicNameTooLong {
        /// Actual length in bytes
        len: usize,
        /// Maximum length in bytes
        max: usize,
    },

    /// QoS profile is malformed
    #[error("invalid QoS: {0}")]
    InvalidQos(&'static str),

    /// QoS policy declared but not enforceable over this transport
    #[error("unsupported QoS: {0}")]
    UnsupportedQos(&'static str),

    /// Encode/decode buffer too small
    #[error("buffer too small")]
    BufferTooSmall,

    /// Payload length does not match the message's fixed size
    #[error("size mismatch (expected {expected} bytes, got {actual})")]
    SizeMismatch {
        /// Fixed size of the message type
        expected: usize,
        /// Observed length
        actual: usize,
    },

    /// Capability not provided by this transport
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

impl Error {
    /// True for bind and multicast-join failures
    pub const fn is_bind_failure(&self) -> bool {
        matches!(self, Error::Bind { .. } | Error::MulticastJoin { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_capacity() {
        let err = Error::CapacityExceeded {
            what: "publisher",
            capacity: 8,
        };
        assert_eq!(err.to_string(), "publisher capacity exceeded (max 8)");
    }

    #[test]
    fn test_bind_failure_classification() {
        let bind = Error::Bind {
            port: 7100,
            reason: "in use".into(),
        };
        let join = Error::MulticastJoin {
            group: Ipv4Addr::new(239, 255, 0, 1),
            reason: "no route".into(),
        };
        assert!(bind.is_bind_failure());
        assert!(join.is_bind_failure());
        assert!(!Error::NotInitialized.is_bind_failure());
    }
}
