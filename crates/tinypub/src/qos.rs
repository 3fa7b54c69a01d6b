// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QoS (Quality of Service) profiles for publishers and subscriptions
//!
//! # Supported Policies
//!
//! - **Reliability**: BestEffort only. `Reliable` is declared for API parity
//!   with ROS2-style profiles but rejected by [`QosProfile::validate`]:
//!   datagrams carry no acknowledgments, so there is nothing to enforce it.
//! - **History**: KeepLast / KeepAll. Pending datagrams live in the transport's
//!   own queue, so both behave the same here: `depth` is the drain budget.
//! - **Depth**: maximum messages processed by one `spin_all` call (>= 1).
//!
//! # Examples
//!
//! ```
//! use tinypub::qos::{History, QosProfile};
//!
//! let qos = QosProfile::default();
//! assert_eq!(qos.depth, 10);
//! assert!(qos.validate().is_ok());
//!
//! let sensor = QosProfile::sensor_data();
//! assert_eq!(sensor.history, History::KeepLast);
//! assert_eq!(sensor.depth, 5);
//! ```

use crate::config::{DEFAULT_QOS_DEPTH, SENSOR_QOS_DEPTH};
use crate::error::{Error, Result};

/// QoS profile attached to a publisher or subscription
///
/// Validated at endpoint creation (fail-fast on invalid config) and immutable
/// afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QosProfile {
    /// Reliability policy
    pub reliability: Reliability,
    /// History policy
    pub history: History,
    /// Drain budget per `spin_all` (>= 1)
    pub depth: u32,
}

impl Default for QosProfile {
    fn default() -> Self {
        Self {
            reliability: Reliability::BestEffort,
            history: History::KeepLast,
            depth: DEFAULT_QOS_DEPTH,
        }
    }
}

impl QosProfile {
    /// Profile for high-rate sensor streams (best effort, small budget)
    #[must_use]
    pub fn sensor_data() -> Self {
        Self {
            depth: SENSOR_QOS_DEPTH,
            ..Self::default()
        }
    }

    /// Same profile with a different drain budget
    #[must_use]
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Validate QoS configuration
    ///
    /// # Validation Rules
    ///
    /// - `depth >= 1`
    /// - `Reliability::Reliable` is refused (no enforcement path over datagrams)
    ///
    /// ```
    /// use tinypub::qos::{QosProfile, Reliability};
    ///
    /// let mut qos = QosProfile::default();
    /// qos.depth = 0;
    /// assert!(qos.validate().is_err());
    ///
    /// qos.depth = 1;
    /// qos.reliability = Reliability::Reliable;
    /// assert!(qos.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        if self.depth == 0 {
            return Err(Error::InvalidQos("depth must be >= 1"));
        }

        if self.reliability == Reliability::Reliable {
            return Err(Error::UnsupportedQos(
                "Reliable requires acknowledgments; datagram transport is best-effort",
            ));
        }

        Ok(())
    }

    /// Drain budget as a count
    pub const fn budget(&self) -> usize {
        self.depth as usize
    }
}

/// Reliability policy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Reliability {
    /// Guaranteed delivery (declared, refused by `validate`)
    Reliable,
    /// Fire-and-forget
    #[default]
    BestEffort,
}

/// History policy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum History {
    /// Keep last `depth` messages
    #[default]
    KeepLast,
    /// Keep all messages (bounded by the transport queue)
    KeepAll,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile() {
        let qos = QosProfile::default();
        assert_eq!(qos.reliability, Reliability::BestEffort);
        assert_eq!(qos.history, History::KeepLast);
        assert_eq!(qos.budget(), 10);
    }

    #[test]
    fn test_depth_zero_rejected() {
        let qos = QosProfile::default().with_depth(0);
        assert_eq!(
            qos.validate(),
            Err(Error::InvalidQos("depth must be >= 1"))
        );
    }

    #[test]
    fn test_reliable_rejected() {
        let qos = QosProfile {
            reliability: Reliability::Reliable,
            ..QosProfile::default()
        };
        assert!(matches!(qos.validate(), Err(Error::UnsupportedQos(_))));
    }

    #[test]
    fn test_keep_all_accepted() {
        let qos = QosProfile {
            history: History::KeepAll,
            depth: 1,
            ..QosProfile::default()
        };
        assert!(qos.validate().is_ok());
    }
}
