// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Clock abstraction
//!
//! Timers, rates and endpoint timestamps read time through [`Clock`] so the
//! control loop can run against the OS monotonic clock in production and a
//! hand-advanced [`ManualClock`] in tests.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic microsecond clock
pub trait Clock: Clone {
    /// Microseconds since an arbitrary fixed origin
    fn now_micros(&self) -> u64;

    /// Block the calling thread for roughly `micros`
    fn sleep_micros(&self, micros: u64);

    /// Wait `micros` without yielding to the scheduler.
    ///
    /// Used for the tail of short waits where OS sleep granularity would
    /// add jitter.
    fn busy_wait_micros(&self, micros: u64) {
        let deadline = self.now_micros().saturating_add(micros);
        while self.now_micros() < deadline {
            std::hint::spin_loop();
        }
    }
}

/// OS monotonic clock (`std::time::Instant`)
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Clock whose origin is "now"
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_micros(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    fn sleep_micros(&self, micros: u64) {
        std::thread::sleep(Duration::from_micros(micros));
    }
}

/// Manually advanced clock for deterministic tests
///
/// Clones share the same time. `sleep_micros` and `busy_wait_micros` advance
/// the shared time instead of blocking.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    /// Clock starting at `start_micros`
    pub fn new(start_micros: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_micros)),
        }
    }

    /// Advance time by `micros`
    pub fn advance_micros(&self, micros: u64) {
        self.now.set(self.now.get().saturating_add(micros));
    }

    /// Advance time by `duration`
    pub fn advance(&self, duration: Duration) {
        self.advance_micros(duration_micros(duration));
    }

    /// Jump to an absolute time
    pub fn set_micros(&self, micros: u64) {
        self.now.set(micros);
    }
}

impl Clock for ManualClock {
    fn now_micros(&self) -> u64 {
        self.now.get()
    }

    fn sleep_micros(&self, micros: u64) {
        self.advance_micros(micros);
    }

    fn busy_wait_micros(&self, micros: u64) {
        self.advance_micros(micros);
    }
}

/// Duration as whole microseconds, saturating at `u64::MAX`
pub(crate) fn duration_micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new(100);
        let other = clock.clone();

        clock.advance_micros(50);
        assert_eq!(other.now_micros(), 150);

        other.sleep_micros(25);
        assert_eq!(clock.now_micros(), 175);

        clock.advance(Duration::from_millis(1));
        assert_eq!(clock.now_micros(), 1175);
    }

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_micros();
        clock.busy_wait_micros(200);
        let b = clock.now_micros();
        assert!(b >= a + 200);
    }
}
