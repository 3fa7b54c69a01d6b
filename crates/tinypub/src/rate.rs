// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Loop pacing
//!
//! [`Rate::sleep`] is the only blocking call in tinypub. It waits out the
//! remainder of the current period: an OS sleep for all but the last
//! [`SPIN_THRESHOLD_MICROS`], then a busy-wait for the tail, which keeps
//! short periods from inheriting scheduler jitter.

use std::time::Duration;

use crate::clock::{duration_micros, Clock, SystemClock};
use crate::config::SPIN_THRESHOLD_MICROS;
use crate::error::Result;
use crate::timer::{frequency_from_micros, period_from_hz};

/// Fixed-frequency loop pacer
#[derive(Clone, Debug)]
pub struct Rate<C: Clock = SystemClock> {
    period_micros: u64,
    clock: C,
    last_micros: u64,
}

impl<C: Clock> Rate<C> {
    /// Pacer with the given period; the first period starts now
    pub fn new(period: Duration, clock: C) -> Self {
        let last_micros = clock.now_micros();
        Self {
            period_micros: duration_micros(period),
            clock,
            last_micros,
        }
    }

    /// Pacer from a frequency in Hz (must be finite and > 0)
    pub fn from_hz(hz: f64, clock: C) -> Result<Self> {
        Ok(Self::new(period_from_hz(hz)?, clock))
    }

    /// Block until one period has passed since the previous call.
    ///
    /// Returns immediately when the period already elapsed (no catch-up).
    /// The reference time is "now" after waking.
    pub fn sleep(&mut self) {
        let now = self.clock.now_micros();
        let elapsed = now.saturating_sub(self.last_micros);

        if elapsed < self.period_micros {
            let deadline = self.last_micros.saturating_add(self.period_micros);
            let remaining = self.period_micros - elapsed;

            if remaining > SPIN_THRESHOLD_MICROS {
                self.clock.sleep_micros(remaining - SPIN_THRESHOLD_MICROS);
            }

            let now = self.clock.now_micros();
            if now < deadline {
                self.clock.busy_wait_micros(deadline - now);
            }
        }

        self.last_micros = self.clock.now_micros();
    }

    /// Restart the period from now
    pub fn reset(&mut self) {
        self.last_micros = self.clock.now_micros();
    }

    /// Loop period
    pub fn period(&self) -> Duration {
        Duration::from_micros(self.period_micros)
    }

    /// Loop frequency
    pub fn frequency_hz(&self) -> f64 {
        frequency_from_micros(self.period_micros)
    }
}
