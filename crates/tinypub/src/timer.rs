// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Periodic callback driven by non-blocking polls
//!
//! A timer fires at most once per [`Timer::spin_once`]. On fire the reference
//! time becomes "now", not "previous + period": missed periods are skipped
//! and never replayed as a burst.

use core::fmt;
use std::time::Duration;

use crate::clock::{duration_micros, Clock, SystemClock};
use crate::error::{Error, Result};

/// Periodic timer
///
/// The phase starts at construction: the first fire happens one full period
/// after `new`.
pub struct Timer<C: Clock = SystemClock> {
    period_micros: u64,
    callback: Box<dyn FnMut()>,
    clock: C,
    last_fire_micros: u64,
    fire_count: u64,
    active: bool,
}

impl<C: Clock> Timer<C> {
    /// Create an active timer
    pub fn new<F>(period: Duration, callback: F, clock: C) -> Self
    where
        F: FnMut() + 'static,
    {
        let now = clock.now_micros();
        Self {
            period_micros: duration_micros(period),
            callback: Box::new(callback),
            clock,
            last_fire_micros: now,
            fire_count: 0,
            active: true,
        }
    }

    /// Create an active timer from a frequency in Hz
    pub fn from_hz<F>(hz: f64, callback: F, clock: C) -> Result<Self>
    where
        F: FnMut() + 'static,
    {
        Ok(Self::new(period_from_hz(hz)?, callback, clock))
    }

    /// Fire if at least one period elapsed since the last fire.
    ///
    /// Returns whether the callback ran.
    pub fn spin_once(&mut self) -> bool {
        if !self.active {
            return false;
        }

        let now = self.clock.now_micros();
        if now.saturating_sub(self.last_fire_micros) < self.period_micros {
            return false;
        }

        self.last_fire_micros = now;
        self.fire_count += 1;
        (self.callback)();
        true
    }

    /// Stop firing until `resume`
    pub fn cancel(&mut self) {
        self.active = false;
    }

    /// Re-activate; the next fire is one full period from now
    pub fn resume(&mut self) {
        self.active = true;
        self.reset();
    }

    /// Restart the phase without changing the active state
    pub fn reset(&mut self) {
        self.last_fire_micros = self.clock.now_micros();
    }

    /// Whether the timer is active
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Number of times the callback ran
    pub const fn fire_count(&self) -> u64 {
        self.fire_count
    }

    /// Timer period
    pub fn period(&self) -> Duration {
        Duration::from_micros(self.period_micros)
    }

    /// Timer frequency (0.0 for a zero period)
    pub fn frequency_hz(&self) -> f64 {
        frequency_from_micros(self.period_micros)
    }
}

impl<C: Clock> fmt::Debug for Timer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("period_micros", &self.period_micros)
            .field("last_fire_micros", &self.last_fire_micros)
            .field("fire_count", &self.fire_count)
            .field("active", &self.active)
            .finish()
    }
}

/// Period for a frequency; rejects non-finite and non-positive values
pub(crate) fn period_from_hz(hz: f64) -> Result<Duration> {
    if !hz.is_finite() || hz <= 0.0 {
        return Err(Error::InvalidParameter("frequency must be finite and > 0"));
    }
    Duration::try_from_secs_f64(1.0 / hz)
        .map_err(|_| Error::InvalidParameter("frequency out of range"))
}

pub(crate) fn frequency_from_micros(period_micros: u64) -> f64 {
    if period_micros == 0 {
        0.0
    } else {
        1_000_000.0 / period_micros as f64
    }
}
