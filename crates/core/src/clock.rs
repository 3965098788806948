// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling.
//!
//! The store and the worker loop both need wall-clock instants that survive
//! a round trip through a document store (`DateTime<Utc>`) as well as a
//! monotonic instant for measuring elapsed time in-process. [`FakeClock`]
//! lets tests drive both without real sleeps.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A clock that provides the current time.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Wall-clock instant, suitable for persisting to a store.
    fn now(&self) -> DateTime<Utc>;
    /// Monotonic instant, suitable for measuring elapsed in-process time.
    fn monotonic(&self) -> Instant;
}

/// Real system clock.
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic(&self) -> Instant {
        Instant::now()
    }
}

/// Fake clock for testing with controllable time.
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<DateTime<Utc>>>,
    monotonic: Arc<Mutex<Instant>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(Utc::now())),
            monotonic: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Build a clock pinned to a specific instant.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(now)),
            monotonic: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        let delta = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
        *self.current.lock() += delta;
        *self.monotonic.lock() += duration;
    }

    /// Set the clock to a specific wall-clock instant.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.current.lock() = now;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }

    fn monotonic(&self) -> Instant {
        *self.monotonic.lock()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
