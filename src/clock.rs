//! Time Sources
//!
//! Stores read time through the [`Clock`] trait so expiry can be driven by a
//! logical clock in tests instead of sleeping.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;

// == Clock ==
/// A source of millisecond timestamps.
///
/// Timestamps only need to be monotonic with respect to a single clock
/// instance; they are never compared across clocks.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current time in milliseconds.
    fn now_millis(&self) -> u64;
}

// == System Clock ==
/// Wall-clock time as Unix milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        // Clamp pre-epoch clocks to zero rather than wrapping.
        Utc::now().timestamp_millis().max(0) as u64
    }
}

// == Manual Clock ==
/// A logical clock that only moves when told to.
///
/// Shared between a test (or the conformance harness) and the store under
/// test via `Arc<ManualClock>`.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Creates a clock starting at `start` milliseconds.
    pub fn new(start: u64) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    /// Moves the clock forward by `ticks` milliseconds.
    pub fn tick(&self, ticks: u64) {
        self.now.fetch_add(ticks, Ordering::SeqCst);
    }

    /// Jumps to an absolute time. Going backwards is allowed but stores are
    /// free to treat earlier timestamps as "not yet elapsed".
    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
