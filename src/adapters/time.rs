//! Monotonic clock adapter.
//!
//! The control engine works in plain `u64` milliseconds since start.
//! This adapter anchors those milliseconds to `std::time::Instant` so
//! the runtime can turn a deadline back into a timer.

use std::time::{Duration, Instant};

/// Milliseconds since construction (monotonic).
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// The `Instant` corresponding to `ms` on this clock.
    pub fn instant_at(&self, ms: u64) -> Instant {
        self.start + Duration::from_millis(ms)
    }
}
