//! Minimum spacing between injection sequences.

/// Tracks when the last sequence started and refuses a new one until
/// `duration_ms` has elapsed.
#[derive(Debug, Clone, Copy)]
pub struct CooldownTimer {
    duration_ms: u64,
    last_start_ms: Option<u64>,
}

impl CooldownTimer {
    pub const fn new(duration_ms: u64) -> Self {
        Self {
            duration_ms,
            last_start_ms: None,
        }
    }

    /// True if a new sequence may start at `now_ms`.
    pub fn ready(&self, now_ms: u64) -> bool {
        self.last_start_ms
            .is_none_or(|t| now_ms.saturating_sub(t) >= self.duration_ms)
    }

    /// Record a sequence start.
    pub fn mark(&mut self, now_ms: u64) {
        self.last_start_ms = Some(now_ms);
    }

    pub fn last_start(&self) -> Option<u64> {
        self.last_start_ms
    }

    /// Earliest time the next sequence may start, once one has run.
    pub fn until(&self) -> Option<u64> {
        self.last_start_ms.map(|t| t + self.duration_ms)
    }
}
