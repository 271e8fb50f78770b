//! Time management for the node
//!
//! Clock abstraction so the cache, the recovery cooldown, and the log
//! timestamps can run against a fixed clock in tests. The battery-backed
//! RTC is a collaborator (see [`crate::traits::Rtc`]); this is only about
//! reading "now".

/// Timestamp in milliseconds since epoch (or device boot for monotonic).
pub type Timestamp = u64;

/// Source of time for the system.
pub trait TimeSource {
    /// Get current timestamp in milliseconds.
    fn now(&self) -> Timestamp;
}

/// System time source.
#[derive(Debug, Clone)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> Timestamp {
        use std::time::{SystemTime, UNIX_EPOCH};

        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}

/// Fixed time source for testing.
#[derive(Debug, Clone)]
pub struct FixedClock {
    timestamp: Timestamp,
}

impl FixedClock {
    /// Create a clock frozen at `timestamp`.
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp }
    }

    /// Jump to an absolute timestamp.
    pub fn set(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }

    /// Advance by `ms` milliseconds.
    pub fn advance(&mut self, ms: u64) {
        self.timestamp += ms;
    }
}

impl TimeSource for FixedClock {
    fn now(&self) -> Timestamp {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let mut clock = FixedClock::new(1000);
        assert_eq!(clock.now(), 1000);

        clock.advance(500);
        assert_eq!(clock.now(), 1500);
    }

    #[test]
    fn system_clock_reads_epoch_time() {
        assert!(SystemClock.now() > 0);
    }
}
