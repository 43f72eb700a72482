//! Clock abstraction
//!
//! Expiry decisions in the auth crate are made against an injected
//! [`Clock`] rather than `Utc::now()` so that sliding and absolute
//! timeouts can be exercised with simulated time in tests.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Current moment according to this clock
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
///
/// Intended for tests: construct it at a fixed instant, then `advance` it
/// past a configured timeout and observe the expiry behavior.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at the given instant
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by the given number of seconds
    pub fn advance(&self, seconds: i64) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now += Duration::seconds(seconds);
    }

    /// Set the clock to an exact instant
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(90);
        assert_eq!(clock.now(), start + Duration::seconds(90));
    }
}
