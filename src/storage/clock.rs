//! Time Source
//!
//! Every expiry in the store is an absolute Unix timestamp in milliseconds,
//! and every "now" comes from a [`Clock`]. Production code uses
//! [`SystemClock`]; tests and replay checks drive a [`FixedClock`] by hand so
//! that expiry boundaries can be hit to the millisecond.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of the current time as epoch milliseconds (UTC).
pub trait Clock: Send + Sync + fmt::Debug {
    fn now_millis(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
///
/// # Example
///
/// ```
/// use ledgerkv::storage::{Clock, FixedClock};
///
/// let clock = FixedClock::new(1_000);
/// clock.advance_secs(3);
/// assert_eq!(clock.now_millis(), 4_000);
/// ```
#[derive(Debug, Default)]
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    pub fn new(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    pub fn set_millis(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance_millis(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance_millis(secs * 1000);
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn test_fixed_clock_moves_only_when_told() {
        let clock = FixedClock::new(10_123);
        assert_eq!(clock.now_millis(), 10_123);

        clock.advance_millis(877);
        assert_eq!(clock.now_millis(), 11_000);

        clock.set_millis(5);
        assert_eq!(clock.now_millis(), 5);
    }
}
