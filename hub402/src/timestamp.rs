//! Authorization time bounds and the clock they are checked against.
//!
//! ERC-3009 `validAfter`/`validBefore` are seconds since the Unix epoch.
//! Verification asks a [`Clock`] for "now" instead of reading the system
//! time directly, so window checks can be pinned in tests.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct UnixTimestamp(u64);

impl UnixTimestamp {
    /// Wraps a raw seconds value.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Raw seconds value.
    #[must_use]
    pub const fn as_secs(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnixTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> UnixTimestamp;
}

/// Reads the operating system clock. A clock set before 1970 reads as zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> UnixTimestamp {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        UnixTimestamp(secs)
    }
}

/// A clock that always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub UnixTimestamp);

impl FixedClock {
    /// Frozen at `secs` since the epoch.
    #[must_use]
    pub const fn at(secs: u64) -> Self {
        Self(UnixTimestamp::from_secs(secs))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> UnixTimestamp {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_order_by_seconds() {
        assert!(UnixTimestamp::from_secs(99) < UnixTimestamp::from_secs(100));
        assert_eq!(UnixTimestamp::from_secs(7).to_string(), "7");
    }

    #[test]
    fn fixed_clock_does_not_move() {
        let clock = FixedClock::at(100);
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().as_secs(), 100);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now().as_secs() > 1_577_836_800);
    }
}
