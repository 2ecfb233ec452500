//! Utilities for messing with time
//!
//! Types included allow messing with and mocking out clocks and other
//! side-effect-laden time operations.

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_must_use
)]
#![forbid(unsafe_code)]

use std::{
    ops::{Add, AddAssign, Sub, SubAssign},
    time::SystemTime,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unix time
///
/// Unix time as represented by the number of seconds elapsed since the
/// beginning of the Unix epoch on 1970/01/01 at 00:00:00 UTC.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
#[repr(transparent)]
pub struct UnixTime(pub u64);

impl From<SystemTime> for UnixTime {
    #[inline]
    fn from(t: SystemTime) -> Self {
        let time = t
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("times before Unix epoch are not expected")
            .as_secs();

        UnixTime(time)
    }
}

/// A duration measured in whole seconds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
#[repr(transparent)]
pub struct DurationSecs(pub u64);

impl Add<DurationSecs> for UnixTime {
    type Output = UnixTime;

    #[inline]
    fn add(self, dur: DurationSecs) -> Self::Output {
        UnixTime(self.0 + dur.0)
    }
}

impl AddAssign<DurationSecs> for UnixTime {
    #[inline]
    fn add_assign(&mut self, dur: DurationSecs) {
        self.0 += dur.0;
    }
}

impl Sub<DurationSecs> for UnixTime {
    type Output = UnixTime;

    #[inline]
    fn sub(self, dur: DurationSecs) -> Self::Output {
        UnixTime(self.0 - dur.0)
    }
}

impl SubAssign<DurationSecs> for UnixTime {
    #[inline]
    fn sub_assign(&mut self, dur: DurationSecs) {
        self.0 -= dur.0;
    }
}

impl Sub<UnixTime> for UnixTime {
    type Output = DurationSecs;

    #[inline]
    fn sub(self, other: UnixTime) -> Self::Output {
        DurationSecs(self.0 - other.0)
    }
}

impl UnixTime {
    /// Subtracts a duration from this time, saturating at the epoch
    #[inline]
    #[must_use]
    pub const fn saturating_sub(self, dur: DurationSecs) -> UnixTime {
        UnixTime(self.0.saturating_sub(dur.0))
    }
}

impl From<DurationSecs> for std::time::Duration {
    #[inline]
    fn from(dur: DurationSecs) -> Self {
        std::time::Duration::from_secs(dur.0)
    }
}

/// Represents a clock, which can tell the current time
pub trait Clock {
    /// Gets the current time according to this clock
    fn now(&self) -> UnixTime;
}

/// The system clock as provided by `std::time::SystemTime`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct System;

impl Clock for System {
    #[inline]
    fn now(&self) -> UnixTime {
        UnixTime::from(SystemTime::now())
    }
}

/// A test clock which maintains the current time as internal state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TestClock(UnixTime);

impl Clock for TestClock {
    #[inline]
    fn now(&self) -> UnixTime {
        self.0
    }
}

impl TestClock {
    /// Creates a new test clock with the specified time
    #[inline]
    pub const fn new(time: UnixTime) -> Self {
        Self(time)
    }

    /// Updates the clock's current time to `val`
    pub fn set(&mut self, val: UnixTime) {
        self.0 = val;
    }

    /// Increments the clock's current time by `inc` seconds
    pub fn inc(&mut self, inc: u64) {
        (self.0).0 += inc;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_move_time_forward_and_back() {
        let t = UnixTime(100) + DurationSecs(50);
        assert_eq!(t, UnixTime(150));
        assert_eq!(t - DurationSecs(150), UnixTime(0));
        assert_eq!(t - UnixTime(100), DurationSecs(50));
    }

    #[test]
    fn saturating_sub_stops_at_epoch() {
        assert_eq!(UnixTime(10).saturating_sub(DurationSecs(30)), UnixTime(0));
    }

    #[test]
    fn test_clock_advances_on_demand() {
        let mut clock = TestClock::new(UnixTime(5));
        assert_eq!(clock.now(), UnixTime(5));
        clock.inc(10);
        assert_eq!(clock.now(), UnixTime(15));
    }
}
