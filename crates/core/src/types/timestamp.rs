//! Nanosecond-precision monotonic timestamps.
//!
//! [`Timestamp`] wraps a `u64` nanosecond count. [`Timestamp::now`] reads
//! `CLOCK_MONOTONIC` directly for low-overhead, NTP-drift-independent timing
//! on the hot path.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Nanosecond-precision timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Capture the current monotonic time in nanoseconds.
    ///
    /// Uses `clock_gettime(CLOCK_MONOTONIC)` on unix; falls back to
    /// `std::time::SystemTime` elsewhere.
    #[inline]
    pub fn now() -> Self {
        #[cfg(unix)]
        {
            let mut ts = libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            };
            // SAFETY: passing a valid pointer to a stack-allocated timespec.
            unsafe {
                libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
            }
            Self(ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64)
        }
        #[cfg(not(unix))]
        {
            use std::time::{SystemTime, UNIX_EPOCH};
            let dur = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("system clock before UNIX epoch");
            Self(dur.as_nanos() as u64)
        }
    }

    /// Create a timestamp from milliseconds.
    #[inline]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms * 1_000_000)
    }

    /// Returns the raw nanosecond value.
    #[inline]
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Elapsed nanoseconds from `earlier` to `self`, saturating at zero.
    #[inline]
    pub const fn elapsed_since(&self, earlier: &Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.0 / 1_000_000_000, self.0 % 1_000_000_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_millis() {
        assert_eq!(Timestamp::from_millis(1000).0, 1_000_000_000);
    }

    #[test]
    fn test_as_nanos() {
        assert_eq!(Timestamp(42).as_nanos(), 42);
    }

    #[test]
    fn test_elapsed_since() {
        let earlier = Timestamp(1_000_000_000);
        let later = Timestamp(2_500_000_000);
        assert_eq!(later.elapsed_since(&earlier), 1_500_000_000);
        assert_eq!(earlier.elapsed_since(&later), 0);
    }

    #[test]
    fn test_now_monotonic() {
        let a = Timestamp::now();
        let b = Timestamp::now();
        assert!(a.0 > 0);
        assert!(b >= a);
    }

    #[test]
    fn test_display() {
        let ts = Timestamp(1_234_567_890_123_456_789);
        assert_eq!(format!("{}", ts), "1234567890.123456789");
    }

    #[test]
    fn test_ord() {
        assert!(Timestamp(100) < Timestamp(200));
        assert_eq!(Timestamp(100), Timestamp(100));
    }
}
