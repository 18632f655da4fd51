//! Media timestamp arithmetic
//!
//! All media timestamps inside playcore are signed microsecond counts wrapped
//! in [`MediaTime`]. Microseconds are the unit the media engine speaks;
//! pipeline positions and wall-clock deltas are converted at the boundary.
//!
//! # Sentinels
//!
//! [`MediaTime::MAX`] doubles as "no value": it marks "no seek pending" and
//! is recorded as the maximum timestamp of a stream that reached
//! end-of-stream, so that "minimum across streams" logic is not held back by
//! a stream that will never produce more data.
//!
//! # Examples
//!
//! ```rust
//! use playcore_common::time::MediaTime;
//!
//! let a = MediaTime::from_millis(33);
//! assert_eq!(a.as_micros(), 33_000);
//!
//! let gap = MediaTime::from_secs(2).saturating_sub(a);
//! assert_eq!(gap.as_millis(), 1_967);
//!
//! assert!(MediaTime::MAX.is_max());
//! assert_eq!(MediaTime::MAX.saturating_add(a), MediaTime::MAX);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Microseconds per millisecond
pub const MICROS_PER_MS: i64 = 1_000;

/// Microseconds per second
pub const MICROS_PER_SECOND: i64 = 1_000_000;

/// Nanoseconds per microsecond (pipeline clocks are in nanoseconds)
pub const NANOS_PER_MICRO: i64 = 1_000;

// ============================================================================
// MediaTime
// ============================================================================

/// A media timestamp or duration in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaTime(i64);

impl MediaTime {
    /// Timestamp zero
    pub const ZERO: MediaTime = MediaTime(0);

    /// Largest representable timestamp, also used as the "none" sentinel
    pub const MAX: MediaTime = MediaTime(i64::MAX);

    pub const fn from_micros(micros: i64) -> Self {
        MediaTime(micros)
    }

    pub const fn from_millis(millis: i64) -> Self {
        MediaTime(millis.saturating_mul(MICROS_PER_MS))
    }

    pub const fn from_secs(secs: i64) -> Self {
        MediaTime(secs.saturating_mul(MICROS_PER_SECOND))
    }

    /// Convert a pipeline clock value (nanoseconds), truncating
    pub const fn from_nanos(nanos: i64) -> Self {
        MediaTime(nanos / NANOS_PER_MICRO)
    }

    pub const fn as_micros(self) -> i64 {
        self.0
    }

    /// Milliseconds, truncating
    pub const fn as_millis(self) -> i64 {
        self.0 / MICROS_PER_MS
    }

    /// Nanoseconds, saturating at `i64::MAX`
    pub const fn as_nanos(self) -> i64 {
        self.0.saturating_mul(NANOS_PER_MICRO)
    }

    /// True for the [`MediaTime::MAX`] sentinel
    pub const fn is_max(self) -> bool {
        self.0 == i64::MAX
    }

    pub const fn saturating_add(self, other: MediaTime) -> MediaTime {
        MediaTime(self.0.saturating_add(other.0))
    }

    pub const fn saturating_sub(self, other: MediaTime) -> MediaTime {
        MediaTime(self.0.saturating_sub(other.0))
    }

    /// Convert to a `Duration`; negative values clamp to zero
    pub fn to_duration(self) -> Duration {
        if self.0 <= 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(self.0 as u64)
        }
    }
}

impl From<Duration> for MediaTime {
    fn from(duration: Duration) -> Self {
        MediaTime(i64::try_from(duration.as_micros()).unwrap_or(i64::MAX))
    }
}

impl fmt::Display for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_max() {
            return write!(f, "none");
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(
            f,
            "{}{}.{:06}s",
            sign,
            abs / MICROS_PER_SECOND as u64,
            abs % MICROS_PER_SECOND as u64
        )
    }
}

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversions() {
        assert_eq!(MediaTime::from_millis(250).as_micros(), 250_000);
        assert_eq!(MediaTime::from_secs(2).as_millis(), 2_000);
        assert_eq!(MediaTime::from_nanos(33_366_999).as_micros(), 33_366);
        assert_eq!(MediaTime::from_micros(5).as_nanos(), 5_000);
    }

    #[test]
    fn test_max_sentinel_saturates() {
        assert!(MediaTime::MAX.is_max());
        assert!(!MediaTime::ZERO.is_max());
        assert_eq!(MediaTime::MAX.saturating_add(MediaTime::from_secs(1)), MediaTime::MAX);
        assert_eq!(MediaTime::MAX.as_nanos(), i64::MAX);
    }

    #[test]
    fn test_saturating_sub_allows_negative_gaps() {
        let position = MediaTime::from_millis(500);
        let pushed = MediaTime::from_millis(300);
        assert_eq!(pushed.saturating_sub(position).as_millis(), -200);
    }

    #[test]
    fn test_duration_round_trip_and_clamp() {
        let d = Duration::from_millis(1_500);
        assert_eq!(MediaTime::from(d).to_duration(), d);
        assert_eq!(MediaTime::from_millis(-10).to_duration(), Duration::ZERO);
    }

    #[test]
    fn test_display() {
        assert_eq!(MediaTime::from_millis(1_234).to_string(), "1.234000s");
        assert_eq!(MediaTime::from_millis(-66).to_string(), "-0.066000s");
        assert_eq!(MediaTime::MAX.to_string(), "none");
    }

    #[test]
    fn test_ordering() {
        let mut times = vec![
            MediaTime::from_millis(66),
            MediaTime::ZERO,
            MediaTime::MAX,
            MediaTime::from_millis(33),
        ];
        times.sort();
        assert_eq!(times[0], MediaTime::ZERO);
        assert_eq!(times[3], MediaTime::MAX);
    }

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }
}
