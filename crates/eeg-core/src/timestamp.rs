//! Wall-clock timestamps for samples and published results
//!
//! Samples and results carry seconds since the Unix epoch as `f64`. Scheduling
//! never uses these; ticks run on the monotonic clock.

use crate::error::{EegError, EegResult};
use core::fmt;
use serde::{Deserialize, Serialize};

/// Nanosecond-resolution wall-clock timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PrecisionTimestamp {
    /// Nanoseconds since Unix epoch
    nanos: u64,
}

impl PrecisionTimestamp {
    #[inline]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    /// Negative or non-finite input saturates to the epoch
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Self { nanos: 0 };
        }
        Self {
            nanos: (secs * 1_000_000_000.0) as u64,
        }
    }

    #[inline]
    pub const fn as_nanos(&self) -> u64 {
        self.nanos
    }

    #[inline]
    pub fn as_secs_f64(&self) -> f64 {
        self.nanos as f64 / 1_000_000_000.0
    }

    /// Current system time
    pub fn now() -> EegResult<Self> {
        use std::time::{SystemTime, UNIX_EPOCH};

        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| PrecisionTimestamp::from_nanos(d.as_nanos() as u64))
            .map_err(|_| EegError::config("system time before Unix epoch"))
    }
}

impl fmt::Display for PrecisionTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.nanos / 1_000_000_000;
        let subsec_nanos = self.nanos % 1_000_000_000;
        write!(f, "{}.{:09}", secs, subsec_nanos)
    }
}

/// Seconds since the Unix epoch, `0.0` if the system clock predates it
pub fn unix_now_secs() -> f64 {
    PrecisionTimestamp::now()
        .map(|ts| ts.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secs_conversion() {
        let ts = PrecisionTimestamp::from_secs_f64(1.5);
        assert_eq!(ts.as_nanos(), 1_500_000_000);
        assert_eq!(ts.as_secs_f64(), 1.5);
        assert_eq!(ts.to_string(), "1.500000000");
    }

    #[test]
    fn test_negative_saturates() {
        assert_eq!(PrecisionTimestamp::from_secs_f64(-3.0).as_nanos(), 0);
        assert_eq!(PrecisionTimestamp::from_secs_f64(f64::NAN).as_nanos(), 0);
    }

    #[test]
    fn test_now_is_after_2020() {
        assert!(unix_now_secs() > 1_600_000_000.0);
    }
}
