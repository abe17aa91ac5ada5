//! Error handling for the EEG pipeline
//!
//! One error type for every stage. Whether an error is fatal depends on where
//! it surfaces: `InsufficientData` only ever skips a scheduler cycle,
//! `InvalidFilterSpec` is raised at construction, `InsufficientSamples` fails
//! a single cycle.

use thiserror::Error;

/// Result type alias for EEG pipeline operations
pub type EegResult<T> = Result<T, EegError>;

/// Error type for all EEG pipeline operations
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EegError {
    /// The buffer has not yet collected enough samples for a window
    #[error("Insufficient data: {required} samples required, {available} available")]
    InsufficientData {
        /// Samples needed per channel
        required: usize,
        /// Samples currently held per channel
        available: usize,
    },

    /// Band-pass parameters violate `0 < low < high < fs/2` or order bounds
    #[error("Invalid filter spec (low {low_hz}Hz, high {high_hz}Hz, fs {sample_rate_hz}Hz, order {order}): {reason}")]
    InvalidFilterSpec {
        low_hz: f64,
        high_hz: f64,
        sample_rate_hz: f64,
        order: usize,
        reason: String,
    },

    /// Spectral estimation needs at least two samples
    #[error("Insufficient samples for spectral estimation: {len} (need at least 2)")]
    InsufficientSamples {
        /// Samples in the offending window
        len: usize,
    },

    /// Sample channel count differs from the buffer layout
    #[error("Channel mismatch: expected {expected} channels, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    #[error("Invalid sampling rate: {rate}Hz")]
    InvalidSampleRate { rate: f64 },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// FFT planning or execution failed
    #[error("Spectral estimation failed: {message}")]
    Spectral { message: String },

    /// A band power came out NaN or infinite
    #[error("Non-finite power in band '{band}'")]
    NonFiniteFeature { band: String },

    /// Scheduler lifecycle call made in the wrong state
    #[error("Scheduler is {actual}, expected {expected}")]
    SchedulerState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl EegError {
    /// Shorthand for configuration errors
    pub fn config(message: impl Into<String>) -> Self {
        EegError::InvalidConfig {
            message: message.into(),
        }
    }

    /// True for errors the scheduler treats as "not ready yet" rather than failure
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, EegError::InsufficientData { .. })
    }
}

impl From<serde_json::Error> for EegError {
    fn from(err: serde_json::Error) -> Self {
        EegError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = EegError::InsufficientData {
            required: 256,
            available: 100,
        };
        let display = format!("{}", error);
        assert!(display.contains("Insufficient data"));
        assert!(display.contains("256"));
        assert!(display.contains("100"));
    }

    #[test]
    fn test_filter_spec_display_names_parameters() {
        let error = EegError::InvalidFilterSpec {
            low_hz: 30.0,
            high_hz: 4.0,
            sample_rate_hz: 256.0,
            order: 5,
            reason: "low cutoff must be below high cutoff".to_string(),
        };
        let display = error.to_string();
        assert!(display.contains("30"));
        assert!(display.contains("low cutoff"));
    }

    #[test]
    fn test_insufficient_data_classification() {
        assert!(EegError::InsufficientData { required: 2, available: 1 }.is_insufficient_data());
        assert!(!EegError::InsufficientSamples { len: 1 }.is_insufficient_data());
    }
}
