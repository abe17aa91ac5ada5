//! Raw samples and single-channel processing windows

use serde::{Deserialize, Serialize};
use crate::error::{EegError, EegResult};

/// One multi-channel reading handed over by the acquisition layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds (wall-clock or monotonic, as the device reports)
    pub timestamp: f64,
    /// One voltage per channel, in channel order
    pub channel_values: Vec<f64>,
}

impl Sample {
    pub fn new(timestamp: f64, channel_values: Vec<f64>) -> Self {
        Self {
            timestamp,
            channel_values,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channel_values.len()
    }
}

/// Contiguous samples of one channel spanning one processing window
///
/// Created from a buffer snapshot and never mutated afterwards; stages that
/// transform a window return a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalWindow {
    /// Channel index inside the originating buffer
    pub channel: usize,
    pub start_timestamp: f64,
    pub sample_rate_hz: f64,
    pub samples: Vec<f64>,
}

impl SignalWindow {
    pub fn new(channel: usize, start_timestamp: f64, sample_rate_hz: f64, samples: Vec<f64>) -> EegResult<Self> {
        if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
            return Err(EegError::InvalidSampleRate { rate: sample_rate_hz });
        }
        Ok(Self {
            channel,
            start_timestamp,
            sample_rate_hz,
            samples,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Window span in seconds
    pub fn duration_s(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate_hz
    }

    /// Same channel and timing, different sample values
    pub fn with_samples(&self, samples: Vec<f64>) -> SignalWindow {
        SignalWindow {
            channel: self.channel,
            start_timestamp: self.start_timestamp,
            sample_rate_hz: self.sample_rate_hz,
            samples,
        }
    }
}

/// Number of samples covering `duration_s` at `sample_rate_hz`
pub fn samples_for_duration(sample_rate_hz: f64, duration_s: f64) -> usize {
    (sample_rate_hz * duration_s).round().max(0.0) as usize
}
