//! Stream-level configuration: cadence, window, buffering and fan-out

use eeg_core::{samples_for_duration, EegError, EegResult};
use eeg_processing::ProcessingConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Everything needed to assemble buffer, pipeline, scheduler and publisher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub processing: ProcessingConfig,
    /// Span of each analysed window (seconds)
    pub window_s: f64,
    /// Time between processing cycles (seconds)
    pub cadence_s: f64,
    /// How much history the buffer keeps (seconds)
    pub retention_s: f64,
    pub channel_count: usize,
    /// Upper bound on one classifier call
    pub classifier_timeout_ms: u64,
    /// Per-subscriber queue depth before records are dropped
    pub subscriber_queue_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            processing: ProcessingConfig::default(),
            window_s: 1.0,
            cadence_s: 1.0,
            retention_s: 10.0,
            channel_count: 1,
            classifier_timeout_ms: 500,
            subscriber_queue_capacity: 64,
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> EegResult<()> {
        self.processing.validate()?;

        if !(self.window_s.is_finite() && self.window_s > 0.0) {
            return Err(EegError::config(format!("Window must be positive, got {}s", self.window_s)));
        }
        if !(self.cadence_s.is_finite() && self.cadence_s > 0.0) {
            return Err(EegError::config(format!("Cadence must be positive, got {}s", self.cadence_s)));
        }
        if samples_for_duration(self.processing.sample_rate_hz, self.window_s) == 0 {
            return Err(EegError::config("Window is shorter than one sample"));
        }
        if !(self.retention_s.is_finite() && self.retention_s >= self.window_s) {
            return Err(EegError::config(format!(
                "Retention {}s must cover the {}s window",
                self.retention_s, self.window_s
            )));
        }
        if self.channel_count == 0 {
            return Err(EegError::config("At least one channel is required"));
        }
        if self.classifier_timeout_ms == 0 {
            return Err(EegError::config("Classifier timeout must be greater than 0"));
        }
        if self.subscriber_queue_capacity == 0 {
            return Err(EegError::config("Subscriber queue capacity must be greater than 0"));
        }
        Ok(())
    }

    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_millis(self.classifier_timeout_ms)
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> EegResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| EegError::Serialization {
            message: format!("Failed to serialize configuration: {}", e),
        })
    }

    /// Import configuration from JSON
    pub fn from_json(json: &str) -> EegResult<Self> {
        serde_json::from_str(json).map_err(|e| EegError::Serialization {
            message: format!("Failed to deserialize configuration: {}", e),
        })
    }
}
