//! Configuration for the DSP stages

use eeg_core::{BandLayout, EegError, EegResult};
use serde::{Deserialize, Serialize};

use crate::filters::FilterSpec;

/// Parameters shared by the filter, spectral and feature stages
///
/// Every field has a default, so a partial JSON document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Acquisition sampling rate (Hz)
    pub sample_rate_hz: f64,
    /// Band-pass lower cutoff (Hz)
    pub filter_low_hz: f64,
    /// Band-pass upper cutoff (Hz)
    pub filter_high_hz: f64,
    /// Butterworth prototype order
    pub filter_order: usize,
    /// Nominal Welch segment length; clamped to the window length
    pub psd_segment_length: usize,
    /// Band intervals for feature extraction
    pub bands: BandLayout,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 256.0,
            filter_low_hz: 4.0,
            filter_high_hz: 30.0,
            filter_order: 5,
            psd_segment_length: 1024,
            bands: BandLayout::standard(),
        }
    }
}

impl ProcessingConfig {
    /// Defaults with a different acquisition rate
    pub fn for_sample_rate(sample_rate_hz: f64) -> Self {
        Self {
            sample_rate_hz,
            ..Self::default()
        }
    }

    /// Filter parameters derived from this config
    pub fn filter_spec(&self) -> FilterSpec {
        FilterSpec::new(self.filter_low_hz, self.filter_high_hz, self.sample_rate_hz, self.filter_order)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> EegResult<()> {
        if !(self.sample_rate_hz.is_finite() && self.sample_rate_hz > 0.0) {
            return Err(EegError::InvalidSampleRate {
                rate: self.sample_rate_hz,
            });
        }

        self.filter_spec().validate()?;

        if self.psd_segment_length < 2 {
            return Err(EegError::config("PSD segment length must be at least 2 samples"));
        }

        self.bands.validate()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::MAX_FILTER_ORDER;
    use eeg_core::{Band, BandRange};

    #[test]
    fn test_default_config_is_valid() {
        let config = ProcessingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_rate_hz, 256.0);
        assert_eq!(config.filter_order, 5);
        assert_eq!(config.psd_segment_length, 1024);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = ProcessingConfig::from_json(r#"{"sample_rate_hz": 512.0, "bands": {
            "delta": [1.0, 4.0], "theta": [4.0, 8.0], "alpha": [8.0, 12.0], "beta": [12.0, 35.0]
        }}"#)
        .unwrap();

        assert_eq!(config.sample_rate_hz, 512.0);
        assert_eq!(config.filter_high_hz, 30.0);
        assert_eq!(config.bands.range(Band::Alpha), BandRange::new(8.0, 12.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_configs() {
        let mut config = ProcessingConfig::default();
        config.filter_high_hz = 200.0;
        assert!(matches!(config.validate(), Err(EegError::InvalidFilterSpec { .. })));

        for order in [0, MAX_FILTER_ORDER + 1] {
            let mut config = ProcessingConfig::default();
            config.filter_order = order;
            assert!(
                matches!(config.validate(), Err(EegError::InvalidFilterSpec { .. })),
                "order {} accepted",
                order
            );
        }

        let mut config = ProcessingConfig::default();
        config.psd_segment_length = 1;
        assert!(config.validate().is_err());

        let config = ProcessingConfig::for_sample_rate(-1.0);
        assert!(matches!(config.validate(), Err(EegError::InvalidSampleRate { .. })));
    }

    #[test]
    fn test_json_export_import() {
        let config = ProcessingConfig::for_sample_rate(500.0);
        let json = config.to_json().unwrap();
        assert_eq!(ProcessingConfig::from_json(&json).unwrap(), config);
        assert!(ProcessingConfig::from_json("{not json").is_err());
    }
}
