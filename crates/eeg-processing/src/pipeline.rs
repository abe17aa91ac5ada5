//! Filter, normalize, PSD and band-power stages chained over a window set

use eeg_core::{Band, EegError, EegResult, FeatureVector, SignalWindow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ProcessingConfig;
use crate::features::FeatureExtractor;
use crate::filters::BandpassFilter;
use crate::normalize::Normalizer;
use crate::processor::{ProcessingMetrics, ProcessingTimer, StageTimings};
use crate::spectral::SpectralEstimator;

/// Non-fatal conditions noticed while analysing a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Channel was flat; its normalized signal is all zeros
    DegenerateSignal { channel: usize },
    /// No PSD bin fell inside the band; its power is reported as 0.0
    EmptyBand { channel: usize, band: Band },
}

/// Result of analysing one multi-channel window
#[derive(Debug, Clone, PartialEq)]
pub struct WindowAnalysis {
    pub start_timestamp: f64,
    /// Band-wise mean over channels
    pub features: FeatureVector,
    pub per_channel: Vec<FeatureVector>,
    pub diagnostics: Vec<Diagnostic>,
    pub timings: StageTimings,
}

impl WindowAnalysis {
    pub fn degenerate_channels(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::DegenerateSignal { .. }))
            .count()
    }

    pub fn has_empty_bands(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::EmptyBand { .. }))
    }
}

/// The synchronous DSP chain run once per scheduler cycle
///
/// Each channel is filtered, normalized and analysed independently; the
/// published feature vector is the per-band mean across channels.
#[derive(Debug)]
pub struct DspPipeline {
    config: ProcessingConfig,
    filter: BandpassFilter,
    normalizer: Normalizer,
    estimator: SpectralEstimator,
    extractor: FeatureExtractor,
    metrics: ProcessingMetrics,
}

impl DspPipeline {
    /// Validates the config and designs the filter up front
    pub fn new(config: ProcessingConfig) -> EegResult<Self> {
        config.validate()?;
        let filter = BandpassFilter::new(config.filter_spec())?;

        info!(
            sample_rate_hz = config.sample_rate_hz,
            low_hz = config.filter_low_hz,
            high_hz = config.filter_high_hz,
            order = config.filter_order,
            segment_length = config.psd_segment_length,
            "DSP pipeline ready"
        );

        Ok(Self {
            estimator: SpectralEstimator::new(config.psd_segment_length),
            extractor: FeatureExtractor::new(config.bands.clone()),
            normalizer: Normalizer::new(),
            filter,
            config,
            metrics: ProcessingMetrics::new(),
        })
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ProcessingMetrics {
        &self.metrics
    }

    pub fn filter(&self) -> &BandpassFilter {
        &self.filter
    }

    /// Run every stage over one window per channel
    pub fn analyze(&mut self, windows: &[SignalWindow]) -> EegResult<WindowAnalysis> {
        let timer = ProcessingTimer::start();
        match self.analyze_channels(windows) {
            Ok(mut analysis) => {
                analysis.timings.total_us = timer.elapsed_us();
                self.metrics
                    .record_success(analysis.timings.total_us, analysis.degenerate_channels());
                debug!(
                    channels = windows.len(),
                    total_us = analysis.timings.total_us,
                    dominant = %analysis.features.dominant_band(),
                    "window analysed"
                );
                Ok(analysis)
            }
            Err(err) => {
                self.metrics.record_failure();
                Err(err)
            }
        }
    }

    fn analyze_channels(&mut self, windows: &[SignalWindow]) -> EegResult<WindowAnalysis> {
        let first = windows
            .first()
            .ok_or_else(|| EegError::config("No channel windows to analyse"))?;

        let mut per_channel = Vec::with_capacity(windows.len());
        let mut diagnostics = Vec::new();
        let mut timings = StageTimings::default();
        for window in windows {
            let (features, channel_timings) = self.analyze_channel(window, &mut diagnostics)?;
            per_channel.push(features);
            timings.accumulate(&channel_timings);
        }

        let features = FeatureVector::mean(&per_channel).unwrap_or_default();
        Ok(WindowAnalysis {
            start_timestamp: first.start_timestamp,
            features,
            per_channel,
            diagnostics,
            timings,
        })
    }

    fn analyze_channel(
        &mut self,
        window: &SignalWindow,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> EegResult<(FeatureVector, StageTimings)> {
        if window.len() < 2 {
            return Err(EegError::InsufficientSamples { len: window.len() });
        }

        let mut timer = ProcessingTimer::start();
        let mut timings = StageTimings::default();

        let filtered = self.filter.apply(window)?;
        timings.filter_us = timer.lap();

        let normalized = self.normalizer.normalize(&filtered);
        if normalized.degenerate {
            diagnostics.push(Diagnostic::DegenerateSignal {
                channel: window.channel,
            });
        }
        timings.normalize_us = timer.lap();

        let psd = self.estimator.estimate(&normalized.window)?;
        timings.spectral_us = timer.lap();

        let band_powers = self.extractor.extract(&psd)?;
        diagnostics.extend(band_powers.empty_bands.iter().map(|&band| Diagnostic::EmptyBand {
            channel: window.channel,
            band,
        }));
        timings.features_us = timer.lap();

        Ok((band_powers.features, timings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};
    use std::f64::consts::PI;

    fn tone(frequency_hz: f64, amplitude: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * frequency_hz * i as f64 / 256.0).sin())
            .collect()
    }

    fn window(channel: usize, samples: Vec<f64>) -> SignalWindow {
        SignalWindow::new(channel, 100.0, 256.0, samples).unwrap()
    }

    #[test]
    fn test_alpha_tone_in_noise_end_to_end() {
        let mut rng = StdRng::seed_from_u64(42);
        let noise = Normal::new(0.0, 1.0).unwrap();
        let samples: Vec<f64> = tone(10.0, 5.0, 256)
            .into_iter()
            .map(|x| x + noise.sample(&mut rng))
            .collect();

        let config = ProcessingConfig {
            psd_segment_length: 256,
            ..ProcessingConfig::default()
        };
        let mut pipeline = DspPipeline::new(config).unwrap();
        let analysis = pipeline.analyze(&[window(0, samples)]).unwrap();
        let features = analysis.features;

        assert!(features.alpha > features.delta);
        assert!(features.alpha > features.theta);
        assert!(features.alpha > features.beta);
        assert!(analysis.diagnostics.is_empty());
        assert_eq!(analysis.start_timestamp, 100.0);
        assert_eq!(pipeline.metrics().windows_processed, 1);
    }

    #[test]
    fn test_default_segment_clamps_to_window() {
        let mut pipeline = DspPipeline::new(ProcessingConfig::default()).unwrap();
        let analysis = pipeline.analyze(&[window(0, tone(10.0, 1.0, 256))]).unwrap();
        assert_eq!(analysis.features.dominant_band(), Band::Alpha);
    }

    #[test]
    fn test_channel_mean() {
        let mut pipeline = DspPipeline::new(ProcessingConfig::default()).unwrap();
        let windows = [window(0, tone(10.0, 1.0, 512)), window(1, tone(20.0, 1.0, 512))];
        let analysis = pipeline.analyze(&windows).unwrap();

        assert_eq!(analysis.per_channel.len(), 2);
        assert_eq!(analysis.per_channel[0].dominant_band(), Band::Alpha);
        assert_eq!(analysis.per_channel[1].dominant_band(), Band::Beta);

        let expected = FeatureVector::mean(&analysis.per_channel).unwrap();
        assert_eq!(analysis.features, expected);
    }

    #[test]
    fn test_flat_channel_is_soft_diagnostic() {
        let mut pipeline = DspPipeline::new(ProcessingConfig::default()).unwrap();
        let windows = [window(0, tone(10.0, 1.0, 256)), window(1, vec![2.5; 256])];
        let analysis = pipeline.analyze(&windows).unwrap();

        assert_eq!(analysis.per_channel[1], FeatureVector::default());
        assert_eq!(analysis.diagnostics, vec![Diagnostic::DegenerateSignal { channel: 1 }]);
        assert_eq!(pipeline.metrics().degenerate_channels, 1);
    }

    #[test]
    fn test_short_window_reports_empty_bands() {
        let mut pipeline = DspPipeline::new(ProcessingConfig::default()).unwrap();
        let analysis = pipeline
            .analyze(&[window(0, vec![1.0, -2.0, 3.0, -1.0, 0.5, 2.0, -3.0, 1.0])])
            .unwrap();

        assert_eq!(analysis.features, FeatureVector::default());
        assert!(analysis.has_empty_bands());
    }

    #[test]
    fn test_single_sample_window_fails_cycle() {
        let mut pipeline = DspPipeline::new(ProcessingConfig::default()).unwrap();
        let err = pipeline.analyze(&[window(0, vec![1.0])]).unwrap_err();

        assert_eq!(err, EegError::InsufficientSamples { len: 1 });
        assert_eq!(pipeline.metrics().windows_failed, 1);
        assert!(pipeline.analyze(&[]).is_err());
    }

    #[test]
    fn test_bad_filter_rejected_at_construction() {
        let config = ProcessingConfig {
            filter_low_hz: 40.0,
            filter_high_hz: 30.0,
            ..ProcessingConfig::default()
        };
        assert!(matches!(
            DspPipeline::new(config),
            Err(EegError::InvalidFilterSpec { .. })
        ));
    }
}
