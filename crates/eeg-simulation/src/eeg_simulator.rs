//! Multi-channel EEG simulator with background noise and mains interference

use crate::signal_patterns::BrainState;
use eeg_core::{unix_now_secs, EegError, EegResult, Sample};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Noise configuration for realistic EEG simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Gaussian background noise standard deviation (microvolts)
    pub gaussian_std_uv: f64,
    /// Mains interference frequency, typically 50 or 60Hz
    pub mains_hz: Option<f64>,
    /// Mains interference amplitude (microvolts)
    pub mains_amplitude_uv: f64,
    /// Electrode pop probability per sample (0.0 to 1.0)
    pub artifact_prob: f64,
    /// Electrode pop amplitude (microvolts)
    pub artifact_amplitude_uv: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            gaussian_std_uv: 5.0,
            mains_hz: Some(50.0),
            mains_amplitude_uv: 10.0,
            artifact_prob: 0.0,
            artifact_amplitude_uv: 100.0,
        }
    }
}

/// Configuration for EEG simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub sample_rate_hz: f64,
    pub channel_count: usize,
    pub state: BrainState,
    pub noise: NoiseConfig,
    /// Random seed for reproducibility; entropy-seeded when absent
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 256.0,
            channel_count: 1,
            state: BrainState::Resting,
            noise: NoiseConfig::default(),
            seed: None,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> EegResult<()> {
        if !(self.sample_rate_hz.is_finite() && self.sample_rate_hz > 0.0) {
            return Err(EegError::InvalidSampleRate {
                rate: self.sample_rate_hz,
            });
        }
        if self.channel_count == 0 {
            return Err(EegError::config("Simulator needs at least one channel"));
        }
        if !(0.0..=1.0).contains(&self.noise.artifact_prob) {
            return Err(EegError::config("Artifact probability must be within [0, 1]"));
        }
        Ok(())
    }
}

/// EEG signal simulator
///
/// Produces a continuous sample stream: successive calls carry on from where
/// the previous one stopped, both in phase and in timestamps.
pub struct EegSimulator {
    config: SimulatorConfig,
    rng: StdRng,
    noise: Normal<f64>,
    start_timestamp: f64,
    samples_generated: u64,
    requested_s: f64,
}

impl EegSimulator {
    pub fn new(config: SimulatorConfig) -> EegResult<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let noise = Normal::new(0.0, config.noise.gaussian_std_uv).map_err(|e| {
            EegError::config(format!("Failed to create noise distribution: {}", e))
        })?;

        Ok(Self {
            config,
            rng,
            noise,
            start_timestamp: unix_now_secs(),
            samples_generated: 0,
            requested_s: 0.0,
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Switch the dominant rhythm without breaking continuity
    pub fn set_state(&mut self, state: BrainState) {
        self.config.state = state;
    }

    pub fn samples_generated(&self) -> u64 {
        self.samples_generated
    }

    /// Simulated time of the next sample, in seconds from the start
    pub fn elapsed_s(&self) -> f64 {
        self.samples_generated as f64 / self.config.sample_rate_hz
    }

    /// Restart simulated time at zero with fresh timestamps
    pub fn reset_time(&mut self) {
        self.samples_generated = 0;
        self.requested_s = 0.0;
        self.start_timestamp = unix_now_secs();
    }

    /// Next multi-channel sample
    pub fn next_sample(&mut self) -> Sample {
        let time = self.elapsed_s();
        let state = self.config.state;

        let mut values = Vec::with_capacity(self.config.channel_count);
        for channel in 0..self.config.channel_count {
            // Channels share rhythms but not phase or noise
            let mut value = state.value_at(time, channel as f64 * 0.7);
            value += self.noise.sample(&mut self.rng);

            if let Some(mains_hz) = self.config.noise.mains_hz {
                value += self.config.noise.mains_amplitude_uv * (2.0 * PI * mains_hz * time).sin();
            }

            if self.config.noise.artifact_prob > 0.0 && self.rng.gen::<f64>() < self.config.noise.artifact_prob {
                value += self.config.noise.artifact_amplitude_uv * self.rng.gen_range(-1.0..1.0);
            }

            values.push(value);
        }

        self.samples_generated += 1;
        Sample::new(self.start_timestamp + time, values)
    }

    /// Samples covering the next `duration_s` of simulated time
    ///
    /// Sample counts are derived from the cumulative duration, so repeated
    /// fractional chunks do not drift from the nominal rate.
    pub fn generate(&mut self, duration_s: f64) -> Vec<Sample> {
        self.requested_s += duration_s.max(0.0);
        let target = (self.requested_s * self.config.sample_rate_hz).round() as u64;
        let count = target.saturating_sub(self.samples_generated);
        (0..count).map(|_| self.next_sample()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eeg_core::SignalWindow;
    use eeg_processing::{DspPipeline, ProcessingConfig};

    fn seeded(state: BrainState, channel_count: usize) -> EegSimulator {
        EegSimulator::new(SimulatorConfig {
            channel_count,
            state,
            seed: Some(1234),
            ..SimulatorConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_generate_counts_and_timestamps() {
        let mut simulator = seeded(BrainState::Resting, 3);
        let samples = simulator.generate(1.0);

        assert_eq!(samples.len(), 256);
        assert!(samples.iter().all(|s| s.channel_count() == 3));
        let dt = samples[1].timestamp - samples[0].timestamp;
        assert!((dt - 1.0 / 256.0).abs() < 1e-6);
    }

    #[test]
    fn test_fractional_chunks_do_not_drift() {
        let mut simulator = seeded(BrainState::Resting, 1);
        let total: usize = (0..100).map(|_| simulator.generate(0.1).len()).sum();
        assert_eq!(total, 2560);
    }

    #[test]
    fn test_seed_is_reproducible() {
        let a = seeded(BrainState::Focused, 2).generate(0.5);
        let b = seeded(BrainState::Focused, 2).generate(0.5);
        let values = |s: &[Sample]| s.iter().map(|x| x.channel_values.clone()).collect::<Vec<_>>();
        assert_eq!(values(&a[..]), values(&b[..]));
    }

    #[test]
    fn test_invalid_config() {
        let config = SimulatorConfig {
            channel_count: 0,
            ..SimulatorConfig::default()
        };
        assert!(EegSimulator::new(config).is_err());
    }

    #[test]
    fn test_states_dominate_their_band_after_processing() {
        let mut pipeline = DspPipeline::new(ProcessingConfig::default()).unwrap();
        // Delta sits below the 4Hz filter edge, so deep sleep is left out
        for state in [BrainState::Resting, BrainState::Focused, BrainState::Drowsy] {
            let samples = seeded(state, 1).generate(1.0);
            let values = samples.iter().map(|s| s.channel_values[0]).collect();
            let window = SignalWindow::new(0, samples[0].timestamp, 256.0, values).unwrap();

            let analysis = pipeline.analyze(&[window]).unwrap();
            assert_eq!(analysis.features.dominant_band(), state.dominant_band(), "{}", state);
        }
    }
}
