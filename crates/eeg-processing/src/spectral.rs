//! Welch power spectral density estimation
//!
//! Segments overlap by half, are detrended by their mean and tapered with a
//! periodic Hann window. Periodograms are averaged and scaled to a one-sided
//! density, so `sum(power) * resolution` equals the signal variance.

use eeg_core::{EegError, EegResult, SignalWindow};
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// One-sided power spectral density
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Psd {
    /// Bin centre frequencies, strictly increasing from 0 to at most fs/2
    pub frequencies: Vec<f64>,
    /// Power per Hz at each bin
    pub power: Vec<f64>,
}

impl Psd {
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Bin spacing in Hz
    pub fn resolution_hz(&self) -> f64 {
        match self.frequencies.as_slice() {
            [first, second, ..] => second - first,
            _ => 0.0,
        }
    }

    /// Power integrated over all bins
    pub fn total_power(&self) -> f64 {
        self.power.iter().sum::<f64>() * self.resolution_hz()
    }

    /// Frequency of the strongest bin
    pub fn peak_frequency(&self) -> Option<f64> {
        self.power
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| self.frequencies[i])
    }
}

/// Welch estimator holding a reusable FFT planner
pub struct SpectralEstimator {
    planner: RealFftPlanner<f64>,
    segment_length: usize,
}

impl fmt::Debug for SpectralEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralEstimator")
            .field("segment_length", &self.segment_length)
            .finish()
    }
}

impl SpectralEstimator {
    /// `segment_length` is the nominal Welch segment used by [`estimate`](Self::estimate)
    pub fn new(segment_length: usize) -> Self {
        Self {
            planner: RealFftPlanner::new(),
            segment_length,
        }
    }

    pub fn segment_length(&self) -> usize {
        self.segment_length
    }

    /// PSD of a window using the configured segment length
    pub fn estimate(&mut self, window: &SignalWindow) -> EegResult<Psd> {
        self.estimate_psd(&window.samples, window.sample_rate_hz, self.segment_length)
    }

    /// Welch PSD of `samples`
    ///
    /// Windows shorter than `segment_length` are analysed as a single segment.
    pub fn estimate_psd(&mut self, samples: &[f64], sample_rate_hz: f64, segment_length: usize) -> EegResult<Psd> {
        let len = samples.len();
        if len < 2 {
            return Err(EegError::InsufficientSamples { len });
        }
        if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
            return Err(EegError::InvalidSampleRate { rate: sample_rate_hz });
        }
        if segment_length < 2 {
            return Err(EegError::config(format!(
                "PSD segment length must be at least 2, got {}",
                segment_length
            )));
        }

        let nperseg = segment_length.min(len);
        let step = nperseg - nperseg / 2;
        let segments = (len - nperseg) / step + 1;

        let taper = hann(nperseg);
        let taper_energy: f64 = taper.iter().map(|w| w * w).sum();

        let r2c = self.planner.plan_fft_forward(nperseg);
        let mut input = r2c.make_input_vec();
        let mut spectrum = r2c.make_output_vec();
        let mut accumulated = vec![0.0; spectrum.len()];

        for index in 0..segments {
            let segment = &samples[index * step..index * step + nperseg];
            let mean = segment.iter().sum::<f64>() / nperseg as f64;
            for ((slot, x), w) in input.iter_mut().zip(segment).zip(&taper) {
                *slot = (x - mean) * w;
            }
            r2c.process(&mut input, &mut spectrum)
                .map_err(|e| EegError::Spectral { message: e.to_string() })?;
            for (acc, bin) in accumulated.iter_mut().zip(&spectrum) {
                *acc += bin.norm_sqr();
            }
        }

        let scale = 1.0 / (sample_rate_hz * taper_energy * segments as f64);
        let last = accumulated.len() - 1;
        let has_nyquist = nperseg % 2 == 0;
        let power = accumulated
            .iter()
            .enumerate()
            .map(|(k, acc)| {
                // One-sided: fold negative frequencies in, except DC and Nyquist
                let fold = if k == 0 || (has_nyquist && k == last) { 1.0 } else { 2.0 };
                acc * scale * fold
            })
            .collect();

        let frequencies = (0..accumulated.len())
            .map(|k| k as f64 * sample_rate_hz / nperseg as f64)
            .collect();

        Ok(Psd { frequencies, power })
    }
}

/// Periodic Hann window
fn hann(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / len as f64).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn sine(frequency_hz: f64, sample_rate_hz: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * PI * frequency_hz * i as f64 / sample_rate_hz).sin())
            .collect()
    }

    #[test]
    fn test_frequency_axis() {
        let mut estimator = SpectralEstimator::new(1024);
        for len in [2usize, 3, 255, 256, 1000, 3000] {
            let psd = estimator.estimate_psd(&sine(10.0, 256.0, len), 256.0, 1024).unwrap();

            assert_eq!(psd.frequencies.len(), psd.power.len());
            assert_eq!(psd.frequencies[0], 0.0);
            assert!(psd.frequencies.windows(2).all(|w| w[1] > w[0]));
            assert!(psd.frequencies.iter().all(|&f| f <= 128.0));
            assert!(psd.power.iter().all(|&p| p >= 0.0 && p.is_finite()));
        }
    }

    #[test]
    fn test_short_window_uses_single_segment() {
        let mut estimator = SpectralEstimator::new(1024);
        let psd = estimator.estimate_psd(&sine(10.0, 256.0, 256), 256.0, 1024).unwrap();

        assert_eq!(psd.len(), 129);
        assert_eq!(psd.resolution_hz(), 1.0);
        assert_eq!(psd.frequencies[128], 128.0);
        assert_eq!(psd.peak_frequency(), Some(10.0));
    }

    #[test]
    fn test_parseval_unit_sine() {
        let mut estimator = SpectralEstimator::new(256);
        let psd = estimator.estimate_psd(&sine(10.0, 256.0, 1024), 256.0, 256).unwrap();

        // A unit-amplitude sine carries a mean power of 1/2
        assert!((psd.total_power() - 0.5).abs() < 1e-3, "total {}", psd.total_power());
    }

    #[test]
    fn test_white_noise_power_matches_variance() {
        let mut rng = StdRng::seed_from_u64(11);
        let noise = Normal::new(0.0, 2.0).unwrap();
        let samples: Vec<f64> = (0..4096).map(|_| noise.sample(&mut rng)).collect();

        let mut estimator = SpectralEstimator::new(256);
        let psd = estimator.estimate_psd(&samples, 256.0, 256).unwrap();
        let total = psd.total_power();
        assert!((total - 4.0).abs() < 0.6, "total {}", total);
    }

    #[test]
    fn test_insufficient_samples() {
        let mut estimator = SpectralEstimator::new(1024);
        assert_eq!(
            estimator.estimate_psd(&[], 256.0, 1024).unwrap_err(),
            EegError::InsufficientSamples { len: 0 }
        );
        assert_eq!(
            estimator.estimate_psd(&[1.0], 256.0, 1024).unwrap_err(),
            EegError::InsufficientSamples { len: 1 }
        );
    }

    #[test]
    fn test_estimate_window_uses_configured_segment() {
        let window = SignalWindow::new(0, 0.0, 128.0, sine(8.0, 128.0, 512)).unwrap();
        let mut estimator = SpectralEstimator::new(128);
        let psd = estimator.estimate(&window).unwrap();

        assert_eq!(psd.len(), 65);
        assert_eq!(psd.peak_frequency(), Some(8.0));
    }
}
