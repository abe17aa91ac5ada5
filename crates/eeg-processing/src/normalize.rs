//! Zero-mean, unit-variance scaling of a filtered window

use eeg_core::SignalWindow;
use tracing::warn;

/// Standard deviation below which a window is treated as flat
pub const DEGENERATE_STD: f64 = 1e-12;

/// Normalizer output
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedWindow {
    pub window: SignalWindow,
    /// Set when the input was flat and the output is all zeros
    pub degenerate: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// `(x - mean) / std` using the population standard deviation
    ///
    /// Flat or empty input yields zeros flagged as degenerate instead of
    /// dividing by zero.
    pub fn normalize(&self, window: &SignalWindow) -> NormalizedWindow {
        let samples = &window.samples;
        let (mean, std) = mean_std(samples);

        // Rounding in the mean leaves a constant window with a tiny non-zero std
        if is_flat(samples) || std < DEGENERATE_STD {
            warn!(channel = window.channel, std, "flat window normalized to zeros");
            return NormalizedWindow {
                window: window.with_samples(vec![0.0; samples.len()]),
                degenerate: true,
            };
        }

        NormalizedWindow {
            window: window.with_samples(samples.iter().map(|x| (x - mean) / std).collect()),
            degenerate: false,
        }
    }
}

fn is_flat(samples: &[f64]) -> bool {
    match samples.split_first() {
        Some((first, rest)) => rest.iter().all(|x| x == first),
        None => true,
    }
}

fn mean_std(samples: &[f64]) -> (f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn window(samples: Vec<f64>) -> SignalWindow {
        SignalWindow::new(0, 0.0, 256.0, samples).unwrap()
    }

    #[test]
    fn test_unit_statistics() {
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(42.0, 13.0).unwrap();
        for _ in 0..10 {
            let samples: Vec<f64> = (0..300).map(|_| noise.sample(&mut rng)).collect();
            let normalized = Normalizer::new().normalize(&window(samples));
            let (mean, std) = mean_std(&normalized.window.samples);

            assert!(!normalized.degenerate);
            assert!(mean.abs() < 1e-10);
            assert!((std - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_constant_input_yields_zeros() {
        let normalized = Normalizer::new().normalize(&window(vec![5.0; 64]));
        assert!(normalized.degenerate);
        assert_eq!(normalized.window.samples, vec![0.0; 64]);
    }

    #[test]
    fn test_constant_input_with_inexact_mean_yields_zeros() {
        for value in [123456.789, 1000000.3, 4321.123, -0.1] {
            let normalized = Normalizer::new().normalize(&window(vec![value; 256]));
            assert!(normalized.degenerate, "{} not flagged", value);
            assert_eq!(normalized.window.samples, vec![0.0; 256]);
        }
    }

    #[test]
    fn test_empty_and_single_sample() {
        let empty = Normalizer::new().normalize(&window(Vec::new()));
        assert!(empty.degenerate);
        assert!(empty.window.is_empty());

        let single = Normalizer::new().normalize(&window(vec![3.0]));
        assert!(single.degenerate);
        assert_eq!(single.window.samples, vec![0.0]);
    }
}
