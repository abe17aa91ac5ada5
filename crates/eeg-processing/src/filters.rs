//! Butterworth band-pass design and zero-phase application
//!
//! Coefficients are designed in zero/pole/gain form (analog prototype,
//! low-pass to band-pass transform, bilinear transform) and realised as a
//! cascade of second-order sections. The expanded transfer function is kept
//! alongside for inspection, but filtering always runs through the sections.

use eeg_core::{EegError, EegResult, SignalWindow};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::Arc;
use tracing::debug;

/// Default Butterworth prototype order
pub const DEFAULT_FILTER_ORDER: usize = 5;

/// Highest prototype order accepted; beyond this the band edges of narrow
/// EEG bands lose too much precision even in second-order form
pub const MAX_FILTER_ORDER: usize = 12;

// Poles whose imaginary part is below this are treated as real
const IMAG_TOLERANCE: f64 = 1e-12;

/// Band-pass design parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub low_hz: f64,
    pub high_hz: f64,
    pub sample_rate_hz: f64,
    pub order: usize,
}

/// Exact cache key; float parameters compared bitwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FilterKey {
    low_bits: u64,
    high_bits: u64,
    rate_bits: u64,
    order: usize,
}

impl FilterSpec {
    pub fn new(low_hz: f64, high_hz: f64, sample_rate_hz: f64, order: usize) -> Self {
        Self {
            low_hz,
            high_hz,
            sample_rate_hz,
            order,
        }
    }

    /// Same cutoffs and order at another sampling rate
    pub fn with_sample_rate(&self, sample_rate_hz: f64) -> Self {
        Self {
            sample_rate_hz,
            ..*self
        }
    }

    /// Enforce `0 < low < high < fs/2` and `1 <= order <= MAX_FILTER_ORDER`
    pub fn validate(&self) -> EegResult<()> {
        let reject = |reason: &str| EegError::InvalidFilterSpec {
            low_hz: self.low_hz,
            high_hz: self.high_hz,
            sample_rate_hz: self.sample_rate_hz,
            order: self.order,
            reason: reason.to_string(),
        };

        if !(self.low_hz.is_finite() && self.high_hz.is_finite() && self.sample_rate_hz.is_finite()) {
            return Err(reject("parameters must be finite"));
        }
        if self.sample_rate_hz <= 0.0 {
            return Err(reject("sampling rate must be positive"));
        }
        if self.low_hz <= 0.0 {
            return Err(reject("low cutoff must be above 0Hz"));
        }
        if self.low_hz >= self.high_hz {
            return Err(reject("low cutoff must be below high cutoff"));
        }
        if self.high_hz >= self.sample_rate_hz / 2.0 {
            return Err(reject("high cutoff must be below the Nyquist frequency"));
        }
        if self.order == 0 || self.order > MAX_FILTER_ORDER {
            return Err(reject("order out of range"));
        }
        Ok(())
    }

    fn key(&self) -> FilterKey {
        FilterKey {
            low_bits: self.low_hz.to_bits(),
            high_bits: self.high_hz.to_bits(),
            rate_bits: self.sample_rate_hz.to_bits(),
            order: self.order,
        }
    }
}

/// Second-order section, `a0` normalised to 1
///
/// Runs in transposed direct form II:
/// `y = b0*x + z1; z1 = b1*x - a1*y + z2; z2 = b2*x - a2*y`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadSection {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadSection {
    /// Gain at 0Hz
    pub fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// State reached after an infinitely long unit-step input
    fn step_state(&self) -> (f64, f64) {
        let gain = self.dc_gain();
        let z2 = self.b2 - self.a2 * gain;
        let z1 = self.b1 - self.a1 * gain + z2;
        (z1, z2)
    }

    fn process(&self, data: &mut [f64], mut z1: f64, mut z2: f64) {
        for value in data.iter_mut() {
            let input = *value;
            let output = self.b0 * input + z1;
            z1 = self.b1 * input - self.a1 * output + z2;
            z2 = self.b2 * input - self.a2 * output;
            *value = output;
        }
    }

    fn response(&self, z_inv: Complex<f64>) -> Complex<f64> {
        let z_inv2 = z_inv * z_inv;
        let numerator = z_inv * self.b1 + z_inv2 * self.b2 + self.b0;
        let denominator = z_inv * self.a1 + z_inv2 * self.a2 + 1.0;
        numerator / denominator
    }
}

/// Designed band-pass filter
///
/// `b` and `a` are the expanded transfer function; both have `2 * order + 1`
/// taps since a band-pass doubles the prototype order. `a[0] == 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCoefficients {
    pub b: Vec<f64>,
    pub a: Vec<f64>,
    pub sections: Vec<BiquadSection>,
}

impl FilterCoefficients {
    /// Butterworth band-pass for `spec`
    pub fn butterworth_bandpass(spec: &FilterSpec) -> EegResult<Self> {
        spec.validate()?;
        let n = spec.order;
        let nyquist = spec.sample_rate_hz / 2.0;

        // Pre-warp both edges for a bilinear transform at fs = 2
        let warped_low = 4.0 * (PI * (spec.low_hz / nyquist) / 2.0).tan();
        let warped_high = 4.0 * (PI * (spec.high_hz / nyquist) / 2.0).tan();
        let bandwidth = warped_high - warped_low;
        let center_sq = warped_low * warped_high;

        // Each prototype pole splits into two band-pass poles
        let mut analog_poles = Vec::with_capacity(2 * n);
        for k in 0..n {
            let theta = PI * (2 * k + n + 1) as f64 / (2 * n) as f64;
            let scaled = Complex::from_polar(1.0, theta) * (bandwidth / 2.0);
            let offset = (scaled * scaled - center_sq).sqrt();
            analog_poles.push(scaled + offset);
            analog_poles.push(scaled - offset);
        }

        // Bilinear transform; n zeros land on z = 1 and n on z = -1
        let mut product = Complex::new(1.0, 0.0);
        let mut digital_poles = Vec::with_capacity(2 * n);
        for &pole in &analog_poles {
            product *= 4.0 - pole;
            digital_poles.push((4.0 + pole) / (4.0 - pole));
        }
        let gain = (Complex::new((4.0 * bandwidth).powi(n as i32), 0.0) / product).re;

        let mut denominators = Vec::with_capacity(n);
        let mut real_poles = Vec::new();
        for pole in &digital_poles {
            if pole.im.abs() <= IMAG_TOLERANCE {
                real_poles.push(pole.re);
            } else if pole.im > 0.0 {
                denominators.push((-2.0 * pole.re, pole.norm_sqr()));
            }
        }
        real_poles.sort_by(|a, b| a.total_cmp(b));
        for pair in real_poles.chunks(2) {
            match pair {
                [r1, r2] => denominators.push((-(r1 + r2), r1 * r2)),
                _ => {
                    return Err(EegError::InvalidFilterSpec {
                        low_hz: spec.low_hz,
                        high_hz: spec.high_hz,
                        sample_rate_hz: spec.sample_rate_hz,
                        order: spec.order,
                        reason: "design produced an unpaired real pole".to_string(),
                    })
                }
            }
        }

        let sections: Vec<BiquadSection> = denominators
            .into_iter()
            .enumerate()
            .map(|(i, (a1, a2))| {
                let k = if i == 0 { gain } else { 1.0 };
                BiquadSection {
                    b0: k,
                    b1: 0.0,
                    b2: -k,
                    a1,
                    a2,
                }
            })
            .collect();

        let mut b = vec![1.0];
        let mut a = vec![1.0];
        for section in &sections {
            b = convolve(&b, &[section.b0, section.b1, section.b2]);
            a = convolve(&a, &[1.0, section.a1, section.a2]);
        }

        Ok(Self { b, a, sections })
    }

    /// Effective order of the designed transfer function
    pub fn order(&self) -> usize {
        self.a.len().saturating_sub(1)
    }

    /// Magnitude response at `frequency_hz`
    pub fn magnitude_at(&self, frequency_hz: f64, sample_rate_hz: f64) -> f64 {
        let omega = 2.0 * PI * frequency_hz / sample_rate_hz;
        let z_inv = Complex::from_polar(1.0, -omega);
        self.sections
            .iter()
            .fold(Complex::new(1.0, 0.0), |acc, section| acc * section.response(z_inv))
            .norm()
    }

    /// Forward-backward filtering; output has the same length as `input`
    ///
    /// The input is extended at both ends by odd reflection and each pass
    /// starts from the steady state matching its first sample, so edges do
    /// not ring.
    pub fn filtfilt(&self, input: &[f64]) -> Vec<f64> {
        let len = input.len();
        if len == 0 {
            return Vec::new();
        }

        let padlen = (3 * (2 * self.sections.len() + 1)).min(len - 1);
        let mut data = odd_extension(input, padlen);
        let initial = self.initial_states();

        let first = data[0];
        self.run_cascade(&mut data, &initial, first);
        data.reverse();
        let first = data[0];
        self.run_cascade(&mut data, &initial, first);
        data.reverse();

        data.drain(..padlen);
        data.truncate(len);
        data
    }

    // Per-section step state, scaled by the DC gain of everything upstream
    fn initial_states(&self) -> Vec<(f64, f64)> {
        let mut scale = 1.0;
        self.sections
            .iter()
            .map(|section| {
                let (z1, z2) = section.step_state();
                let state = (z1 * scale, z2 * scale);
                scale *= section.dc_gain();
                state
            })
            .collect()
    }

    fn run_cascade(&self, data: &mut [f64], initial: &[(f64, f64)], level: f64) {
        for (section, (z1, z2)) in self.sections.iter().zip(initial) {
            section.process(data, z1 * level, z2 * level);
        }
    }
}

fn convolve(x: &[f64], y: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; x.len() + y.len() - 1];
    for (i, xv) in x.iter().enumerate() {
        for (j, yv) in y.iter().enumerate() {
            out[i + j] += xv * yv;
        }
    }
    out
}

fn odd_extension(input: &[f64], padlen: usize) -> Vec<f64> {
    let len = input.len();
    let first = input[0];
    let last = input[len - 1];
    let mut extended = Vec::with_capacity(len + 2 * padlen);
    extended.extend((1..=padlen).rev().map(|i| 2.0 * first - input[i]));
    extended.extend_from_slice(input);
    extended.extend((1..=padlen).map(|i| 2.0 * last - input[len - 1 - i]));
    extended
}

/// Zero-phase Butterworth band-pass with a per-parameter coefficient cache
///
/// Construction designs the filter for the configured spec and fails fast on
/// bad parameters. A window arriving at a different sampling rate switches to
/// the coefficients for that rate, designing them once.
#[derive(Debug)]
pub struct BandpassFilter {
    spec: FilterSpec,
    active: Arc<FilterCoefficients>,
    cache: HashMap<FilterKey, Arc<FilterCoefficients>>,
    designs: u64,
}

impl BandpassFilter {
    pub fn new(spec: FilterSpec) -> EegResult<Self> {
        let coefficients = Arc::new(FilterCoefficients::butterworth_bandpass(&spec)?);
        let mut cache = HashMap::new();
        cache.insert(spec.key(), coefficients.clone());
        debug!(
            low_hz = spec.low_hz,
            high_hz = spec.high_hz,
            sample_rate_hz = spec.sample_rate_hz,
            order = spec.order,
            "designed band-pass filter"
        );

        Ok(Self {
            spec,
            active: coefficients,
            cache,
            designs: 1,
        })
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn coefficients(&self) -> &FilterCoefficients {
        &self.active
    }

    /// Number of coefficient designs performed (cache misses)
    pub fn design_count(&self) -> u64 {
        self.designs
    }

    /// Switch parameters, reusing cached coefficients when available
    pub fn set_spec(&mut self, spec: FilterSpec) -> EegResult<()> {
        if spec.key() == self.spec.key() {
            return Ok(());
        }
        let coefficients = match self.cache.get(&spec.key()) {
            Some(cached) => cached.clone(),
            None => {
                let designed = Arc::new(FilterCoefficients::butterworth_bandpass(&spec)?);
                self.designs += 1;
                debug!(sample_rate_hz = spec.sample_rate_hz, "designed band-pass filter for new parameters");
                self.cache.insert(spec.key(), designed.clone());
                designed
            }
        };
        self.spec = spec;
        self.active = coefficients;
        Ok(())
    }

    /// Filter one window
    pub fn apply(&mut self, window: &SignalWindow) -> EegResult<SignalWindow> {
        if window.sample_rate_hz.to_bits() != self.spec.sample_rate_hz.to_bits() {
            self.set_spec(self.spec.with_sample_rate(window.sample_rate_hz))?;
        }
        Ok(window.with_samples(self.active.filtfilt(&window.samples)))
    }
}
