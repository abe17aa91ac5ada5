//! EEG-specific band, feature and result types

use serde::{Deserialize, Serialize};
use crate::error::{EegError, EegResult};

/// Label reported when the classifier cannot produce one
pub const UNKNOWN_LABEL: &str = "unknown";

/// Named EEG frequency bands, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Delta,
    Theta,
    Alpha,
    Beta,
}

impl Band {
    /// All bands in canonical order
    pub const ALL: [Band; 4] = [Band::Delta, Band::Theta, Band::Alpha, Band::Beta];

    /// Lowercase band name as used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Band::Delta => "delta",
            Band::Theta => "theta",
            Band::Alpha => "alpha",
            Band::Beta => "beta",
        }
    }

    fn index(self) -> usize {
        match self {
            Band::Delta => 0,
            Band::Theta => 1,
            Band::Alpha => 2,
            Band::Beta => 3,
        }
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Closed frequency interval `[low_hz, high_hz]`
///
/// Serialized as a two-element array, e.g. `[8.0, 13.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct BandRange {
    pub low_hz: f64,
    pub high_hz: f64,
}

impl BandRange {
    pub const fn new(low_hz: f64, high_hz: f64) -> Self {
        Self { low_hz, high_hz }
    }

    /// Inclusive on both ends
    pub fn contains(&self, frequency_hz: f64) -> bool {
        self.low_hz <= frequency_hz && frequency_hz <= self.high_hz
    }
}

impl From<(f64, f64)> for BandRange {
    fn from((low_hz, high_hz): (f64, f64)) -> Self {
        BandRange { low_hz, high_hz }
    }
}

impl From<BandRange> for (f64, f64) {
    fn from(range: BandRange) -> Self {
        (range.low_hz, range.high_hz)
    }
}

/// Frequency interval for every band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandLayout {
    pub delta: BandRange,
    pub theta: BandRange,
    pub alpha: BandRange,
    pub beta: BandRange,
}

impl BandLayout {
    /// Conventional clinical EEG bands
    pub const fn standard() -> Self {
        Self {
            delta: BandRange::new(0.5, 4.0),
            theta: BandRange::new(4.0, 8.0),
            alpha: BandRange::new(8.0, 13.0),
            beta: BandRange::new(13.0, 30.0),
        }
    }

    /// Interval assigned to a band
    pub fn range(&self, band: Band) -> BandRange {
        match band {
            Band::Delta => self.delta,
            Band::Theta => self.theta,
            Band::Alpha => self.alpha,
            Band::Beta => self.beta,
        }
    }

    /// Bands with their intervals, in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (Band, BandRange)> + '_ {
        Band::ALL.into_iter().map(move |band| (band, self.range(band)))
    }

    /// Every interval must be finite, non-negative and non-empty
    pub fn validate(&self) -> EegResult<()> {
        for (band, range) in self.iter() {
            if !range.low_hz.is_finite() || !range.high_hz.is_finite() {
                return Err(EegError::config(format!("Band '{}' has non-finite bounds", band)));
            }
            if range.low_hz < 0.0 {
                return Err(EegError::config(format!("Band '{}' has a negative lower bound", band)));
            }
            if range.low_hz >= range.high_hz {
                return Err(EegError::config(format!(
                    "Band '{}' lower bound {}Hz must be below upper bound {}Hz",
                    band, range.low_hz, range.high_hz
                )));
            }
        }
        Ok(())
    }
}

impl Default for BandLayout {
    fn default() -> Self {
        Self::standard()
    }
}

/// Per-band spectral power of one processing window
///
/// Always carries all four bands. Values are finite and non-negative, also
/// when deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawFeatureVector")]
pub struct FeatureVector {
    pub delta: f64,
    pub theta: f64,
    pub alpha: f64,
    pub beta: f64,
}

#[derive(Deserialize)]
struct RawFeatureVector {
    delta: f64,
    theta: f64,
    alpha: f64,
    beta: f64,
}

impl TryFrom<RawFeatureVector> for FeatureVector {
    type Error = EegError;

    fn try_from(raw: RawFeatureVector) -> EegResult<Self> {
        FeatureVector::from_powers([raw.delta, raw.theta, raw.alpha, raw.beta])
    }
}

impl FeatureVector {
    /// Build from powers in canonical band order
    ///
    /// Negative values (rounding residue) clamp to zero; NaN or infinity is an error.
    pub fn from_powers(powers: [f64; 4]) -> EegResult<Self> {
        for (band, power) in Band::ALL.iter().zip(powers.iter()) {
            if !power.is_finite() {
                return Err(EegError::NonFiniteFeature {
                    band: band.name().to_string(),
                });
            }
        }
        let [delta, theta, alpha, beta] = powers.map(|p| p.max(0.0));
        Ok(Self { delta, theta, alpha, beta })
    }

    pub fn get(&self, band: Band) -> f64 {
        self.as_array()[band.index()]
    }

    /// Powers in canonical band order
    pub fn as_array(&self) -> [f64; 4] {
        [self.delta, self.theta, self.alpha, self.beta]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Band, f64)> + '_ {
        Band::ALL.into_iter().map(move |band| (band, self.get(band)))
    }

    /// Band with the highest power (earliest band wins ties)
    pub fn dominant_band(&self) -> Band {
        let mut best = Band::Delta;
        for band in Band::ALL {
            if self.get(band) > self.get(best) {
                best = band;
            }
        }
        best
    }

    /// Band-wise arithmetic mean, `None` for an empty slice
    pub fn mean(vectors: &[FeatureVector]) -> Option<FeatureVector> {
        if vectors.is_empty() {
            return None;
        }
        let mut sums = [0.0; 4];
        for vector in vectors {
            for (sum, power) in sums.iter_mut().zip(vector.as_array()) {
                *sum += power;
            }
        }
        let n = vectors.len() as f64;
        let [delta, theta, alpha, beta] = sums.map(|s| s / n);
        Some(FeatureVector { delta, theta, alpha, beta })
    }
}

/// Features of one window paired with the classifier's label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Seconds since the Unix epoch at classification time
    pub timestamp: f64,
    pub features: FeatureVector,
    pub label: String,
}

impl ClassificationResult {
    pub fn new(features: FeatureVector, label: impl Into<String>, timestamp: f64) -> Self {
        Self {
            timestamp,
            features,
            label: label.into(),
        }
    }

    /// True when the classifier failed and the label was downgraded
    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }

    /// Wire record: `{"timestamp": .., "features": {band: power}, "label": ..}`
    pub fn to_json(&self) -> EegResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
