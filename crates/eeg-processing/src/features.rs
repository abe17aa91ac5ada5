//! Band-power feature extraction from a PSD

use eeg_core::{Band, BandLayout, EegError, EegResult, FeatureVector};
use tracing::trace;

use crate::spectral::Psd;

/// Band powers plus the bands that had no PSD bin inside them
#[derive(Debug, Clone, PartialEq)]
pub struct BandPowers {
    pub features: FeatureVector,
    /// Reported as 0.0 in `features`
    pub empty_bands: Vec<Band>,
}

/// Averages PSD bins over each configured band
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    bands: BandLayout,
}

impl FeatureExtractor {
    pub fn new(bands: BandLayout) -> Self {
        Self { bands }
    }

    pub fn bands(&self) -> &BandLayout {
        &self.bands
    }

    pub fn extract(&self, psd: &Psd) -> EegResult<BandPowers> {
        extract_band_powers(&psd.frequencies, &psd.power, &self.bands)
    }
}

/// Mean of `power[i]` over every bin with `low <= frequencies[i] <= high`
///
/// A band with no bin reports 0.0 and is listed in `empty_bands`.
pub fn extract_band_powers(frequencies: &[f64], power: &[f64], bands: &BandLayout) -> EegResult<BandPowers> {
    if frequencies.len() != power.len() {
        return Err(EegError::Spectral {
            message: format!(
                "{} frequencies but {} power values",
                frequencies.len(),
                power.len()
            ),
        });
    }

    let mut powers = [0.0; 4];
    let mut empty_bands = Vec::new();
    for ((band, range), slot) in bands.iter().zip(powers.iter_mut()) {
        let (sum, count) = frequencies
            .iter()
            .zip(power)
            .filter(|(f, _)| range.contains(**f))
            .fold((0.0, 0usize), |(sum, count), (_, p)| (sum + p, count + 1));

        if count == 0 {
            trace!(band = %band, "no PSD bins in band");
            empty_bands.push(band);
        } else {
            *slot = sum / count as f64;
        }
    }

    Ok(BandPowers {
        features: FeatureVector::from_powers(powers)?,
        empty_bands,
    })
}
