//! Pre-defined EEG rhythm mixes for simulation

use eeg_core::{Band, EegError};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::str::FromStr;

/// One sinusoidal rhythm inside a simulated signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RhythmComponent {
    pub frequency_hz: f64,
    /// Peak amplitude in microvolts
    pub amplitude_uv: f64,
}

const fn rhythm(frequency_hz: f64, amplitude_uv: f64) -> RhythmComponent {
    RhythmComponent {
        frequency_hz,
        amplitude_uv,
    }
}

/// Mental state driving which band dominates the simulated signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BrainState {
    /// Eyes closed, relaxed: strong alpha
    Resting,
    /// Active concentration: beta
    Focused,
    /// Light drowsiness: theta
    Drowsy,
    /// Slow-wave sleep: delta
    DeepSleep,
}

impl BrainState {
    pub const ALL: [BrainState; 4] = [
        BrainState::Resting,
        BrainState::Focused,
        BrainState::Drowsy,
        BrainState::DeepSleep,
    ];

    /// Rhythm mix, one component per band
    pub fn components(&self) -> [RhythmComponent; 4] {
        match self {
            BrainState::Resting => [rhythm(2.0, 10.0), rhythm(6.0, 8.0), rhythm(10.0, 40.0), rhythm(20.0, 5.0)],
            BrainState::Focused => [rhythm(2.0, 8.0), rhythm(6.0, 6.0), rhythm(10.0, 8.0), rhythm(20.0, 35.0)],
            BrainState::Drowsy => [rhythm(2.0, 15.0), rhythm(6.0, 35.0), rhythm(10.0, 10.0), rhythm(20.0, 4.0)],
            BrainState::DeepSleep => [rhythm(2.0, 60.0), rhythm(6.0, 10.0), rhythm(10.0, 4.0), rhythm(20.0, 2.0)],
        }
    }

    /// Band holding the strongest rhythm
    pub fn dominant_band(&self) -> Band {
        match self {
            BrainState::Resting => Band::Alpha,
            BrainState::Focused => Band::Beta,
            BrainState::Drowsy => Band::Theta,
            BrainState::DeepSleep => Band::Delta,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BrainState::Resting => "resting",
            BrainState::Focused => "focused",
            BrainState::Drowsy => "drowsy",
            BrainState::DeepSleep => "deep-sleep",
        }
    }

    /// Noise-free value at `time_s`; `phase` shifts every rhythm (per-channel variation)
    pub fn value_at(&self, time_s: f64, phase: f64) -> f64 {
        self.components()
            .iter()
            .map(|c| c.amplitude_uv * (2.0 * PI * c.frequency_hz * time_s + phase).sin())
            .sum()
    }
}

impl std::fmt::Display for BrainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BrainState {
    type Err = EegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "resting" | "alpha" => Ok(BrainState::Resting),
            "focused" | "beta" => Ok(BrainState::Focused),
            "drowsy" | "theta" => Ok(BrainState::Drowsy),
            "deep-sleep" | "deep_sleep" | "delta" => Ok(BrainState::DeepSleep),
            other => Err(EegError::config(format!("Unknown brain state '{}'", other))),
        }
    }
}
