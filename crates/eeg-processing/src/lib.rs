//! EEG-Processing: Windowed DSP pipeline for EEG
//!
//! Zero-phase band-pass filtering, normalization, Welch PSD estimation and
//! band-power feature extraction over fixed-length windows.

pub mod config;
pub mod features;
pub mod filters;
pub mod normalize;
pub mod pipeline;
pub mod processor;
pub mod spectral;

pub use config::ProcessingConfig;
pub use features::{BandPowers, FeatureExtractor};
pub use filters::{BandpassFilter, BiquadSection, FilterCoefficients, FilterSpec};
pub use normalize::{NormalizedWindow, Normalizer};
pub use pipeline::{Diagnostic, DspPipeline, WindowAnalysis};
pub use processor::{ProcessingMetrics, ProcessingTimer, StageTimings};
pub use spectral::{Psd, SpectralEstimator};
