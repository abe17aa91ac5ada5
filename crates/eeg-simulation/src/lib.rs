//! EEG-Simulation: Synthetic EEG acquisition
//!
//! Stands in for the device layer: generates multi-channel EEG with a
//! configurable dominant rhythm and feeds it into a `SignalBuffer` at the
//! acquisition rate.

pub mod acquisition;
pub mod eeg_simulator;
pub mod signal_patterns;

pub use acquisition::{AcquisitionStats, AcquisitionTask};
pub use eeg_simulator::{EegSimulator, NoiseConfig, SimulatorConfig};
pub use signal_patterns::{BrainState, RhythmComponent};
