//! EEG-Core: Foundation types for windowed EEG processing
//!
//! Samples, processing windows, band/feature types, the rolling sample
//! buffer shared between acquisition and processing, and the error taxonomy.

pub mod error;
pub mod eeg_types;
pub mod signal_window;
pub mod signal_buffer;
pub mod timestamp;

pub use error::{EegError, EegResult};
pub use eeg_types::*;
pub use signal_window::*;
pub use signal_buffer::SignalBuffer;
pub use timestamp::{unix_now_secs, PrecisionTimestamp};
