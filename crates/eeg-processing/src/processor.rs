//! Stage timing and running pipeline metrics

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Time spent in each DSP stage for one window, summed over channels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimings {
    pub filter_us: u64,
    pub normalize_us: u64,
    pub spectral_us: u64,
    pub features_us: u64,
    pub total_us: u64,
}

impl StageTimings {
    pub fn accumulate(&mut self, other: &StageTimings) {
        self.filter_us += other.filter_us;
        self.normalize_us += other.normalize_us;
        self.spectral_us += other.spectral_us;
        self.features_us += other.features_us;
    }
}

/// Helper for timing processing stages
pub struct ProcessingTimer {
    start_time: Instant,
    lap_time: Instant,
}

impl ProcessingTimer {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            lap_time: now,
        }
    }

    /// Microseconds since the previous lap (or start)
    pub fn lap(&mut self) -> u64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.lap_time).as_micros() as u64;
        self.lap_time = now;
        elapsed
    }

    /// Microseconds since start
    pub fn elapsed_us(&self) -> u64 {
        self.start_time.elapsed().as_micros() as u64
    }
}

/// Running counters over every window the pipeline has processed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingMetrics {
    pub windows_processed: u64,
    pub windows_failed: u64,
    /// Channels whose normalized window came out all-zero
    pub degenerate_channels: u64,
    pub last_processing_time_us: u64,
    pub total_processing_time_us: u64,
    pub max_processing_time_us: u64,
}

impl ProcessingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, processing_time_us: u64, degenerate_channels: usize) {
        self.windows_processed += 1;
        self.degenerate_channels += degenerate_channels as u64;
        self.last_processing_time_us = processing_time_us;
        self.total_processing_time_us += processing_time_us;
        self.max_processing_time_us = self.max_processing_time_us.max(processing_time_us);
    }

    pub fn record_failure(&mut self) {
        self.windows_failed += 1;
    }

    pub fn average_processing_time_us(&self) -> f64 {
        if self.windows_processed == 0 {
            0.0
        } else {
            self.total_processing_time_us as f64 / self.windows_processed as f64
        }
    }
}
