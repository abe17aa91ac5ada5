//! Rolling per-channel store of recent samples
//!
//! The acquisition side appends, the scheduler snapshots. Snapshots copy the
//! requested tail while holding the lock for the copy only, so a slow
//! processing cycle never holds up appends.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tracing::trace;

use crate::error::{EegError, EegResult};
use crate::signal_window::{samples_for_duration, Sample, SignalWindow};

#[derive(Debug)]
struct BufferState {
    timestamps: VecDeque<f64>,
    channels: Vec<VecDeque<f64>>,
    total_appended: u64,
}

/// Bounded ring of the most recent `retention_s` seconds per channel
#[derive(Debug)]
pub struct SignalBuffer {
    sample_rate_hz: f64,
    channel_count: usize,
    capacity: usize,
    state: Mutex<BufferState>,
}

impl SignalBuffer {
    /// Capacity is `ceil(sample_rate_hz * retention_s)` samples per channel
    pub fn new(sample_rate_hz: f64, channel_count: usize, retention_s: f64) -> EegResult<Self> {
        if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
            return Err(EegError::InvalidSampleRate { rate: sample_rate_hz });
        }
        if channel_count == 0 {
            return Err(EegError::config("Signal buffer needs at least one channel"));
        }
        if !(retention_s.is_finite() && retention_s > 0.0) {
            return Err(EegError::config(format!("Retention must be positive, got {}s", retention_s)));
        }

        let capacity = (sample_rate_hz * retention_s).ceil() as usize;
        Ok(Self {
            sample_rate_hz,
            channel_count,
            capacity,
            state: Mutex::new(BufferState {
                timestamps: VecDeque::with_capacity(capacity),
                channels: (0..channel_count).map(|_| VecDeque::with_capacity(capacity)).collect(),
                total_appended: 0,
            }),
        })
    }

    // Nothing under the lock can panic mid-update, so a poisoned state is still consistent.
    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store one sample, evicting the oldest once at capacity
    pub fn append(&self, sample: &Sample) -> EegResult<()> {
        if sample.channel_count() != self.channel_count {
            return Err(EegError::ChannelMismatch {
                expected: self.channel_count,
                actual: sample.channel_count(),
            });
        }

        let mut state = self.lock();
        if state.timestamps.len() == self.capacity {
            state.timestamps.pop_front();
            for channel in state.channels.iter_mut() {
                channel.pop_front();
            }
        }
        for (channel, value) in state.channels.iter_mut().zip(sample.channel_values.iter()) {
            channel.push_back(*value);
        }
        state.timestamps.push_back(sample.timestamp);
        state.total_appended += 1;
        Ok(())
    }

    /// Append a batch; stops at the first malformed sample
    pub fn append_batch(&self, samples: &[Sample]) -> EegResult<()> {
        for sample in samples {
            self.append(sample)?;
        }
        trace!(count = samples.len(), "appended sample batch");
        Ok(())
    }

    /// Most recent `duration_s` seconds, one window per channel
    pub fn snapshot(&self, duration_s: f64) -> EegResult<Vec<SignalWindow>> {
        let required = samples_for_duration(self.sample_rate_hz, duration_s);
        if required == 0 {
            return Err(EegError::config(format!(
                "Window of {}s holds no samples at {}Hz",
                duration_s, self.sample_rate_hz
            )));
        }
        if required > self.capacity {
            return Err(EegError::config(format!(
                "Window of {} samples exceeds buffer capacity {}",
                required, self.capacity
            )));
        }

        let (start_timestamp, channels) = {
            let state = self.lock();
            let available = state.timestamps.len();
            if available < required {
                return Err(EegError::InsufficientData { required, available });
            }
            let start = available - required;
            let start_timestamp = state.timestamps[start];
            let channels: Vec<Vec<f64>> = state
                .channels
                .iter()
                .map(|channel| channel.range(start..).copied().collect())
                .collect();
            (start_timestamp, channels)
        };

        Ok(channels
            .into_iter()
            .enumerate()
            .map(|(channel, samples)| SignalWindow {
                channel,
                start_timestamp,
                sample_rate_hz: self.sample_rate_hz,
                samples,
            })
            .collect())
    }

    /// Samples currently held per channel
    pub fn len(&self) -> usize {
        self.lock().timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples ever appended, including evicted ones
    pub fn total_appended(&self) -> u64 {
        self.lock().total_appended
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn retention_s(&self) -> f64 {
        self.capacity as f64 / self.sample_rate_hz
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.timestamps.clear();
        for channel in state.channels.iter_mut() {
            channel.clear();
        }
    }
}
