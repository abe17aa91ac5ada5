//! Simulated acquisition loop feeding a shared `SignalBuffer`

use crate::eeg_simulator::EegSimulator;
use eeg_core::{EegError, EegResult, SignalBuffer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters reported when the acquisition loop exits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionStats {
    pub chunks_pushed: u64,
    pub samples_pushed: u64,
    pub samples_rejected: u64,
}

/// Pushes simulator output into the buffer in fixed-duration chunks
pub struct AcquisitionTask {
    simulator: EegSimulator,
    buffer: Arc<SignalBuffer>,
    chunk_duration: Duration,
}

impl AcquisitionTask {
    /// Simulator and buffer must agree on rate and channel count
    pub fn new(simulator: EegSimulator, buffer: Arc<SignalBuffer>, chunk_duration_s: f64) -> EegResult<Self> {
        let config = simulator.config();
        if config.sample_rate_hz.to_bits() != buffer.sample_rate_hz().to_bits() {
            return Err(EegError::config(format!(
                "Simulator rate {}Hz does not match buffer rate {}Hz",
                config.sample_rate_hz,
                buffer.sample_rate_hz()
            )));
        }
        if config.channel_count != buffer.channel_count() {
            return Err(EegError::ChannelMismatch {
                expected: buffer.channel_count(),
                actual: config.channel_count,
            });
        }
        if !(chunk_duration_s.is_finite() && chunk_duration_s > 0.0) {
            return Err(EegError::config(format!(
                "Chunk duration must be positive, got {}s",
                chunk_duration_s
            )));
        }

        Ok(Self {
            simulator,
            buffer,
            chunk_duration: Duration::from_secs_f64(chunk_duration_s),
        })
    }

    /// Generate one chunk per tick until cancelled
    ///
    /// Each tick produces the samples for the interval that just elapsed, so
    /// the buffer never runs ahead of the clock.
    pub async fn run(mut self, token: CancellationToken) -> AcquisitionStats {
        let mut ticker = interval_at(Instant::now() + self.chunk_duration, self.chunk_duration);
        let chunk_s = self.chunk_duration.as_secs_f64();
        let mut stats = AcquisitionStats::default();

        info!(
            sample_rate_hz = self.simulator.config().sample_rate_hz,
            channels = self.simulator.config().channel_count,
            state = %self.simulator.config().state,
            chunk_ms = self.chunk_duration.as_millis() as u64,
            "acquisition started"
        );

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let chunk = self.simulator.generate(chunk_s);
                    for sample in &chunk {
                        match self.buffer.append(sample) {
                            Ok(()) => stats.samples_pushed += 1,
                            Err(err) => {
                                stats.samples_rejected += 1;
                                warn!(error = %err, "sample rejected by buffer");
                            }
                        }
                    }
                    stats.chunks_pushed += 1;
                    debug!(samples = chunk.len(), buffered = self.buffer.len(), "chunk pushed");
                }
            }
        }

        info!(
            chunks = stats.chunks_pushed,
            samples = stats.samples_pushed,
            "acquisition stopped"
        );
        stats
    }

    pub fn spawn(self, token: CancellationToken) -> JoinHandle<AcquisitionStats> {
        tokio::spawn(self.run(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eeg_simulator::SimulatorConfig;
    use tokio::time::sleep;

    fn simulator(channel_count: usize) -> EegSimulator {
        EegSimulator::new(SimulatorConfig {
            channel_count,
            seed: Some(9),
            ..SimulatorConfig::default()
        })
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffer_fills_at_sample_rate() {
        let buffer = Arc::new(SignalBuffer::new(256.0, 2, 5.0).unwrap());
        let task = AcquisitionTask::new(simulator(2), buffer.clone(), 0.1).unwrap();
        let token = CancellationToken::new();
        let handle = task.spawn(token.clone());

        sleep(Duration::from_millis(1050)).await;
        token.cancel();
        let stats = handle.await.unwrap();

        assert_eq!(stats.chunks_pushed, 10);
        assert_eq!(stats.samples_pushed, 256);
        assert_eq!(stats.samples_rejected, 0);
        assert_eq!(buffer.len(), 256);
        assert_eq!(buffer.snapshot(1.0).unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_tick() {
        let buffer = Arc::new(SignalBuffer::new(256.0, 1, 1.0).unwrap());
        let task = AcquisitionTask::new(simulator(1), buffer.clone(), 0.1).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let stats = task.run(token).await;
        assert_eq!(stats, AcquisitionStats::default());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_mismatched_buffer_rejected() {
        let buffer = Arc::new(SignalBuffer::new(256.0, 4, 1.0).unwrap());
        assert!(matches!(
            AcquisitionTask::new(simulator(2), buffer, 0.1),
            Err(EegError::ChannelMismatch { expected: 4, actual: 2 })
        ));

        let buffer = Arc::new(SignalBuffer::new(512.0, 2, 1.0).unwrap());
        assert!(AcquisitionTask::new(simulator(2), buffer.clone(), 0.1).is_err());

        let buffer = Arc::new(SignalBuffer::new(256.0, 2, 1.0).unwrap());
        assert!(AcquisitionTask::new(simulator(2), buffer, 0.0).is_err());
    }
}
