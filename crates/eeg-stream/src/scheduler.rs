//! Fixed-cadence processing loop
//!
//! Ticks are laid out on a grid anchored at start time, so slow cycles never
//! shift the phase of later ones. A cycle that overruns its period is followed
//! immediately by one catch-up cycle; the ticks it swallowed are counted, not
//! queued.

use crate::classifier::{ClassificationAdapter, Classifier};
use crate::config::StreamConfig;
use crate::publisher::StreamPublisher;
use eeg_core::{samples_for_duration, EegError, EegResult, SignalBuffer};
use eeg_processing::{DspPipeline, ProcessingMetrics};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lifecycle of a [`WindowScheduler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Running,
    /// Stop requested; the in-flight cycle is finishing
    Stopping,
}

impl SchedulerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Running => "running",
            SchedulerState::Stopping => "stopping",
        }
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cycle counters, cumulative across start/stop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Cycles that published a result
    pub cycles_completed: u64,
    /// Cycles skipped because the buffer was still filling
    pub cycles_skipped: u64,
    /// Cycles abandoned on a processing error
    pub cycles_failed: u64,
    /// Ticks dropped while a cycle overran
    pub ticks_coalesced: u64,
    /// Wall time of the most recent cycle, classifier call included
    pub last_cycle_us: u64,
    pub state: SchedulerState,
}

impl Default for SchedulerStats {
    fn default() -> Self {
        Self {
            cycles_completed: 0,
            cycles_skipped: 0,
            cycles_failed: 0,
            ticks_coalesced: 0,
            last_cycle_us: 0,
            state: SchedulerState::Idle,
        }
    }
}

/// Tick instants `origin + k * period` for `k = 1, 2, ...`
#[derive(Debug, Clone, Copy)]
pub struct TickGrid {
    origin: Instant,
    period: Duration,
    next: u64,
}

impl TickGrid {
    /// First tick falls one period after `origin`
    pub fn new(origin: Instant, period: Duration) -> Self {
        Self {
            origin,
            period: period.max(Duration::from_nanos(1)),
            next: 1,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Index of the tick being waited for
    pub fn next_index(&self) -> u64 {
        self.next
    }

    pub fn next_deadline(&self) -> Instant {
        self.origin + self.offset(self.next)
    }

    /// Advance past a cycle that finished at `now`
    ///
    /// If later ticks have already elapsed, the most recent one becomes the
    /// next deadline (so it fires at once) and the ones before it are
    /// dropped. Returns how many were dropped.
    pub fn complete(&mut self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.origin).as_nanos();
        let due = (elapsed / self.period.as_nanos()).min(u64::MAX as u128) as u64;
        if due > self.next {
            let coalesced = due - self.next - 1;
            self.next = due;
            coalesced
        } else {
            self.next += 1;
            0
        }
    }

    fn offset(&self, ticks: u64) -> Duration {
        let period_nanos = self.period.as_nanos().min(u64::MAX as u128) as u64;
        Duration::from_nanos(period_nanos.saturating_mul(ticks))
    }
}

enum CycleOutcome {
    Published { label: String, delivered: usize },
    Skipped,
    Failed,
}

/// Everything one cycle touches, shared with the background task
#[derive(Clone)]
struct CycleContext {
    buffer: Arc<SignalBuffer>,
    pipeline: Arc<Mutex<DspPipeline>>,
    adapter: ClassificationAdapter,
    publisher: Arc<StreamPublisher>,
    stats: Arc<Mutex<SchedulerStats>>,
}

impl CycleContext {
    async fn run_cycle(&self, window_s: f64) -> CycleOutcome {
        let windows = match self.buffer.snapshot(window_s) {
            Ok(windows) => windows,
            Err(err) if err.is_insufficient_data() => {
                debug!(error = %err, "buffer still filling, cycle skipped");
                return CycleOutcome::Skipped;
            }
            Err(err) => {
                warn!(error = %err, "snapshot failed, cycle abandoned");
                return CycleOutcome::Failed;
            }
        };

        // DSP is synchronous; the lock is released before the classifier call
        let analysis = {
            let mut pipeline = self.pipeline.lock().await;
            pipeline.analyze(&windows)
        };
        let analysis = match analysis {
            Ok(analysis) => analysis,
            Err(err) => {
                warn!(error = %err, "window processing failed, cycle abandoned");
                return CycleOutcome::Failed;
            }
        };
        for diagnostic in &analysis.diagnostics {
            debug!(?diagnostic, "window diagnostic");
        }

        let result = self.adapter.classify(analysis.features).await;
        let report = self.publisher.publish(&result);
        CycleOutcome::Published {
            label: result.label,
            delivered: report.delivered,
        }
    }

    async fn run(self, token: CancellationToken, mut grid: TickGrid, window_s: f64) {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = sleep_until(grid.next_deadline()) => {}
            }

            let started = Instant::now();
            let tick = grid.next_index();
            let outcome = self.run_cycle(window_s).await;
            let finished = Instant::now();
            let coalesced = grid.complete(finished);

            let mut stats = self.stats.lock().await;
            stats.last_cycle_us = finished.duration_since(started).as_micros() as u64;
            stats.ticks_coalesced += coalesced;
            match outcome {
                CycleOutcome::Published { label, delivered } => {
                    stats.cycles_completed += 1;
                    debug!(tick, %label, delivered, cycle_us = stats.last_cycle_us, "result published");
                }
                CycleOutcome::Skipped => stats.cycles_skipped += 1,
                CycleOutcome::Failed => stats.cycles_failed += 1,
            }
            if coalesced > 0 {
                warn!(
                    tick,
                    coalesced,
                    cycle_us = stats.last_cycle_us,
                    "cycle overran its period, ticks dropped"
                );
            }
        }
    }
}

struct RunHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Drives buffer → pipeline → classifier → publisher on a fixed cadence
///
/// At most one cycle is in flight. `stop` waits for that cycle to publish
/// and guarantees no tick fires afterwards.
pub struct WindowScheduler {
    context: CycleContext,
    state: watch::Sender<SchedulerState>,
    run: Option<RunHandle>,
}

impl WindowScheduler {
    pub fn new(
        buffer: Arc<SignalBuffer>,
        pipeline: DspPipeline,
        adapter: ClassificationAdapter,
        publisher: Arc<StreamPublisher>,
    ) -> EegResult<Self> {
        let pipeline_rate = pipeline.config().sample_rate_hz;
        if pipeline_rate.to_bits() != buffer.sample_rate_hz().to_bits() {
            return Err(EegError::config(format!(
                "Pipeline rate {}Hz does not match buffer rate {}Hz",
                pipeline_rate,
                buffer.sample_rate_hz()
            )));
        }

        let (state, _) = watch::channel(SchedulerState::Idle);
        Ok(Self {
            context: CycleContext {
                buffer,
                pipeline: Arc::new(Mutex::new(pipeline)),
                adapter,
                publisher,
                stats: Arc::new(Mutex::new(SchedulerStats::default())),
            },
            state,
            run: None,
        })
    }

    /// Build pipeline and adapter from a stream config
    pub fn from_config(
        config: &StreamConfig,
        buffer: Arc<SignalBuffer>,
        classifier: Arc<dyn Classifier>,
        publisher: Arc<StreamPublisher>,
    ) -> EegResult<Self> {
        config.validate()?;
        let pipeline = DspPipeline::new(config.processing.clone())?;
        let adapter = ClassificationAdapter::new(classifier, config.classifier_timeout());
        Self::new(buffer, pipeline, adapter, publisher)
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Receiver that observes every state transition
    pub fn watch_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub async fn stats(&self) -> SchedulerStats {
        let mut stats = self.context.stats.lock().await.clone();
        stats.state = self.state();
        stats
    }

    pub async fn processing_metrics(&self) -> ProcessingMetrics {
        self.context.pipeline.lock().await.metrics().clone()
    }

    pub fn publisher(&self) -> &Arc<StreamPublisher> {
        &self.context.publisher
    }

    /// Idle → Running; the first tick fires `cadence_s` from now
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, cadence_s: f64, window_s: f64) -> EegResult<()> {
        let current = self.state();
        if current != SchedulerState::Idle {
            return Err(EegError::SchedulerState {
                expected: SchedulerState::Idle.as_str(),
                actual: current.as_str(),
            });
        }
        if !(cadence_s.is_finite() && cadence_s > 0.0) {
            return Err(EegError::config(format!("Cadence must be positive, got {}s", cadence_s)));
        }
        if !(window_s.is_finite() && window_s > 0.0) {
            return Err(EegError::config(format!("Window must be positive, got {}s", window_s)));
        }
        let window_samples = samples_for_duration(self.context.buffer.sample_rate_hz(), window_s);
        if window_samples == 0 || window_samples > self.context.buffer.capacity() {
            return Err(EegError::config(format!(
                "Window of {} samples does not fit a buffer of {}",
                window_samples,
                self.context.buffer.capacity()
            )));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| EegError::config(format!("Scheduler needs a tokio runtime: {}", e)))?;

        let token = CancellationToken::new();
        let grid = TickGrid::new(Instant::now(), Duration::from_secs_f64(cadence_s));
        let task = runtime.spawn(self.context.clone().run(token.clone(), grid, window_s));

        self.run = Some(RunHandle { token, task });
        self.state.send_replace(SchedulerState::Running);
        info!(cadence_s, window_s, window_samples, "scheduler started");
        Ok(())
    }

    /// Running → Stopping → Idle; no-op when already idle
    ///
    /// Returns once the in-flight cycle, if any, has published.
    pub async fn stop(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };

        self.state.send_replace(SchedulerState::Stopping);
        run.token.cancel();
        if let Err(err) = run.task.await {
            error!(error = %err, "scheduler task ended abnormally");
        }
        self.state.send_replace(SchedulerState::Idle);

        let stats = self.stats().await;
        info!(
            completed = stats.cycles_completed,
            skipped = stats.cycles_skipped,
            failed = stats.cycles_failed,
            coalesced = stats.ticks_coalesced,
            "scheduler stopped"
        );
    }
}

impl Drop for WindowScheduler {
    fn drop(&mut self) {
        if let Some(run) = &self.run {
            run.token.cancel();
        }
    }
}
