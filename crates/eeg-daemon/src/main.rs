//! EEG Daemon: simulated acquisition → windowed DSP → JSON lines on stdout

mod cli;
mod rules;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use eeg_core::SignalBuffer;
use eeg_simulation::{AcquisitionTask, EegSimulator, SimulatorConfig};
use eeg_stream::{StreamPublisher, Subscription, WindowScheduler};
use rules::BandRatioClassifier;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const ACQUISITION_CHUNK_S: f64 = 0.05;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries results only
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.stream_config()?;
    let run_for = cli.run_for()?;
    info!(
        sample_rate_hz = config.processing.sample_rate_hz,
        channels = config.channel_count,
        cadence_s = config.cadence_s,
        window_s = config.window_s,
        state = %cli.state,
        "EEG daemon starting"
    );

    let buffer = Arc::new(SignalBuffer::new(
        config.processing.sample_rate_hz,
        config.channel_count,
        config.retention_s,
    )?);

    let simulator = EegSimulator::new(SimulatorConfig {
        sample_rate_hz: config.processing.sample_rate_hz,
        channel_count: config.channel_count,
        state: cli.state,
        seed: cli.seed,
        ..SimulatorConfig::default()
    })?;
    let acquisition_token = CancellationToken::new();
    let acquisition = AcquisitionTask::new(simulator, buffer.clone(), ACQUISITION_CHUNK_S)?
        .spawn(acquisition_token.clone());

    let publisher = Arc::new(StreamPublisher::new(config.subscriber_queue_capacity));
    let stdout_subscription = publisher.subscribe();
    let stdout_id = stdout_subscription.id();
    let printer = tokio::spawn(print_json_lines(stdout_subscription));

    let mut scheduler = WindowScheduler::from_config(
        &config,
        buffer,
        Arc::new(BandRatioClassifier::default()),
        publisher.clone(),
    )?;
    scheduler.start(config.cadence_s, config.window_s)?;

    match run_for {
        Some(duration) => {
            tokio::select! {
                _ = tokio::time::sleep(duration) => info!("run duration elapsed"),
                signal = tokio::signal::ctrl_c() => signal.context("listening for Ctrl-C")?,
            }
        }
        None => tokio::signal::ctrl_c().await.context("listening for Ctrl-C")?,
    }

    info!("shutting down");
    scheduler.stop().await;
    acquisition_token.cancel();
    let acquisition_stats = acquisition.await.context("acquisition task")?;

    // Dropping the last sender lets the printer drain and exit
    publisher.unsubscribe(stdout_id);
    printer.await.context("stdout writer")?;

    let stats = scheduler.stats().await;
    info!(
        published = stats.cycles_completed,
        skipped = stats.cycles_skipped,
        failed = stats.cycles_failed,
        coalesced = stats.ticks_coalesced,
        samples = acquisition_stats.samples_pushed,
        "EEG daemon stopped"
    );
    Ok(())
}

async fn print_json_lines(mut subscription: Subscription) {
    let mut stdout = tokio::io::stdout();
    while let Some(record) = subscription.recv().await {
        let line = format!("{}\n", record.payload);
        if let Err(err) = stdout.write_all(line.as_bytes()).await {
            warn!(error = %err, "stdout closed, no longer printing results");
            return;
        }
        if let Err(err) = stdout.flush().await {
            warn!(error = %err, "stdout closed, no longer printing results");
            return;
        }
    }
}
