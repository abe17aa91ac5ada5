use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use eeg_simulation::BrainState;
use eeg_stream::StreamConfig;

/// Streams band-power features and state labels from simulated EEG as JSON lines
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// JSON stream configuration; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Acquisition sample rate (Hz)
    #[arg(long)]
    pub sample_rate: Option<f64>,

    /// Number of EEG channels
    #[arg(long)]
    pub channels: Option<usize>,

    /// Seconds between results
    #[arg(long)]
    pub cadence: Option<f64>,

    /// Seconds of signal per analysed window
    #[arg(long)]
    pub window: Option<f64>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    pub duration: Option<f64>,

    /// Seed for the simulated signal
    #[arg(long)]
    pub seed: Option<u64>,

    /// Simulated brain state: resting, focused, drowsy, deep-sleep
    #[arg(long, default_value = "resting")]
    pub state: BrainState,
}

impl Cli {
    /// Load the config file, if any, then apply flag overrides
    pub fn stream_config(&self) -> anyhow::Result<StreamConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                StreamConfig::from_json(&json).with_context(|| format!("parsing {}", path.display()))?
            }
            None => StreamConfig::default(),
        };

        if let Some(rate) = self.sample_rate {
            config.processing.sample_rate_hz = rate;
        }
        if let Some(channels) = self.channels {
            config.channel_count = channels;
        }
        if let Some(cadence) = self.cadence {
            config.cadence_s = cadence;
        }
        if let Some(window) = self.window {
            config.window_s = window;
            config.retention_s = config.retention_s.max(window);
        }

        config.validate().context("invalid stream configuration")?;
        Ok(config)
    }

    pub fn run_for(&self) -> anyhow::Result<Option<std::time::Duration>> {
        match self.duration {
            Some(secs) if secs.is_finite() && secs > 0.0 => Ok(Some(std::time::Duration::from_secs_f64(secs))),
            Some(secs) => anyhow::bail!("--duration must be positive, got {}", secs),
            None => Ok(None),
        }
    }
}
