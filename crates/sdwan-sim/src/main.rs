//! Overlay drift simulator
//!
//! Builds the four-site demo overlay, then feeds random-walk link telemetry
//! into the reoptimizer on a fixed tick and prints every recomputation.
//!
//! # Usage
//!
//! ```bash
//! sdwan-sim --once --format json
//! sdwan-sim --steps 10 --interval-ms 1000 --threshold 10
//! sdwan-sim --config controller.json --seed 7
//! ```

use clap::Parser;
use sdwan_path::{ControllerConfig, Reoptimizer, SdwanController};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod feed;
mod monitor;
mod output;
mod scenario;

/// Drift threshold used when no configuration file is given
const DEFAULT_THRESHOLD: f64 = 10.0;

#[derive(Parser)]
#[command(name = "sdwan-sim")]
#[command(version)]
#[command(about = "Overlay path selection and drift reoptimization simulator", long_about = None)]
struct Cli {
    /// Controller configuration (JSON)
    #[arg(long, short, env = "SDWAN_CONFIG")]
    config: Option<PathBuf>,

    /// Drift threshold, overrides the configuration file
    #[arg(long, env = "SDWAN_DRIFT_THRESHOLD")]
    threshold: Option<f64>,

    /// Number of telemetry ticks
    #[arg(long, default_value_t = 10)]
    steps: u32,

    /// Milliseconds between ticks
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Seed for the telemetry random walk
    #[arg(long)]
    seed: Option<u64>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: output::OutputFormat,

    /// Evaluate the scenario once and exit
    #[arg(long)]
    once: bool,
}

impl Cli {
    fn controller_config(&self) -> anyhow::Result<ControllerConfig> {
        let mut config = match &self.config {
            Some(path) => ControllerConfig::load(path)?,
            None => ControllerConfig::new(DEFAULT_THRESHOLD),
        };
        if let Some(threshold) = self.threshold {
            config.drift.threshold = threshold;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("sdwan-sim v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let config = cli.controller_config()?;

    let controller = Arc::new(SdwanController::with_weights(config.weights));
    scenario::build(&controller)?;

    if cli.once {
        cli.format.print(&controller.evaluate_all())?;
        return Ok(());
    }

    let reoptimizer = Arc::new(Reoptimizer::new(controller, config.drift)?);
    let mut feed = match cli.seed {
        Some(seed) => feed::RandomWalkFeed::seeded(seed),
        None => feed::RandomWalkFeed::from_entropy(),
    };
    let settings = monitor::LoopSettings {
        steps: cli.steps,
        interval: Duration::from_millis(cli.interval_ms.max(1)),
        format: cli.format,
    };

    tokio::select! {
        summary = monitor::run(reoptimizer, &mut feed, settings) => {
            let summary = summary?;
            tracing::info!(
                "Completed {} steps, {} reoptimizations",
                summary.steps,
                summary.reoptimizations
            );
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
        }
    }

    Ok(())
}
