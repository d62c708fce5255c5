//! Periodic drift monitoring loop

use crate::output::OutputFormat;
use sdwan_path::{MetricsSource, PathError, Reoptimizer};
use std::sync::Arc;
use std::time::Duration;

/// Loop settings
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    /// Number of telemetry ticks
    pub steps: u32,
    /// Time between ticks
    pub interval: Duration,
    /// How recomputed paths are printed
    pub format: OutputFormat,
}

/// What happened over a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub steps: u32,
    pub reoptimizations: u32,
}

/// Tick the reoptimizer with a fresh telemetry batch every interval
pub async fn run(
    reoptimizer: Arc<Reoptimizer>,
    feed: &mut dyn MetricsSource,
    settings: LoopSettings,
) -> Result<RunSummary, PathError> {
    tracing::info!(
        "Starting drift monitor: {} steps every {:?}",
        settings.steps,
        settings.interval
    );

    let mut interval = tokio::time::interval(settings.interval);
    let mut summary = RunSummary::default();

    for step in 0..settings.steps {
        interval.tick().await;
        tracing::debug!("Step {}", step);

        if let Some(evaluation) = reoptimizer.poll(feed)? {
            tracing::info!("Step {}: paths recomputed", step);
            settings.format.print(&evaluation)?;
            summary.reoptimizations += 1;
        }
        summary.steps += 1;
    }

    let stats = reoptimizer.stats();
    tracing::info!(
        "Drift monitor finished: {} ingests, {} reoptimizations",
        stats.ingests,
        stats.triggers
    );
    Ok(summary)
}
