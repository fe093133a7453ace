// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::aggregator::Aggregator;
use crate::error::AggregatorError;

/// Spawn a ticker that runs an ingestion cycle every `interval`. The first
/// tick fires immediately. Per-source rate limits still apply, so a short
/// interval only polls the sources that are due.
pub fn spawn_ingest_scheduler(aggregator: Arc<Aggregator>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match aggregator.run_ingestion_cycle().await {
                Ok(summary) => tracing::info!(
                    target: "ingest",
                    updated = ?summary.updated_sources,
                    skipped = ?summary.skipped_sources,
                    errors = summary.errors.len(),
                    "scheduled ingest tick"
                ),
                Err(AggregatorError::Busy) => {
                    tracing::debug!(target: "ingest", "cycle already running; tick skipped")
                }
                Err(e) => tracing::warn!(target: "ingest", error = %e, "scheduled ingest failed"),
            }
        }
    })
}
