// src/lib.rs
// Public library surface for the service binary, the one-shot ingest binary and integration tests.

pub mod aggregator;
pub mod api;
pub mod clock;
pub mod corridors;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod summary;

pub use crate::aggregator::{Aggregator, CorridorReport, IngestionSummary};
pub use crate::api::{router, AppState};
pub use crate::error::{AggregatorError, IngestError};

use std::sync::Arc;

use crate::clock::SystemClock;
use crate::ingest::cache::FileStore;
use crate::ingest::config::IngestConfig;

/// Aggregator wired for production: file-backed cache under `cfg.cache_dir`,
/// wall clock, and HTTP providers for every enabled source.
pub fn build_aggregator(
    cfg: &IngestConfig,
    corridors: Vec<corridors::CorridorDefinition>,
) -> anyhow::Result<Aggregator> {
    let providers = ingest::providers::from_config(cfg)?;
    tracing::info!(
        target: "ingest",
        sources = providers.len(),
        cache_dir = %cfg.cache_dir.display(),
        "aggregator configured"
    );
    Ok(Aggregator::new(
        corridors,
        Arc::new(FileStore::new(cfg.cache_dir.clone())),
        Arc::new(SystemClock),
    )
    .with_sources(providers)
    .with_cycle_deadline(cfg.cycle_deadline()))
}
