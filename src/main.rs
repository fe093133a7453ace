//! Chain-map aggregator: binary entrypoint.
//! Loads config, restores the last-known-good snapshot, starts the ingest
//! ticker and serves the read API plus `/metrics`.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use chain_map_aggregator::api::{self, AppState};
use chain_map_aggregator::corridors::load_corridors_default;
use chain_map_aggregator::ingest::config::load_ingest_config_default;
use chain_map_aggregator::ingest::scheduler::spawn_ingest_scheduler;
use chain_map_aggregator::metrics::Metrics;

/// Compact logs by default, JSON when `LOG_FORMAT=json`. Uses `try_init` so a
/// subscriber installed by the runtime keeps priority.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chain_map_aggregator=info,warn"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = load_ingest_config_default()?;
    let corridors = load_corridors_default()?;

    let aggregator = Arc::new(chain_map_aggregator::build_aggregator(&cfg, corridors)?);
    let restored = aggregator.restore().await;
    tracing::info!(restored, "aggregator ready");

    spawn_ingest_scheduler(Arc::clone(&aggregator), cfg.interval());

    let state = AppState {
        aggregator,
        ingest_token: cfg.ingest_token.clone(),
    };
    let mut router = api::router(state);
    match Metrics::init() {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = %format!("{e:#}"), "metrics disabled"),
    }

    Ok(router.into())
}
