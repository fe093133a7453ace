//! Run a single ingestion cycle against the configured sources, write the
//! cache and print the corridor statuses as JSON.
//!
//! Exit code 1 when no source updated and at least one failed.

use std::process::ExitCode;

use chain_map_aggregator::corridors::load_corridors_default;
use chain_map_aggregator::ingest::config::load_ingest_config_default;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chain_map_aggregator=info,warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = load_ingest_config_default()?;
    let corridors = load_corridors_default()?;
    let aggregator = chain_map_aggregator::build_aggregator(&cfg, corridors)?;
    aggregator.restore().await;

    let summary = aggregator.run_ingestion_cycle().await?;
    for err in &summary.errors {
        eprintln!("error: {err}");
    }
    eprintln!(
        "updated: {:?} skipped: {:?} events: {}",
        summary.updated_sources,
        summary.skipped_sources,
        summary.snapshot.events.len()
    );

    println!(
        "{}",
        serde_json::to_string_pretty(&aggregator.corridor_statuses())?
    );

    if summary.updated_sources.is_empty() && !summary.errors.is_empty() {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}
