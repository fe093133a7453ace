//! Error types shared by the ingest pipeline and the read API.

use thiserror::Error;

/// Failure of a single source during one ingestion cycle.
///
/// These never escape the orchestrator: they are logged and rendered into the
/// cycle summary, and the failing source keeps its previous events.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Network failure, connect/read timeout, empty body.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Upstream answered with a non-success status.
    #[error("upstream returned {status} for {url}")]
    Status { status: u16, url: String },

    /// Payload could not be read as the expected feed shape.
    #[error("parse failed: {0}")]
    Parse(String),

    /// The cycle deadline elapsed before the source finished.
    #[error("deadline elapsed after {0:?}")]
    Timeout(std::time::Duration),

    /// Source is registered but cannot run (e.g. missing API key).
    #[error("source not configured: {0}")]
    Config(String),
}

impl IngestError {
    pub fn parse(msg: impl std::fmt::Display) -> Self {
        Self::Parse(msg.to_string())
    }

    pub fn fetch(msg: impl std::fmt::Display) -> Self {
        Self::Fetch(msg.to_string())
    }
}

/// Errors surfaced to callers of the aggregator.
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("corridor not found: {0}")]
    NotFound(String),

    #[error("ingestion cycle already running")]
    Busy,
}
