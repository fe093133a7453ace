use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use shuttle_axum::axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::aggregator::{Aggregator, CorridorReport};
use crate::error::AggregatorError;
use crate::ingest::types::{NormalizedEvent, SourceId};

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    /// Bearer token for `POST /v1/ingest`. `None` disables the endpoint.
    pub ingest_token: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/corridors", get(corridors))
        .route("/v1/events", get(events))
        .route("/v1/ingest", post(ingest))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthOut {
    status: &'static str,
    generated_at: DateTime<Utc>,
    corridor_count: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthOut> {
    Json(HealthOut {
        status: "ok",
        generated_at: state.aggregator.snapshot().generated_at,
        corridor_count: state.aggregator.corridors().len(),
    })
}

async fn corridors(State(state): State<AppState>) -> Json<CorridorReport> {
    Json(state.aggregator.corridor_statuses())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventsOut {
    generated_at: DateTime<Utc>,
    corridor: String,
    events: Vec<NormalizedEvent>,
}

async fn events(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    let Some(id) = q.get("corridor").map(|s| s.trim()).filter(|s| !s.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "missing query parameter: corridor");
    };

    match state.aggregator.events_for_corridor(id) {
        Ok(events) => Json(EventsOut {
            generated_at: state.aggregator.snapshot().generated_at,
            corridor: id.to_string(),
            events,
        })
        .into_response(),
        Err(e @ AggregatorError::NotFound(_)) => error_response(StatusCode::NOT_FOUND, e.to_string()),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestOut {
    generated_at: DateTime<Utc>,
    updated_sources: Vec<SourceId>,
    skipped_sources: Vec<SourceId>,
    errors: Vec<String>,
    event_count: usize,
}

fn bearer_matches(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let Some(expected) = expected.filter(|t| !t.is_empty()) else {
        return false;
    };
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token.trim() == expected)
}

async fn ingest(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !bearer_matches(&headers, state.ingest_token.as_deref()) {
        tracing::warn!(target: "api", "ingest trigger rejected: bad or missing token");
        return error_response(StatusCode::UNAUTHORIZED, "unauthorized");
    }

    match state.aggregator.run_ingestion_cycle().await {
        Ok(summary) => {
            tracing::info!(
                target: "api",
                updated = summary.updated_sources.len(),
                errors = summary.errors.len(),
                "manual ingest finished"
            );
            Json(IngestOut {
                generated_at: summary.generated_at,
                updated_sources: summary.updated_sources,
                skipped_sources: summary.skipped_sources,
                errors: summary.errors,
                event_count: summary.snapshot.events.len(),
            })
            .into_response()
        }
        Err(e @ AggregatorError::Busy) => error_response(StatusCode::CONFLICT, e.to_string()),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
