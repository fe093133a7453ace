//! Ingestion orchestrator and the read side it feeds.
//!
//! One [`Aggregator`] owns the served snapshot, the persistent store, the
//! clock and the registered sources. It is shared by `Arc` between the HTTP
//! layer, the scheduler and the one-shot binary.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use tokio::task::JoinSet;

use crate::clock::Clock;
use crate::corridors::{self, CorridorDefinition};
use crate::error::{AggregatorError, IngestError};
use crate::ingest::cache::{IngestAttemptState, PersistentStore};
use crate::ingest::ensure_metrics_described;
use crate::ingest::types::{CacheSnapshot, NormalizedEvent, SourceId, SourceProvider};
use crate::summary::{self, CorridorSummary};

pub const DEFAULT_CYCLE_DEADLINE: Duration = Duration::from_secs(30);

struct RegisteredSource {
    provider: Arc<dyn SourceProvider>,
    min_interval: Duration,
}

/// Outcome of one ingestion cycle. Source lists follow registration order.
#[derive(Debug, Clone)]
pub struct IngestionSummary {
    pub generated_at: DateTime<Utc>,
    pub updated_sources: Vec<SourceId>,
    pub skipped_sources: Vec<SourceId>,
    /// `"<source>: <message>"`, plus `"cache: ..."` for persistence failures.
    pub errors: Vec<String>,
    pub snapshot: Arc<CacheSnapshot>,
}

/// Corridor statuses as served to list/map consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorridorReport {
    pub generated_at: DateTime<Utc>,
    pub corridors: Vec<CorridorSummary>,
}

pub struct Aggregator {
    corridors: Vec<CorridorDefinition>,
    sources: Vec<RegisteredSource>,
    store: Arc<dyn PersistentStore>,
    clock: Arc<dyn Clock>,
    cycle_deadline: Duration,
    served: RwLock<Arc<CacheSnapshot>>,
    attempts: std::sync::Mutex<IngestAttemptState>,
    cycle_guard: tokio::sync::Mutex<()>,
}

impl Aggregator {
    pub fn new(
        corridors: Vec<CorridorDefinition>,
        store: Arc<dyn PersistentStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let empty = CacheSnapshot::empty(clock.now());
        Self {
            corridors,
            sources: Vec::new(),
            store,
            clock,
            cycle_deadline: DEFAULT_CYCLE_DEADLINE,
            served: RwLock::new(Arc::new(empty)),
            attempts: std::sync::Mutex::new(IngestAttemptState::default()),
            cycle_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Register a source. Sources are attempted and reported in this order.
    pub fn with_source(mut self, provider: Arc<dyn SourceProvider>, min_interval: Duration) -> Self {
        self.sources.push(RegisteredSource {
            provider,
            min_interval,
        });
        self
    }

    pub fn with_sources<I>(self, sources: I) -> Self
    where
        I: IntoIterator<Item = (Arc<dyn SourceProvider>, Duration)>,
    {
        sources
            .into_iter()
            .fold(self, |agg, (p, every)| agg.with_source(p, every))
    }

    pub fn with_cycle_deadline(mut self, deadline: Duration) -> Self {
        self.cycle_deadline = deadline;
        self
    }

    pub fn corridors(&self) -> &[CorridorDefinition] {
        &self.corridors
    }

    /// Serve the persisted snapshot (if any) before the first cycle runs.
    /// Returns the number of events restored.
    pub async fn restore(&self) -> usize {
        if let Some(attempts) = self.load_attempts().await {
            *self.attempts.lock().unwrap_or_else(|p| p.into_inner()) = attempts;
        }
        match self.store.load_snapshot().await {
            Ok(Some(snap)) => {
                let n = snap.events.len();
                tracing::info!(target: "ingest", events = n, generated_at = %snap.generated_at, "restored last-known-good snapshot");
                self.publish(snap);
                n
            }
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(target: "ingest", error = %format!("{e:#}"), "snapshot unreadable; starting empty");
                0
            }
        }
    }

    /// Current snapshot. Never blocks on a running cycle for longer than the
    /// pointer swap.
    pub fn snapshot(&self) -> Arc<CacheSnapshot> {
        Arc::clone(&self.served.read().unwrap_or_else(|p| p.into_inner()))
    }

    fn publish(&self, snap: CacheSnapshot) -> Arc<CacheSnapshot> {
        let snap = Arc::new(snap);
        *self.served.write().unwrap_or_else(|p| p.into_inner()) = Arc::clone(&snap);
        snap
    }

    pub fn corridor_statuses(&self) -> CorridorReport {
        let snap = self.snapshot();
        CorridorReport {
            generated_at: snap.generated_at,
            corridors: summary::summarize_corridors(
                &self.corridors,
                snap.events.iter(),
                snap.generated_at,
                self.clock.now(),
            ),
        }
    }

    /// Events currently in effect for one corridor, most recent first.
    pub fn events_for_corridor(&self, id: &str) -> Result<Vec<NormalizedEvent>, AggregatorError> {
        let corridor = corridors::find_by_id(&self.corridors, id)
            .ok_or_else(|| AggregatorError::NotFound(id.to_string()))?;
        let now = self.clock.now();
        let snap = self.snapshot();
        let mut events: Vec<NormalizedEvent> = snap
            .events
            .iter()
            .filter(|e| corridor.matches(e) && e.is_active_at(now))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.last_updated_at.cmp(&a.last_updated_at));
        Ok(events)
    }

    async fn load_attempts(&self) -> Option<IngestAttemptState> {
        match self.store.load_attempts().await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "ingest", error = %format!("{e:#}"), "ingest state unreadable; ignoring");
                None
            }
        }
    }

    async fn load_snapshot_for_cycle(&self) -> CacheSnapshot {
        match self.store.load_snapshot().await {
            Ok(Some(s)) => s,
            Ok(None) => self.snapshot().as_ref().clone(),
            Err(e) => {
                tracing::warn!(target: "ingest", error = %format!("{e:#}"), "snapshot unreadable; using in-memory copy");
                self.snapshot().as_ref().clone()
            }
        }
    }

    /// Run one cycle: fetch every due source concurrently, replace the events
    /// of each source that succeeded, persist, and publish.
    ///
    /// Rejected with [`AggregatorError::Busy`] while another cycle runs.
    pub async fn run_ingestion_cycle(&self) -> Result<IngestionSummary, AggregatorError> {
        let _guard = self
            .cycle_guard
            .try_lock()
            .map_err(|_| AggregatorError::Busy)?;

        ensure_metrics_described();
        counter!("ingest_cycles_total").increment(1);

        let now = self.clock.now();
        let mut snapshot = self.load_snapshot_for_cycle().await;
        let mut attempts = match self.load_attempts().await {
            Some(a) => a,
            None => self.attempts.lock().unwrap_or_else(|p| p.into_inner()).clone(),
        };

        let mut skipped_sources = Vec::new();
        let mut tasks = JoinSet::new();
        let mut attempted = vec![false; self.sources.len()];

        for (idx, src) in self.sources.iter().enumerate() {
            let id = src.provider.source();
            if let Some(last) = attempts.last_attempt(id) {
                let min = chrono::Duration::from_std(src.min_interval)
                    .unwrap_or(chrono::Duration::MAX);
                if now.signed_duration_since(last) < min {
                    tracing::debug!(target: "ingest", source = %id, "rate limited; skipping");
                    counter!("ingest_source_skipped_total", "source" => id.as_str()).increment(1);
                    skipped_sources.push(id);
                    continue;
                }
            }

            attempts.record(id, now);
            let provider = Arc::clone(&src.provider);
            let deadline = self.cycle_deadline;
            attempted[idx] = true;
            tasks.spawn(async move {
                let res = match tokio::time::timeout(deadline, provider.fetch_latest(now)).await {
                    Ok(res) => res,
                    Err(_) => Err(IngestError::Timeout(deadline)),
                };
                (idx, res)
            });
        }

        let mut results: Vec<Option<Result<Vec<NormalizedEvent>, IngestError>>> =
            self.sources.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, res)) => results[idx] = Some(res),
                Err(e) => tracing::error!(target: "ingest", error = %e, "source task aborted"),
            }
        }
        // A task that panicked left no result; report it like any other failure.
        for (idx, res) in results.iter_mut().enumerate() {
            if attempted[idx] && res.is_none() {
                *res = Some(Err(IngestError::fetch("source task aborted")));
            }
        }

        let mut updated_sources = Vec::new();
        let mut errors = Vec::new();
        for (idx, res) in results.into_iter().enumerate() {
            let Some(res) = res else { continue };
            let id = self.sources[idx].provider.source();
            match res {
                Ok(events) => {
                    let count = events.len();
                    let previous = snapshot.events.replace_source(id, events);
                    tracing::info!(target: "ingest", source = %id, events = count, previous, "source updated");
                    counter!("ingest_source_updated_total", "source" => id.as_str()).increment(1);
                    updated_sources.push(id);
                }
                Err(e) => {
                    tracing::warn!(target: "ingest", source = %id, error = %e, "source failed; keeping previous events");
                    counter!("ingest_source_errors_total", "source" => id.as_str()).increment(1);
                    errors.push(format!("{id}: {e}"));
                }
            }
        }

        if let Err(e) = self.store.save_attempts(&attempts).await {
            tracing::warn!(target: "ingest", error = %format!("{e:#}"), "failed to persist ingest state");
            errors.push(format!("cache: {e:#}"));
        }
        *self.attempts.lock().unwrap_or_else(|p| p.into_inner()) = attempts;

        if !updated_sources.is_empty() {
            snapshot.generated_at = now;
            if let Err(e) = self.store.save_snapshot(&snapshot).await {
                tracing::warn!(target: "ingest", error = %format!("{e:#}"), "failed to persist snapshot");
                errors.push(format!("cache: {e:#}"));
            }
        }

        let snapshot = self.publish(snapshot);
        gauge!("ingest_last_cycle_ts").set(now.timestamp() as f64);
        tracing::info!(
            target: "ingest",
            updated = updated_sources.len(),
            skipped = skipped_sources.len(),
            errors = errors.len(),
            events = snapshot.events.len(),
            "ingestion cycle finished"
        );

        Ok(IngestionSummary {
            generated_at: now,
            updated_sources,
            skipped_sources,
            errors,
            snapshot,
        })
    }
}
