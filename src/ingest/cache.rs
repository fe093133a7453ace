// src/ingest/cache.rs
//! Durable last-known-good snapshot and per-source attempt timestamps.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::types::{CacheSnapshot, SourceId};

pub const SNAPSHOT_FILE: &str = "last_known_good.json";
pub const ATTEMPTS_FILE: &str = "ingest_state.json";

/// When each source was last actually fetched (skips do not count).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestAttemptState {
    #[serde(default)]
    pub last_attempt_at: BTreeMap<SourceId, DateTime<Utc>>,
}

impl IngestAttemptState {
    pub fn last_attempt(&self, source: SourceId) -> Option<DateTime<Utc>> {
        self.last_attempt_at.get(&source).copied()
    }

    pub fn record(&mut self, source: SourceId, at: DateTime<Utc>) {
        self.last_attempt_at.insert(source, at);
    }
}

/// Storage for the two independent records. `Ok(None)` means "never written".
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn load_snapshot(&self) -> Result<Option<CacheSnapshot>>;
    async fn save_snapshot(&self, snapshot: &CacheSnapshot) -> Result<()>;
    async fn load_attempts(&self) -> Result<Option<IngestAttemptState>>;
    async fn save_attempts(&self, state: &IngestAttemptState) -> Result<()>;
}

/// JSON files in one directory, replaced atomically (write tmp, then rename).
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    pub fn attempts_path(&self) -> PathBuf {
        self.dir.join(ATTEMPTS_FILE)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let v = serde_json::from_slice(&bytes)
            .with_context(|| format!("decoding {}", path.display()))?;
        Ok(Some(v))
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let json = serde_json::to_vec_pretty(value).context("encoding cache json")?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("renaming {} -> {}", tmp.display(), path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl PersistentStore for FileStore {
    async fn load_snapshot(&self) -> Result<Option<CacheSnapshot>> {
        Self::read_json(&self.snapshot_path()).await
    }

    async fn save_snapshot(&self, snapshot: &CacheSnapshot) -> Result<()> {
        self.write_json(&self.snapshot_path(), snapshot).await
    }

    async fn load_attempts(&self) -> Result<Option<IngestAttemptState>> {
        Self::read_json(&self.attempts_path()).await
    }

    async fn save_attempts(&self, state: &IngestAttemptState) -> Result<()> {
        self.write_json(&self.attempts_path(), state).await
    }
}

/// In-process store for tests and runs without a cache directory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<CacheSnapshot>>,
    attempts: Mutex<Option<IngestAttemptState>>,
    snapshot_writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `save_snapshot` ran.
    pub fn snapshot_writes(&self) -> usize {
        *self.snapshot_writes.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn load_snapshot(&self) -> Result<Option<CacheSnapshot>> {
        Ok(self.snapshot.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }

    async fn save_snapshot(&self, snapshot: &CacheSnapshot) -> Result<()> {
        *self.snapshot.lock().unwrap_or_else(|p| p.into_inner()) = Some(snapshot.clone());
        *self.snapshot_writes.lock().unwrap_or_else(|p| p.into_inner()) += 1;
        Ok(())
    }

    async fn load_attempts(&self) -> Result<Option<IngestAttemptState>> {
        Ok(self.attempts.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }

    async fn save_attempts(&self, state: &IngestAttemptState) -> Result<()> {
        *self.attempts.lock().unwrap_or_else(|p| p.into_inner()) = Some(state.clone());
        Ok(())
    }
}
