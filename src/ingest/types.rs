// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::IngestError;

/// Upstream feed an event came from. Ordering is the rendering order used for
/// corridor `sources` and for the persisted event list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    CaltransChainControl,
    CaltransLaneClosure,
    Nevada511,
    CaltransQuickmap,
}

impl SourceId {
    pub const ALL: [SourceId; 4] = [
        SourceId::CaltransChainControl,
        SourceId::CaltransLaneClosure,
        SourceId::Nevada511,
        SourceId::CaltransQuickmap,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceId::CaltransChainControl => "caltrans_chain_control",
            SourceId::CaltransLaneClosure => "caltrans_lane_closure",
            SourceId::Nevada511 => "nevada_511",
            SourceId::CaltransQuickmap => "caltrans_quickmap",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ChainControl,
    LaneClosure,
    RoadCondition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    EB,
    WB,
    NB,
    SB,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::EB => "EB",
            Direction::WB => "WB",
            Direction::NB => "NB",
            Direction::SB => "SB",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caltrans chain-control requirement code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainLevel {
    #[serde(rename = "R-0")]
    R0,
    #[serde(rename = "R-1")]
    R1,
    #[serde(rename = "R-2")]
    R2,
    #[serde(rename = "R-3")]
    R3,
    #[serde(rename = "RC")]
    RC,
    #[serde(rename = "ESC")]
    Esc,
    #[serde(rename = "HT")]
    HT,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl ChainLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ChainLevel::R0 => "R-0",
            ChainLevel::R1 => "R-1",
            ChainLevel::R2 => "R-2",
            ChainLevel::R3 => "R-3",
            ChainLevel::RC => "RC",
            ChainLevel::Esc => "ESC",
            ChainLevel::HT => "HT",
            ChainLevel::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ChainLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Time span during which a lane closure is in effect. Either bound may be
/// missing; a missing bound is open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

impl ValidityWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        if matches!(self.start, Some(s) if at < s) {
            return false;
        }
        if matches!(self.end, Some(e) if at > e) {
            return false;
        }
        true
    }
}

/// Structured lane-closure facts used by the severity rules.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneClosure {
    #[serde(default)]
    pub lanes_closed: Option<u32>,
    #[serde(default)]
    pub total_lanes: Option<u32>,
    #[serde(default)]
    pub closure_type: String,
    #[serde(default)]
    pub work_type: String,
}

impl LaneClosure {
    /// Whole roadway closed: every lane, or a closure type that says so.
    pub fn is_full_closure(&self) -> bool {
        let ty = self.closure_type.to_ascii_lowercase();
        if ty.contains("road") && ty.contains("closure") {
            return true;
        }
        if ty.contains("full") || ty.contains("total") || ty.contains("complete") {
            return true;
        }
        matches!(
            (self.lanes_closed, self.total_lanes),
            (Some(closed), Some(total)) if total > 0 && closed >= total
        )
    }
}

/// One upstream record in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEvent {
    pub id: String,
    pub source: SourceId,
    pub kind: EventKind,
    pub highway: Option<String>,
    pub direction: Option<Direction>,
    pub title: String,
    pub status_text: String,
    pub chain_level: Option<ChainLevel>,
    pub point: Option<GeoPoint>,
    #[serde(default)]
    pub validity_window: Option<ValidityWindow>,
    #[serde(default)]
    pub closure: Option<LaneClosure>,
    /// Segment geometry as published by the feed (Google encoded polyline).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoded_polyline: Option<String>,
    pub last_updated_at: DateTime<Utc>,
}

/// Fields that define an event's identity. Field order is part of the hash.
#[derive(Serialize)]
struct IdKey<'a> {
    source: SourceId,
    title: &'a str,
    status_text: &'a str,
    highway: Option<&'a str>,
    direction: Option<Direction>,
    chain_level: Option<ChainLevel>,
    point: Option<GeoPoint>,
    validity_window: Option<ValidityWindow>,
    encoded_polyline: Option<&'a str>,
}

impl NormalizedEvent {
    /// SHA-256 over the defining fields, hex encoded.
    pub fn content_id(&self) -> String {
        use sha2::{Digest, Sha256};
        use std::fmt::Write as _;

        let key = IdKey {
            source: self.source,
            title: &self.title,
            status_text: &self.status_text,
            highway: self.highway.as_deref(),
            direction: self.direction,
            chain_level: self.chain_level,
            point: self.point,
            validity_window: self.validity_window,
            encoded_polyline: self.encoded_polyline.as_deref(),
        };
        let bytes = serde_json::to_vec(&key).unwrap_or_default();
        let digest = Sha256::digest(&bytes);
        let mut out = String::with_capacity(64);
        for b in digest.iter() {
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }

    /// Stamp `id` from the current content.
    pub fn sealed(mut self) -> Self {
        self.id = self.content_id();
        self
    }

    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.validity_window.map_or(true, |w| w.contains(at))
    }
}

/// Current events per source. Serialized as one flat list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<NormalizedEvent>", into = "Vec<NormalizedEvent>")]
pub struct EventStore {
    by_source: BTreeMap<SourceId, Vec<NormalizedEvent>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything known about `source`; other sources are untouched.
    /// Returns how many events the source had before.
    pub fn replace_source(&mut self, source: SourceId, events: Vec<NormalizedEvent>) -> usize {
        debug_assert!(events.iter().all(|e| e.source == source));
        let previous = if events.is_empty() {
            self.by_source.remove(&source)
        } else {
            self.by_source.insert(source, events)
        };
        previous.map_or(0, |v| v.len())
    }

    pub fn events_for(&self, source: SourceId) -> &[NormalizedEvent] {
        self.by_source
            .get(&source)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NormalizedEvent> + Clone {
        self.by_source.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_source.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<NormalizedEvent>> for EventStore {
    fn from(events: Vec<NormalizedEvent>) -> Self {
        let mut by_source: BTreeMap<SourceId, Vec<NormalizedEvent>> = BTreeMap::new();
        for ev in events {
            by_source.entry(ev.source).or_default().push(ev);
        }
        Self { by_source }
    }
}

impl From<EventStore> for Vec<NormalizedEvent> {
    fn from(store: EventStore) -> Self {
        store.by_source.into_values().flatten().collect()
    }
}

/// Last-known-good state served to readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    pub generated_at: DateTime<Utc>,
    pub events: EventStore,
}

impl CacheSnapshot {
    pub fn empty(generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            events: EventStore::new(),
        }
    }
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    fn source(&self) -> SourceId;
    /// Fetch and parse the source. `generated_at` is the cycle timestamp used
    /// as `lastUpdatedAt` when the feed carries none.
    async fn fetch_latest(
        &self,
        generated_at: DateTime<Utc>,
    ) -> Result<Vec<NormalizedEvent>, IngestError>;
}
