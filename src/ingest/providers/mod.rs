// src/ingest/providers/mod.rs
pub mod caltrans_cwwp2;
pub mod caltrans_kml;
pub mod http;
pub mod nevada_511;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::ingest::config::IngestConfig;
use crate::ingest::types::{GeoPoint, NormalizedEvent, SourceId, SourceProvider};

pub use http::{Fetcher, HttpFetcher, StaticFetcher, UnconfiguredFetcher};

/// Lat/lon rectangle used to keep map placemarks near the passes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl Bounds {
    pub const SIERRA: Bounds = Bounds {
        min_lon: -123.0,
        max_lon: -118.0,
        min_lat: 37.0,
        max_lat: 41.0,
    };

    pub fn contains(&self, p: GeoPoint) -> bool {
        p.lon >= self.min_lon && p.lon <= self.max_lon && p.lat >= self.min_lat && p.lat <= self.max_lat
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::SIERRA
    }
}

/// Inputs every parser needs besides the payload.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext {
    /// Cycle time; used as `lastUpdatedAt` when a record has none.
    pub generated_at: DateTime<Utc>,
    pub bounds: Bounds,
}

impl ParseContext {
    pub fn new(generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            bounds: Bounds::SIERRA,
        }
    }
}

/// Upstream payload shapes this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedParser {
    CaltransKml,
    CaltransChainControl,
    CaltransLaneClosure,
    Nevada511,
}

impl FeedParser {
    pub fn source(self) -> SourceId {
        match self {
            FeedParser::CaltransKml => SourceId::CaltransQuickmap,
            FeedParser::CaltransChainControl => SourceId::CaltransChainControl,
            FeedParser::CaltransLaneClosure => SourceId::CaltransLaneClosure,
            FeedParser::Nevada511 => SourceId::Nevada511,
        }
    }

    pub fn for_source(source: SourceId) -> Self {
        match source {
            SourceId::CaltransQuickmap => FeedParser::CaltransKml,
            SourceId::CaltransChainControl => FeedParser::CaltransChainControl,
            SourceId::CaltransLaneClosure => FeedParser::CaltransLaneClosure,
            SourceId::Nevada511 => FeedParser::Nevada511,
        }
    }

    pub fn parse(self, body: &[u8], ctx: &ParseContext) -> Result<Vec<NormalizedEvent>, IngestError> {
        match self {
            FeedParser::CaltransKml => caltrans_kml::parse(body, ctx),
            FeedParser::CaltransChainControl => caltrans_cwwp2::parse_chain_controls(body, ctx),
            FeedParser::CaltransLaneClosure => caltrans_cwwp2::parse_lane_closures(body, ctx),
            FeedParser::Nevada511 => nevada_511::parse(body, ctx),
        }
    }
}

/// A source = one fetcher (one or more endpoints) + one parser.
pub struct FeedProvider {
    parser: FeedParser,
    fetcher: Arc<dyn Fetcher>,
    bounds: Bounds,
}

impl FeedProvider {
    pub fn new(parser: FeedParser, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            parser,
            fetcher,
            bounds: Bounds::SIERRA,
        }
    }

    /// Provider that always serves the given payload (tests, offline runs).
    pub fn from_fixture(parser: FeedParser, body: &str) -> Self {
        Self::new(parser, Arc::new(StaticFetcher::from_fixture(body)))
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    fn parse_all(
        &self,
        payloads: &[Vec<u8>],
        generated_at: DateTime<Utc>,
    ) -> Result<Vec<NormalizedEvent>, IngestError> {
        let t0 = Instant::now();
        let ctx = ParseContext {
            generated_at,
            bounds: self.bounds,
        };
        let mut out = Vec::new();
        for body in payloads {
            out.extend(self.parser.parse(body, &ctx)?);
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_events_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for FeedProvider {
    fn source(&self) -> SourceId {
        self.parser.source()
    }

    async fn fetch_latest(
        &self,
        generated_at: DateTime<Utc>,
    ) -> Result<Vec<NormalizedEvent>, IngestError> {
        let payloads = self.fetcher.fetch().await?;
        self.parse_all(&payloads, generated_at)
    }
}

/// HTTP-backed providers for every enabled source, with their minimum
/// fetch intervals, in `SourceId` order.
pub fn from_config(
    cfg: &IngestConfig,
) -> Result<Vec<(Arc<dyn SourceProvider>, Duration)>, IngestError> {
    let mut out: Vec<(Arc<dyn SourceProvider>, Duration)> = Vec::new();
    for id in SourceId::ALL {
        let sc = cfg.source(id);
        if !sc.enabled {
            tracing::info!(target: "ingest", source = %id, "source disabled by config");
            continue;
        }
        let fetcher: Arc<dyn Fetcher> = match (id, cfg.nevada_api_key.as_deref()) {
            (SourceId::Nevada511, None) => {
                Arc::new(UnconfiguredFetcher::new("NEVADA_511_API_KEY is not set"))
            }
            (SourceId::Nevada511, Some(key)) => Arc::new(
                HttpFetcher::new(sc.urls.clone(), cfg.http_timeouts())?
                    .with_query("key", key)
                    .with_query("format", "json"),
            ),
            _ => Arc::new(HttpFetcher::new(sc.urls.clone(), cfg.http_timeouts())?),
        };
        let provider = FeedProvider::new(FeedParser::for_source(id), fetcher).with_bounds(cfg.bounds);
        out.push((Arc::new(provider), sc.min_interval()));
    }
    Ok(out)
}

/// Unix epoch in seconds or milliseconds (values above 1e12 are millis).
pub(crate) fn epoch_to_utc(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    let millis = if value > 1_000_000_000_000.0 {
        value
    } else {
        value * 1_000.0
    };
    DateTime::from_timestamp_millis(millis.round() as i64)
}

/// First "lon,lat[,alt]" tuple of a KML coordinate list.
pub(crate) fn first_coordinate(coords: &str) -> Option<GeoPoint> {
    let first = coords.split_whitespace().next()?;
    let mut parts = first.split(',');
    let lon = parts.next()?.trim().parse::<f64>().ok()?;
    let lat = parts.next()?.trim().parse::<f64>().ok()?;
    (lon.is_finite() && lat.is_finite()).then_some(GeoPoint { lat, lon })
}

pub(crate) fn point_from(lat: Option<f64>, lon: Option<f64>) -> Option<GeoPoint> {
    match (lat, lon) {
        (Some(lat), Some(lon)) if lat != 0.0 || lon != 0.0 => Some(GeoPoint { lat, lon }),
        _ => None,
    }
}
