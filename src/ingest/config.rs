// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::providers::http::HttpTimeouts;
use crate::ingest::providers::Bounds;
use crate::ingest::types::SourceId;

const ENV_PATH: &str = "INGEST_CONFIG_PATH";
const ENV_NEVADA_KEY: &str = "NEVADA_511_API_KEY";
const ENV_INGEST_TOKEN: &str = "INGEST_TOKEN";
const ENV_INTERVAL: &str = "INGEST_INTERVAL_SECS";
const ENV_CACHE_DIR: &str = "CACHE_DIR";

/// Per-source settings. Missing fields fall back to the source defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub enabled: bool,
    pub min_interval_secs: u64,
    pub urls: Vec<String>,
}

impl SourceConfig {
    pub fn defaults_for(source: SourceId) -> Self {
        use crate::ingest::providers::{caltrans_cwwp2, caltrans_kml, nevada_511};
        let (secs, urls): (u64, Vec<&str>) = match source {
            SourceId::CaltransChainControl => (60, caltrans_cwwp2::CHAIN_CONTROL_URLS.to_vec()),
            SourceId::CaltransLaneClosure => (300, caltrans_cwwp2::LANE_CLOSURE_URLS.to_vec()),
            SourceId::Nevada511 => (120, vec![nevada_511::DEFAULT_URL]),
            SourceId::CaltransQuickmap => (60, vec![caltrans_kml::DEFAULT_URL]),
        };
        Self {
            enabled: true,
            min_interval_secs: secs,
            urls: urls.into_iter().map(String::from).collect(),
        }
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_secs)
    }
}

/// Service-wide ingest settings.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    pub interval_secs: u64,
    pub cycle_deadline_secs: u64,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub cache_dir: PathBuf,
    pub nevada_api_key: Option<String>,
    pub ingest_token: Option<String>,
    pub bounds: Bounds,
    pub sources: BTreeMap<SourceId, SourceConfig>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            cycle_deadline_secs: 30,
            connect_timeout_secs: 5,
            request_timeout_secs: 15,
            cache_dir: PathBuf::from("data"),
            nevada_api_key: None,
            ingest_token: None,
            bounds: Bounds::SIERRA,
            sources: SourceId::ALL
                .into_iter()
                .map(|s| (s, SourceConfig::defaults_for(s)))
                .collect(),
        }
    }
}

/// On-disk shape; every field optional so partial files work.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    interval_secs: Option<u64>,
    cycle_deadline_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    cache_dir: Option<String>,
    nevada_api_key: Option<String>,
    ingest_token: Option<String>,
    bounds: Option<Bounds>,
    sources: BTreeMap<String, RawSource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSource {
    enabled: Option<bool>,
    min_interval_secs: Option<u64>,
    urls: Option<Vec<String>>,
}

impl IngestConfig {
    pub fn cycle_deadline(&self) -> Duration {
        Duration::from_secs(self.cycle_deadline_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn http_timeouts(&self) -> HttpTimeouts {
        HttpTimeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            total: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn source(&self, id: SourceId) -> SourceConfig {
        self.sources
            .get(&id)
            .cloned()
            .unwrap_or_else(|| SourceConfig::defaults_for(id))
    }

    fn merge(mut self, raw: RawConfig) -> Result<Self> {
        if let Some(v) = raw.interval_secs {
            self.interval_secs = v;
        }
        if let Some(v) = raw.cycle_deadline_secs {
            self.cycle_deadline_secs = v;
        }
        if let Some(v) = raw.connect_timeout_secs {
            self.connect_timeout_secs = v;
        }
        if let Some(v) = raw.request_timeout_secs {
            self.request_timeout_secs = v;
        }
        if let Some(v) = raw.cache_dir {
            self.cache_dir = PathBuf::from(v);
        }
        self.nevada_api_key = secret(raw.nevada_api_key).or(self.nevada_api_key);
        self.ingest_token = secret(raw.ingest_token).or(self.ingest_token);
        if let Some(b) = raw.bounds {
            self.bounds = b;
        }
        for (name, rs) in raw.sources {
            let id = SourceId::parse(&name).ok_or_else(|| anyhow!("unknown source `{name}`"))?;
            let entry = self
                .sources
                .entry(id)
                .or_insert_with(|| SourceConfig::defaults_for(id));
            if let Some(v) = rs.enabled {
                entry.enabled = v;
            }
            if let Some(v) = rs.min_interval_secs {
                entry.min_interval_secs = v;
            }
            if let Some(v) = rs.urls.filter(|u| !u.is_empty()) {
                entry.urls = v;
            }
        }
        Ok(self)
    }

    /// Environment wins over file values.
    fn apply_env(mut self) -> Result<Self> {
        if let Some(k) = env_non_empty(ENV_NEVADA_KEY) {
            self.nevada_api_key = Some(k);
        }
        if let Some(t) = env_non_empty(ENV_INGEST_TOKEN) {
            self.ingest_token = Some(t);
        }
        if let Some(v) = env_non_empty(ENV_INTERVAL) {
            self.interval_secs = v
                .parse()
                .with_context(|| format!("{ENV_INTERVAL} must be an integer, got `{v}`"))?;
        }
        if let Some(d) = env_non_empty(ENV_CACHE_DIR) {
            self.cache_dir = PathBuf::from(d);
        }
        Ok(self)
    }
}

/// `"ENV"` (or blank) in a file means "take it from the environment".
fn secret(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != "ENV")
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Load config from an explicit path (TOML or JSON), then apply env overrides.
pub fn load_ingest_config_from(path: &Path) -> Result<IngestConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading ingest config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let raw = parse_raw(&content, ext.as_str())?;
    IngestConfig::default().merge(raw)?.apply_env()
}

/// Load config using env var + fallbacks:
/// 1) $INGEST_CONFIG_PATH
/// 2) config/ingest.toml
/// 3) config/ingest.json
/// 4) built-in defaults
pub fn load_ingest_config_default() -> Result<IngestConfig> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_ingest_config_from(&pb);
        } else {
            return Err(anyhow!("INGEST_CONFIG_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/ingest.toml");
    if toml_p.exists() {
        return load_ingest_config_from(&toml_p);
    }
    let json_p = PathBuf::from("config/ingest.json");
    if json_p.exists() {
        return load_ingest_config_from(&json_p);
    }
    IngestConfig::default().apply_env()
}

fn parse_raw(s: &str, hint_ext: &str) -> Result<RawConfig> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("parsing ingest config json");
    }
    if hint_ext == "toml" {
        return toml::from_str(s).context("parsing ingest config toml");
    }
    // No usable extension: sniff.
    if s.trim_start().starts_with('{') {
        serde_json::from_str(s).context("parsing ingest config json")
    } else {
        toml::from_str(s).context("parsing ingest config toml")
    }
}
