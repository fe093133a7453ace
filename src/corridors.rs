//! Named highway corridors and the rule deciding which events belong to them.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::NormalizedEvent;

const ENV_PATH: &str = "CORRIDORS_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorridorDefinition {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub highways: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl CorridorDefinition {
    pub fn new(id: &str, label: &str, highways: &[&str], keywords: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            highways: highways.iter().map(|s| s.to_string()).collect(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// A routed event matches only on its exact route code. Keywords apply
    /// only to events whose route could not be resolved.
    pub fn matches(&self, event: &NormalizedEvent) -> bool {
        if let Some(hw) = event.highway.as_deref() {
            let hw = hw.trim();
            return self
                .highways
                .iter()
                .any(|h| h.trim().eq_ignore_ascii_case(hw));
        }
        let text = format!("{} {}", event.title, event.status_text).to_lowercase();
        self.keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .any(|k| !k.is_empty() && text.contains(&k))
    }
}

/// Sierra / Lake Tahoe corridors served by default.
pub fn builtin() -> Vec<CorridorDefinition> {
    vec![
        CorridorDefinition::new(
            "i80-donner",
            "I-80 (Donner Summit)",
            &["I-80"],
            &["Donner", "Truckee", "Soda Springs"],
        ),
        CorridorDefinition::new(
            "us50-echo",
            "US-50 (Echo Summit)",
            &["US-50"],
            &["Echo Summit", "South Lake Tahoe", "Pollock"],
        ),
        CorridorDefinition::new(
            "ca88-carson",
            "CA-88 (Carson Pass)",
            &["CA-88"],
            &["Carson Pass", "Kirkwood"],
        ),
        CorridorDefinition::new(
            "ca89-tahoe",
            "CA-89 (Tahoe Basin)",
            &["CA-89"],
            &["Emerald Bay", "Tahoe", "Meeks"],
        ),
        CorridorDefinition::new(
            "ca28-laketahoe",
            "CA-28 (Lake Tahoe)",
            &["CA-28"],
            &["Tahoe City", "Kings Beach", "Crystal Bay"],
        ),
        CorridorDefinition::new(
            "ca267-kings",
            "CA-267 (Truckee to Kings Beach)",
            &["CA-267"],
            &["Kings Beach", "Northstar", "Brockway"],
        ),
        CorridorDefinition::new(
            "nv431-mtrose",
            "NV-431 (Mt Rose Hwy)",
            &["NV-431"],
            &["Mt Rose", "Mount Rose"],
        ),
        CorridorDefinition::new(
            "us395-reno",
            "US-395 (Reno/Sierra)",
            &["US-395"],
            &["Reno", "Carson", "Gardnerville"],
        ),
        CorridorDefinition::new(
            "nv28-laketahoe",
            "NV-28 (Lake Tahoe)",
            &["NV-28"],
            &["Incline", "Crystal Bay", "Sand Harbor"],
        ),
        CorridorDefinition::new(
            "nv267-brockway",
            "NV-267 (Brockway Summit)",
            &["NV-267"],
            &["Brockway"],
        ),
        CorridorDefinition::new(
            "sr207-kingsbury",
            "SR-207 (Kingsbury Grade)",
            &["SR-207"],
            &["Kingsbury", "Daggett"],
        ),
    ]
}

pub fn find_by_id<'a>(corridors: &'a [CorridorDefinition], id: &str) -> Option<&'a CorridorDefinition> {
    corridors.iter().find(|c| c.id == id)
}

/// Reject empty or duplicate ids; ids are the join key for statuses.
pub fn validate(corridors: &[CorridorDefinition]) -> Result<()> {
    let mut seen = HashSet::new();
    for c in corridors {
        if c.id.trim().is_empty() {
            bail!("corridor with empty id (label `{}`)", c.label);
        }
        if !seen.insert(c.id.as_str()) {
            bail!("duplicate corridor id `{}`", c.id);
        }
    }
    Ok(())
}

/// Load corridor definitions from an explicit path (TOML or JSON).
pub fn load_corridors_from(path: &Path) -> Result<Vec<CorridorDefinition>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading corridors from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let list = parse_corridors(&content, ext.as_str())?;
    validate(&list)?;
    Ok(list)
}

/// 1) $CORRIDORS_PATH
/// 2) config/corridors.toml
/// 3) config/corridors.json
/// 4) built-in table
pub fn load_corridors_default() -> Result<Vec<CorridorDefinition>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_corridors_from(&pb);
        } else {
            return Err(anyhow!("CORRIDORS_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/corridors.toml");
    if toml_p.exists() {
        return load_corridors_from(&toml_p);
    }
    let json_p = PathBuf::from("config/corridors.json");
    if json_p.exists() {
        return load_corridors_from(&json_p);
    }
    Ok(builtin())
}

#[derive(Deserialize)]
struct CorridorFile {
    corridors: Vec<CorridorDefinition>,
}

fn parse_corridors(s: &str, hint_ext: &str) -> Result<Vec<CorridorDefinition>> {
    if hint_ext == "toml" {
        let f: CorridorFile = toml::from_str(s).context("parsing corridors toml")?;
        return Ok(f.corridors);
    }
    // JSON: bare array or {"corridors": [...]}
    if let Ok(list) = serde_json::from_str::<Vec<CorridorDefinition>>(s) {
        return Ok(list);
    }
    if let Ok(f) = serde_json::from_str::<CorridorFile>(s) {
        return Ok(f.corridors);
    }
    if hint_ext != "json" {
        if let Ok(f) = toml::from_str::<CorridorFile>(s) {
            return Ok(f.corridors);
        }
    }
    Err(anyhow!("unsupported corridors format"))
}
