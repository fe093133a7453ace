//! Reduce the events matched to a corridor into one status line.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::corridors::CorridorDefinition;
use crate::ingest::types::{ChainLevel, EventKind, NormalizedEvent, SourceId};

pub const MAX_DETAILS: usize = 4;
pub const MAX_DETAIL_CHARS: usize = 140;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Caution,
    Chains,
    Closed,
    Unknown,
}

impl Severity {
    pub fn rank(self) -> u8 {
        match self {
            Severity::Closed => 4,
            Severity::Chains => 3,
            Severity::Caution => 2,
            Severity::Ok => 1,
            Severity::Unknown => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorridorStatus {
    pub severity: Severity,
    pub headline: String,
    pub details: Vec<String>,
    pub sources: Vec<SourceId>,
    pub last_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorridorSummary {
    pub id: String,
    pub label: String,
    pub status: CorridorStatus,
}

static RE_CLOSED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(closed|closure|hold|escort)").unwrap());
static RE_CHAINS_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)chains\s+required|chain\s+control\s*level\s*R\s*-?\s*[23]\b").unwrap()
});
static RE_CAUTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(caution|snow|icy|slippery|reduced visibility|winter driving|traction)")
        .unwrap()
});

/// Severity of a single event; the first matching rule wins.
pub fn event_severity(event: &NormalizedEvent) -> Severity {
    let text = format!("{} {}", event.title, event.status_text);
    let level = event.chain_level;
    let closure = event.closure.as_ref();

    // Lane-closure text always says "closure"; those use the lane counts instead.
    if event.kind != EventKind::LaneClosure && RE_CLOSED.is_match(&text) {
        return Severity::Closed;
    }
    if closure.is_some_and(|c| c.is_full_closure()) {
        return Severity::Closed;
    }

    if matches!(level, Some(ChainLevel::R2 | ChainLevel::R3 | ChainLevel::RC)) {
        return Severity::Chains;
    }

    if level == Some(ChainLevel::R1) || RE_CAUTION.is_match(&text) {
        return Severity::Caution;
    }
    if closure.is_some_and(|c| c.lanes_closed.unwrap_or(0) >= 1) {
        return Severity::Caution;
    }

    // Unlevelled text only reaches chains once no caution word matched.
    if matches!(level, None | Some(ChainLevel::Unknown)) && RE_CHAINS_TEXT.is_match(&text) {
        return Severity::Chains;
    }

    if level == Some(ChainLevel::R0) {
        return Severity::Ok;
    }
    Severity::Unknown
}

fn route_label(event: &NormalizedEvent) -> &str {
    event.highway.as_deref().unwrap_or("Roadway")
}

fn headline(event: &NormalizedEvent, severity: Severity) -> String {
    let route = route_label(event);
    let dir = event
        .direction
        .map(|d| format!(" ({d})"))
        .unwrap_or_default();
    match severity {
        Severity::Closed => format!("Closed on {route}{dir}"),
        Severity::Chains => match event.chain_level {
            Some(l @ (ChainLevel::R2 | ChainLevel::R3 | ChainLevel::RC)) => {
                format!("{l} chains on {route}{dir}")
            }
            _ => format!("Chains required on {route}{dir}"),
        },
        Severity::Caution => {
            if event.chain_level == Some(ChainLevel::R1) {
                format!("R-1 chains on {route}{dir}")
            } else if event.kind == EventKind::LaneClosure {
                format!("Lane closure on {route}{dir}")
            } else {
                format!("Caution on {route}{dir}")
            }
        }
        Severity::Ok => "No chain restrictions reported".to_string(),
        Severity::Unknown => format!("Conditions reported on {route}{dir}"),
    }
}

fn detail(event: &NormalizedEvent) -> String {
    let dir = event
        .direction
        .map(|d| format!(" {d}"))
        .unwrap_or_default();
    let text = if event.status_text.is_empty() {
        &event.title
    } else {
        &event.status_text
    };
    truncate(&format!("{}{dir}: {text}", route_label(event)), MAX_DETAIL_CHARS)
}

/// Cut to `max` chars, ending in "..." when shortened.
pub fn truncate(s: &str, max: usize) -> String {
    let s = s.trim();
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", head.trim_end())
}

/// Status for one corridor.
///
/// `generated_at` is the snapshot time reported when nothing matched;
/// `as_of` decides which lane closures are currently in effect.
pub fn build_status<'a, I>(events: I, generated_at: DateTime<Utc>, as_of: DateTime<Utc>) -> CorridorStatus
where
    I: IntoIterator<Item = &'a NormalizedEvent>,
{
    let mut ranked: Vec<(Severity, &NormalizedEvent)> = events
        .into_iter()
        .filter(|e| e.is_active_at(as_of))
        .map(|e| (event_severity(e), e))
        .collect();

    if ranked.is_empty() {
        return CorridorStatus {
            severity: Severity::Unknown,
            headline: "No recent data".to_string(),
            details: Vec::new(),
            sources: Vec::new(),
            last_updated_at: generated_at,
        };
    }

    ranked.sort_by(|(sa, a), (sb, b)| {
        sb.rank()
            .cmp(&sa.rank())
            .then_with(|| b.last_updated_at.cmp(&a.last_updated_at))
    });

    let (severity, top) = ranked[0];
    let sources: BTreeSet<SourceId> = ranked.iter().map(|(_, e)| e.source).collect();
    let last_updated_at = ranked
        .iter()
        .map(|(_, e)| e.last_updated_at)
        .max()
        .unwrap_or(generated_at);

    CorridorStatus {
        severity,
        headline: headline(top, severity),
        details: ranked
            .iter()
            .take(MAX_DETAILS)
            .map(|(_, e)| detail(e))
            .collect(),
        sources: sources.into_iter().collect(),
        last_updated_at,
    }
}

/// Status for every corridor, in definition order.
pub fn summarize_corridors<'a>(
    corridors: &[CorridorDefinition],
    events: impl Iterator<Item = &'a NormalizedEvent> + Clone,
    generated_at: DateTime<Utc>,
    as_of: DateTime<Utc>,
) -> Vec<CorridorSummary> {
    corridors
        .iter()
        .map(|c| CorridorSummary {
            id: c.id.clone(),
            label: c.label.clone(),
            status: build_status(
                events.clone().filter(|e| c.matches(e)),
                generated_at,
                as_of,
            ),
        })
        .collect()
}
