// src/ingest/providers/nevada_511.rs
use serde_json::Value;

use super::{epoch_to_utc, ParseContext};
use crate::error::IngestError;
use crate::ingest::clean_text;
use crate::ingest::extract::{extract_direction, extract_highway, RouteTable};
use crate::ingest::fields::{FieldSpec, LenientRecord};
use crate::ingest::types::{EventKind, NormalizedEvent, SourceId};

pub const DEFAULT_URL: &str = "https://www.nvroads.com/api/v2/get/roadconditions";

const LIST_KEYS: [&str; 6] = [
    "RoadConditions",
    "roadConditions",
    "roadconditions",
    "data",
    "result",
    "items",
];

/// Place names that make an unrouted record relevant to the Tahoe area.
const PLACE_KEYWORDS: [&str; 8] = [
    "tahoe",
    "reno",
    "incline",
    "carson",
    "truckee",
    "mt rose",
    "mount rose",
    "kingsbury",
];

#[derive(Debug, Clone, Copy)]
enum Nv {
    Roadway,
    Location,
    OverallStatus,
    SecondaryConditions,
    Polyline,
    LastUpdated,
}

impl FieldSpec for Nv {
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Nv::Roadway => &["RoadwayName", "roadwayName", "Roadway", "roadway"],
            Nv::Location => &[
                "LocationDescription",
                "locationDescription",
                "Location",
                "location",
            ],
            Nv::OverallStatus => &["OverallStatus", "overallStatus", "Status", "status"],
            Nv::SecondaryConditions => &[
                "SecondaryConditions",
                "secondaryConditions",
                "SecondaryCondition",
                "secondaryCondition",
            ],
            Nv::Polyline => &["EncodedPolyline", "encodedPolyline", "Polyline", "polyline"],
            Nv::LastUpdated => &["LastUpdated", "lastUpdated"],
        }
    }
}

/// Parse a Nevada 511 road-conditions response.
pub fn parse(body: &[u8], ctx: &ParseContext) -> Result<Vec<NormalizedEvent>, IngestError> {
    let root: Value = serde_json::from_slice(body)
        .map_err(|e| IngestError::parse(format!("nevada 511 json: {e}")))?;

    let items = match &root {
        Value::Array(items) => items,
        Value::Object(obj) => LIST_KEYS
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_array))
            .ok_or_else(|| IngestError::parse("nevada 511: no road-condition list in payload"))?,
        _ => return Err(IngestError::parse("nevada 511: expected object or array")),
    };

    Ok(items
        .iter()
        .filter_map(LenientRecord::from_value)
        .filter_map(|r| road_condition_event(r, ctx))
        .collect())
}

fn road_condition_event(r: LenientRecord<'_>, ctx: &ParseContext) -> Option<NormalizedEvent> {
    let roadway = clean_text(&r.text(Nv::Roadway));
    let location = clean_text(&r.text(Nv::Location));
    let overall = clean_text(&r.text(Nv::OverallStatus));

    let combined = clean_text(&format!("{roadway} {location} {overall}"));
    if combined.is_empty() {
        return None;
    }

    let title = [roadway.as_str(), location.as_str()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" - ");
    let title = if title.is_empty() { combined.clone() } else { title };

    let mut status_parts = Vec::new();
    if !overall.is_empty() {
        status_parts.push(overall);
    }
    status_parts.extend(secondary_conditions(r.value(Nv::SecondaryConditions)));
    let status_text = if status_parts.is_empty() {
        title.clone()
    } else {
        status_parts.join("; ")
    };

    let table = RouteTable::Nevada;
    let highway = extract_highway(&combined, table);
    let relevant = match &highway {
        Some(hw) if table.is_allowed(hw) => true,
        _ => {
            let text = format!("{title} {status_text}").to_lowercase();
            PLACE_KEYWORDS.iter().any(|k| text.contains(k))
        }
    };
    if !relevant {
        return None;
    }

    let encoded_polyline = r.string(Nv::Polyline);
    let last_updated_at = r
        .number(Nv::LastUpdated)
        .and_then(epoch_to_utc)
        .unwrap_or(ctx.generated_at);

    Some(
        NormalizedEvent {
            id: String::new(),
            source: SourceId::Nevada511,
            kind: EventKind::RoadCondition,
            direction: extract_direction(&combined),
            highway,
            title,
            status_text,
            chain_level: None,
            point: None,
            validity_window: None,
            closure: None,
            encoded_polyline,
            last_updated_at,
        }
        .sealed(),
    )
}

/// Secondary conditions come as a string, a list of strings, or a list of
/// `{"Condition": ...}` objects.
fn secondary_conditions(raw: Option<&Value>) -> Vec<String> {
    let one = |v: &Value| -> String {
        match v {
            Value::String(s) => clean_text(s),
            Value::Object(o) => o
                .get("Condition")
                .or_else(|| o.get("condition"))
                .and_then(Value::as_str)
                .map(clean_text)
                .unwrap_or_default(),
            _ => String::new(),
        }
    };
    match raw {
        Some(Value::Array(items)) => items.iter().map(one).filter(|s| !s.is_empty()).collect(),
        Some(v @ Value::String(_)) => Some(one(v)).filter(|s| !s.is_empty()).into_iter().collect(),
        _ => Vec::new(),
    }
}
