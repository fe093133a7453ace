// src/ingest/providers/caltrans_kml.rs
//! Caltrans QuickMap chain-control KML.
//!
//! Placemarks can sit at any depth (folders, nested documents), so this is a
//! single streaming pass with an element stack rather than a typed
//! deserialization.

use quick_xml::events::Event as XmlEvent;
use quick_xml::Reader;

use super::{first_coordinate, ParseContext};
use crate::error::IngestError;
use crate::ingest::clean_text;
use crate::ingest::extract::{extract_chain_level, extract_direction, extract_highway, RouteTable};
use crate::ingest::types::{EventKind, NormalizedEvent, SourceId};

pub const DEFAULT_URL: &str = "https://quickmap.dot.ca.gov/data/cc.kml";

const FALLBACK_TITLE: &str = "Chain control";

#[derive(Default)]
struct RawPlacemark {
    name: String,
    description: String,
    point_coords: Option<String>,
    line_coords: Option<String>,
}

/// Parse a KML document into relevant chain-control events.
pub fn parse(body: &[u8], ctx: &ParseContext) -> Result<Vec<NormalizedEvent>, IngestError> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut saw_root = false;
    // (stack depth of the Placemark element, collected fields)
    let mut current: Option<(usize, RawPlacemark)> = None;
    let mut out = Vec::new();

    loop {
        let ev = reader.read_event_into(&mut buf).map_err(|e| {
            IngestError::parse(format!(
                "kml at byte {}: {e}",
                reader.buffer_position()
            ))
        })?;
        match ev {
            XmlEvent::Start(e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if tag == "kml" || tag == "Document" {
                    saw_root = true;
                }
                if tag == "Placemark" && current.is_none() {
                    current = Some((stack.len(), RawPlacemark::default()));
                }
                stack.push(tag);
            }
            XmlEvent::End(_) => {
                stack.pop();
                if matches!(current, Some((depth, _)) if depth == stack.len()) {
                    if let Some((_, pm)) = current.take() {
                        if let Some(ev) = placemark_to_event(pm, ctx) {
                            out.push(ev);
                        }
                    }
                }
            }
            XmlEvent::Text(t) => {
                if let Some((depth, pm)) = current.as_mut() {
                    let text = t
                        .unescape()
                        .map(|s| s.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                    collect_text(pm, *depth, &stack, text);
                }
            }
            XmlEvent::CData(c) => {
                if let Some((depth, pm)) = current.as_mut() {
                    let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                    collect_text(pm, *depth, &stack, text);
                }
            }
            XmlEvent::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(IngestError::parse("kml: no <kml> or <Document> root"));
    }
    Ok(out)
}

fn collect_text(pm: &mut RawPlacemark, pm_depth: usize, stack: &[String], text: String) {
    let Some(parent) = stack.last() else {
        return;
    };
    let direct_child = stack.len() == pm_depth + 2;
    match parent.as_str() {
        "name" if direct_child => pm.name.push_str(&text),
        "description" if direct_child => pm.description.push_str(&text),
        "coordinates" => {
            let within = |geom: &str| stack[pm_depth..].iter().any(|s| s == geom);
            if within("Point") {
                pm.point_coords.get_or_insert_with(String::new).push_str(&text);
            } else if within("LineString") {
                pm.line_coords.get_or_insert_with(String::new).push_str(&text);
            }
        }
        _ => {}
    }
}

fn placemark_to_event(pm: RawPlacemark, ctx: &ParseContext) -> Option<NormalizedEvent> {
    let name = clean_text(&pm.name);
    let description = clean_text(&pm.description);
    let point = pm
        .point_coords
        .as_deref()
        .and_then(first_coordinate)
        .or_else(|| pm.line_coords.as_deref().and_then(first_coordinate));

    if name.is_empty() && description.is_empty() && point.is_none() {
        return None;
    }

    let combined = format!("{name} {description}");
    let combined = combined.trim();
    let table = RouteTable::California;
    let highway = extract_highway(combined, table);

    let relevant = match (&highway, point) {
        (Some(hw), _) if table.is_allowed(hw) => true,
        (_, Some(p)) => ctx.bounds.contains(p),
        _ => false,
    };
    if !relevant {
        return None;
    }

    let title = first_non_empty(&[&name, &description]).unwrap_or(FALLBACK_TITLE);
    let status_text = first_non_empty(&[&description, &name]).unwrap_or(FALLBACK_TITLE);

    Some(
        NormalizedEvent {
            id: String::new(),
            source: SourceId::CaltransQuickmap,
            kind: EventKind::ChainControl,
            direction: extract_direction(combined),
            chain_level: Some(extract_chain_level(combined)),
            highway,
            title: title.to_string(),
            status_text: status_text.to_string(),
            point,
            validity_window: None,
            closure: None,
            encoded_polyline: None,
            last_updated_at: ctx.generated_at,
        }
        .sealed(),
    )
}

fn first_non_empty<'a>(candidates: &[&'a String]) -> Option<&'a str> {
    candidates
        .iter()
        .find(|s| !s.is_empty())
        .map(|s| s.as_str())
}
