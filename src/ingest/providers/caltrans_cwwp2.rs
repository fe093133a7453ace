// src/ingest/providers/caltrans_cwwp2.rs
//! Caltrans CWWP2 JSON feeds: chain controls (`cc`) and lane closures (`lcs`).
//!
//! District files wrap each record (`{"data":[{"cc":{...}}]}`) and nest most
//! fields inside `location` / `statusData` / `closure` objects, with spelling
//! that varies by district. Fields are read through [`LenientRecord`].

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday};
use serde_json::{Map, Value};

use super::{epoch_to_utc, point_from, ParseContext};
use crate::error::IngestError;
use crate::ingest::clean_text;
use crate::ingest::extract::{
    extract_chain_level, extract_direction, extract_direction_field, extract_highway,
    extract_route_field, RouteTable,
};
use crate::ingest::fields::{FieldSpec, LenientRecord};
use crate::ingest::types::{
    ChainLevel, EventKind, GeoPoint, LaneClosure, NormalizedEvent, SourceId, ValidityWindow,
};

pub const CHAIN_CONTROL_URLS: [&str; 2] = [
    "https://cwwp2.dot.ca.gov/data/d3/cc/ccStatusD03.json",
    "https://cwwp2.dot.ca.gov/data/d10/cc/ccStatusD10.json",
];

pub const LANE_CLOSURE_URLS: [&str; 2] = [
    "https://cwwp2.dot.ca.gov/data/d3/lcs/lcsStatusD03.json",
    "https://cwwp2.dot.ca.gov/data/d10/lcs/lcsStatusD10.json",
];

#[derive(Debug, Clone, Copy)]
enum Cc {
    LocationName,
    NearbyPlace,
    Latitude,
    Longitude,
    Direction,
    Route,
    Status,
    StatusDescription,
    StatusDate,
    StatusTime,
}

impl FieldSpec for Cc {
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Cc::LocationName => &["locationName", "LocationName"],
            Cc::NearbyPlace => &["nearbyPlace", "NearbyPlace"],
            Cc::Latitude => &["latitude", "Latitude"],
            Cc::Longitude => &["longitude", "Longitude"],
            Cc::Direction => &["direction", "Direction", "dir", "Dir"],
            Cc::Route => &["route", "Route"],
            Cc::Status => &["status", "Status"],
            Cc::StatusDescription => &["statusDescription", "StatusDescription"],
            Cc::StatusDate => &["statusDate", "StatusDate"],
            Cc::StatusTime => &["statusTime", "StatusTime"],
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Lcs {
    TravelFlowDirection,
    BeginRoute,
    EndRoute,
    BeginLatitude,
    BeginLongitude,
    BeginLocationName,
    EndLocationName,
    BeginNearbyPlace,
    EndNearbyPlace,
    TypeOfClosure,
    TypeOfWork,
    LanesClosed,
    TotalExistingLanes,
    ClosureStartEpoch,
    ClosureEndEpoch,
}

impl FieldSpec for Lcs {
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Lcs::TravelFlowDirection => &["travelFlowDirection", "TravelFlowDirection"],
            Lcs::BeginRoute => &["beginRoute", "BeginRoute"],
            Lcs::EndRoute => &["endRoute", "EndRoute"],
            Lcs::BeginLatitude => &["beginLatitude", "BeginLatitude"],
            Lcs::BeginLongitude => &["beginLongitude", "BeginLongitude"],
            Lcs::BeginLocationName => &["beginLocationName", "BeginLocationName"],
            Lcs::EndLocationName => &["endLocationName", "EndLocationName"],
            Lcs::BeginNearbyPlace => &["beginNearbyPlace", "BeginNearbyPlace"],
            Lcs::EndNearbyPlace => &["endNearbyPlace", "EndNearbyPlace"],
            Lcs::TypeOfClosure => &["typeOfClosure", "TypeOfClosure"],
            Lcs::TypeOfWork => &["typeOfWork", "TypeOfWork"],
            Lcs::LanesClosed => &["lanesClosed", "LanesClosed"],
            Lcs::TotalExistingLanes => &["totalExistingLanes", "TotalExistingLanes"],
            Lcs::ClosureStartEpoch => &["closureStartEpoch", "ClosureStartEpoch"],
            Lcs::ClosureEndEpoch => &["closureEndEpoch", "ClosureEndEpoch"],
        }
    }
}

/// Records of a district file. Accepts the wrapped `{data:[{cc:{..}}]}` form,
/// a bare array, and array items that are not wrapped.
fn records<'a>(
    root: &'a Value,
    wrapper: &str,
) -> Result<Vec<&'a Map<String, Value>>, IngestError> {
    let items = match root {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get("data") {
            Some(Value::Array(items)) => items,
            _ => return Err(IngestError::parse("cwwp2: missing `data` array")),
        },
        _ => return Err(IngestError::parse("cwwp2: expected object or array")),
    };
    Ok(items
        .iter()
        .filter_map(Value::as_object)
        .map(|item| match item.get(wrapper) {
            Some(Value::Object(inner)) => inner,
            _ => item,
        })
        .collect())
}

fn decode(body: &[u8]) -> Result<Value, IngestError> {
    serde_json::from_slice(body).map_err(|e| IngestError::parse(format!("cwwp2 json: {e}")))
}

/// Parse one chain-control district file.
pub fn parse_chain_controls(
    body: &[u8],
    ctx: &ParseContext,
) -> Result<Vec<NormalizedEvent>, IngestError> {
    let root = decode(body)?;
    Ok(records(&root, "cc")?
        .into_iter()
        .filter_map(|obj| chain_control_event(LenientRecord::new(obj), ctx))
        .collect())
}

fn chain_control_event(r: LenientRecord<'_>, ctx: &ParseContext) -> Option<NormalizedEvent> {
    let table = RouteTable::California;
    let location = clean_text(&r.text(Cc::LocationName));
    let nearby = clean_text(&r.text(Cc::NearbyPlace));
    let route = r.text(Cc::Route);
    let status = clean_text(&r.text(Cc::Status));
    let description = clean_text(&r.text(Cc::StatusDescription));

    let place_text = format!("{location} {nearby} {description}");
    let highway = extract_route_field(&route, table).or_else(|| extract_highway(&place_text, table));
    let direction = r
        .string(Cc::Direction)
        .and_then(|d| extract_direction_field(&d))
        .or_else(|| extract_direction(&place_text));

    let chain_level = match extract_chain_level(&status) {
        ChainLevel::Unknown => extract_chain_level(&description),
        level => level,
    };

    let title = if !location.is_empty() {
        location.clone()
    } else if !nearby.is_empty() {
        nearby.clone()
    } else {
        String::new()
    };
    let status_text = if !description.is_empty() {
        description
    } else {
        status
    };

    if highway.is_none() && title.is_empty() && status_text.is_empty() {
        return None;
    }
    let point = point_from(r.number(Cc::Latitude), r.number(Cc::Longitude));
    if !is_relevant(highway.as_deref(), point, ctx) {
        return None;
    }

    let last_updated_at = parse_pacific(&r.text(Cc::StatusDate), &r.text(Cc::StatusTime))
        .unwrap_or(ctx.generated_at);

    Some(
        NormalizedEvent {
            id: String::new(),
            source: SourceId::CaltransChainControl,
            kind: EventKind::ChainControl,
            title: if title.is_empty() {
                "Chain control".to_string()
            } else {
                title
            },
            status_text,
            highway,
            direction,
            chain_level: Some(chain_level),
            point,
            validity_window: None,
            closure: None,
            encoded_polyline: None,
            last_updated_at,
        }
        .sealed(),
    )
}

/// Parse one lane-closure district file.
pub fn parse_lane_closures(
    body: &[u8],
    ctx: &ParseContext,
) -> Result<Vec<NormalizedEvent>, IngestError> {
    let root = decode(body)?;
    Ok(records(&root, "lcs")?
        .into_iter()
        .filter_map(|obj| lane_closure_event(LenientRecord::new(obj), ctx))
        .collect())
}

fn lane_closure_event(r: LenientRecord<'_>, ctx: &ParseContext) -> Option<NormalizedEvent> {
    let table = RouteTable::California;
    let begin_name = clean_text(&r.text(Lcs::BeginLocationName));
    let end_name = clean_text(&r.text(Lcs::EndLocationName));
    let begin_place = clean_text(&r.text(Lcs::BeginNearbyPlace));
    let end_place = clean_text(&r.text(Lcs::EndNearbyPlace));

    let highway = extract_route_field(&r.text(Lcs::BeginRoute), table)
        .or_else(|| extract_route_field(&r.text(Lcs::EndRoute), table))
        .or_else(|| {
            [&begin_name, &end_name, &begin_place, &end_place]
                .into_iter()
                .find_map(|s| extract_highway(s, table))
        });
    let direction = r
        .string(Lcs::TravelFlowDirection)
        .and_then(|d| extract_direction_field(&d));

    let closure = LaneClosure {
        lanes_closed: r.count(Lcs::LanesClosed),
        total_lanes: r.count(Lcs::TotalExistingLanes),
        closure_type: clean_text(&r.text(Lcs::TypeOfClosure)),
        work_type: clean_text(&r.text(Lcs::TypeOfWork)),
    };

    let start = r.number(Lcs::ClosureStartEpoch).and_then(epoch_to_utc);
    let end = r.number(Lcs::ClosureEndEpoch).and_then(epoch_to_utc);
    let validity_window = (start.is_some() || end.is_some()).then_some(ValidityWindow { start, end });

    let title = match (begin_name.is_empty(), end_name.is_empty()) {
        (false, false) if begin_name != end_name => format!("{begin_name} to {end_name}"),
        (false, _) => begin_name.clone(),
        (true, false) => end_name.clone(),
        (true, true) if !begin_place.is_empty() => begin_place.clone(),
        _ => "Lane closure".to_string(),
    };
    let status_text = closure_status_text(&closure);

    let point = point_from(r.number(Lcs::BeginLatitude), r.number(Lcs::BeginLongitude));
    if !is_relevant(highway.as_deref(), point, ctx) {
        return None;
    }

    Some(
        NormalizedEvent {
            id: String::new(),
            source: SourceId::CaltransLaneClosure,
            kind: EventKind::LaneClosure,
            highway,
            direction,
            title,
            status_text,
            chain_level: None,
            point,
            validity_window,
            encoded_polyline: None,
            last_updated_at: start.or(end).unwrap_or(ctx.generated_at),
            closure: Some(closure),
        }
        .sealed(),
    )
}

/// "2 of 4 lanes closed - Paving", falling back to the closure type.
fn closure_status_text(c: &LaneClosure) -> String {
    let lanes = match (c.lanes_closed, c.total_lanes) {
        (Some(closed), Some(total)) if total > 0 => format!("{closed} of {total} lanes closed"),
        (Some(closed), _) => format!("{closed} lanes closed"),
        _ if !c.closure_type.is_empty() => c.closure_type.clone(),
        _ => "Lane closure".to_string(),
    };
    if c.work_type.is_empty() {
        lanes
    } else {
        format!("{lanes} - {}", c.work_type)
    }
}

fn is_relevant(highway: Option<&str>, point: Option<GeoPoint>, ctx: &ParseContext) -> bool {
    match (highway, point) {
        (Some(hw), _) if RouteTable::California.is_allowed(hw) => true,
        (_, Some(p)) => ctx.bounds.contains(p),
        _ => false,
    }
}

const LOCAL_FORMATS: [&str; 10] = [
    "%m/%d/%y %H:%M",
    "%m/%d/%y %I:%M %p",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// CWWP2 `statusDate` + `statusTime`, given in California local time.
pub fn parse_pacific(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let combined = format!("{} {}", date.trim(), time.trim());
    let combined = combined.trim();
    if combined.is_empty() {
        return None;
    }
    let local = LOCAL_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(combined, f).ok())?;
    let offset_hours = if is_pacific_dst(local) { 7 } else { 8 };
    Some(Utc.from_utc_datetime(&(local + Duration::hours(offset_hours))))
}

/// US daylight time: second Sunday of March 02:00 to first Sunday of
/// November 02:00, local wall clock.
fn is_pacific_dst(local: NaiveDateTime) -> bool {
    let year = local.date().year();
    let at_two = |d: NaiveDate| d.and_hms_opt(2, 0, 0);
    let start = NaiveDate::from_weekday_of_month_opt(year, 3, Weekday::Sun, 2).and_then(at_two);
    let end = NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Sun, 1).and_then(at_two);
    match (start, end) {
        (Some(s), Some(e)) => local >= s && local < e,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Direction;

    fn ctx() -> ParseContext {
        ParseContext::new(Utc.with_ymd_and_hms(2025, 1, 10, 20, 0, 0).unwrap())
    }

    #[test]
    fn pacific_time_handles_standard_and_daylight() {
        let winter = parse_pacific("1/10/2025", "8:30").unwrap();
        assert_eq!(winter, Utc.with_ymd_and_hms(2025, 1, 10, 16, 30, 0).unwrap());
        let summer = parse_pacific("2024-07-01", "08:30:00").unwrap();
        assert_eq!(summer, Utc.with_ymd_and_hms(2024, 7, 1, 15, 30, 0).unwrap());
        let pm = parse_pacific("12/24/24", "3:05 PM").unwrap();
        assert_eq!(pm, Utc.with_ymd_and_hms(2024, 12, 24, 23, 5, 0).unwrap());
        assert!(parse_pacific("", "").is_none());
        assert!(parse_pacific("yesterday", "noon").is_none());
    }

    #[test]
    fn wrapped_chain_control_with_nested_fields() {
        let body = r#"{"data":[{"cc":{
            "index":"1",
            "location":{"locationName":"Kingvale","nearbyPlace":"Soda Springs",
                        "latitude":"39.3167","longitude":"-120.4333",
                        "direction":"East","route":"I-80"},
            "statusData":{"status":"R2","statusDescription":"Chains required except 4WD with snow tires",
                          "statusDate":"01/10/2025","statusTime":"06:15"}
        }}]}"#;
        let evs = parse_chain_controls(body.as_bytes(), &ctx()).unwrap();
        assert_eq!(evs.len(), 1);
        let e = &evs[0];
        assert_eq!(e.highway.as_deref(), Some("I-80"));
        assert_eq!(e.direction, Some(Direction::EB));
        assert_eq!(e.chain_level, Some(ChainLevel::R2));
        assert_eq!(e.title, "Kingvale");
        assert_eq!(e.last_updated_at, Utc.with_ymd_and_hms(2025, 1, 10, 14, 15, 0).unwrap());
    }

    #[test]
    fn lane_closure_window_and_status_text() {
        let body = r#"{"data":[{"lcs":{
            "travelFlowDirection":"Westbound","beginRoute":"050",
            "beginLocationName":"Echo Summit","endLocationName":"Meyers",
            "typeOfClosure":"Lane","typeOfWork":"Paving",
            "lanesClosed":"1","totalExistingLanes":"2",
            "closureStartEpoch":1736496000,"closureEndEpoch":"1736539200000"
        }}]}"#;
        let evs = parse_lane_closures(body.as_bytes(), &ctx()).unwrap();
        assert_eq!(evs.len(), 1);
        let e = &evs[0];
        assert_eq!(e.highway.as_deref(), Some("US-50"));
        assert_eq!(e.direction, Some(Direction::WB));
        assert_eq!(e.title, "Echo Summit to Meyers");
        assert_eq!(e.status_text, "1 of 2 lanes closed - Paving");
        let w = e.validity_window.unwrap();
        assert_eq!(w.start, Utc.timestamp_opt(1_736_496_000, 0).single());
        assert_eq!(w.end, Utc.timestamp_opt(1_736_539_200, 0).single());
        assert_eq!(Some(e.last_updated_at), w.start);
    }

    #[test]
    fn unexpected_shapes_are_parse_errors() {
        assert!(parse_chain_controls(b"not json", &ctx()).is_err());
        assert!(parse_lane_closures(br#"{"status":"ok"}"#, &ctx()).is_err());
        assert!(parse_chain_controls(b"[]", &ctx()).unwrap().is_empty());
    }
}
