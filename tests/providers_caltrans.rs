// tests/providers_caltrans.rs
use chain_map_aggregator::ingest::providers::{FeedParser, FeedProvider, ParseContext};
use chain_map_aggregator::ingest::types::{
    ChainLevel, Direction, EventKind, GeoPoint, SourceId, SourceProvider,
};
use chrono::{DateTime, TimeZone, Utc};

const QUICKMAP_KML: &str = include_str!("fixtures/quickmap_cc.kml");
const CC_JSON: &str = include_str!("fixtures/cwwp2_cc_d03.json");
const LCS_JSON: &str = include_str!("fixtures/cwwp2_lcs_d03.json");

fn noon_pst() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 10, 20, 0, 0).unwrap()
}

#[tokio::test]
async fn quickmap_fixture_keeps_sierra_placemarks() {
    let p = FeedProvider::from_fixture(FeedParser::CaltransKml, QUICKMAP_KML);
    assert_eq!(p.source(), SourceId::CaltransQuickmap);

    let evs = p.fetch_latest(noon_pst()).await.unwrap();
    assert_eq!(evs.len(), 3, "Grapevine placemark is outside the area");

    let donner = &evs[0];
    assert_eq!(donner.kind, EventKind::ChainControl);
    assert_eq!(donner.highway.as_deref(), Some("I-80"));
    assert_eq!(donner.direction, Some(Direction::EB));
    assert_eq!(donner.chain_level, Some(ChainLevel::R2));
    assert_eq!(donner.title, "EB I-80 Chain Control R-2");
    assert!(donner.status_text.starts_with("Kingvale to Donner Lake Interchange. Chains required"));
    assert_eq!(donner.last_updated_at, noon_pst());

    let echo = &evs[1];
    assert_eq!(echo.highway.as_deref(), Some("US-50"));
    assert_eq!(echo.direction, Some(Direction::WB));
    assert_eq!(echo.chain_level, Some(ChainLevel::R1));
    assert_eq!(echo.point, Some(GeoPoint { lat: 38.8127, lon: -120.0286 }));

    let checkpoint = &evs[2];
    assert_eq!(checkpoint.highway, None);
    assert_eq!(checkpoint.chain_level, Some(ChainLevel::R0));
}

#[tokio::test]
async fn quickmap_ids_are_stable_across_fetches() {
    let p = FeedProvider::from_fixture(FeedParser::CaltransKml, QUICKMAP_KML);
    let a = p.fetch_latest(noon_pst()).await.unwrap();
    let b = p
        .fetch_latest(noon_pst() + chrono::Duration::minutes(5))
        .await
        .unwrap();
    let ids_a: Vec<_> = a.iter().map(|e| e.id.clone()).collect();
    let ids_b: Vec<_> = b.iter().map(|e| e.id.clone()).collect();
    assert_eq!(ids_a, ids_b);
    assert!(ids_a.iter().all(|id| id.len() == 64));
}

#[tokio::test]
async fn chain_control_fixture() {
    let p = FeedProvider::from_fixture(FeedParser::CaltransChainControl, CC_JSON);
    let evs = p.fetch_latest(noon_pst()).await.unwrap();
    assert_eq!(evs.len(), 2, "district 7 record is out of area");

    assert!(evs.iter().all(|e| e.source == SourceId::CaltransChainControl));

    let kingvale = &evs[0];
    assert_eq!(kingvale.title, "Kingvale");
    assert_eq!(kingvale.highway.as_deref(), Some("I-80"));
    assert_eq!(kingvale.direction, Some(Direction::EB));
    assert_eq!(kingvale.chain_level, Some(ChainLevel::R2));
    assert_eq!(
        kingvale.last_updated_at,
        Utc.with_ymd_and_hms(2025, 1, 10, 14, 15, 0).unwrap()
    );
    assert_eq!(kingvale.point, Some(GeoPoint { lat: 39.3167, lon: -120.4333 }));

    let twin = &evs[1];
    assert_eq!(twin.highway.as_deref(), Some("US-50"));
    assert_eq!(twin.direction, Some(Direction::WB));
    assert_eq!(twin.chain_level, Some(ChainLevel::R1));
    assert_eq!(twin.status_text, "Chains or snow tires required");
}

#[tokio::test]
async fn lane_closure_fixture() {
    let p = FeedProvider::from_fixture(FeedParser::CaltransLaneClosure, LCS_JSON);
    let evs = p.fetch_latest(noon_pst()).await.unwrap();
    assert_eq!(evs.len(), 3);
    assert!(evs.iter().all(|e| e.kind == EventKind::LaneClosure));

    let echo = &evs[0];
    assert_eq!(echo.highway.as_deref(), Some("US-50"));
    assert_eq!(echo.title, "Echo Summit to Meyers");
    assert_eq!(echo.status_text, "1 of 2 lanes closed - Paving");
    assert!(echo.is_active_at(noon_pst()));

    let emerald = &evs[1];
    assert_eq!(emerald.highway.as_deref(), Some("CA-89"));
    assert_eq!(emerald.title, "Emerald Bay");
    assert_eq!(emerald.direction, Some(Direction::NB));
    let window = emerald.validity_window.unwrap();
    assert!(window.start.is_some());
    assert_eq!(window.end, None, "\"Not Reported\" end means open-ended");
    assert!(emerald.closure.as_ref().unwrap().is_full_closure());

    let soda = &evs[2];
    assert_eq!(soda.highway.as_deref(), Some("I-80"));
    assert!(!soda.is_active_at(noon_pst()), "starts the next day");
}

#[test]
fn parser_errors_on_wrong_payload() {
    let ctx = ParseContext::new(noon_pst());
    assert!(FeedParser::CaltransKml.parse(CC_JSON.as_bytes(), &ctx).is_err());
    assert!(FeedParser::CaltransChainControl
        .parse(QUICKMAP_KML.as_bytes(), &ctx)
        .is_err());
    assert!(FeedParser::CaltransLaneClosure
        .parse(br#"{"error":"maintenance"}"#, &ctx)
        .is_err());
}

#[tokio::test]
async fn multiple_district_payloads_are_concatenated() {
    use chain_map_aggregator::ingest::providers::StaticFetcher;
    use std::sync::Arc;

    let fetcher = StaticFetcher::from_payloads(vec![
        CC_JSON.as_bytes().to_vec(),
        br#"{"data":[]}"#.to_vec(),
        CC_JSON.as_bytes().to_vec(),
    ]);
    let p = FeedProvider::new(FeedParser::CaltransChainControl, Arc::new(fetcher));
    let evs = p.fetch_latest(noon_pst()).await.unwrap();
    assert_eq!(evs.len(), 4);
}
