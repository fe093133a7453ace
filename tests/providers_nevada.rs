// tests/providers_nevada.rs
use std::sync::Arc;

use chain_map_aggregator::error::IngestError;
use chain_map_aggregator::ingest::providers::{
    FeedParser, FeedProvider, ParseContext, UnconfiguredFetcher,
};
use chain_map_aggregator::ingest::types::{EventKind, SourceId, SourceProvider};
use chrono::{TimeZone, Utc};

const NV_JSON: &str = include_str!("fixtures/nevada_511.json");

#[tokio::test]
async fn road_conditions_fixture() {
    let now = Utc.with_ymd_and_hms(2025, 1, 10, 20, 0, 0).unwrap();
    let p = FeedProvider::from_fixture(FeedParser::Nevada511, NV_JSON);
    assert_eq!(p.source(), SourceId::Nevada511);

    let evs = p.fetch_latest(now).await.unwrap();
    assert_eq!(evs.len(), 2, "I-15 Las Vegas is not a Tahoe route");
    assert!(evs.iter().all(|e| e.kind == EventKind::RoadCondition));

    let rose = &evs[0];
    assert_eq!(rose.highway.as_deref(), Some("NV-431"));
    assert_eq!(rose.title, "SR-431 - Mt Rose Summit to Incline Village");
    assert_eq!(rose.status_text, "Snow covered; Chains required; Icy spots");
    assert_eq!(rose.chain_level, None);
    assert_eq!(rose.last_updated_at, Utc.timestamp_opt(1_736_530_000, 0).unwrap());
    assert_eq!(rose.encoded_polyline.as_deref(), Some("ohgmFd~kvUpAkBzCsE"));

    let verdi = &evs[1];
    assert_eq!(verdi.highway.as_deref(), Some("I-80"));
    assert_eq!(verdi.status_text, "Dry");
    assert_eq!(verdi.encoded_polyline, None);
}

#[test]
fn bare_array_and_alternate_keys() {
    let now = Utc.with_ymd_and_hms(2025, 1, 10, 20, 0, 0).unwrap();
    let ctx = ParseContext::new(now);
    let body = br#"[{"roadway":"NV-28","location":"Sand Harbor","status":"Wet","secondaryCondition":"Slushy"}]"#;
    let evs = FeedParser::Nevada511.parse(body, &ctx).unwrap();
    assert_eq!(evs.len(), 1);
    assert_eq!(evs[0].highway.as_deref(), Some("NV-28"));
    assert_eq!(evs[0].status_text, "Wet; Slushy");
    assert_eq!(evs[0].last_updated_at, now);

    assert!(FeedParser::Nevada511.parse(br#"{"message":"no key"}"#, &ctx).is_err());
}

#[tokio::test]
async fn missing_api_key_fails_every_fetch() {
    let p = FeedProvider::new(
        FeedParser::Nevada511,
        Arc::new(UnconfiguredFetcher::new("NEVADA_511_API_KEY is not set")),
    );
    let err = p.fetch_latest(Utc::now()).await.unwrap_err();
    assert!(matches!(err, IngestError::Config(_)));
    assert!(err.to_string().contains("NEVADA_511_API_KEY"));
}
