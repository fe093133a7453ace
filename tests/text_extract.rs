// tests/text_extract.rs
use chain_map_aggregator::ingest::clean_text;
use chain_map_aggregator::ingest::extract::{
    extract_chain_level, extract_direction, extract_direction_field, extract_highway,
    extract_route_field, RouteTable,
};
use chain_map_aggregator::ingest::types::{ChainLevel, Direction};

#[test]
fn clean_text_strips_markup_and_entities() {
    assert_eq!(clean_text(""), "");
    assert_eq!(
        clean_text("  <p>Chains&nbsp;required</p>\n\n<br/>for &quot;all&quot; vehicles &#39;now&#39; "),
        "Chains required for \"all\" vehicles 'now'"
    );
    assert_eq!(clean_text("R-2 &amp; R-3"), "R-2 & R-3");
}

#[test]
fn headline_scenario_fields() {
    let text = "EB I-80 Chain Control level R-2 Chains required for all vehicles except 4WD.";
    assert_eq!(
        extract_highway(text, RouteTable::California).as_deref(),
        Some("I-80")
    );
    assert_eq!(extract_direction(text), Some(Direction::EB));
    assert_eq!(extract_chain_level(text), ChainLevel::R2);
}

#[test]
fn chain_level_precedence() {
    assert_eq!(extract_chain_level("NO CHAIN controls; R-2 lifted"), ChainLevel::R0);
    assert_eq!(extract_chain_level("No restrictions"), ChainLevel::R0);
    assert_eq!(extract_chain_level("R1"), ChainLevel::R1);
    assert_eq!(extract_chain_level("R - 3 in effect"), ChainLevel::R3);
    assert_eq!(extract_chain_level("R/C"), ChainLevel::RC);
    assert_eq!(extract_chain_level("RC chain controls"), ChainLevel::RC);
    assert_eq!(extract_chain_level("ARC lights"), ChainLevel::Unknown);
    assert_eq!(extract_chain_level("ESC over the summit"), ChainLevel::Esc);
    assert_eq!(extract_chain_level("HT only"), ChainLevel::HT);
    assert_eq!(extract_chain_level("Snow flurries"), ChainLevel::Unknown);
    assert_eq!(extract_chain_level(""), ChainLevel::Unknown);
}

#[test]
fn route_tables_differ_by_region() {
    assert_eq!(
        extract_highway("SR 28 near Tahoe City", RouteTable::California).as_deref(),
        Some("CA-28")
    );
    assert_eq!(
        extract_highway("SR 28 near Incline", RouteTable::Nevada).as_deref(),
        Some("NV-28")
    );
    assert_eq!(
        extract_highway("SR-207 Kingsbury Grade", RouteTable::Nevada).as_deref(),
        Some("SR-207")
    );
    assert_eq!(extract_highway("Main Street", RouteTable::California), None);
    assert_eq!(extract_highway("I-805 at Mission Valley", RouteTable::California), None);
    assert_eq!(extract_highway("US 505", RouteTable::California), None);
    assert!(RouteTable::Nevada.is_allowed("nv-431"));
    assert!(!RouteTable::California.is_allowed("US-395"));
}

#[test]
fn structured_route_and_direction_fields() {
    let ca = RouteTable::California;
    assert_eq!(extract_route_field("080", ca).as_deref(), Some("I-80"));
    assert_eq!(extract_route_field("88", ca).as_deref(), Some("CA-88"));
    assert_eq!(extract_route_field("US-50", ca).as_deref(), Some("US-50"));
    assert_eq!(extract_route_field("5", ca), None);
    assert_eq!(extract_route_field("", ca), None);

    assert_eq!(extract_direction_field("East"), Some(Direction::EB));
    assert_eq!(extract_direction_field("s"), Some(Direction::SB));
    assert_eq!(extract_direction_field("Northbound"), Some(Direction::NB));
    assert_eq!(extract_direction_field("Both"), None);
    assert_eq!(extract_direction("westbound at Meyers"), Some(Direction::WB));
}
