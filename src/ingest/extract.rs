//! Pattern classifiers over cleaned feed text: canonical route codes, compass
//! directions, chain-control levels.
//!
//! Route tables are per region because state-route shorthand is ambiguous
//! across the state line ("SR 28" is CA-28 in Caltrans text and NV-28 in
//! Nevada 511 text).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ingest::types::{ChainLevel, Direction};

struct RoutePattern {
    re: Regex,
    code: &'static str,
}

fn compile(table: &[(&str, &'static str)]) -> Vec<RoutePattern> {
    table
        .iter()
        .map(|(pat, code)| RoutePattern {
            re: Regex::new(pat).expect("route regex"),
            code,
        })
        .collect()
}

// California state-route prefixes: CA, SR, Hwy, Hwy., Highway, State Route.
static CALIFORNIA: Lazy<Vec<RoutePattern>> = Lazy::new(|| {
    compile(&[
        (r"(?i)\b(?:I|INTERSTATE)\s*-?\s*80\b", "I-80"),
        (r"(?i)\bU\.?\s*S\.?\s*-?\s*50\b", "US-50"),
        (r"(?i)\bU\.?\s*S\.?\s*-?\s*395\b", "US-395"),
        (r"(?i)\b(?:CA|SR|HWY\.?|HIGHWAY|STATE\s+ROUTE)\s*-?\s*88\b", "CA-88"),
        (r"(?i)\b(?:CA|SR|HWY\.?|HIGHWAY|STATE\s+ROUTE)\s*-?\s*89\b", "CA-89"),
        (r"(?i)\b(?:CA|SR|HWY\.?|HIGHWAY|STATE\s+ROUTE)\s*-?\s*28\b", "CA-28"),
        (r"(?i)\b(?:CA|SR|HWY\.?|HIGHWAY|STATE\s+ROUTE)\s*-?\s*267\b", "CA-267"),
    ])
});

static NEVADA: Lazy<Vec<RoutePattern>> = Lazy::new(|| {
    compile(&[
        (r"(?i)\b(?:I|INTERSTATE)\s*-?\s*80\b", "I-80"),
        (r"(?i)\bU\.?\s*S\.?\s*-?\s*395\b", "US-395"),
        (r"(?i)\bU\.?\s*S\.?\s*-?\s*50\b", "US-50"),
        (r"(?i)\b(?:NV|SR)\s*-?\s*431\b", "NV-431"),
        (r"(?i)\b(?:NV|SR)\s*-?\s*28\b", "NV-28"),
        (r"(?i)\b(?:NV|SR)\s*-?\s*267\b", "NV-267"),
        (r"(?i)\b(?:SR|NV)\s*-?\s*207\b", "SR-207"),
    ])
});

/// Which route table a feed's text should be read against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTable {
    California,
    Nevada,
}

impl RouteTable {
    fn patterns(self) -> &'static [RoutePattern] {
        match self {
            RouteTable::California => &CALIFORNIA,
            RouteTable::Nevada => &NEVADA,
        }
    }

    /// Route codes a feed of this region keeps without further checks.
    pub fn allow_list(self) -> &'static [&'static str] {
        match self {
            RouteTable::California => &["I-80", "US-50", "CA-88", "CA-89", "CA-28", "CA-267"],
            RouteTable::Nevada => &["I-80", "US-395", "NV-431", "NV-28", "NV-267", "SR-207"],
        }
    }

    pub fn is_allowed(self, highway: &str) -> bool {
        self.allow_list()
            .iter()
            .any(|h| h.eq_ignore_ascii_case(highway))
    }
}

/// First canonical route code found in `text`.
pub fn extract_highway(text: &str, table: RouteTable) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    table
        .patterns()
        .iter()
        .find(|p| p.re.is_match(text))
        .map(|p| p.code.to_string())
}

/// Like [`extract_highway`], but also accepts the bare route numbers some
/// structured feeds put in their `route` field ("80", "50").
pub fn extract_route_field(field: &str, table: RouteTable) -> Option<String> {
    if let Some(hw) = extract_highway(field, table) {
        return Some(hw);
    }
    let digits = field.trim();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let digits = digits.trim_start_matches('0');
    table
        .allow_list()
        .iter()
        .find(|code| code.rsplit('-').next() == Some(digits))
        .map(|code| code.to_string())
}

static RE_DIR_SHORT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(EB|WB|NB|SB)\b").unwrap());
static RE_DIR_LONG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(EASTBOUND|WESTBOUND|NORTHBOUND|SOUTHBOUND)\b").unwrap());

fn direction_from_word(word: &str) -> Option<Direction> {
    match word.to_ascii_uppercase().as_str() {
        "EB" | "EASTBOUND" => Some(Direction::EB),
        "WB" | "WESTBOUND" => Some(Direction::WB),
        "NB" | "NORTHBOUND" => Some(Direction::NB),
        "SB" | "SOUTHBOUND" => Some(Direction::SB),
        _ => None,
    }
}

/// Compass direction mentioned in free text. Abbreviations win over words.
pub fn extract_direction(text: &str) -> Option<Direction> {
    if let Some(c) = RE_DIR_SHORT.captures(text) {
        return direction_from_word(&c[1]);
    }
    RE_DIR_LONG
        .captures(text)
        .and_then(|c| direction_from_word(&c[1]))
}

/// Direction from a dedicated field, which may hold "East", "E", "Eastbound".
pub fn extract_direction_field(field: &str) -> Option<Direction> {
    if let Some(d) = extract_direction(field) {
        return Some(d);
    }
    match field.trim().to_ascii_uppercase().as_str() {
        "E" | "EAST" => Some(Direction::EB),
        "W" | "WEST" => Some(Direction::WB),
        "N" | "NORTH" => Some(Direction::NB),
        "S" | "SOUTH" => Some(Direction::SB),
        _ => None,
    }
}

static RE_NO_CHAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bNO\s+CHAIN|\bNO\s+RESTRICTIONS\b").unwrap());
static RE_R_LEVEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bR\s*-?\s*([0-3])\b").unwrap());
static RE_RC: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bR\s*/\s*C\b|\bRC\b").unwrap());
static RE_ESC: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bESC\b").unwrap());
static RE_HT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bHT\b").unwrap());

/// Chain-control level. Explicit "no chain" phrasing is checked before any
/// level digits so "No chain controls, R-2 lifted" reads as R-0.
pub fn extract_chain_level(text: &str) -> ChainLevel {
    if RE_NO_CHAIN.is_match(text) {
        return ChainLevel::R0;
    }
    if let Some(c) = RE_R_LEVEL.captures(text) {
        return match &c[1] {
            "0" => ChainLevel::R0,
            "1" => ChainLevel::R1,
            "2" => ChainLevel::R2,
            _ => ChainLevel::R3,
        };
    }
    if RE_RC.is_match(text) {
        return ChainLevel::RC;
    }
    if RE_ESC.is_match(text) {
        return ChainLevel::Esc;
    }
    if RE_HT.is_match(text) {
        return ChainLevel::HT;
    }
    ChainLevel::Unknown
}
