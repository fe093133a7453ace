// src/ingest/mod.rs
pub mod cache;
pub mod config;
pub mod extract;
pub mod fields;
pub mod providers;
pub mod scheduler;
pub mod types;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_cycles_total", "Ingestion cycles started.");
        describe_counter!(
            "ingest_source_updated_total",
            "Sources whose events were replaced by a fresh fetch."
        );
        describe_counter!(
            "ingest_source_skipped_total",
            "Sources skipped because their minimum interval had not elapsed."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Source fetch/parse failures and timeouts."
        );
        describe_counter!("ingest_events_total", "Normalized events produced by parsers.");
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!(
            "ingest_last_cycle_ts",
            "Unix ts when the last ingestion cycle finished."
        );
    });
}

/// Clean feed text for display and matching: markup tags become a space,
/// HTML entities are decoded, whitespace runs collapse, ends are trimmed.
pub fn clean_text(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    // 1) Strip tags (before decoding, so `&lt;b&gt;` stays literal text)
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?s)<[^>]*>").unwrap());
    let out = re_tags.replace_all(s, " ");

    // 2) HTML entity decode
    let out = html_escape::decode_html_entities(&out);

    // 3) Collapse whitespace (incl. NBSP from &nbsp;)
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"[\s\u{00A0}]+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}
