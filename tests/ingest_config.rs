// tests/ingest_config.rs
use chain_map_aggregator::ingest::config::{load_ingest_config_default, load_ingest_config_from};
use chain_map_aggregator::ingest::providers::{self, Bounds};
use chain_map_aggregator::ingest::types::{SourceId, SourceProvider};
use std::path::PathBuf;
use std::time::Duration;
use std::{env, fs};

const ENV_KEYS: [&str; 5] = [
    "INGEST_CONFIG_PATH",
    "NEVADA_511_API_KEY",
    "INGEST_TOKEN",
    "INGEST_INTERVAL_SECS",
    "CACHE_DIR",
];

fn clear_env() {
    for k in ENV_KEYS {
        env::remove_var(k);
    }
}

#[serial_test::serial]
#[test]
fn parse_toml_and_json_paths() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("ingest.toml");
    fs::write(
        &p_toml,
        r#"
cycle_deadline_secs = 10
cache_dir = "/var/cache/chains"

[bounds]
minLon = -121.0
maxLon = -119.0
minLat = 38.0
maxLat = 40.0

[sources.caltrans_quickmap]
urls = ["http://localhost:9000/cc.kml"]
"#,
    )
    .unwrap();
    let cfg = load_ingest_config_from(&p_toml).unwrap();
    assert_eq!(cfg.cycle_deadline(), Duration::from_secs(10));
    assert_eq!(cfg.cache_dir, PathBuf::from("/var/cache/chains"));
    assert_eq!(cfg.bounds.min_lon, -121.0);
    assert_eq!(
        cfg.source(SourceId::CaltransQuickmap).urls,
        vec!["http://localhost:9000/cc.kml".to_string()]
    );
    assert_eq!(cfg.interval_secs, 60, "unset fields keep defaults");

    let p_json = dir.path().join("ingest.json");
    fs::write(
        &p_json,
        r#"{"ingest_token":"from-file","sources":{"nevada_511":{"min_interval_secs":600}}}"#,
    )
    .unwrap();
    let cfg = load_ingest_config_from(&p_json).unwrap();
    assert_eq!(cfg.ingest_token.as_deref(), Some("from-file"));
    assert_eq!(cfg.source(SourceId::Nevada511).min_interval(), Duration::from_secs(600));
    assert_eq!(cfg.bounds, Bounds::SIERRA);

    let p_bad = dir.path().join("bad.toml");
    fs::write(&p_bad, "interval_secs = \"soon\"").unwrap();
    assert!(load_ingest_config_from(&p_bad).is_err());
}

#[serial_test::serial]
#[test]
fn env_overrides_file_values() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("ingest.toml");
    fs::write(
        &p,
        "interval_secs = 90\nnevada_api_key = \"ENV\"\ningest_token = \"file-token\"\n",
    )
    .unwrap();

    env::set_var("NEVADA_511_API_KEY", "  nv-key ");
    env::set_var("INGEST_TOKEN", "env-token");
    env::set_var("INGEST_INTERVAL_SECS", "45");
    env::set_var("CACHE_DIR", "/tmp/chain-cache");

    let cfg = load_ingest_config_from(&p).unwrap();
    assert_eq!(cfg.nevada_api_key.as_deref(), Some("nv-key"));
    assert_eq!(cfg.ingest_token.as_deref(), Some("env-token"));
    assert_eq!(cfg.interval(), Duration::from_secs(45));
    assert_eq!(cfg.cache_dir, PathBuf::from("/tmp/chain-cache"));

    env::set_var("INGEST_INTERVAL_SECS", "often");
    assert!(load_ingest_config_from(&p).is_err());
    clear_env();
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    clear_env();
    // Isolate the CWD so the test never reads a real config/ directory.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    // 1) Nothing on disk → defaults
    let cfg = load_ingest_config_default().unwrap();
    assert_eq!(cfg.interval_secs, 60);
    assert_eq!(cfg.nevada_api_key, None);
    assert_eq!(cfg.source(SourceId::CaltransChainControl).urls.len(), 2);

    // 2) ./config/ingest.json, then ./config/ingest.toml wins over it
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(cfg_dir.join("ingest.json"), r#"{"interval_secs": 30}"#).unwrap();
    assert_eq!(load_ingest_config_default().unwrap().interval_secs, 30);
    fs::write(cfg_dir.join("ingest.toml"), "interval_secs = 20").unwrap();
    assert_eq!(load_ingest_config_default().unwrap().interval_secs, 20);

    // 3) INGEST_CONFIG_PATH has priority; a dangling path is an error
    let p_env = tmp.path().join("custom.json");
    fs::write(&p_env, r#"{"interval_secs": 5}"#).unwrap();
    env::set_var("INGEST_CONFIG_PATH", p_env.display().to_string());
    assert_eq!(load_ingest_config_default().unwrap().interval_secs, 5);
    env::set_var("INGEST_CONFIG_PATH", tmp.path().join("nope.toml").display().to_string());
    assert!(load_ingest_config_default().is_err());
    env::remove_var("INGEST_CONFIG_PATH");

    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn providers_follow_enabled_sources() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("ingest.toml");
    fs::write(
        &p,
        r#"
[sources.caltrans_lane_closure]
enabled = false

[sources.caltrans_quickmap]
enabled = false
"#,
    )
    .unwrap();
    let cfg = load_ingest_config_from(&p).unwrap();
    let built = providers::from_config(&cfg).unwrap();
    let ids: Vec<SourceId> = built.iter().map(|(p, _)| p.source()).collect();
    assert_eq!(ids, vec![SourceId::CaltransChainControl, SourceId::Nevada511]);
    assert_eq!(built[0].1, Duration::from_secs(60));
    assert_eq!(built[1].1, Duration::from_secs(120));
}
