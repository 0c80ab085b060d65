use std::fs;
use wende::aggregator::AggregatorSettings;
use wende::config::{Config, LocationConfig};
use wende::dashboard::DashboardSettings;

#[test]
fn save_and_load_yaml_roundtrip() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("config.yaml");

    let mut cfg = Config::default();
    cfg.sources.smard.region = "50Hertz".to_string();
    cfg.sources.open_meteo.locations = vec![LocationConfig {
        name: "Cottbus".to_string(),
        latitude: 51.76,
        longitude: 14.33,
    }];
    cfg.target.year = 2035;
    cfg.logging.file = path.with_extension("log").to_string_lossy().to_string();

    cfg.save_to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();

    assert_eq!(loaded.sources.smard.region, "50Hertz");
    assert_eq!(loaded.sources.open_meteo.locations.len(), 1);
    assert_eq!(loaded.sources.open_meteo.locations[0].name, "Cottbus");
    assert_eq!(loaded.target.year, 2035);
    assert_eq!(loaded.logging.file, cfg.logging.file);
    assert!(loaded.validate().is_ok());
}

#[test]
fn api_key_is_read_from_yaml() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(tmp.path(), "sources:\n  entsoe:\n    api_key: abc-123\n").unwrap();
    let cfg = Config::from_file(tmp.path()).unwrap();
    assert_eq!(cfg.sources.entsoe.api_key, "abc-123");
    assert_eq!(cfg.sources.entsoe.domain, "10Y1001A1001A83F");
}

#[test]
fn config_validation_errors() {
    let mut cfg = Config::default();

    cfg.refresh_interval_secs = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.sources.retry_attempts = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.sources.entsoe.psr_types.clear();
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.sources.open_meteo.locations[0].latitude = 123.0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.aggregation.staleness_horizon_days = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.cache.today_ttl_secs = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.target.share = 1.2;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.web.port = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn validation_names_the_field() {
    let mut cfg = Config::default();
    cfg.timezone = "Europe/Atlantis".to_string();
    let msg = cfg.validate().unwrap_err().to_string();
    assert!(msg.contains("Validation error"));
    assert!(msg.contains("timezone"));
}

#[test]
fn from_file_with_invalid_yaml_fails() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(tmp.path(), b"bad: [unclosed").unwrap();
    let err = Config::from_file(tmp.path()).unwrap_err();
    let msg = format!("{}", err);
    assert!(msg.contains("Serialization error"));
}

#[test]
fn from_missing_file_is_io_error() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let err = Config::from_file(tmp_dir.path().join("nope.yaml")).unwrap_err();
    assert!(format!("{}", err).contains("I/O error"));
}

#[test]
fn oversized_durations_are_rejected_not_panicking() {
    let mut cfg = Config::default();
    cfg.aggregation.staleness_horizon_days = 1_000_000_000_000_000;
    let msg = cfg.validate().unwrap_err().to_string();
    assert!(msg.contains("aggregation.staleness_horizon_days"));
    // Settings built from an unvalidated config fail instead of panicking
    assert!(AggregatorSettings::from_config(&cfg).is_err());
    assert!(DashboardSettings::from_config(&cfg).is_err());

    cfg = Config::default();
    cfg.aggregation.staleness_horizon_days = 366;
    assert!(cfg.validate().is_ok());
    cfg.aggregation.staleness_horizon_days = 367;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.cache.today_ttl_secs = i64::MAX;
    assert!(cfg.validate().is_err());
    assert!(DashboardSettings::from_config(&cfg).is_err());

    cfg.cache.today_ttl_secs = 7 * 24 * 3600;
    assert!(cfg.validate().is_ok());
}
