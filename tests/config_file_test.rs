//! The shipped configuration file.

use insole_logger::config::{ClockSetPolicy, LoggerConfig, DEFAULT_CONFIG_PATH};
use std::path::Path;

#[test]
fn test_shipped_config_matches_reference_defaults() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_PATH);
    assert!(path.exists(), "missing {}", path.display());

    let config = LoggerConfig::load_from(&path).unwrap();
    config.validate().unwrap();

    let defaults = LoggerConfig::default();
    assert_eq!(config.channels, defaults.channels);
    assert_eq!(config.acquisition.sample_period_ms, 10);
    assert_eq!(config.acquisition.sync_period_ms, 1000);
    assert_eq!(config.network.port, 23);
    assert_eq!(config.clock.set_policy, ClockSetPolicy::Always);
    assert!(config.network.client_timeout_ms.is_none());
}

#[test]
fn test_shipped_config_spells_out_channels_and_clock() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_PATH);
    let text = std::fs::read_to_string(path).unwrap();
    let table: toml::Table = text.parse().unwrap();

    let channels = table["channels"].as_array().unwrap();
    assert_eq!(channels.len(), 10);
    assert_eq!(channels[9]["name"].as_str(), Some("f5RV"));
    assert_eq!(channels[9]["pin"].as_integer(), Some(9));
    assert!(channels.iter().all(|c| c.get("slope").is_some()));

    assert_eq!(table["clock"]["set_policy"].as_str(), Some("always"));
}
