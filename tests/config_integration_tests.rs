//! Integration tests for ConfigManager and configuration file handling
//!
//! These tests verify:
//! - Configuration loading and saving
//! - Defaults for missing files and missing keys
//! - Environment overrides layered over the YAML file
//! - Invalid YAML is reported, not silently replaced

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use torrent_control::config::CLIENT_CONFIG_FILE;
use torrent_control::{BridgeConfig, ClientConfig, ConfigManager};

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

fn manager_without_env(config_path: &Utf8Path) -> ConfigManager {
    ConfigManager::new(config_path)
        .unwrap()
        .with_env_source(config::Map::new())
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.config_dir(), &config_path);
}

#[test]
fn test_config_dir_created_if_missing() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let nested = config_path.join("nested").join("conf");

    let manager = ConfigManager::new(&nested).unwrap();

    assert!(nested.exists());
    assert_eq!(manager.client_config_path(), nested.join(CLIENT_CONFIG_FILE));
}

#[test]
fn test_load_default_client_config() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = manager_without_env(&config_path);

    let config = manager.load_client_config().unwrap();

    assert_eq!(config.state_file, "state.bin");
    assert_eq!(config.log_dir, "logs");
    assert!(!config.debug);
    assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
}

#[test]
fn test_partial_file_fills_defaults() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(
        config_path.join(CLIENT_CONFIG_FILE),
        "download_dir: /srv/torrents\nshutdown_timeout_secs: 12\n",
    )
    .unwrap();
    let manager = manager_without_env(&config_path);

    let config = manager.load_client_config().unwrap();

    assert_eq!(config.download_dir, "/srv/torrents");
    assert_eq!(config.shutdown_timeout_secs, 12);
    assert_eq!(config.state_file, "state.bin");
}

#[test]
fn test_environment_overrides_file() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(
        config_path.join(CLIENT_CONFIG_FILE),
        "debug: false\nstate_file: from-file.bin\n",
    )
    .unwrap();

    let mut vars = config::Map::new();
    vars.insert("TORRENT_CONTROL_DEBUG".to_string(), "true".to_string());
    vars.insert(
        "TORRENT_CONTROL_SHUTDOWN_TIMEOUT_SECS".to_string(),
        "30".to_string(),
    );
    let manager = ConfigManager::new(&config_path)
        .unwrap()
        .with_env_source(vars);

    let config = manager.load_client_config().unwrap();

    assert!(config.debug);
    assert_eq!(config.shutdown_timeout_secs, 30);
    assert_eq!(config.state_file, "from-file.bin");
}

#[test]
fn test_save_and_load_client_config() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = manager_without_env(&config_path);

    let mut config = manager.load_client_config().unwrap();
    config.download_dir = Utf8PathBuf::from("/home/user/Downloads");
    config.state_file = Utf8PathBuf::from("session/state.bin");
    manager.save_client_config(&config).unwrap();

    let loaded = manager.load_client_config().unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_invalid_yaml_is_an_error() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(
        config_path.join(CLIENT_CONFIG_FILE),
        "shutdown_timeout_secs: [not, a, number\n",
    )
    .unwrap();
    let manager = manager_without_env(&config_path);

    assert!(manager.load_client_config().is_err());
}

#[test]
fn test_bridge_config_from_resolved_client_config() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = manager_without_env(&config_path);
    let config = ClientConfig {
        shutdown_timeout_secs: 2,
        ..ClientConfig::default()
    };

    let bridge_config = BridgeConfig {
        state_file: manager.resolve(&config.state_file),
        ..BridgeConfig::from(&config)
    };

    assert_eq!(bridge_config.state_file, config_path.join("state.bin"));
    assert_eq!(bridge_config.shutdown_timeout, Duration::from_secs(2));
}
