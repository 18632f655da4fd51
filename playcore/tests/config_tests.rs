//! Integration tests for player configuration loading
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.

use playcore::{Error, PlayerConfig};
use playcore_common::config::CONFIG_ENV_VAR;
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

#[test]
#[serial]
fn test_load_from_env_var() {
    let file = write_config("watchdog_interval_ms = 40\nsteady_buffer_ms = 3000\n");
    env::set_var(CONFIG_ENV_VAR, file.path());

    let config = PlayerConfig::load(None).unwrap();
    assert_eq!(config.watchdog_interval_ms, 40);
    assert_eq!(config.steady_buffer_ms, 3_000);
    // Unset keys keep their defaults
    assert_eq!(config.first_playback_buffer_ms, 500);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_explicit_path_beats_env_var() {
    let from_env = write_config("watchdog_interval_ms = 40\n");
    let explicit = write_config("watchdog_interval_ms = 75\n");
    env::set_var(CONFIG_ENV_VAR, from_env.path());

    let config = PlayerConfig::load(Some(explicit.path().to_path_buf())).unwrap();
    assert_eq!(config.watchdog_interval_ms, 75);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_file_uses_defaults() {
    env::set_var(CONFIG_ENV_VAR, "/nonexistent/playcore/config.toml");

    let config = PlayerConfig::load(None).unwrap();
    assert_eq!(config, PlayerConfig::default());

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_inconsistent_thresholds_rejected() {
    let file = write_config("min_buffer_ms = 900\nfirst_playback_buffer_ms = 500\n");

    let result = PlayerConfig::load(Some(file.path().to_path_buf()));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_malformed_file_is_an_error() {
    let file = write_config("watchdog_interval_ms = \"often\"\n");

    let result = PlayerConfig::load(Some(file.path().to_path_buf()));
    assert!(matches!(result, Err(Error::Common(_))));
}

#[test]
#[serial]
fn test_logging_section_parsed() {
    let file = write_config("[logging]\nlevel = \"trace\"\n");

    let config = PlayerConfig::load(Some(file.path().to_path_buf())).unwrap();
    assert_eq!(config.logging.level, "trace");
    assert!(config.logging.file.is_none());
}
