//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::io::Write;
use std::path::PathBuf;

use faultline_domain::LogFormat;
use faultline_infra::config;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_toml_file() {
    let toml_content = r#"
[recorder]
history_capacity = 250
restore_window_secs = 3600
retention_days = 7

[recovery]
max_attempts = 3
window_secs = 120
strategy_timeout_ms = 5000

[executor]
default_retries = 5

[shutdown]
deadline_ms = 2000

[storage]
data_dir = "/var/lib/faultline"

[logging]
filter = "faultline=debug"
format = "json"
"#;

    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(toml_content.as_bytes()).expect("Failed to write to temp file");

    let path = temp_file.path().with_extension("toml");
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");

    let config = config::load_from_file(Some(path.clone())).expect("TOML config loads");

    assert_eq!(config.recorder.history_capacity, 250);
    assert_eq!(config.recorder.restore_window_secs, 3600);
    assert_eq!(config.recorder.retention_days, 7);
    assert_eq!(config.recovery.max_attempts, 3);
    assert_eq!(config.recovery.window_secs, 120);
    assert_eq!(config.recovery.strategy_timeout_ms, 5000);
    assert_eq!(config.executor.default_retries, 5);
    assert_eq!(config.shutdown.deadline_ms, 2000);
    assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/faultline"));
    assert_eq!(config.logging.format, LogFormat::Json);
    assert!(config.validate().is_ok());

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_from_json_file() {
    let json_content = r#"{
        "recovery": { "max_attempts": 9 },
        "storage": { "data_dir": "/tmp/faultline-json" }
    }"#;

    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(json_content.as_bytes()).expect("Failed to write to temp file");

    let path = temp_file.path().with_extension("json");
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");

    let config = config::load_from_file(Some(path.clone())).expect("JSON config loads");

    assert_eq!(config.recovery.max_attempts, 9);
    assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/faultline-json"));
    assert_eq!(config.recorder.history_capacity, 100);

    std::fs::remove_file(path).ok();
}

#[test]
fn test_invalid_toml_is_config_error() {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(b"[recovery\nmax_attempts = ").expect("Failed to write to temp file");

    let path = temp_file.path().with_extension("toml");
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");

    let result = config::load_from_file(Some(path.clone()));
    assert!(matches!(result, Err(faultline_domain::FaultlineError::Config(_))));

    std::fs::remove_file(path).ok();
}
