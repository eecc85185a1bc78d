//! Tests for configuration resolution

use serial_test::serial;
use std::io::Write;
use trackdb_common::config::{DetachedDetailsPolicy, ImportConfig, MeasurementSystem};

#[test]
#[serial]
fn test_load_without_config_file_uses_defaults() {
    std::env::remove_var("TRACKDB_CONFIG");
    std::env::remove_var("TRACKDB_MEASUREMENT_SYSTEM");
    std::env::remove_var("TRACKDB_LATEST_ONLY");

    let config = ImportConfig::load(None).unwrap();
    assert_eq!(config.measurement_system, MeasurementSystem::Metric);
    assert_eq!(config.concurrency, 4);
    assert!(!config.latest_only);
}

#[test]
#[serial]
fn test_explicit_path_takes_priority() {
    std::env::remove_var("TRACKDB_MEASUREMENT_SYSTEM");
    std::env::remove_var("TRACKDB_LATEST_ONLY");

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "measurement_system = \"statute\"").unwrap();
    writeln!(file, "concurrency = 2").unwrap();
    writeln!(file, "detached_details = \"reject\"").unwrap();

    let config = ImportConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.measurement_system, MeasurementSystem::Statute);
    assert_eq!(config.concurrency, 2);
    assert_eq!(config.detached_details, DetachedDetailsPolicy::Reject);
}

#[test]
#[serial]
fn test_env_overrides_file_value() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "measurement_system = \"metric\"").unwrap();

    std::env::set_var("TRACKDB_MEASUREMENT_SYSTEM", "statute");
    let config = ImportConfig::load(Some(file.path())).unwrap();
    std::env::remove_var("TRACKDB_MEASUREMENT_SYSTEM");

    assert_eq!(config.measurement_system, MeasurementSystem::Statute);
}

#[test]
#[serial]
fn test_malformed_file_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "concurrency = \"lots\"").unwrap();

    assert!(ImportConfig::load(Some(file.path())).is_err());
}
