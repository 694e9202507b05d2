use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use testinject::config::{Config, ConfigError, CONFIG_ENV, LOG_ENV, SDK_PATH_ENV};

/// Test that Config::default() produces the expected values.
#[test]
fn test_config_default_values() {
    let config = Config::default();

    assert_eq!(
        config.sdk.import_path,
        "github.com/DataDog/dd-sdk-go-testing/autoinstrument"
    );
    assert_eq!(config.sdk.import_name, "ddtesting");
    assert!(config.sdk.path.is_none());
    assert_eq!(
        config.sdk.repository,
        "https://github.com/DataDog/dd-sdk-go-testing.git"
    );
    assert_eq!(config.sdk.revision, "tony/rd-autoinstrument");

    assert!(config.logging.file.is_none());
    assert_eq!(config.logging.filter, "info");
}

#[test]
fn test_default_config_is_valid() {
    assert!(Config::default().validate().is_ok());
}

#[test]
fn test_instrumentation_from_config() {
    let mut config = Config::default();
    config.sdk.import_name = "sdk".to_string();
    let sdk = config.sdk.instrumentation();
    assert_eq!(sdk.local_name, "sdk");
    assert_eq!(sdk.import_path, config.sdk.import_path);
    assert_eq!(sdk.subtest_entry, "Run");
    assert_eq!(sdk.suite_entry, "RunM");
}

/// Test that a missing file yields the defaults.
#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.sdk.import_name, "ddtesting");
}

/// Test parsing a partial TOML file; unspecified fields keep defaults.
#[test]
fn test_parse_valid_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[sdk]
path = "/opt/dd-sdk-go-testing"
import_name = "dd"

[logging]
file = "/var/log/testinject.log"
filter = "testinject=debug"
"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.sdk.path, Some(PathBuf::from("/opt/dd-sdk-go-testing")));
    assert_eq!(config.sdk.import_name, "dd");
    assert_eq!(config.sdk.revision, "tony/rd-autoinstrument");
    assert_eq!(config.logging.file, Some(PathBuf::from("/var/log/testinject.log")));
    assert_eq!(config.logging.filter, "testinject=debug");
}

#[test]
fn test_parse_invalid_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[sdk\nimport_name = ").unwrap();

    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { .. }));
    assert!(err.to_string().contains("config.toml"));
}

#[test]
fn test_validation_fails_empty_import_path() {
    let mut config = Config::default();
    config.sdk.import_path = "  ".to_string();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("sdk.import_path"));
}

#[test]
fn test_validation_fails_invalid_import_name() {
    for name in ["", "_", "1dd", "dd-testing", "dd.testing"] {
        let mut config = Config::default();
        config.sdk.import_name = name.to_string();
        assert!(
            matches!(config.validate(), Err(ConfigError::ValidationError { .. })),
            "{name:?} should be rejected"
        );
    }
}

#[test]
fn test_validation_errors_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[sdk]\nimport_name = \"not-valid\"\n").unwrap();

    let err = Config::load_from(&path).unwrap_err();
    assert!(err.to_string().contains("not-valid"));
}

/// Test round-trip serialization/deserialization.
#[test]
fn test_config_roundtrip() {
    let mut original = Config::default();
    original.sdk.path = Some(PathBuf::from("/src/sdk"));
    let serialized = toml::to_string(&original).expect("Should serialize");
    let deserialized: Config = toml::from_str(&serialized).expect("Should deserialize");

    assert_eq!(original.sdk.path, deserialized.sdk.path);
    assert_eq!(original.sdk.import_path, deserialized.sdk.import_path);
    assert_eq!(original.logging.filter, deserialized.logging.filter);
}

// =============================================================================
// ENVIRONMENT
// =============================================================================

fn clear_env() {
    env::remove_var(CONFIG_ENV);
    env::remove_var(SDK_PATH_ENV);
    env::remove_var(LOG_ENV);
}

#[test]
#[serial]
fn test_config_path_ends_with_expected() {
    clear_env();
    let path = Config::config_path();
    assert!(path.ends_with("testinject/config.toml"));
}

#[test]
#[serial]
fn test_config_path_env_override() {
    clear_env();
    env::set_var(CONFIG_ENV, "/etc/testinject.toml");
    assert_eq!(Config::config_path(), PathBuf::from("/etc/testinject.toml"));
    clear_env();
}

#[test]
#[serial]
fn test_env_overrides_win_over_file() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[sdk]\npath = \"/from/file\"\n").unwrap();

    env::set_var(CONFIG_ENV, &path);
    env::set_var(SDK_PATH_ENV, "/from/env");
    env::set_var(LOG_ENV, "/tmp/testinject.log");
    let config = Config::load();
    clear_env();

    let config = config.unwrap();
    assert_eq!(config.sdk.path, Some(PathBuf::from("/from/env")));
    assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/testinject.log")));
}

#[test]
#[serial]
fn test_empty_env_override_is_ignored() {
    clear_env();
    let mut config = Config::default();
    env::set_var(SDK_PATH_ENV, "");
    config.apply_env_overrides();
    clear_env();
    assert!(config.sdk.path.is_none());
}
