use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::Config;

/// Config file location override.
pub const CONFIG_ENV: &str = "TESTINJECT_CONFIG";
/// SDK checkout override.
pub const SDK_PATH_ENV: &str = "TESTINJECT_SDK_PATH";
/// Log file; logging stays off without it.
pub const LOG_ENV: &str = "TESTINJECT_LOG";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", .path.display())]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl Config {
    /// Returns the path to the configuration file.
    ///
    /// `TESTINJECT_CONFIG` if set, otherwise `testinject/config.toml` under
    /// `dirs::config_dir()` (current directory as a last resort).
    pub fn config_path() -> PathBuf {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("testinject").join("config.toml")
    }

    /// Loads the default config file and applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a specific path.
    ///
    /// - If the file doesn't exist, returns `Config::default()`.
    /// - If the file exists, parses it as TOML and validates.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// `TESTINJECT_SDK_PATH` and `TESTINJECT_LOG` take precedence over the
    /// file.
    pub fn apply_env_overrides(&mut self) {
        if let Some(path) = env::var_os(SDK_PATH_ENV).filter(|p| !p.is_empty()) {
            self.sdk.path = Some(PathBuf::from(path));
        }
        if let Some(path) = env::var_os(LOG_ENV).filter(|p| !p.is_empty()) {
            self.logging.file = Some(PathBuf::from(path));
        }
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - The SDK import path is not empty
    /// - The SDK import name is a usable Go identifier
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sdk.import_path.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "sdk.import_path must not be empty".to_string(),
            });
        }

        let name = &self.sdk.import_name;
        if !is_go_identifier(name) || name == "_" {
            return Err(ConfigError::ValidationError {
                message: format!("sdk.import_name '{}' is not a valid Go identifier", name),
            });
        }

        Ok(())
    }
}

fn is_go_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_alphabetic() => {
            chars.all(|c| c == '_' || c.is_alphanumeric())
        }
        _ => false,
    }
}
