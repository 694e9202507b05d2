use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::rewrite::{Instrumentation, DEFAULT_SDK_IMPORT_NAME, DEFAULT_SDK_IMPORT_PATH};

/// Root configuration container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sdk: SdkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Instrumentation SDK settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkConfig {
    /// Import path rewritten files reference.
    #[serde(default = "default_import_path")]
    pub import_path: String,
    /// Preferred local name for the SDK import.
    #[serde(default = "default_import_name")]
    pub import_name: String,
    /// Existing SDK checkout, searched before the temp area.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Repository cloned when no checkout is found.
    #[serde(default = "default_repository")]
    pub repository: String,
    /// Revision checked out after cloning.
    #[serde(default = "default_revision")]
    pub revision: String,
}

/// File logging. Off unless a file is configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base path of the log file; timestamp and pid are appended.
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_import_path() -> String {
    DEFAULT_SDK_IMPORT_PATH.to_string()
}

fn default_import_name() -> String {
    DEFAULT_SDK_IMPORT_NAME.to_string()
}

fn default_repository() -> String {
    "https://github.com/DataDog/dd-sdk-go-testing.git".to_string()
}

fn default_revision() -> String {
    "tony/rd-autoinstrument".to_string()
}

fn default_filter() -> String {
    "info".to_string()
}

impl SdkConfig {
    pub fn instrumentation(&self) -> Instrumentation {
        Instrumentation::new(&self.import_path, &self.import_name)
    }
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            import_path: default_import_path(),
            import_name: default_import_name(),
            path: None,
            repository: default_repository(),
            revision: default_revision(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: None,
            filter: default_filter(),
        }
    }
}
