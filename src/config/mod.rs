mod loader;
mod types;

pub use loader::{ConfigError, CONFIG_ENV, LOG_ENV, SDK_PATH_ENV};
pub use types::{Config, LoggingConfig, SdkConfig};
