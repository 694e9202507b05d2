use std::path::Path;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Initialize tracing with optional file output.
///
/// Logging is off unless a log file is configured (`TESTINJECT_LOG` or
/// `logging.file`): stdout and stderr belong to the wrapped compiler.
///
/// The go command runs many toolexec processes in parallel, so each one
/// writes its own `{path}.{timestamp}.{pid}`.
pub fn init_tracing(config: &LoggingConfig) {
    let Some(log_path) = config.file.as_deref() else {
        return;
    };

    let unique_path = unique_log_path(log_path);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let Ok(file) = std::fs::File::create(&unique_path) else {
        eprintln!("testinject: failed to create log file: {}", unique_path);
        return;
    };

    let file_layer = fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_target(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .init();
}

fn unique_log_path(base: &Path) -> String {
    let pid = std::process::id();
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{}.{}.{}", base.display(), timestamp, pid)
}
