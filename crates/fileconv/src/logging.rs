//! Subscriber setup for binaries. The library itself only emits through
//! `log` and `tracing` and never installs anything.

use tracing_subscriber::EnvFilter;

use crate::config::schema::{LogFormat, LoggingConfig};
use crate::error::{FileconvError, Result};

/// Filter from `RUST_LOG` when set, otherwise from the configured level.
pub fn build_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level)
        .map_err(|e| FileconvError::Logging(format!("invalid log level '{}': {}", level, e)))
}

/// Installs a global fmt subscriber writing to stderr and forwards `log`
/// records into it. Fails if a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(&config.level)?;

    let installed = match config.format {
        LogFormat::Text => tracing::subscriber::set_global_default(
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish(),
        ),
        LogFormat::Json => tracing::subscriber::set_global_default(
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish(),
        ),
    };
    installed.map_err(|e| FileconvError::Logging(e.to_string()))?;

    tracing_log::LogTracer::init().map_err(|e| FileconvError::Logging(e.to_string()))?;

    Ok(())
}
