//! Tracing subscriber setup
//!
//! Console output always goes through a `fmt` layer. When a log directory is
//! configured, a daily rolling file is added through a non-blocking writer;
//! the returned [`WorkerGuard`] must be kept alive for buffered lines to be
//! flushed.
//!
//! `RUST_LOG` takes precedence over the configured level.

use crate::config::LoggingConfig;
use crate::error::{Result, StageError};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file prefix inside the log directory
pub const LOG_FILE_PREFIX: &str = "framestage.log";

/// Build the filter: `RUST_LOG` first, then the configured level.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| StageError::Config(format!("Invalid log level '{}': {}", config.level, e)))
}

/// Install the global subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(config)?;

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                StageError::Config(format!("Failed to create log directory {:?}: {}", dir, e))
            })?;
            let (writer, guard) = non_blocking(rolling::daily(dir, LOG_FILE_PREFIX));
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .try_init()
        .map_err(|e| StageError::Config(format!("Failed to install tracing subscriber: {}", e)))?;

    Ok(guard)
}
