//! Tracing subscriber setup
//!
//! Installs a console layer and, when a directory is configured, a daily
//! rolling log file written through a non-blocking worker. `RUST_LOG`
//! overrides the configured level.

use std::path::PathBuf;

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_LOG_FILE_PREFIX: &str = "tilerender.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directives, e.g. `info` or `tilerender::storage=debug`.
    pub level: String,
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: None,
            file_prefix: DEFAULT_LOG_FILE_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{directives}': {message}")]
    InvalidFilter { directives: String, message: String },

    #[error("Failed to create log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Keeps the file writer alive. Dropping it flushes pending lines.
#[derive(Debug)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Builds the filter from `RUST_LOG`, falling back to `level`.
fn build_filter(env_directives: Option<&str>, level: &str) -> Result<EnvFilter, LoggingError> {
    let directives = env_directives
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(level);
    EnvFilter::try_new(directives).map_err(|e| LoggingError::InvalidFilter {
        directives: directives.to_string(),
        message: e.to_string(),
    })
}

/// Installs the global subscriber.
///
/// Hold the returned guard for the life of the process.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(env.as_deref(), &config.level)?;
    let timer = LocalTime::new(Rfc3339);

    let console = fmt::layer()
        .with_timer(timer.clone())
        .with_target(true)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| LoggingError::Directory {
                path: dir.clone(),
                source,
            })?;
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_timer(timer)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    tracing::info!(
        level = %config.level,
        file = config.directory.is_some(),
        "Logging initialized"
    );
    Ok(LoggingGuard { _file: guard })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_filter_sources() {
        assert!(build_filter(Some("tilerender=trace"), "info").is_ok());
        assert!(build_filter(Some("  "), "debug").is_ok());
        assert!(build_filter(None, "warn,tilerender::tiler=debug").is_ok());
    }

    #[test]
    fn test_invalid_filter() {
        let err = build_filter(None, "tilerender=loud").unwrap_err();
        assert!(matches!(err, LoggingError::InvalidFilter { .. }));
    }

    #[test]
    fn test_init_once_with_file() {
        let dir = TempDir::new().unwrap();
        let config = LoggingConfig {
            directory: Some(dir.path().join("logs")),
            ..Default::default()
        };
        // An invalid RUST_LOG from the environment is acceptable here.
        match init(&config) {
            Ok(guard) => {
                assert!(dir.path().join("logs").is_dir());
                assert!(matches!(
                    init(&config),
                    Err(LoggingError::AlreadyInitialized(_))
                ));
                drop(guard);
            }
            Err(LoggingError::InvalidFilter { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
