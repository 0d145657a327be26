//! Multi-layer tracing setup: rotated text and JSON files plus a compact stdout layer.
//!
//! Filtering comes from `RUST_LOG`, defaulting to `info`, e.g.
//! `RUST_LOG=domain_crawler=debug,reqwest=warn`.

use std::path::Path;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to create log directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Failed to install subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Keeps the background file writers flushing. Drop it only at shutdown.
pub struct LogGuards {
    _text: WorkerGuard,
    _json: WorkerGuard,
}

/// Install the global subscriber writing `crawler.log` and `crawler.json.log` into `log_dir`.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging<P: AsRef<Path>>(log_dir: P) -> Result<LogGuards, LoggingError> {
    let log_path = log_dir.as_ref();
    std::fs::create_dir_all(log_path)?;

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new("info")?,
    };

    let text_file_appender = tracing_appender::rolling::daily(log_path, "crawler.log");
    let (text_writer, text_guard) = tracing_appender::non_blocking(text_file_appender);

    let json_file_appender = tracing_appender::rolling::daily(log_path, "crawler.json.log");
    let (json_writer, json_guard) = tracing_appender::non_blocking(json_file_appender);

    let text_layer = fmt::layer()
        .with_writer(text_writer)
        .with_target(true)
        .with_thread_names(true)
        .with_line_number(true)
        .with_ansi(false)
        .compact()
        .with_filter(env_filter.clone());

    let json_layer = fmt::layer()
        .json()
        .with_writer(json_writer)
        .with_target(true)
        .with_thread_names(true)
        .with_current_span(true)
        .with_filter(env_filter.clone());

    let stdout_layer = fmt::layer()
        .with_target(false)
        .compact()
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(text_layer)
        .with(json_layer)
        .with(stdout_layer)
        .try_init()?;

    tracing::info!("Logging initialized, writing to {}", log_path.display());

    Ok(LogGuards {
        _text: text_guard,
        _json: json_guard,
    })
}

/// Log into `data_dir/logs`.
pub fn init_logging_in_data_dir<P: AsRef<Path>>(data_dir: P) -> Result<LogGuards, LoggingError> {
    init_logging(data_dir.as_ref().join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // The only test that installs the global subscriber.
    #[test]
    fn test_init_creates_log_dir_and_rejects_second_init() {
        let temp_dir = TempDir::new().unwrap();
        let guards = init_logging_in_data_dir(temp_dir.path()).unwrap();
        assert!(temp_dir.path().join("logs").is_dir());

        let second = init_logging(temp_dir.path().join("other"));
        assert!(matches!(second, Err(LoggingError::Init(_))));
        drop(guards);
    }
}
