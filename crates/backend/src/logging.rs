//! Logging setup for processes hosting the orchestrator

use std::path::{Path, PathBuf};

use tracing_appender::{non_blocking::WorkerGuard, rolling::RollingFileAppender};
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

use crate::{dirs, domain::config::LoggingConfig};

const LOG_FILE_NAME: &str = "siteindex.log";

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
  #[error("Failed to create log directory {path:?}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("A global subscriber is already installed")]
  AlreadyInitialized,
}

/// Parse log level from config string. Unknown values fall back to info.
pub fn parse_log_level(level: &str) -> LevelFilter {
  match level.to_lowercase().as_str() {
    "off" => LevelFilter::OFF,
    "error" => LevelFilter::ERROR,
    "warn" => LevelFilter::WARN,
    "info" => LevelFilter::INFO,
    "debug" => LevelFilter::DEBUG,
    "trace" => LevelFilter::TRACE,
    _ => LevelFilter::INFO,
  }
}

/// Directory the rolling log files are written to.
pub fn log_dir(config: &LoggingConfig) -> PathBuf {
  config.directory.clone().unwrap_or_else(dirs::default_log_dir)
}

fn file_appender(config: &LoggingConfig, dir: &Path) -> RollingFileAppender {
  match config.rotation.as_str() {
    "hourly" => tracing_appender::rolling::hourly(dir, LOG_FILE_NAME),
    "never" => tracing_appender::rolling::never(dir, LOG_FILE_NAME),
    _ => tracing_appender::rolling::daily(dir, LOG_FILE_NAME),
  }
}

/// Initialize logging with config-driven settings.
///
/// In foreground mode: Logs to console only with colors
/// In background mode: Logs to a rolling file only (no ANSI)
///
/// `RUST_LOG` overrides the configured level. The returned guard must be kept
/// alive for the duration of the program or buffered file output is lost.
pub fn init_logging(config: &LoggingConfig, foreground: bool) -> Result<Option<WorkerGuard>, LoggingError> {
  let level = parse_log_level(&config.level);
  let env_filter = EnvFilter::builder()
    .with_default_directive(level.into())
    .from_env_lossy();

  if foreground {
    tracing_subscriber::fmt()
      .with_env_filter(env_filter)
      .with_target(true)
      .with_ansi(true)
      .try_init()
      .map_err(|_| LoggingError::AlreadyInitialized)?;
    return Ok(None);
  }

  let dir = log_dir(config);
  std::fs::create_dir_all(&dir).map_err(|source| LoggingError::CreateDir {
    path: dir.clone(),
    source,
  })?;

  let (file_writer, guard) = tracing_appender::non_blocking(file_appender(config, &dir));

  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_target(true)
    .with_ansi(false)
    .with_writer(file_writer)
    .try_init()
    .map_err(|_| LoggingError::AlreadyInitialized)?;

  Ok(Some(guard))
}
