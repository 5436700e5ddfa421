//! Configuration for the site indexer.
//!
//! Config priority: explicit path > user (~/.config/siteindex/config.toml) > defaults

use std::{
  collections::HashSet,
  path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::site::SiteDescriptor;

// ============================================================================
// Indexing Configuration
// ============================================================================

/// Worker pool settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
  /// Number of workers per run (0 = available parallelism of the host)
  /// Default: 0
  #[serde(default)]
  pub parallelism: usize,
}

impl IndexingConfig {
  /// Resolved worker count, never zero.
  pub fn worker_count(&self) -> usize {
    if self.parallelism == 0 {
      num_cpus::get().max(1)
    } else {
      self.parallelism
    }
  }
}

// ============================================================================
// Logging Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Log level: "off", "error", "warn", "info", "debug", "trace"
  /// Default: "info"
  #[serde(default = "default_log_level")]
  pub level: String,

  /// Log file rotation: "daily", "hourly", "never"
  /// Default: "daily"
  #[serde(default = "default_log_rotation")]
  pub rotation: String,

  /// Directory for log files (None = platform data dir)
  pub directory: Option<PathBuf>,
}

fn default_log_level() -> String {
  "info".to_string()
}
fn default_log_rotation() -> String {
  "daily".to_string()
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      rotation: default_log_rotation(),
      directory: None,
    }
  }
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Site indexer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Worker pool settings
  #[serde(default)]
  pub indexing: IndexingConfig,

  /// Logging settings
  #[serde(default)]
  pub logging: LoggingConfig,

  /// Sites eligible for indexing, in indexing submission order
  #[serde(default)]
  pub sites: Vec<SiteDescriptor>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Failed to read config {path:?}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("Failed to parse config {path:?}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
  #[error("Site {0:?} has an empty url")]
  EmptyUrl(String),
  #[error("Duplicate site url: {0}")]
  DuplicateSite(String),
}

impl Config {
  /// Load and validate a config file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    config.validate()?;
    Ok(config)
  }

  /// Load the user config, falling back to defaults when missing or invalid.
  pub fn load_global() -> Self {
    let Some(path) = Self::user_config_path() else {
      return Self::default();
    };

    if !path.exists() {
      debug!(path = %path.display(), "No user config, using defaults");
      return Self::default();
    }

    match Self::load(&path) {
      Ok(config) => config,
      Err(e) => {
        warn!(error = %e, "Ignoring invalid user config");
        Self::default()
      }
    }
  }

  /// Get the user-level config path
  pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CONFIG_DIR") {
      return Some(PathBuf::from(path).join("config.toml"));
    }

    if let Ok(path) = std::env::var("XDG_CONFIG_HOME") {
      return Some(PathBuf::from(path).join("siteindex").join("config.toml"));
    }

    dirs::config_dir().map(|p: PathBuf| p.join("siteindex").join("config.toml"))
  }

  /// Reject site lists the registry cannot represent.
  ///
  /// URLs are the site identity, so they must be present and unique.
  pub fn validate(&self) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for site in &self.sites {
      if site.url.trim().is_empty() {
        return Err(ConfigError::EmptyUrl(site.name.clone()));
      }
      if !seen.insert(site.url.as_str()) {
        return Err(ConfigError::DuplicateSite(site.url.clone()));
      }
    }
    Ok(())
  }
}
