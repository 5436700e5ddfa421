//! Site types shared by the registry, the store and the orchestrator.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A site eligible for indexing, as listed in the registry.
///
/// Identity is the URL, compared case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SiteDescriptor {
  pub name: String,
  pub url: String,
}

impl SiteDescriptor {
  pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      url: url.into(),
    }
  }

  /// Exact URL match, no normalization.
  pub fn matches(&self, url: &str) -> bool {
    self.url == url
  }
}

impl fmt::Display for SiteDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.name, self.url)
  }
}

/// Persisted indexing status of a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SiteStatus {
  Indexing,
  Indexed,
  Failed,
}

impl SiteStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      SiteStatus::Indexing => "INDEXING",
      SiteStatus::Indexed => "INDEXED",
      SiteStatus::Failed => "FAILED",
    }
  }
}

impl fmt::Display for SiteStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SiteStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_uppercase().as_str() {
      "INDEXING" => Ok(SiteStatus::Indexing),
      "INDEXED" => Ok(SiteStatus::Indexed),
      "FAILED" => Ok(SiteStatus::Failed),
      _ => Err(format!("Unknown site status: {}", s)),
    }
  }
}

/// Status row for one site, owned by the persistence layer.
///
/// Only worker tasks write these. The orchestrator reads the status to decide
/// whether a run is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
  pub url: String,
  pub name: String,
  pub status: SiteStatus,
  pub status_time: DateTime<Utc>,
  pub last_error: Option<String>,
}

impl SiteRecord {
  pub fn indexing(site: &SiteDescriptor) -> Self {
    Self {
      url: site.url.clone(),
      name: site.name.clone(),
      status: SiteStatus::Indexing,
      status_time: Utc::now(),
      last_error: None,
    }
  }

  pub fn is_indexing(&self) -> bool {
    self.status == SiteStatus::Indexing
  }
}
