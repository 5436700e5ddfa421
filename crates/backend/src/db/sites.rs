// Site record operations
//
// In-memory site status table. Records are keyed by URL and written only by
// worker tasks; the orchestrator scans them through `StateQuery`.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::{
  db::{Result, SiteStatusWriter, StateQuery, StoreError},
  domain::site::{SiteDescriptor, SiteRecord, SiteStatus},
};

/// Concurrent site status store keyed by URL.
#[derive(Debug, Default)]
pub struct MemorySiteStore {
  records: DashMap<String, SiteRecord>,
}

impl MemorySiteStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Get the record for a URL
  pub fn get(&self, url: &str) -> Option<SiteRecord> {
    self.records.get(url).map(|r| r.value().clone())
  }

  /// Snapshot of all records, in no particular order
  pub fn records(&self) -> Vec<SiteRecord> {
    self.records.iter().map(|r| r.value().clone()).collect()
  }

  /// Status of a single site, if it has ever been indexed
  pub fn status(&self, url: &str) -> Option<SiteStatus> {
    self.records.get(url).map(|r| r.status)
  }

  /// Insert a record as-is.
  ///
  /// Used to seed state left behind by another process (e.g. a crashed run
  /// that never cleared INDEXING).
  pub fn insert(&self, record: SiteRecord) {
    self.records.insert(record.url.clone(), record);
  }

  fn transition(&self, url: &str, status: SiteStatus, error: Option<&str>) -> Result<()> {
    let mut record = self
      .records
      .get_mut(url)
      .ok_or_else(|| StoreError::NotFound(url.to_string()))?;
    record.status = status;
    record.status_time = Utc::now();
    record.last_error = error.map(str::to_string);
    debug!(url, status = %status, "Site status updated");
    Ok(())
  }
}

#[async_trait]
impl StateQuery for MemorySiteStore {
  #[tracing::instrument(level = "trace", skip(self))]
  async fn any_site_indexing(&self) -> Result<bool> {
    let indexing = self.records.iter().any(|r| r.value().is_indexing());
    trace!(indexing, sites = self.records.len(), "Scanned site records");
    Ok(indexing)
  }
}

#[async_trait]
impl SiteStatusWriter for MemorySiteStore {
  #[tracing::instrument(level = "trace", skip(self, site), fields(url = %site.url))]
  async fn mark_indexing(&self, site: &SiteDescriptor) -> Result<()> {
    self.records.insert(site.url.clone(), SiteRecord::indexing(site));
    debug!(url = %site.url, name = %site.name, "Site status updated to INDEXING");
    Ok(())
  }

  async fn mark_indexed(&self, url: &str) -> Result<()> {
    self.transition(url, SiteStatus::Indexed, None)
  }

  async fn mark_failed(&self, url: &str, error: &str) -> Result<()> {
    self.transition(url, SiteStatus::Failed, Some(error))
  }
}
