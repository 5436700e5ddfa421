//! Site status persistence.
//!
//! The orchestrator only reads through [`StateQuery`]; worker tasks are the
//! sole writers through [`SiteStatusWriter`].

mod sites;

use async_trait::async_trait;

pub use sites::MemorySiteStore;

use crate::domain::site::SiteDescriptor;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
  #[error("Site not found: {0}")]
  NotFound(String),
  #[error("Store unavailable: {0}")]
  Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Read side of the site status store.
#[async_trait]
pub trait StateQuery: Send + Sync {
  /// Whether any site record is currently INDEXING.
  ///
  /// Must consult the persisted records, not a cached flag, so the answer
  /// survives process restarts.
  async fn any_site_indexing(&self) -> Result<bool>;
}

/// Write side of the site status store, used by worker tasks.
#[async_trait]
pub trait SiteStatusWriter: Send + Sync {
  /// Create or reset the record for `site` with status INDEXING.
  async fn mark_indexing(&self, site: &SiteDescriptor) -> Result<()>;

  /// Transition an existing record to INDEXED.
  async fn mark_indexed(&self, url: &str) -> Result<()>;

  /// Transition an existing record to FAILED with the given reason.
  async fn mark_failed(&self, url: &str, error: &str) -> Result<()>;
}
