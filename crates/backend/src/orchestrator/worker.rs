//! Worker task contract.
//!
//! A worker task crawls and indexes one site. It owns the site's status
//! transitions (INDEXING → INDEXED | FAILED) and must honor cancellation:
//! the token passed to [`WorkerTask::run`] has to be checked between every
//! unit of work (page fetch). The pool cannot preempt a task that ignores it.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{db::StoreError, domain::site::SiteDescriptor};

/// Errors a worker task can report back to its pool.
///
/// These are logged by the pool and never reach the orchestrator's callers.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
  #[error("Task cancelled")]
  Cancelled,
  #[error("Failed to create task for {url}: {reason}")]
  Create { url: String, reason: String },
  #[error("Indexing failed: {0}")]
  Failed(String),
  #[error("Store error: {0}")]
  Store(#[from] StoreError),
}

/// One cancelable unit of indexing work.
#[async_trait]
pub trait WorkerTask: Send {
  /// Run the full crawl/index cycle for this task's site.
  async fn run(self: Box<Self>, cancel: CancellationToken) -> Result<(), WorkerError>;
}

/// Creates a worker task per site.
pub trait WorkerTaskFactory: Send + Sync {
  fn new_task(&self, site: &SiteDescriptor) -> Result<Box<dyn WorkerTask>, WorkerError>;
}
