//! JobOrchestrator - starts and stops indexing runs.
//!
//! At most one run is tracked at a time. Whether a run is active is derived
//! from the persisted site records (any site INDEXING), with the tracked
//! run's own pool covering the gap between submission and the first status
//! write.
//!
//! # Start sequence
//!
//! ```text
//! try_begin (CAS idle → starting) → status check → fresh pool → submit → seal → track
//! ```
//!
//! Starts return as soon as the tasks are queued. Stops return as soon as the
//! cancellation signal is sent.

use std::sync::{
  Arc,
  atomic::{AtomicU64, Ordering},
};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{
  run::{Run, RunScope, RunSnapshot, RunStateToken},
  worker::WorkerTaskFactory,
};
use crate::{
  db::{StateQuery, StoreError},
  domain::{
    config::{Config, IndexingConfig},
    site::SiteDescriptor,
  },
  registry::{ConfigRegistry, SiteRegistry},
};

// ============================================================================
// Outcomes
// ============================================================================

/// Result of an orchestrator operation.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  Accepted,
  Rejected(Rejection),
}

impl Outcome {
  pub fn is_accepted(&self) -> bool {
    matches!(self, Outcome::Accepted)
  }

  pub fn rejection(&self) -> Option<Rejection> {
    match self {
      Outcome::Accepted => None,
      Outcome::Rejected(reason) => Some(*reason),
    }
  }
}

/// Why an operation was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
  #[error("Site is not in the registry")]
  UnknownSite,
  #[error("Indexing is already running")]
  AlreadyRunning,
  #[error("Another indexing run is still in progress")]
  RunActive,
  #[error("Another start request is in progress")]
  StartInProgress,
  #[error("Indexing is not running")]
  NothingToStop,
  #[error("Site status is unavailable")]
  StateUnavailable,
  #[error("Orchestrator is shutting down")]
  ShuttingDown,
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
  /// Workers per run's pool
  pub workers: usize,
}

impl OrchestratorConfig {
  pub fn from_indexing_config(indexing: &IndexingConfig) -> Self {
    Self {
      workers: indexing.worker_count(),
    }
  }
}

impl Default for OrchestratorConfig {
  fn default() -> Self {
    Self::from_indexing_config(&IndexingConfig::default())
  }
}

// ============================================================================
// JobOrchestrator
// ============================================================================

/// Owns the tracked run and arbitrates between start and stop requests.
///
/// # Thread Safety
///
/// Safe to share via `Arc<JobOrchestrator>`. Start operations race through
/// a [`RunStateToken`]; only the winner reads the store and creates a pool.
pub struct JobOrchestrator {
  registry: Arc<dyn SiteRegistry>,
  state: Arc<dyn StateQuery>,
  factory: Arc<dyn WorkerTaskFactory>,
  config: OrchestratorConfig,
  run_state: RunStateToken,
  generation: AtomicU64,
  current: Mutex<Option<Run>>,
  /// Parent of every run's token
  cancel: CancellationToken,
}

impl JobOrchestrator {
  pub fn new(
    registry: Arc<dyn SiteRegistry>,
    state: Arc<dyn StateQuery>,
    factory: Arc<dyn WorkerTaskFactory>,
    config: OrchestratorConfig,
  ) -> Self {
    Self {
      registry,
      state,
      factory,
      config,
      run_state: RunStateToken::new(),
      generation: AtomicU64::new(0),
      current: Mutex::new(None),
      cancel: CancellationToken::new(),
    }
  }

  /// Build an orchestrator over the config's site list and worker count.
  pub fn from_config(config: &Config, state: Arc<dyn StateQuery>, factory: Arc<dyn WorkerTaskFactory>) -> Self {
    Self::new(
      Arc::new(ConfigRegistry::from_config(config)),
      state,
      factory,
      OrchestratorConfig::from_indexing_config(&config.indexing),
    )
  }

  /// Reindex a single registered site.
  ///
  /// Rejected if the URL is not registered or the tracked run still has
  /// queued or running tasks. Does not consult the site records.
  pub async fn index_one(&self, url: &str) -> Outcome {
    let Some(site) = self.registry.find(url) else {
      debug!(url, "Rejected reindex of unregistered site");
      return Outcome::Rejected(Rejection::UnknownSite);
    };

    let Some(_start) = self.run_state.try_begin() else {
      debug!(url, "Rejected reindex: another start is in progress");
      return Outcome::Rejected(Rejection::StartInProgress);
    };

    if self.cancel.is_cancelled() {
      return Outcome::Rejected(Rejection::ShuttingDown);
    }

    let mut current = self.current.lock().await;
    if let Some(run) = current.as_ref()
      && run.is_live()
    {
      info!(
        url,
        generation = run.generation(),
        scope = %run.scope(),
        outstanding = run.pool().outstanding(),
        "Rejected reindex: run still in progress"
      );
      return Outcome::Rejected(Rejection::RunActive);
    }

    info!(url = %site.url, "Start reindexing site");
    let mut run = self.new_run(RunScope::Site(site.url.clone()));
    self.submit(&mut run, &site);
    run.pool_mut().shutdown();

    *current = Some(run);
    Outcome::Accepted
  }

  /// Index every registered site.
  ///
  /// Rejected if any site is INDEXING or the tracked run is still live. One
  /// task per site is queued in registry order; a site whose task cannot be
  /// created or queued is skipped.
  pub async fn index_all(&self) -> Outcome {
    let Some(_start) = self.run_state.try_begin() else {
      debug!("Rejected indexing: another start is in progress");
      return Outcome::Rejected(Rejection::StartInProgress);
    };

    if self.cancel.is_cancelled() {
      return Outcome::Rejected(Rejection::ShuttingDown);
    }

    match self.query_indexing().await {
      Ok(false) => {}
      Ok(true) => {
        debug!("Indexing already started");
        return Outcome::Rejected(Rejection::AlreadyRunning);
      }
      Err(reason) => return Outcome::Rejected(reason),
    }

    let mut current = self.current.lock().await;
    if let Some(run) = current.as_ref()
      && run.is_live()
    {
      debug!(
        generation = run.generation(),
        outstanding = run.pool().outstanding(),
        "Indexing already started"
      );
      return Outcome::Rejected(Rejection::AlreadyRunning);
    }

    let sites = self.registry.list_sites();
    let mut run = self.new_run(RunScope::All);
    let mut submitted = 0;
    for site in &sites {
      info!(name = %site.name, url = %site.url, "Parsing site");
      if self.submit(&mut run, site) {
        submitted += 1;
      }
    }
    run.pool_mut().shutdown();

    info!(
      generation = run.generation(),
      sites = sites.len(),
      submitted,
      workers = run.pool().size(),
      "Indexing run started"
    );

    *current = Some(run);
    Outcome::Accepted
  }

  /// Cancel the tracked run.
  ///
  /// Rejected if no site is INDEXING. Returns without waiting for tasks to
  /// wind down, so a second call before any status changes is accepted too.
  pub async fn stop(&self) -> Outcome {
    match self.query_indexing().await {
      Ok(true) => {}
      Ok(false) => {
        info!("Indexing was not stopped because it was not started");
        return Outcome::Rejected(Rejection::NothingToStop);
      }
      Err(reason) => return Outcome::Rejected(reason),
    }

    let mut current = self.current.lock().await;
    match current.as_mut() {
      Some(run) => {
        let signalled = run.cancel();
        info!(generation = run.generation(), scope = %run.scope(), signalled, "Indexing was stopped");
      }
      None => {
        // Status left behind by another process; nothing here can clear it
        warn!("Sites are marked INDEXING but no run is tracked by this process");
      }
    }

    Outcome::Accepted
  }

  /// Whether any site record is INDEXING.
  pub async fn is_run_active(&self) -> Result<bool, StoreError> {
    self.state.any_site_indexing().await
  }

  /// Snapshot of the tracked run, if any run was started by this process.
  pub async fn current_run(&self) -> Option<RunSnapshot> {
    self.current.lock().await.as_ref().map(Run::snapshot)
  }

  /// Cancel the tracked run and refuse further starts.
  pub fn shutdown(&self) {
    if !self.cancel.is_cancelled() {
      info!("Orchestrator shutting down");
      self.cancel.cancel();
    }
  }

  // --------------------------------------------------------------------------
  // Helpers
  // --------------------------------------------------------------------------

  async fn query_indexing(&self) -> Result<bool, Rejection> {
    self.state.any_site_indexing().await.map_err(|e| {
      warn!(error = %e, "Failed to query site status");
      Rejection::StateUnavailable
    })
  }

  fn new_run(&self, scope: RunScope) -> Run {
    let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
    trace!(generation, scope = %scope, "Creating run");
    Run::new(generation, scope, self.config.workers, self.cancel.child_token())
  }

  /// Create and queue the task for one site. Failures only affect this site.
  fn submit(&self, run: &mut Run, site: &SiteDescriptor) -> bool {
    let task = match self.factory.new_task(site) {
      Ok(task) => task,
      Err(e) => {
        warn!(url = %site.url, error = %e, "Failed to create worker task");
        return false;
      }
    };

    match run.pool_mut().submit(site.url.clone(), task) {
      Ok(job_id) => {
        trace!(url = %site.url, job_id, generation = run.generation(), "Worker task submitted");
        true
      }
      Err(e) => {
        warn!(url = %site.url, error = %e, "Failed to submit worker task");
        false
      }
    }
  }
}

impl Drop for JobOrchestrator {
  fn drop(&mut self) {
    self.cancel.cancel();
  }
}
