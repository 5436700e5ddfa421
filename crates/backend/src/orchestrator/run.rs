//! Run records and the run-state token.

use std::{
  fmt,
  sync::atomic::{AtomicU8, Ordering},
};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::pool::{PoolStats, WorkerPool};

/// What a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunScope {
  /// Every site in the registry
  All,
  /// A single site, by URL
  Site(String),
}

impl fmt::Display for RunScope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RunScope::All => f.write_str("all"),
      RunScope::Site(url) => write!(f, "site:{}", url),
    }
  }
}

/// The batch of worker tasks submitted by one accepted start.
///
/// Owns its pool exclusively. A new run replaces this one only after the pool
/// has drained, so no pool is ever left running without a handle.
#[derive(Debug)]
pub struct Run {
  generation: u64,
  scope: RunScope,
  started_at: DateTime<Utc>,
  cancel: CancellationToken,
  pool: WorkerPool,
}

impl Run {
  /// Create a run whose pool is cancelled by `cancel`.
  pub fn new(generation: u64, scope: RunScope, workers: usize, cancel: CancellationToken) -> Self {
    let pool = WorkerPool::new(workers, cancel.clone());
    Self {
      generation,
      scope,
      started_at: Utc::now(),
      cancel,
      pool,
    }
  }

  pub fn generation(&self) -> u64 {
    self.generation
  }

  pub fn scope(&self) -> &RunScope {
    &self.scope
  }

  pub fn pool(&self) -> &WorkerPool {
    &self.pool
  }

  pub fn pool_mut(&mut self) -> &mut WorkerPool {
    &mut self.pool
  }

  /// A run is live while any of its tasks is queued or running.
  pub fn is_live(&self) -> bool {
    !self.pool.is_drained()
  }

  /// Request cancellation of every queued and running task.
  ///
  /// Returns the number of tasks signalled; 0 if the run was already cancelled.
  pub fn cancel(&mut self) -> usize {
    self.pool.shutdown_now()
  }

  /// Token shared by the run's pool and, through child tokens, its tasks.
  pub fn cancel_token(&self) -> &CancellationToken {
    &self.cancel
  }

  pub fn snapshot(&self) -> RunSnapshot {
    RunSnapshot {
      generation: self.generation,
      scope: self.scope.clone(),
      started_at: self.started_at,
      pool: self.pool.stats(),
    }
  }
}

/// Point-in-time view of the tracked run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSnapshot {
  pub generation: u64,
  pub scope: RunScope,
  pub started_at: DateTime<Utc>,
  pub pool: PoolStats,
}

impl RunSnapshot {
  pub fn is_live(&self) -> bool {
    self.pool.outstanding > 0
  }
}

// ============================================================================
// Run State Token
// ============================================================================

const IDLE: u8 = 0;
const STARTING: u8 = 1;

/// Guards the check-and-create sequence of a start operation.
///
/// Exactly one caller can move the token from idle to starting; everyone
/// else is turned away without touching the store.
#[derive(Debug, Default)]
pub struct RunStateToken {
  state: AtomicU8,
}

impl RunStateToken {
  pub fn new() -> Self {
    Self::default()
  }

  /// Try to enter the starting state. The guard returns the token to idle on drop.
  pub fn try_begin(&self) -> Option<StartGuard<'_>> {
    self
      .state
      .compare_exchange(IDLE, STARTING, Ordering::AcqRel, Ordering::Acquire)
      .ok()
      .map(|_| StartGuard { token: self })
  }

  #[cfg(test)]
  pub fn is_starting(&self) -> bool {
    self.state.load(Ordering::Acquire) == STARTING
  }
}

/// Held for the duration of one start attempt.
#[derive(Debug)]
pub struct StartGuard<'a> {
  token: &'a RunStateToken,
}

impl Drop for StartGuard<'_> {
  fn drop(&mut self) {
    self.token.state.store(IDLE, Ordering::Release);
  }
}
