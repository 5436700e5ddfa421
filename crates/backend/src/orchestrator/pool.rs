//! Fixed-size worker pool for one indexing run.
//!
//! `size` workers share a single job queue, the same way the indexing
//! pipeline's reader and parser workers share their receivers:
//!
//! ```text
//! submit() → queue → worker 0..size → WorkerTask::run(child token)
//! ```
//!
//! Two ways to stop:
//! - [`WorkerPool::shutdown`] closes the queue. Queued jobs still run, then
//!   the workers exit.
//! - [`WorkerPool::shutdown_now`] closes the queue and cancels the pool token.
//!   Queued jobs are discarded without running and running jobs see their
//!   token fire.

use std::sync::{
  Arc,
  atomic::{AtomicUsize, Ordering},
};

use tokio::sync::{Mutex, Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::worker::{WorkerError, WorkerTask};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
  #[error("Pool is not accepting new tasks")]
  Shutdown,
  #[error("All pool workers have exited")]
  Closed,
}

/// A queued unit of work.
struct PoolJob {
  id: u64,
  label: String,
  task: Box<dyn WorkerTask>,
}

/// Counters shared between the pool handle and its workers.
#[derive(Debug, Default)]
struct PoolState {
  /// Submitted but not yet finished or discarded
  outstanding: AtomicUsize,
  completed: AtomicUsize,
  discarded: AtomicUsize,
  drained: Notify,
}

impl PoolState {
  fn finish(&self) {
    self.completed.fetch_add(1, Ordering::Relaxed);
    self.release();
  }

  fn discard(&self, job: &PoolJob) {
    debug!(job_id = job.id, site = %job.label, "Discarding queued task after cancellation");
    self.discarded.fetch_add(1, Ordering::Relaxed);
    self.release();
  }

  fn release(&self) {
    if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
      self.drained.notify_waiters();
    }
  }
}

/// Point-in-time view of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
  pub size: usize,
  pub submitted: usize,
  pub outstanding: usize,
  pub completed: usize,
  pub discarded: usize,
  pub accepting: bool,
  pub cancelled: bool,
}

/// Worker pool owned by a single run.
#[derive(Debug)]
pub struct WorkerPool {
  size: usize,
  tx: Option<mpsc::UnboundedSender<PoolJob>>,
  cancel: CancellationToken,
  state: Arc<PoolState>,
  submitted: usize,
}

impl std::fmt::Debug for PoolJob {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PoolJob")
      .field("id", &self.id)
      .field("label", &self.label)
      .finish_non_exhaustive()
  }
}

impl WorkerPool {
  /// Spawn `size` workers (at least one) on the current runtime.
  ///
  /// Cancelling `cancel` has the same effect as [`WorkerPool::shutdown_now`]
  /// on the workers, minus closing the queue.
  pub fn new(size: usize, cancel: CancellationToken) -> Self {
    let size = size.max(1);
    let (tx, rx) = mpsc::unbounded_channel();
    let rx = Arc::new(Mutex::new(rx));
    let state = Arc::new(PoolState::default());

    for worker_id in 0..size {
      let rx = rx.clone();
      let state = state.clone();
      let cancel = cancel.clone();
      tokio::spawn(async move {
        pool_worker(worker_id, rx, state, cancel).await;
      });
    }

    debug!(size, "Worker pool started");

    Self {
      size,
      tx: Some(tx),
      cancel,
      state,
      submitted: 0,
    }
  }

  /// Queue a task. Returns the job id.
  ///
  /// Never waits for the task to start. Fails once the pool is sealed or
  /// cancelled; cancelled workers do not come back for late jobs.
  pub fn submit(&mut self, label: impl Into<String>, task: Box<dyn WorkerTask>) -> Result<u64, PoolError> {
    if self.cancel.is_cancelled() {
      return Err(PoolError::Shutdown);
    }
    let tx = self.tx.as_ref().ok_or(PoolError::Shutdown)?;
    let id = self.submitted as u64;
    let job = PoolJob {
      id,
      label: label.into(),
      task,
    };

    self.state.outstanding.fetch_add(1, Ordering::AcqRel);
    if tx.send(job).is_err() {
      self.state.outstanding.fetch_sub(1, Ordering::AcqRel);
      return Err(PoolError::Closed);
    }

    self.submitted += 1;
    trace!(job_id = id, "Task queued");
    Ok(id)
  }

  /// Stop accepting tasks. Already queued tasks still run.
  pub fn shutdown(&mut self) {
    if self.tx.take().is_some() {
      debug!(submitted = self.submitted, "Worker pool sealed");
    }
  }

  /// Stop accepting tasks, discard queued ones and signal running ones.
  ///
  /// Returns how many tasks were outstanding when the signal went out. A
  /// second call is a no-op and returns 0, so no task is signalled twice.
  pub fn shutdown_now(&mut self) -> usize {
    self.shutdown();

    if self.cancel.is_cancelled() {
      return 0;
    }

    let outstanding = self.outstanding();
    self.cancel.cancel();
    info!(outstanding, "Worker pool cancelled");
    outstanding
  }

  /// Tasks submitted but not yet finished or discarded.
  pub fn outstanding(&self) -> usize {
    self.state.outstanding.load(Ordering::Acquire)
  }

  pub fn is_drained(&self) -> bool {
    self.outstanding() == 0
  }

  pub fn is_accepting(&self) -> bool {
    self.tx.is_some()
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancel.is_cancelled()
  }

  pub fn size(&self) -> usize {
    self.size
  }

  pub fn stats(&self) -> PoolStats {
    PoolStats {
      size: self.size,
      submitted: self.submitted,
      outstanding: self.outstanding(),
      completed: self.state.completed.load(Ordering::Relaxed),
      discarded: self.state.discarded.load(Ordering::Relaxed),
      accepting: self.is_accepting(),
      cancelled: self.is_cancelled(),
    }
  }

  /// Wait until every submitted task has finished or been discarded.
  pub async fn wait_drained(&self) {
    loop {
      let notified = self.state.drained.notified();
      if self.is_drained() {
        return;
      }
      notified.await;
    }
  }
}

/// Pool worker - pulls tasks from the shared queue and runs them one at a time.
///
/// Exits when the queue is closed and empty, or when the pool is cancelled.
/// After cancellation it discards whatever is still queued.
async fn pool_worker(
  worker_id: usize,
  rx: Arc<Mutex<mpsc::UnboundedReceiver<PoolJob>>>,
  state: Arc<PoolState>,
  cancel: CancellationToken,
) {
  trace!(worker_id, "Pool worker starting");
  let mut processed = 0;

  loop {
    let job = {
      let mut rx_guard = rx.lock().await;
      tokio::select! {
          biased;
          _ = cancel.cancelled() => {
              trace!(worker_id, processed, "Pool worker cancelled");
              break;
          }
          job = rx_guard.recv() => job
      }
    };

    let Some(job) = job else {
      trace!(worker_id, processed, "Pool worker: queue closed");
      break;
    };

    // Cancelled between dequeue and start
    if cancel.is_cancelled() {
      state.discard(&job);
      continue;
    }

    run_job(worker_id, job, &cancel).await;
    state.finish();
    processed += 1;
  }

  if cancel.is_cancelled() {
    let mut rx_guard = rx.lock().await;
    while let Ok(job) = rx_guard.try_recv() {
      state.discard(&job);
    }
  }

  trace!(worker_id, processed, "Pool worker finished");
}

/// Run one task on its own tokio task so a panic stays contained.
async fn run_job(worker_id: usize, job: PoolJob, cancel: &CancellationToken) {
  let PoolJob { id, label, task } = job;
  debug!(worker_id, job_id = id, site = %label, "Worker task started");

  let handle = tokio::spawn(task.run(cancel.child_token()));

  match handle.await {
    Ok(Ok(())) => debug!(worker_id, job_id = id, site = %label, "Worker task finished"),
    Ok(Err(WorkerError::Cancelled)) => info!(worker_id, job_id = id, site = %label, "Worker task cancelled"),
    Ok(Err(e)) => warn!(worker_id, job_id = id, site = %label, error = %e, "Worker task failed"),
    Err(e) if e.is_panic() => error!(worker_id, job_id = id, site = %label, "Worker task panicked"),
    Err(e) => warn!(worker_id, job_id = id, site = %label, error = %e, "Worker task aborted"),
  }
}
