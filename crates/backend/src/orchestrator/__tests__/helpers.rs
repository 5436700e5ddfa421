//! Test helpers for orchestrator tests.
//!
//! Provides `OrchestratorTestContext`, which wires a `JobOrchestrator` to an
//! in-memory site store and a worker factory that records every task it
//! creates and every cancellation its tasks observe.

use std::{
  collections::HashSet,
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
  db::{MemorySiteStore, SiteStatusWriter, StateQuery, StoreError},
  domain::site::{SiteDescriptor, SiteStatus},
  orchestrator::{
    jobs::{JobOrchestrator, OrchestratorConfig},
    run::RunSnapshot,
    worker::{WorkerError, WorkerTask, WorkerTaskFactory},
  },
  registry::ConfigRegistry,
};

pub const WAIT: Duration = Duration::from_secs(5);

/// How a recorded task behaves once it starts.
#[derive(Debug, Clone, Copy)]
pub enum TaskBehavior {
  /// Mark INDEXING then INDEXED immediately
  Complete,
  /// Mark INDEXING then FAILED with a crawl error
  Fail,
  /// Mark INDEXING, wait for cancellation, then mark FAILED
  UntilCancelled,
  /// Like `UntilCancelled`, but take this long to honor the signal
  SlowCancel(Duration),
  /// Wait for cancellation without ever writing a status
  Silent,
}

/// Counters shared by every task a factory creates.
#[derive(Debug, Default)]
pub struct TaskCounters {
  pub started: AtomicUsize,
  pub completed: AtomicUsize,
  pub cancelled: AtomicUsize,
}

impl TaskCounters {
  pub fn started(&self) -> usize {
    self.started.load(Ordering::SeqCst)
  }

  pub fn completed(&self) -> usize {
    self.completed.load(Ordering::SeqCst)
  }

  pub fn cancelled(&self) -> usize {
    self.cancelled.load(Ordering::SeqCst)
  }
}

struct RecordingTask {
  site: SiteDescriptor,
  store: Arc<MemorySiteStore>,
  behavior: TaskBehavior,
  counters: Arc<TaskCounters>,
}

#[async_trait]
impl WorkerTask for RecordingTask {
  async fn run(self: Box<Self>, cancel: CancellationToken) -> Result<(), WorkerError> {
    self.counters.started.fetch_add(1, Ordering::SeqCst);
    if let TaskBehavior::Silent = self.behavior {
      cancel.cancelled().await;
      self.counters.cancelled.fetch_add(1, Ordering::SeqCst);
      return Err(WorkerError::Cancelled);
    }
    self.store.mark_indexing(&self.site).await?;

    match self.behavior {
      TaskBehavior::Complete => {
        self.store.mark_indexed(&self.site.url).await?;
        self.counters.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
      }
      TaskBehavior::Fail => {
        self.store.mark_failed(&self.site.url, "connection refused").await?;
        Err(WorkerError::Failed("connection refused".to_string()))
      }
      TaskBehavior::UntilCancelled | TaskBehavior::SlowCancel(_) | TaskBehavior::Silent => {
        cancel.cancelled().await;
        self.counters.cancelled.fetch_add(1, Ordering::SeqCst);
        if let TaskBehavior::SlowCancel(delay) = self.behavior {
          tokio::time::sleep(delay).await;
        }
        self.store.mark_failed(&self.site.url, "Indexing stopped by user").await?;
        Err(WorkerError::Cancelled)
      }
    }
  }
}

/// Worker factory that records which sites it created tasks for.
pub struct RecordingFactory {
  store: Arc<MemorySiteStore>,
  behavior: TaskBehavior,
  failing: HashSet<String>,
  submitted: Mutex<Vec<String>>,
  pub counters: Arc<TaskCounters>,
}

impl RecordingFactory {
  pub fn new(store: Arc<MemorySiteStore>, behavior: TaskBehavior) -> Self {
    Self {
      store,
      behavior,
      failing: HashSet::new(),
      submitted: Mutex::new(Vec::new()),
      counters: Arc::new(TaskCounters::default()),
    }
  }

  /// Refuse to create tasks for these URLs.
  pub fn failing_for(mut self, urls: &[&str]) -> Self {
    self.failing = urls.iter().map(|u| u.to_string()).collect();
    self
  }

  /// URLs of every task created so far, in creation order.
  pub fn submitted(&self) -> Vec<String> {
    self.submitted.lock().unwrap().clone()
  }
}

impl WorkerTaskFactory for RecordingFactory {
  fn new_task(&self, site: &SiteDescriptor) -> Result<Box<dyn WorkerTask>, WorkerError> {
    if self.failing.contains(&site.url) {
      return Err(WorkerError::Create {
        url: site.url.clone(),
        reason: "no crawler available".to_string(),
      });
    }

    self.submitted.lock().unwrap().push(site.url.clone());
    Ok(Box::new(RecordingTask {
      site: site.clone(),
      store: self.store.clone(),
      behavior: self.behavior,
      counters: self.counters.clone(),
    }))
  }
}

/// State query whose backing store is down.
pub struct UnavailableStore;

#[async_trait]
impl StateQuery for UnavailableStore {
  async fn any_site_indexing(&self) -> Result<bool, StoreError> {
    Err(StoreError::Unavailable("connection reset".to_string()))
  }
}

/// Registry `[{A, http://a}, {B, http://b}]`
pub fn two_sites() -> Vec<SiteDescriptor> {
  vec![SiteDescriptor::new("A", "http://a"), SiteDescriptor::new("B", "http://b")]
}

/// Test context for orchestrator tests.
pub struct OrchestratorTestContext {
  pub store: Arc<MemorySiteStore>,
  pub factory: Arc<RecordingFactory>,
  pub orchestrator: Arc<JobOrchestrator>,
}

impl OrchestratorTestContext {
  /// Two-site registry, four workers.
  pub fn new(behavior: TaskBehavior) -> Self {
    Self::with_sites(two_sites(), behavior, 4)
  }

  pub fn with_sites(sites: Vec<SiteDescriptor>, behavior: TaskBehavior, workers: usize) -> Self {
    let store = Arc::new(MemorySiteStore::new());
    let factory = RecordingFactory::new(store.clone(), behavior);
    Self::from_parts(sites, store, factory, workers)
  }

  pub fn from_parts(
    sites: Vec<SiteDescriptor>,
    store: Arc<MemorySiteStore>,
    factory: RecordingFactory,
    workers: usize,
  ) -> Self {
    let factory = Arc::new(factory);
    let orchestrator = Arc::new(JobOrchestrator::new(
      Arc::new(ConfigRegistry::new(sites)),
      store.clone(),
      factory.clone(),
      OrchestratorConfig { workers },
    ));

    Self {
      store,
      factory,
      orchestrator,
    }
  }

  pub fn counters(&self) -> &TaskCounters {
    &self.factory.counters
  }

  /// Number of site records currently INDEXING.
  pub fn indexing_count(&self) -> usize {
    self.store.records().iter().filter(|r| r.is_indexing()).count()
  }

  pub fn status(&self, url: &str) -> Option<SiteStatus> {
    self.store.status(url)
  }

  /// Wait until `n` tasks have started and marked their site INDEXING.
  pub async fn wait_indexing(&self, n: usize) -> bool {
    wait_until(WAIT, || self.counters().started() >= n && self.indexing_count() >= n).await
  }

  /// Wait until the tracked run has no queued or running tasks.
  pub async fn wait_drained(&self) -> bool {
    let start = Instant::now();
    while start.elapsed() < WAIT {
      let live = self
        .orchestrator
        .current_run()
        .await
        .is_some_and(|run| run.is_live());
      if !live {
        return true;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
  }

  pub async fn snapshot(&self) -> RunSnapshot {
    self.orchestrator.current_run().await.expect("a run should be tracked")
  }
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut check: F) -> bool
where
  F: FnMut() -> bool,
{
  let start = Instant::now();
  let poll_interval = Duration::from_millis(10);

  while start.elapsed() < timeout {
    if check() {
      return true;
    }
    tokio::time::sleep(poll_interval).await;
  }

  check()
}

/// Sorted copy, for comparing submissions without caring about order.
pub fn sorted(mut urls: Vec<String>) -> Vec<String> {
  urls.sort();
  urls
}
