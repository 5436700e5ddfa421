//! Indexing job orchestration
//!
//! Decides whether, when and how many site indexing tasks run. The actual
//! crawl lives behind [`WorkerTask`]; run state lives in the site records.
//!
//! # Components
//!
//! - [`JobOrchestrator`]: `index_one`, `index_all`, `stop`
//! - [`Run`]: the tracked batch of tasks with its generation and token
//! - [`WorkerPool`]: fixed-size pool created fresh for every run
//! - [`WorkerTask`] / [`WorkerTaskFactory`]: the cancelable unit of work
//!
//! ```text
//! JobOrchestrator
//!   └── Run (generation N, scope)
//!         └── WorkerPool (size = parallelism)
//!               └── WorkerTask per site (child CancellationToken)
//! ```

mod jobs;
pub mod pool;
pub mod run;
pub mod worker;


pub use jobs::{JobOrchestrator, OrchestratorConfig, Outcome, Rejection};
pub use pool::{PoolError, PoolStats, WorkerPool};
pub use run::{Run, RunScope, RunSnapshot};
pub use worker::{WorkerError, WorkerTask, WorkerTaskFactory};
