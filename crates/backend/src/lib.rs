mod db;
mod domain;
mod orchestrator;
mod registry;

pub use db::{MemorySiteStore, SiteStatusWriter, StateQuery, StoreError};
pub use domain::{config, site};
pub use orchestrator::{
  JobOrchestrator, OrchestratorConfig, Outcome, PoolError, PoolStats, Rejection, Run, RunScope, RunSnapshot,
  WorkerError, WorkerPool, WorkerTask, WorkerTaskFactory,
};
pub use registry::{ConfigRegistry, SiteRegistry};

pub mod dirs;
pub mod logging;
