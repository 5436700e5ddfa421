//! `index_one` tests.

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use crate::{
    domain::site::{SiteDescriptor, SiteRecord, SiteStatus},
    orchestrator::{
      __tests__::helpers::{OrchestratorTestContext, TaskBehavior},
      jobs::{Outcome, Rejection},
      run::RunScope,
    },
  };

  #[tokio::test]
  async fn test_unknown_url_is_rejected_without_a_pool() {
    let ctx = OrchestratorTestContext::new(TaskBehavior::Complete);

    for url in ["http://c", "HTTP://A", "http://a/", ""] {
      assert_eq!(
        ctx.orchestrator.index_one(url).await,
        Outcome::Rejected(Rejection::UnknownSite),
        "url {:?} is not registered",
        url
      );
    }

    assert!(ctx.factory.submitted().is_empty());
    assert!(ctx.orchestrator.current_run().await.is_none());
  }

  #[tokio::test]
  async fn test_index_one_submits_exactly_one_task() {
    let ctx = OrchestratorTestContext::new(TaskBehavior::Complete);

    assert_eq!(ctx.orchestrator.index_one("http://b").await, Outcome::Accepted);
    assert!(ctx.wait_drained().await);

    assert_eq!(ctx.factory.submitted(), vec!["http://b"]);
    assert_eq!(ctx.status("http://b"), Some(SiteStatus::Indexed));
    assert_eq!(ctx.status("http://a"), None);

    let snapshot = ctx.snapshot().await;
    assert_eq!(snapshot.scope, RunScope::Site("http://b".to_string()));
    assert_eq!(snapshot.pool.submitted, 1);
    assert!(!snapshot.pool.accepting);
  }

  /// A new single-site run never orphans a pool that is still working.
  #[tokio::test]
  async fn test_index_one_rejected_while_run_live() {
    let ctx = OrchestratorTestContext::new(TaskBehavior::UntilCancelled);

    assert!(ctx.orchestrator.index_all().await.is_accepted());
    assert!(ctx.wait_indexing(2).await);

    assert_eq!(
      ctx.orchestrator.index_one("http://a").await,
      Outcome::Rejected(Rejection::RunActive)
    );
    assert_eq!(ctx.factory.submitted().len(), 2);
    assert_eq!(ctx.snapshot().await.scope, RunScope::All);

    assert!(ctx.orchestrator.stop().await.is_accepted());
    assert!(ctx.wait_drained().await);

    // The previous run is gone, so the single-site run may start
    assert!(ctx.orchestrator.index_one("http://a").await.is_accepted());
    assert_eq!(ctx.snapshot().await.generation, 2);
    assert!(ctx.wait_indexing(1).await);
    assert!(ctx.orchestrator.stop().await.is_accepted());
    assert!(ctx.wait_drained().await);
    assert_eq!(ctx.counters().cancelled(), 3);
  }

  #[tokio::test]
  async fn test_index_one_twice_in_a_row() {
    let ctx = OrchestratorTestContext::new(TaskBehavior::UntilCancelled);

    assert!(ctx.orchestrator.index_one("http://a").await.is_accepted());
    assert_eq!(
      ctx.orchestrator.index_one("http://b").await,
      Outcome::Rejected(Rejection::RunActive)
    );
    assert_eq!(ctx.factory.submitted(), vec!["http://a"]);

    assert!(ctx.wait_indexing(1).await);
    assert!(ctx.orchestrator.stop().await.is_accepted());
    assert!(ctx.wait_drained().await);
  }

  /// Site records left INDEXING by another process do not block a reindex.
  #[tokio::test]
  async fn test_index_one_ignores_foreign_indexing_status() {
    let ctx = OrchestratorTestContext::new(TaskBehavior::Complete);
    ctx.store.insert(SiteRecord::indexing(&SiteDescriptor::new("B", "http://b")));

    assert!(ctx.orchestrator.index_one("http://a").await.is_accepted());
    assert!(ctx.wait_drained().await);
    assert_eq!(ctx.status("http://a"), Some(SiteStatus::Indexed));

    // index_all still honors the persisted status
    assert_eq!(
      ctx.orchestrator.index_all().await,
      Outcome::Rejected(Rejection::AlreadyRunning)
    );
  }

  #[tokio::test]
  async fn test_index_one_after_index_all_completes() {
    let ctx = OrchestratorTestContext::new(TaskBehavior::Complete);

    assert!(ctx.orchestrator.index_all().await.is_accepted());
    assert!(ctx.wait_drained().await);
    assert!(ctx.orchestrator.index_one("http://a").await.is_accepted());
    assert!(ctx.wait_drained().await);

    assert_eq!(ctx.factory.submitted().len(), 3);
    assert_eq!(ctx.snapshot().await.generation, 2);
  }
}
