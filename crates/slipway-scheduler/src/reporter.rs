//! Done reporters — where node outcomes go once a task finishes.
//!
//! A reporter is invoked exactly once per task, from whichever worker ran
//! it, so implementations must tolerate concurrent calls.

use std::future::Future;
use std::pin::Pin;

use tracing::{debug, error};

use slipway_core::{NodeInstance, Outcome};
use slipway_state::RunStore;

/// Boxed future returned by [`DoneReporter::report`].
pub type ReportFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Receives the outcome of every node task in a batch.
///
/// Must not block indefinitely: a stuck reporter holds its worker slot and
/// therefore stalls the batch drain.
pub trait DoneReporter: Send + Sync {
    fn report<'a>(&'a self, node: &'a NodeInstance, outcome: &'a Outcome) -> ReportFuture<'a>;
}

/// Persists outcomes into the run store.
///
/// Store errors are logged; they do not fail the task.
#[derive(Debug, Clone)]
pub struct StoreReporter {
    store: RunStore,
}

impl StoreReporter {
    pub fn new(store: RunStore) -> Self {
        Self { store }
    }
}

impl DoneReporter for StoreReporter {
    fn report<'a>(&'a self, node: &'a NodeInstance, outcome: &'a Outcome) -> ReportFuture<'a> {
        Box::pin(async move {
            match self.store.record_outcome(node.run_id, &node.name, outcome) {
                Ok(updated) => {
                    debug!(node = %node.display_id(), status = ?updated.status, "outcome recorded");
                }
                Err(e) => {
                    error!(node = %node.display_id(), error = %e, "failed to record outcome");
                }
            }
        })
    }
}

/// Adapts a synchronous closure into a [`DoneReporter`].
pub struct FnReporter<F> {
    f: F,
}

impl<F> FnReporter<F>
where
    F: Fn(&NodeInstance, &Outcome) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> DoneReporter for FnReporter<F>
where
    F: Fn(&NodeInstance, &Outcome) + Send + Sync,
{
    fn report<'a>(&'a self, node: &'a NodeInstance, outcome: &'a Outcome) -> ReportFuture<'a> {
        (self.f)(node, outcome);
        Box::pin(async {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slipway_core::{NodeStatus, Run, RunCategory};
    use std::sync::Mutex;

    #[tokio::test]
    async fn store_reporter_marks_node_ready() {
        let store = RunStore::open_in_memory().unwrap();
        let run = Run::new(RunCategory::Deployment);
        let node = NodeInstance::new(run.id, "web.1", "shell");
        store.put_node(&node).unwrap();

        let reporter = StoreReporter::new(store.clone());
        reporter
            .report(&node, &Outcome::success(serde_json::json!({"ip": "10.1.0.3"})))
            .await;

        let stored = store.get_node(run.id, "web.1").unwrap().unwrap();
        assert_eq!(stored.status, NodeStatus::Ready);
    }

    #[tokio::test]
    async fn store_reporter_tolerates_missing_node() {
        let store = RunStore::open_in_memory().unwrap();
        let run = Run::new(RunCategory::Deployment);
        let node = NodeInstance::new(run.id, "ghost", "shell");

        // Logged, not propagated.
        StoreReporter::new(store)
            .report(&node, &Outcome::failure("boom"))
            .await;
    }

    #[tokio::test]
    async fn fn_reporter_sees_every_call() {
        let seen = Mutex::new(Vec::new());
        let reporter = FnReporter::new(|node: &NodeInstance, outcome: &Outcome| {
            seen.lock().unwrap().push((node.name.clone(), outcome.is_success()));
        });
        let run = Run::new(RunCategory::Deployment);

        reporter
            .report(&NodeInstance::new(run.id, "a", "x"), &Outcome::failure("no"))
            .await;
        reporter
            .report(
                &NodeInstance::new(run.id, "b", "x"),
                &Outcome::success(serde_json::Value::Null),
            )
            .await;

        drop(reporter);
        assert_eq!(
            seen.into_inner().unwrap(),
            vec![("a".to_string(), false), ("b".to_string(), true)]
        );
    }
}
