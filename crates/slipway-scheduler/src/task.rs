//! Node task — one node instance bound to a connector and a reporter.
//!
//! A task runs exactly once: [`NodeTask::run`] consumes it. Whatever the
//! connector does (returns an error, panics), the task produces an
//! [`Outcome`] and hands it to the reporter before returning.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinError;
use tracing::{debug, error};

use slipway_core::{NodeInstance, Outcome};

use crate::connector::CloudConnector;
use crate::reporter::DoneReporter;

/// Lifecycle of a node task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// A unit of work for one node.
pub struct NodeTask {
    node: Arc<NodeInstance>,
    connector: Arc<dyn CloudConnector>,
    reporter: Arc<dyn DoneReporter>,
    status: TaskStatus,
}

/// What a finished task leaves behind.
#[derive(Debug, Clone)]
pub struct CompletedTask {
    pub node: Arc<NodeInstance>,
    pub outcome: Outcome,
    pub status: TaskStatus,
    pub elapsed: Duration,
}

impl NodeTask {
    pub fn new(
        node: impl Into<Arc<NodeInstance>>,
        connector: Arc<dyn CloudConnector>,
        reporter: Arc<dyn DoneReporter>,
    ) -> Self {
        Self {
            node: node.into(),
            connector,
            reporter,
            status: TaskStatus::Pending,
        }
    }

    pub fn node(&self) -> &NodeInstance {
        &self.node
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Execute the node operation, then report the outcome exactly once.
    ///
    /// Connector and reporter run on their own Tokio tasks so a panic in
    /// either surfaces as a `JoinError` here instead of unwinding through
    /// the worker.
    pub async fn run(mut self) -> CompletedTask {
        self.status = TaskStatus::Running;
        let started = Instant::now();
        debug!(node = %self.node.display_id(), "task running");

        let connector = Arc::clone(&self.connector);
        let node = Arc::clone(&self.node);
        let executed = tokio::spawn(async move { connector.execute(&node).await }).await;

        let mut outcome = match executed {
            Ok(Ok(payload)) => Outcome::success(payload),
            Ok(Err(e)) => Outcome::failure(format!("{e:#}")),
            Err(join_err) => {
                let reason = describe_join_error(join_err);
                error!(node = %self.node.display_id(), %reason, "connector aborted");
                Outcome::failure(format!("connector aborted: {reason}"))
            }
        };

        let reporter = Arc::clone(&self.reporter);
        let node = Arc::clone(&self.node);
        let reported = outcome.clone();
        let report = tokio::spawn(async move { reporter.report(&node, &reported).await }).await;
        if let Err(join_err) = report {
            let reason = describe_join_error(join_err);
            error!(node = %self.node.display_id(), %reason, "reporter aborted");
            outcome = Outcome::failure(format!("reporter aborted: {reason}"));
        }

        self.status = if outcome.is_success() {
            TaskStatus::Succeeded
        } else {
            TaskStatus::Failed
        };

        CompletedTask {
            node: self.node,
            outcome,
            status: self.status,
            elapsed: started.elapsed(),
        }
    }
}

fn describe_join_error(err: JoinError) -> String {
    if err.is_panic() {
        format!("panicked: {}", panic_message(err.into_panic()))
    } else {
        "cancelled".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{ExecuteFuture, FnConnector};
    use crate::reporter::{FnReporter, ReportFuture};
    use slipway_core::{Run, RunCategory};
    use std::sync::Mutex;

    fn node(name: &str) -> NodeInstance {
        NodeInstance::new(Run::new(RunCategory::Deployment).id, name, "test")
    }

    type Log = Arc<Mutex<Vec<(String, Outcome)>>>;

    fn recording_reporter() -> (Arc<dyn DoneReporter>, Log) {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let reporter = FnReporter::new(move |node: &NodeInstance, outcome: &Outcome| {
            sink.lock().unwrap().push((node.name.clone(), outcome.clone()));
        });
        (Arc::new(reporter), log)
    }

    async fn crash() -> anyhow::Result<serde_json::Value> {
        panic!("driver crashed")
    }

    async fn hang_up() {
        panic!("upstream gone")
    }

    struct PanickingConnector;

    impl CloudConnector for PanickingConnector {
        fn execute<'a>(&'a self, _node: &'a NodeInstance) -> ExecuteFuture<'a> {
            Box::pin(crash())
        }
    }

    struct PanickingReporter;

    impl DoneReporter for PanickingReporter {
        fn report<'a>(&'a self, _node: &'a NodeInstance, _outcome: &'a Outcome) -> ReportFuture<'a> {
            Box::pin(hang_up())
        }
    }

    #[tokio::test]
    async fn success_is_reported_once() {
        let (reporter, log) = recording_reporter();
        let connector = Arc::new(FnConnector::new(|_node: NodeInstance| async {
            anyhow::Ok(serde_json::json!({"vm": "i-123"}))
        }));

        let task = NodeTask::new(node("web.1"), connector, reporter);
        assert_eq!(task.status(), TaskStatus::Pending);

        let done = task.run().await;
        assert_eq!(done.status, TaskStatus::Succeeded);
        assert!(done.outcome.is_success());

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, "web.1");
    }

    #[tokio::test]
    async fn connector_error_becomes_failure_outcome() {
        let (reporter, log) = recording_reporter();
        let connector = Arc::new(FnConnector::new(|_node: NodeInstance| async {
            Err::<serde_json::Value, _>(anyhow::anyhow!("quota exceeded"))
        }));

        let done = NodeTask::new(node("db.1"), connector, reporter).run().await;
        assert_eq!(done.status, TaskStatus::Failed);
        assert_eq!(done.outcome.error(), Some("quota exceeded"));
        assert_eq!(log.lock().unwrap()[0].1, Outcome::failure("quota exceeded"));
    }

    #[tokio::test]
    async fn connector_panic_is_contained_and_reported() {
        let (reporter, log) = recording_reporter();

        let done = NodeTask::new(node("db.1"), Arc::new(PanickingConnector), reporter)
            .run()
            .await;

        assert_eq!(done.status, TaskStatus::Failed);
        assert!(done.outcome.error().unwrap().contains("driver crashed"));
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reporter_panic_turns_outcome_into_failure() {
        let connector = Arc::new(FnConnector::new(|_node: NodeInstance| async {
            anyhow::Ok(serde_json::Value::Null)
        }));

        let done = NodeTask::new(node("web.1"), connector, Arc::new(PanickingReporter))
            .run()
            .await;

        assert_eq!(done.status, TaskStatus::Failed);
        assert!(done.outcome.error().unwrap().contains("upstream gone"));
    }
}
