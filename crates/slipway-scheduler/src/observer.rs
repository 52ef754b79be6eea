//! Batch observer — synchronous hooks at task and batch lifecycle points.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{error, info, warn};

use slipway_core::{NodeInstance, Outcome};

use crate::coordinator::BatchSummary;

/// Lifecycle hooks. Every method defaults to a no-op.
///
/// Task hooks are called from worker tasks, concurrently.
pub trait BatchObserver: Send + Sync {
    fn on_task_start(&self, _node: &NodeInstance) {}

    fn on_task_complete(&self, _node: &NodeInstance, _outcome: &Outcome) {}

    fn on_batch_complete(&self, _summary: &BatchSummary) {}
}

/// Observer that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl BatchObserver for NoopObserver {}

/// Observer that logs every hook through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl BatchObserver for TracingObserver {
    fn on_task_start(&self, node: &NodeInstance) {
        info!(node = %node.display_id(), "node task started");
    }

    fn on_task_complete(&self, node: &NodeInstance, outcome: &Outcome) {
        match outcome.error() {
            None => info!(node = %node.display_id(), "node task succeeded"),
            Some(error) => warn!(node = %node.display_id(), %error, "node task failed"),
        }
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        info!(
            batch = summary.batch_id,
            submitted = summary.submitted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "batch finished"
        );
    }
}

/// Run an observer hook, containing a panic so it cannot kill a worker.
pub(crate) fn notify(hook: &str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        error!(hook, "observer panicked");
    }
}
