//! Scaling coordinator — turns a list of node instances into a batch.
//!
//! The coordinator:
//! - Resolves a connector for every node (failing before anything runs if
//!   one is missing)
//! - Sizes a [`WorkerPool`] from configuration, reusing the previous pool
//!   when the size is unchanged
//! - Submits one [`NodeTask`] per node and returns without waiting
//! - Waits for the active batch on request and summarises it
//!
//! One coordinator drives one batch at a time.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use slipway_core::config::SchedulerConfig;
use slipway_core::NodeInstance;

use crate::connector::ConnectorRegistry;
use crate::error::{SchedulerError, SchedulerResult};
use crate::observer::{notify, BatchObserver, NoopObserver};
use crate::pool::{PoolStats, WorkerPool};
use crate::reporter::DoneReporter;
use crate::task::NodeTask;

/// Result counts for one finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub batch_id: u64,
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl BatchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.succeeded == self.submitted
    }
}

/// Book-keeping for the batch currently in flight.
struct ActiveBatch {
    id: u64,
    /// Pool counters when the batch was submitted.
    baseline: PoolStats,
}

/// Dispatches batches of node operations to a bounded worker pool.
pub struct ScalingCoordinator {
    connectors: Arc<ConnectorRegistry>,
    max_workers: usize,
    verbose_level: u8,
    observer: Arc<dyn BatchObserver>,
    pool: Option<WorkerPool>,
    active: Option<ActiveBatch>,
    next_batch_id: u64,
}

impl ScalingCoordinator {
    /// Create a coordinator. The worker count is validated on the first batch.
    pub fn new(connectors: Arc<ConnectorRegistry>, config: &SchedulerConfig) -> Self {
        Self {
            connectors,
            max_workers: config.max_workers,
            verbose_level: config.verbose_level,
            observer: Arc::new(NoopObserver),
            pool: None,
            active: None,
            next_batch_id: 1,
        }
    }

    /// Attach an observer for task and batch lifecycle hooks.
    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = observer;
        // A pool built with the old observer must not be reused.
        self.pool = None;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn verbose_level(&self) -> u8 {
        self.verbose_level
    }

    /// Whether a batch has been submitted and not yet waited for.
    pub fn has_active_batch(&self) -> bool {
        self.active.is_some()
    }

    /// Submit one task per node. Returns once everything is queued.
    ///
    /// Fails without submitting anything if the worker count is invalid, a
    /// node's cloud has no registered connector, or the previous batch has
    /// not been waited for. Returns the batch ID.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn run_batch(
        &mut self,
        nodes: Vec<NodeInstance>,
        reporter: Arc<dyn DoneReporter>,
    ) -> SchedulerResult<u64> {
        if self.active.is_some() {
            return Err(SchedulerError::BatchInProgress);
        }

        let tasks = nodes
            .into_iter()
            .map(|node| {
                let connector = self.connectors.resolve(&node.cloud)?;
                Ok(NodeTask::new(node, connector, Arc::clone(&reporter)))
            })
            .collect::<SchedulerResult<Vec<_>>>()?;

        let pool = self.ensure_pool()?;
        let baseline = pool.stats();
        let count = tasks.len();
        for task in tasks {
            pool.submit(task)?;
        }

        let id = self.next_batch_id;
        self.next_batch_id += 1;
        self.active = Some(ActiveBatch { id, baseline });

        info!(
            batch = id,
            nodes = count,
            max_workers = self.max_workers,
            "batch submitted"
        );
        Ok(id)
    }

    /// Wait for the active batch to drain and summarise it.
    ///
    /// Returns `None` immediately if no batch is active.
    pub async fn wait_batch_finished(&mut self) -> Option<BatchSummary> {
        let batch = self.active.take()?;
        let pool = self.pool.as_ref()?;

        pool.drain_and_wait().await;

        let now = pool.stats();
        let summary = BatchSummary {
            batch_id: batch.id,
            submitted: now.submitted - batch.baseline.submitted,
            succeeded: now.succeeded - batch.baseline.succeeded,
            failed: now.failed - batch.baseline.failed,
        };
        notify("on_batch_complete", || self.observer.on_batch_complete(&summary));
        debug!(?summary, "batch drained");
        Some(summary)
    }

    /// Shut the pool down after the active batch (if any) drains.
    pub async fn shutdown(mut self) {
        self.wait_batch_finished().await;
        if let Some(pool) = self.pool.take() {
            pool.shutdown().await;
        }
    }

    /// Reuse the current pool if it has the configured size, else start one.
    fn ensure_pool(&mut self) -> SchedulerResult<&WorkerPool> {
        let reusable = self
            .pool
            .as_ref()
            .is_some_and(|pool| pool.max_workers() == self.max_workers);

        if !reusable {
            let pool =
                WorkerPool::start_with_observer(self.max_workers, Arc::clone(&self.observer))?;
            self.pool = Some(pool);
        }

        self.pool
            .as_ref()
            .ok_or_else(|| SchedulerError::InvalidConfiguration("worker pool unavailable".into()))
    }
}
