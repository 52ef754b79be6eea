//! Worker pool — a fixed set of workers draining a FIFO task queue.
//!
//! `max_workers` Tokio tasks share one unbounded queue. Each worker takes
//! the next task, runs it to completion (execute + report), and goes back
//! for more. A pending-task counter published through a `watch` channel
//! lets [`WorkerPool::drain_and_wait`] suspend until the queue is empty and
//! no worker is busy.
//!
//! ```text
//! submit ──► [ queue (FIFO) ] ──► worker 0 ─┐
//!                              ├─► worker 1 ─┼─► pending -= 1 ─► drain_and_wait wakes at 0
//!                              └─► worker N ─┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{SchedulerError, SchedulerResult};
use crate::observer::{notify, BatchObserver, NoopObserver};
use crate::task::{CompletedTask, NodeTask, TaskStatus};

/// Cumulative task counters for a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl PoolStats {
    /// Tasks that have finished, either way.
    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed
    }
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn record(&self, done: &CompletedTask) {
        match done.status {
            TaskStatus::Succeeded => self.succeeded.fetch_add(1, Ordering::SeqCst),
            _ => self.failed.fetch_add(1, Ordering::SeqCst),
        };
    }

    fn snapshot(&self) -> PoolStats {
        PoolStats {
            submitted: self.submitted.load(Ordering::SeqCst),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

/// State shared between the pool handle and its workers.
struct Shared {
    queue: Mutex<mpsc::UnboundedReceiver<NodeTask>>,
    /// Tasks submitted but not yet fully completed.
    pending: watch::Sender<usize>,
    counters: Counters,
    observer: Arc<dyn BatchObserver>,
}

/// Bounded pool of concurrent node-task workers.
pub struct WorkerPool {
    max_workers: usize,
    queue: Option<mpsc::UnboundedSender<NodeTask>>,
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("max_workers", &self.max_workers)
            .field("pending", &self.pending())
            .field("stats", &self.stats())
            .finish()
    }
}

impl WorkerPool {
    /// Start a pool with exactly `max_workers` workers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(max_workers: usize) -> SchedulerResult<Self> {
        Self::start_with_observer(max_workers, Arc::new(NoopObserver))
    }

    /// Start a pool whose workers notify `observer` around every task.
    pub fn start_with_observer(
        max_workers: usize,
        observer: Arc<dyn BatchObserver>,
    ) -> SchedulerResult<Self> {
        if max_workers == 0 {
            return Err(SchedulerError::InvalidConfiguration(
                "max_workers must be at least 1".to_string(),
            ));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let (pending, _) = watch::channel(0usize);
        let shared = Arc::new(Shared {
            queue: Mutex::new(rx),
            pending,
            counters: Counters::default(),
            observer,
        });

        let workers = (0..max_workers)
            .map(|worker_id| {
                let shared = Arc::clone(&shared);
                tokio::spawn(worker_loop(worker_id, shared))
            })
            .collect();

        info!(max_workers, "worker pool started");
        Ok(Self {
            max_workers,
            queue: Some(tx),
            shared,
            workers,
        })
    }

    /// Number of worker slots.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Enqueue a task for the next free worker. Never waits.
    pub fn submit(&self, task: NodeTask) -> SchedulerResult<()> {
        let queue = self.queue.as_ref().ok_or(SchedulerError::PoolClosed)?;

        // Count before sending so a concurrent drain never observes zero
        // while this task sits in the queue.
        self.shared.pending.send_modify(|n| *n += 1);
        if queue.send(task).is_err() {
            self.shared.pending.send_modify(|n| *n -= 1);
            return Err(SchedulerError::PoolClosed);
        }
        self.shared.counters.submitted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Wait until every submitted task has completed and reported.
    ///
    /// Returns immediately when nothing is pending. Safe to call repeatedly.
    pub async fn drain_and_wait(&self) {
        let mut pending = self.shared.pending.subscribe();
        if pending.wait_for(|n| *n == 0).await.is_err() {
            // The sender lives in `shared`, which we hold.
            warn!("pending counter closed while draining");
        }
        debug!(stats = ?self.stats(), "worker pool drained");
    }

    /// Tasks submitted but not yet completed.
    pub fn pending(&self) -> usize {
        *self.shared.pending.borrow()
    }

    pub fn stats(&self) -> PoolStats {
        self.shared.counters.snapshot()
    }

    /// Close the queue, let workers finish what was submitted, and join them.
    pub async fn shutdown(mut self) {
        self.queue.take();
        for handle in self.workers.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "worker exited abnormally");
            }
        }
        info!(stats = ?self.stats(), "worker pool shut down");
    }
}

async fn worker_loop(worker_id: usize, shared: Arc<Shared>) {
    loop {
        // The queue lock is released as soon as a task is taken, so other
        // workers can pick up the next one while this one runs.
        let next = {
            let mut queue = shared.queue.lock().await;
            queue.recv().await
        };
        let Some(task) = next else {
            break;
        };

        notify("on_task_start", || shared.observer.on_task_start(task.node()));
        let done = task.run().await;
        debug!(
            worker = worker_id,
            node = %done.node.display_id(),
            status = ?done.status,
            elapsed_ms = done.elapsed.as_millis() as u64,
            "task completed"
        );
        shared.counters.record(&done);
        notify("on_task_complete", || {
            shared.observer.on_task_complete(&done.node, &done.outcome)
        });

        shared.pending.send_modify(|n| *n = n.saturating_sub(1));
    }
    debug!(worker = worker_id, "worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::FnConnector;
    use crate::reporter::FnReporter;
    use slipway_core::{NodeInstance, Outcome, Run, RunCategory};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn nodes(count: usize) -> Vec<NodeInstance> {
        let run = Run::new(RunCategory::Deployment);
        (0..count)
            .map(|i| NodeInstance::new(run.id, format!("node.{i}"), "test"))
            .collect()
    }

    #[tokio::test]
    async fn zero_workers_is_invalid() {
        let result = WorkerPool::start(0);
        assert!(matches!(
            result,
            Err(SchedulerError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn drain_on_idle_pool_returns_immediately() {
        let pool = WorkerPool::start(2).unwrap();
        tokio::time::timeout(Duration::from_secs(1), pool.drain_and_wait())
            .await
            .expect("idle drain should not block");
        assert_eq!(pool.pending(), 0);
        assert_eq!(pool.stats(), PoolStats::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_never_exceeds_max_workers() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let connector = {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            Arc::new(FnConnector::new(move |_node: NodeInstance| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    anyhow::Ok(serde_json::Value::Null)
                }
            }))
        };
        let reports = Arc::new(AtomicUsize::new(0));
        let reporter = {
            let reports = Arc::clone(&reports);
            Arc::new(FnReporter::new(move |_: &NodeInstance, _: &Outcome| {
                reports.fetch_add(1, Ordering::SeqCst);
            }))
        };

        let pool = WorkerPool::start(3).unwrap();
        for node in nodes(12) {
            pool.submit(NodeTask::new(node, connector.clone(), reporter.clone()))
                .unwrap();
        }
        pool.drain_and_wait().await;

        assert_eq!(reports.load(Ordering::SeqCst), 12);
        // 12 tasks of 20ms on 3 workers: every slot is busy at some point.
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(pool.pending(), 0);
        assert_eq!(
            pool.stats(),
            PoolStats {
                submitted: 12,
                succeeded: 12,
                failed: 0
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn single_worker_runs_tasks_in_fifo_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let connector = Arc::new(FnConnector::new(|node: NodeInstance| async move {
            anyhow::Ok(serde_json::json!(node.name))
        }));
        let reporter = {
            let order = Arc::clone(&order);
            Arc::new(FnReporter::new(move |node: &NodeInstance, _: &Outcome| {
                order.lock().unwrap().push(node.name.clone());
            }))
        };

        let pool = WorkerPool::start(1).unwrap();
        for node in nodes(5) {
            pool.submit(NodeTask::new(node, connector.clone(), reporter.clone()))
                .unwrap();
        }
        pool.drain_and_wait().await;

        let order = order.lock().unwrap().clone();
        assert_eq!(order, vec!["node.0", "node.1", "node.2", "node.3", "node.4"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn pool_is_reusable_after_drain() {
        let connector = Arc::new(FnConnector::new(|_node: NodeInstance| async {
            anyhow::Ok(serde_json::Value::Null)
        }));
        let reporter = Arc::new(FnReporter::new(|_: &NodeInstance, _: &Outcome| {}));

        let pool = WorkerPool::start(2).unwrap();
        for round in 1..=3u64 {
            for node in nodes(4) {
                pool.submit(NodeTask::new(node, connector.clone(), reporter.clone()))
                    .unwrap();
            }
            pool.drain_and_wait().await;
            pool.drain_and_wait().await;
            assert_eq!(pool.stats().completed(), round * 4);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_finishes_queued_tasks() {
        let reports = Arc::new(AtomicUsize::new(0));
        let connector = Arc::new(FnConnector::new(|_node: NodeInstance| async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            anyhow::Ok(serde_json::Value::Null)
        }));
        let reporter = {
            let reports = Arc::clone(&reports);
            Arc::new(FnReporter::new(move |_: &NodeInstance, _: &Outcome| {
                reports.fetch_add(1, Ordering::SeqCst);
            }))
        };

        let pool = WorkerPool::start(2).unwrap();
        for node in nodes(6) {
            pool.submit(NodeTask::new(node, connector.clone(), reporter.clone()))
                .unwrap();
        }
        pool.shutdown().await;

        assert_eq!(reports.load(Ordering::SeqCst), 6);
    }
}
