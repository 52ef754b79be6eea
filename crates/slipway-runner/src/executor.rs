//! Run executors — the work performed inside each run state.
//!
//! Every [`RunCategory`] has exactly one executor, looked up through the
//! [`ExecutorRegistry`]. The driver calls [`RunExecutor::execute_state`]
//! once per state it walks; the executor decides which states carry work.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use slipway_core::{NodeStatus, Run, RunCategory, RunState};
use slipway_scheduler::{ScalingCoordinator, StoreReporter};
use slipway_state::RunStore;

use crate::error::{RunnerError, RunnerResult};

/// Boxed future returned by [`RunExecutor::execute_state`].
pub type StateFuture<'a> = Pin<Box<dyn Future<Output = RunnerResult<()>> + Send + 'a>>;

/// Performs the work attached to one state of a run.
pub trait RunExecutor: Send + Sync {
    fn execute_state<'a>(&'a self, run: &'a Run, state: RunState) -> StateFuture<'a>;
}

/// Typed lookup table from run category to executor.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<RunCategory, Arc<dyn RunExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, category: RunCategory, executor: Arc<dyn RunExecutor>) {
        if self.executors.insert(category, executor).is_some() {
            warn!(%category, "executor replaced");
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, category: RunCategory, executor: Arc<dyn RunExecutor>) -> Self {
        self.register(category, executor);
        self
    }

    pub fn resolve(&self, category: RunCategory) -> RunnerResult<Arc<dyn RunExecutor>> {
        self.executors
            .get(&category)
            .cloned()
            .ok_or(RunnerError::ExecutorNotFound(category))
    }
}

/// Provisions the nodes of a run through the scaling coordinator.
///
/// Only `Provisioning` carries work: every node of the run is marked
/// `Provisioning`, dispatched as one batch, and its outcome persisted by a
/// [`StoreReporter`]. The state fails if any node failed. The coordinator
/// is held for the whole batch, so runs sharing an executor provision one
/// after another.
pub struct ProvisioningExecutor {
    store: RunStore,
    coordinator: Mutex<ScalingCoordinator>,
}

impl ProvisioningExecutor {
    pub fn new(store: RunStore, coordinator: ScalingCoordinator) -> Self {
        Self {
            store,
            coordinator: Mutex::new(coordinator),
        }
    }

    async fn provision(&self, run: &Run) -> RunnerResult<()> {
        let mut nodes = self.store.list_nodes_for_run(run.id)?;
        for node in &mut nodes {
            *node = self
                .store
                .set_node_status(run.id, &node.name, NodeStatus::Provisioning)?;
        }

        let reporter = Arc::new(StoreReporter::new(self.store.clone()));
        let mut coordinator = self.coordinator.lock().await;
        let batch = coordinator.run_batch(nodes, reporter)?;
        // run_batch just succeeded, so there is always a batch to wait for.
        let Some(summary) = coordinator.wait_batch_finished().await else {
            return Ok(());
        };

        info!(
            run_id = %run.id,
            batch,
            submitted = summary.submitted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "provisioning batch finished"
        );

        if summary.failed > 0 {
            return Err(RunnerError::NodesFailed {
                run_id: run.id,
                state: RunState::Provisioning,
                failed: summary.failed,
                submitted: summary.submitted,
            });
        }
        Ok(())
    }
}

impl RunExecutor for ProvisioningExecutor {
    fn execute_state<'a>(&'a self, run: &'a Run, state: RunState) -> StateFuture<'a> {
        Box::pin(async move {
            match state {
                RunState::Provisioning => self.provision(run).await,
                other => {
                    debug!(run_id = %run.id, state = %other, "nothing to do");
                    Ok(())
                }
            }
        })
    }
}
