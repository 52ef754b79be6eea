//! Run driver — walks a run from its stored state to the end.
//!
//! The stored state is the last state whose work completed. Resuming a run
//! executes the remaining states in canonical order, persisting each one
//! only after its executor succeeds. An executor error aborts the run.
//! Once a run is terminal its node records are purged.

use std::sync::Arc;

use tracing::{error, info, warn};

use slipway_core::{LifecycleError, Run, RunId, RunState};
use slipway_state::{RunStore, StateError};

use crate::error::{RunnerError, RunnerResult};
use crate::executor::ExecutorRegistry;

/// Result of persisting the next state.
enum Step {
    Moved(Run),
    Ended(Run),
}

pub struct RunDriver {
    store: RunStore,
    executors: Arc<ExecutorRegistry>,
}

impl RunDriver {
    pub fn new(store: RunStore, executors: Arc<ExecutorRegistry>) -> Self {
        Self { store, executors }
    }

    /// Drive a run through every state after its current one.
    ///
    /// A run that is already terminal is returned unchanged. If the run is
    /// cancelled while a state executes, the walk stops there and the
    /// cancelled run is returned (or the state's error, if it failed).
    pub async fn resume(&self, run_id: RunId) -> RunnerResult<Run> {
        let mut run = self.store.require_run(run_id)?;
        if run.is_terminal() {
            info!(%run_id, state = %run.state, "run already finished");
            return Ok(run);
        }

        let executor = self.executors.resolve(run.category)?;
        info!(
            %run_id,
            category = %run.category,
            from = %run.state,
            remaining = run.remaining_states().len(),
            "resuming run"
        );

        for &state in run.remaining_states() {
            info!(%run_id, %state, "executing state");
            let executed = executor.execute_state(&run, state).await;

            let target = match &executed {
                Ok(()) => state,
                Err(e) => {
                    error!(%run_id, %state, error = %e, "state failed; aborting run");
                    RunState::Aborted
                }
            };

            match self.advance(run_id, target)? {
                Step::Ended(current) => return executed.map(|()| current),
                Step::Moved(moved) => {
                    if let Err(e) = executed {
                        self.finish(&moved)?;
                        return Err(e);
                    }
                    run = moved;
                }
            }
        }

        self.finish(&run)?;
        info!(%run_id, state = %run.state, "run finished");
        Ok(run)
    }

    /// Persist `target`. A run that reached a terminal state in the
    /// meantime is finished and handed back as [`Step::Ended`].
    fn advance(&self, run_id: RunId, target: RunState) -> RunnerResult<Step> {
        match self.store.transition_run(run_id, target) {
            Ok(run) => Ok(Step::Moved(run)),
            Err(StateError::Lifecycle(LifecycleError::InvalidTransition { from, .. }))
                if from.is_terminal() =>
            {
                let current = self.store.require_run(run_id)?;
                warn!(%run_id, state = %current.state, "run ended elsewhere; stopping");
                self.finish(&current)?;
                Ok(Step::Ended(current))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Move a live run to `Cancelled`.
    ///
    /// Work already handed to a worker pool is not interrupted; a resume in
    /// progress notices the cancellation before its next state.
    pub fn cancel(&self, run_id: RunId) -> RunnerResult<Run> {
        let run = self.store.require_run(run_id)?;
        if run.is_terminal() {
            return Err(RunnerError::AlreadyTerminal {
                run_id,
                state: run.state,
            });
        }
        let cancelled = self.store.transition_run(run_id, RunState::Cancelled)?;
        self.finish(&cancelled)?;
        info!(%run_id, "run cancelled");
        Ok(cancelled)
    }

    fn finish(&self, run: &Run) -> RunnerResult<()> {
        if run.is_terminal() {
            let purged = self.store.purge_nodes(run.id)?;
            info!(run_id = %run.id, purged, "node records purged");
        }
        Ok(())
    }
}
