//! Run driver error types.

use slipway_core::{RunCategory, RunId, RunState};
use slipway_scheduler::SchedulerError;
use slipway_state::StateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("no executor registered for run category: {0}")]
    ExecutorNotFound(RunCategory),

    #[error("run {run_id}: {failed} of {submitted} nodes failed in {state}")]
    NodesFailed {
        run_id: RunId,
        state: RunState,
        failed: u64,
        submitted: u64,
    },

    #[error("run {run_id} is already {state}")]
    AlreadyTerminal { run_id: RunId, state: RunState },

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("{0}")]
    Executor(#[from] anyhow::Error),
}

pub type RunnerResult<T> = Result<T, RunnerError>;
