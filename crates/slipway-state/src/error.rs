//! Error types for the run store.

use slipway_core::{LifecycleError, RunId};
use thiserror::Error;

/// Result type alias for run store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during run store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("run not found: {0}")]
    RunNotFound(RunId),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
