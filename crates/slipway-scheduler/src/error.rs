//! Scheduler error types.

use slipway_core::CloudKey;
use thiserror::Error;

/// Errors that can occur while dispatching a batch.
///
/// A failing node never produces one of these; its failure travels as an
/// `Outcome` through the batch's reporter.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("no connector registered for cloud: {0}")]
    ConnectorNotFound(CloudKey),

    #[error("a batch is already running; wait for it before submitting another")]
    BatchInProgress,

    #[error("worker pool is closed")]
    PoolClosed,
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
