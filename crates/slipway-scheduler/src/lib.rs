//! slipway-scheduler — concurrent dispatch of node operations.
//!
//! Takes the node instances of a run and executes one operation per node
//! against the node's cloud connector, with bounded concurrency. Every
//! node's outcome is handed to a caller-supplied reporter.
//!
//! # Architecture
//!
//! ```text
//! ScalingCoordinator
//!   ├── ConnectorRegistry (CloudKey → CloudConnector)
//!   ├── BatchObserver (task start / complete, batch complete)
//!   └── WorkerPool (max_workers Tokio tasks, FIFO queue)
//!       └── NodeTask (connector.execute → Outcome → reporter.report)
//! ```
//!
//! A failing node never fails the batch: the failure is an `Outcome`
//! delivered to the reporter like any other.

pub mod connector;
pub mod coordinator;
pub mod error;
pub mod observer;
pub mod pool;
pub mod reporter;
pub mod task;

pub use connector::{CloudConnector, ConnectorRegistry, ExecuteFuture, FnConnector};
pub use coordinator::{BatchSummary, ScalingCoordinator};
pub use error::{SchedulerError, SchedulerResult};
pub use observer::{BatchObserver, NoopObserver, TracingObserver};
pub use pool::{PoolStats, WorkerPool};
pub use reporter::{DoneReporter, FnReporter, ReportFuture, StoreReporter};
pub use task::{CompletedTask, NodeTask, TaskStatus};
