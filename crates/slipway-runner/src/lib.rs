//! slipway-runner — drives runs through their lifecycle.
//!
//! # Components
//!
//! - **`executor`** — `RunExecutor` trait, the category → executor
//!   registry, and the provisioning executor backed by the scheduler
//! - **`driver`** — `RunDriver`: resume a run from its stored state, cancel
//!   it, purge its nodes once it ends

pub mod driver;
pub mod error;
pub mod executor;

pub use driver::RunDriver;
pub use error::{RunnerError, RunnerResult};
pub use executor::{ExecutorRegistry, ProvisioningExecutor, RunExecutor, StateFuture};
