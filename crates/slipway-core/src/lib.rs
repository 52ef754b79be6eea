//! slipway-core — shared types for the Slipway run orchestrator.
//!
//! - [`lifecycle`]: the ordered `RunState` space, transitions, and resume
//!   computation
//! - [`types`]: runs, node instances, outcomes
//! - [`config`]: `slipway.toml` parsing

pub mod config;
pub mod lifecycle;
pub mod types;

pub use config::SlipwayConfig;
pub use lifecycle::{LifecycleError, RunState};
pub use types::*;
