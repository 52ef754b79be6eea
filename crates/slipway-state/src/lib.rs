//! slipway-state — run/config store for Slipway.
//!
//! Backed by [redb](https://docs.rs/redb), persists runs and their node
//! instances. Run state changes go through [`RunStore::transition_run`],
//! which applies the lifecycle rules from `slipway-core` before writing.
//!
//! Values are JSON-serialized into redb's `&[u8]` columns. Node keys are
//! `{run_id}:{node_name}` so a run's nodes share a scannable prefix.
//!
//! `RunStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`).

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use store::RunStore;
