//! redb table definitions for the run store.
//!
//! Both tables use `&str` keys and `&[u8]` values (JSON-serialized domain types).

use redb::TableDefinition;

/// Runs keyed by run UUID.
pub const RUNS: TableDefinition<&str, &[u8]> = TableDefinition::new("runs");

/// Node instances keyed by `{run_id}:{node_name}`.
pub const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");
