//! RunStore — redb-backed persistence for runs and node instances.
//!
//! All values are JSON-serialized into redb's `&[u8]` value columns. The
//! store supports both on-disk and in-memory backends (the latter for
//! testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use slipway_core::{epoch_secs, lifecycle, NodeInstance, NodeStatus, Outcome, Run, RunId, RunState};

use crate::error::{StateError, StateResult};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe run store backed by redb.
#[derive(Clone)]
pub struct RunStore {
    db: Arc<Database>,
}

impl std::fmt::Debug for RunStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunStore").finish_non_exhaustive()
    }
}

impl RunStore {
    /// Open (or create) a persistent run store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "run store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory run store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory run store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(RUNS).map_err(map_err!(Table))?;
        txn.open_table(NODES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Runs ───────────────────────────────────────────────────────

    /// Insert or replace a run record.
    pub fn put_run(&self, run: &Run) -> StateResult<()> {
        let key = run.table_key();
        let value = serde_json::to_vec(run).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(RUNS).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, state = %run.state, "run stored");
        Ok(())
    }

    /// Get a run by ID.
    pub fn get_run(&self, run_id: RunId) -> StateResult<Option<Run>> {
        let key = run_id.to_string();
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RUNS).map_err(map_err!(Table))?;
        match table.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let run: Run =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(run))
            }
            None => Ok(None),
        }
    }

    /// Get a run by ID, failing if it does not exist.
    pub fn require_run(&self, run_id: RunId) -> StateResult<Run> {
        self.get_run(run_id)?.ok_or(StateError::RunNotFound(run_id))
    }

    /// List all runs.
    pub fn list_runs(&self) -> StateResult<Vec<Run>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RUNS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let run: Run =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(run);
        }
        Ok(results)
    }

    /// Apply a lifecycle transition to a stored run.
    ///
    /// Read, validation and write happen in one write transaction, so two
    /// concurrent callers cannot both move the run from the same state.
    pub fn transition_run(&self, run_id: RunId, target: RunState) -> StateResult<Run> {
        let key = run_id.to_string();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let run = {
            let mut table = txn.open_table(RUNS).map_err(map_err!(Table))?;
            let mut run: Run = {
                let guard = table
                    .get(key.as_str())
                    .map_err(map_err!(Read))?
                    .ok_or(StateError::RunNotFound(run_id))?;
                serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
            };
            let from = run.state;
            run.state = lifecycle::transition(from, target)?;
            run.updated_at = epoch_secs();

            let value = serde_json::to_vec(&run).map_err(map_err!(Serialize))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            debug!(%run_id, %from, to = %target, "run transitioned");
            run
        };
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(run)
    }

    /// Delete a run by ID. Returns true if it existed.
    pub fn delete_run(&self, run_id: RunId) -> StateResult<bool> {
        let key = run_id.to_string();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(RUNS).map_err(map_err!(Table))?;
            existed = table.remove(key.as_str()).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed, "run deleted");
        Ok(existed)
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Insert or update a node instance.
    pub fn put_node(&self, node: &NodeInstance) -> StateResult<()> {
        let key = node.table_key();
        let value = serde_json::to_vec(node).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a node of a run by name.
    pub fn get_node(&self, run_id: RunId, name: &str) -> StateResult<Option<NodeInstance>> {
        let key = format!("{run_id}:{name}");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        match table.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let node: NodeInstance =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    /// List all node instances of a run.
    pub fn list_nodes_for_run(&self, run_id: RunId) -> StateResult<Vec<NodeInstance>> {
        let prefix = format!("{run_id}:");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(&prefix) {
                let node: NodeInstance =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(node);
            }
        }
        Ok(results)
    }

    /// Set the status of a stored node.
    pub fn set_node_status(
        &self,
        run_id: RunId,
        name: &str,
        status: NodeStatus,
    ) -> StateResult<NodeInstance> {
        self.update_node(run_id, name, |node| node.status = status)
    }

    /// Persist the outcome of a node operation.
    ///
    /// A success marks the node `Ready`, a failure marks it `Failed`.
    pub fn record_outcome(
        &self,
        run_id: RunId,
        name: &str,
        outcome: &Outcome,
    ) -> StateResult<NodeInstance> {
        self.update_node(run_id, name, |node| {
            node.status = if outcome.is_success() {
                NodeStatus::Ready
            } else {
                NodeStatus::Failed
            };
            node.last_outcome = Some(outcome.clone());
        })
    }

    /// Delete every node of a run. Returns number deleted.
    pub fn purge_nodes(&self, run_id: RunId) -> StateResult<u32> {
        let prefix = format!("{run_id}:");
        // Collect keys in a read transaction first.
        let keys: Vec<String> = {
            let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
            let table = txn.open_table(NODES).map_err(map_err!(Table))?;
            table
                .iter()
                .map_err(map_err!(Read))?
                .filter_map(|entry| {
                    let (key, _) = entry.ok()?;
                    let k = key.value().to_string();
                    k.starts_with(&prefix).then_some(k)
                })
                .collect()
        };
        // Delete in a write transaction.
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let count = keys.len() as u32;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            for key in &keys {
                table.remove(key.as_str()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%run_id, count, "nodes purged");
        Ok(count)
    }

    /// Read-modify-write a node in one write transaction.
    fn update_node<F>(&self, run_id: RunId, name: &str, apply: F) -> StateResult<NodeInstance>
    where
        F: FnOnce(&mut NodeInstance),
    {
        let key = format!("{run_id}:{name}");
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let node = {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            let mut node: NodeInstance = {
                let guard = table
                    .get(key.as_str())
                    .map_err(map_err!(Read))?
                    .ok_or_else(|| StateError::NodeNotFound(key.clone()))?;
                serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
            };
            apply(&mut node);
            node.updated_at = epoch_secs();

            let value = serde_json::to_vec(&node).map_err(map_err!(Serialize))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            node
        };
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(node)
    }
}
