//! Domain types shared across Slipway crates.
//!
//! All types are serializable to/from JSON so the state store can persist
//! them verbatim.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lifecycle::{self, LifecycleError, RunState};

/// Unique identifier for a run.
pub type RunId = Uuid;

// ── Run ───────────────────────────────────────────────────────────

/// What a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunCategory {
    /// Multi-node application deployment.
    Deployment,
    /// Single-machine image build.
    ImageBuild,
}

impl RunCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            RunCategory::Deployment => "deployment",
            RunCategory::ImageBuild => "image_build",
        }
    }
}

impl fmt::Display for RunCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "deployment" => Ok(RunCategory::Deployment),
            "image_build" | "image" => Ok(RunCategory::ImageBuild),
            other => Err(format!("unknown run category: {other}")),
        }
    }
}

/// One orchestrated deployment or build.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Run {
    pub id: RunId,
    pub category: RunCategory,
    pub state: RunState,
    /// Unix timestamp (seconds) when the run was created.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last state change.
    pub updated_at: u64,
}

impl Run {
    /// Create a fresh run in `Initializing`.
    pub fn new(category: RunCategory) -> Self {
        let now = epoch_secs();
        Self {
            id: Uuid::new_v4(),
            category,
            state: RunState::Initializing,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move the run to `target` through the lifecycle rules.
    ///
    /// The run is left untouched if the transition is illegal.
    pub fn advance(&mut self, target: RunState) -> Result<(), LifecycleError> {
        self.state = lifecycle::transition(self.state, target)?;
        self.updated_at = epoch_secs();
        Ok(())
    }

    /// States this run still has to pass through.
    pub fn remaining_states(&self) -> &'static [RunState] {
        self.state.states_after()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Build the key for the runs table.
    pub fn table_key(&self) -> String {
        self.id.to_string()
    }
}

// ── Node instance ─────────────────────────────────────────────────

/// Identifier of a cloud provider connector (e.g. `"exoscale"`, `"shell"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CloudKey(String);

impl CloudKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CloudKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CloudKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for CloudKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Provisioning status of a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Provisioning,
    Ready,
    Failed,
}

/// One participant machine of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeInstance {
    pub run_id: RunId,
    /// Node name, unique within the run (e.g. `"db.1"`).
    pub name: String,
    /// Which connector provisions this node.
    pub cloud: CloudKey,
    /// Provider-specific parameters. Opaque to the scheduler.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    pub status: NodeStatus,
    /// Outcome of the last operation executed on this node.
    #[serde(default)]
    pub last_outcome: Option<Outcome>,
    /// Unix timestamp (seconds) of the last status change.
    pub updated_at: u64,
}

impl NodeInstance {
    /// Create a pending node for `run_id`.
    pub fn new(run_id: RunId, name: impl Into<String>, cloud: impl Into<CloudKey>) -> Self {
        Self {
            run_id,
            name: name.into(),
            cloud: cloud.into(),
            params: BTreeMap::new(),
            status: NodeStatus::Pending,
            last_outcome: None,
            updated_at: epoch_secs(),
        }
    }

    /// Attach a provider parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// `name@cloud`, used in logs.
    pub fn display_id(&self) -> String {
        format!("{}@{}", self.name, self.cloud)
    }

    /// Build the composite key for the nodes table.
    pub fn table_key(&self) -> String {
        format!("{}:{}", self.run_id, self.name)
    }
}

// ── Outcome ───────────────────────────────────────────────────────

/// Result of executing one node operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success { payload: serde_json::Value },
    Failure { error: String },
}

impl Outcome {
    pub fn success(payload: serde_json::Value) -> Self {
        Outcome::Success { payload }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Outcome::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Error description for a failed outcome.
    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::Failure { error } => Some(error),
            Outcome::Success { .. } => None,
        }
    }
}

/// Current Unix epoch in seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
