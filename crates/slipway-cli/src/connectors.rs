//! Built-in connectors registered by the CLI.
//!
//! - `shell`: runs the node's `command` parameter with `sh -c`
//! - `noop`: succeeds immediately, echoing the node back

use std::process::Stdio;
use std::sync::Arc;

use anyhow::Context;
use tokio::process::Command;
use tracing::debug;

use slipway_core::NodeInstance;
use slipway_scheduler::{CloudConnector, ConnectorRegistry, ExecuteFuture};

/// Parameter holding the shell command for the `shell` connector.
pub const COMMAND_PARAM: &str = "command";

pub fn builtin() -> ConnectorRegistry {
    ConnectorRegistry::new()
        .with("shell", Arc::new(ShellConnector))
        .with("noop", Arc::new(NoopConnector))
}

/// Runs a node's `command` in a shell.
///
/// The node is described to the command through `SLIPWAY_RUN_ID`,
/// `SLIPWAY_NODE`, `SLIPWAY_CLOUD` and one `SLIPWAY_PARAM_<KEY>` variable
/// per parameter. A non-zero exit is a failure carrying stderr.
pub struct ShellConnector;

impl ShellConnector {
    async fn run(node: &NodeInstance) -> anyhow::Result<serde_json::Value> {
        let script = node
            .param(COMMAND_PARAM)
            .with_context(|| format!("node {} has no `{COMMAND_PARAM}` parameter", node.name))?;

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(script)
            .env("SLIPWAY_RUN_ID", node.run_id.to_string())
            .env("SLIPWAY_NODE", &node.name)
            .env("SLIPWAY_CLOUD", node.cloud.as_str())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        for (key, value) in &node.params {
            cmd.env(format!("SLIPWAY_PARAM_{}", env_key(key)), value);
        }

        debug!(node = %node.display_id(), %script, "running shell command");
        let output = cmd
            .output()
            .await
            .with_context(|| format!("failed to spawn shell for {}", node.name))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
            anyhow::bail!(
                "command exited with {}: {}",
                output
                    .status
                    .code()
                    .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                stderr
            );
        }

        Ok(serde_json::json!({
            "exit_code": output.status.code(),
            "stdout": stdout,
        }))
    }
}

impl CloudConnector for ShellConnector {
    fn execute<'a>(&'a self, node: &'a NodeInstance) -> ExecuteFuture<'a> {
        Box::pin(Self::run(node))
    }
}

/// Succeeds without doing anything.
pub struct NoopConnector;

impl CloudConnector for NoopConnector {
    fn execute<'a>(&'a self, node: &'a NodeInstance) -> ExecuteFuture<'a> {
        Box::pin(async move { anyhow::Ok(serde_json::json!({ "node": node.display_id() })) })
    }
}

/// `db-port` → `DB_PORT`.
fn env_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
