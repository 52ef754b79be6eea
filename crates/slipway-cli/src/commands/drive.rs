use std::sync::Arc;

use tracing::info;

use slipway_core::{NodeStatus, RunCategory, RunId, SlipwayConfig};
use slipway_runner::{ExecutorRegistry, ProvisioningExecutor, RunDriver};
use slipway_scheduler::{ScalingCoordinator, StoreReporter, TracingObserver};
use slipway_state::RunStore;

use super::open_store;
use crate::connectors;

fn coordinator(config: &SlipwayConfig) -> ScalingCoordinator {
    ScalingCoordinator::new(Arc::new(connectors::builtin()), &config.scheduler)
        .with_observer(Arc::new(TracingObserver))
}

fn driver(config: &SlipwayConfig, store: &RunStore) -> RunDriver {
    // Both categories provision their machines the same way; an image
    // build simply has a single node.
    let provisioning = Arc::new(ProvisioningExecutor::new(store.clone(), coordinator(config)));
    let executors = ExecutorRegistry::new()
        .with(RunCategory::Deployment, provisioning.clone())
        .with(RunCategory::ImageBuild, provisioning);
    RunDriver::new(store.clone(), Arc::new(executors))
}

pub async fn resume(config: &SlipwayConfig, run_id: RunId) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let run = driver(config, &store).resume(run_id).await?;
    println!("✓ Run {} is {}", run.id, run.state);
    Ok(())
}

pub fn cancel(config: &SlipwayConfig, run_id: RunId) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let run = driver(config, &store).cancel(run_id)?;
    println!("✓ Run {} is {}", run.id, run.state);
    Ok(())
}

/// Run one batch over the run's nodes and print the summary. The run's
/// state is left alone; node statuses and outcomes are persisted.
pub async fn scale(config: &SlipwayConfig, run_id: RunId) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let run = store.require_run(run_id)?;
    if run.is_terminal() {
        anyhow::bail!("run {run_id} is {}", run.state);
    }

    let mut nodes = store.list_nodes_for_run(run_id)?;
    for node in &mut nodes {
        *node = store.set_node_status(run_id, &node.name, NodeStatus::Provisioning)?;
    }

    let mut coordinator = coordinator(config);
    coordinator.run_batch(nodes, Arc::new(StoreReporter::new(store.clone())))?;
    let summary = coordinator.wait_batch_finished().await;
    coordinator.shutdown().await;

    if let Some(summary) = summary {
        info!(%run_id, failed = summary.failed, "scale batch finished");
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use slipway_core::{NodeInstance, Run, RunState};

    fn config(dir: &tempfile::TempDir) -> SlipwayConfig {
        let mut config = SlipwayConfig::default();
        config.store.path = dir.path().join("runs").join("slipway.redb");
        config.scheduler.max_workers = 2;
        config
    }

    fn seed(config: &SlipwayConfig, commands: &[(&str, &str)]) -> RunId {
        let store = open_store(config).unwrap();
        let run = Run::new(RunCategory::Deployment);
        store.put_run(&run).unwrap();
        for (name, command) in commands {
            let node = NodeInstance::new(run.id, *name, "shell").with_param("command", *command);
            store.put_node(&node).unwrap();
        }
        run.id
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn resume_drives_shell_nodes_to_done() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let run_id = seed(&config, &[("web.1", "true"), ("web.2", "echo ok")]);

        resume(&config, run_id).await.unwrap();

        let store = open_store(&config).unwrap();
        assert_eq!(store.require_run(run_id).unwrap().state, RunState::Done);
        assert!(store.list_nodes_for_run(run_id).unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failing_node_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let run_id = seed(&config, &[("web.1", "true"), ("db.1", "exit 1")]);

        assert!(resume(&config, run_id).await.is_err());

        let store = open_store(&config).unwrap();
        assert_eq!(store.require_run(run_id).unwrap().state, RunState::Aborted);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn scale_persists_outcomes_without_moving_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let run_id = seed(&config, &[("web.1", "echo up"), ("db.1", "exit 2")]);

        scale(&config, run_id).await.unwrap();

        let store = open_store(&config).unwrap();
        assert_eq!(
            store.require_run(run_id).unwrap().state,
            RunState::Initializing
        );
        let web = store.get_node(run_id, "web.1").unwrap().unwrap();
        assert_eq!(web.status, NodeStatus::Ready);
        let db = store.get_node(run_id, "db.1").unwrap().unwrap();
        assert_eq!(db.status, NodeStatus::Failed);
    }

    #[test]
    fn cancel_then_cancel_again_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let run_id = seed(&config, &[]);

        cancel(&config, run_id).unwrap();
        assert!(cancel(&config, run_id).is_err());
    }
}
