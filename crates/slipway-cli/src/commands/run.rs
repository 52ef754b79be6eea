use slipway_core::lifecycle;
use slipway_core::{Run, RunCategory, RunId, SlipwayConfig};

use super::open_store;

pub fn create(config: &SlipwayConfig, category: RunCategory) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let run = Run::new(category);
    store.put_run(&run)?;
    tracing::info!(run_id = %run.id, %category, "run created");
    println!("{}", run.id);
    Ok(())
}

pub fn show(config: &SlipwayConfig, run_id: RunId) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let run = store.require_run(run_id)?;
    let nodes = store.list_nodes_for_run(run_id)?;
    let view = serde_json::json!({
        "run": run,
        "remaining_states": run.remaining_states(),
        "nodes": nodes,
    });
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

pub fn list(config: &SlipwayConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let runs = store.list_runs()?;
    if runs.is_empty() {
        println!("No runs.");
        return Ok(());
    }
    for run in runs {
        println!("{}  {:<12} {}", run.id, run.category, run.state);
    }
    Ok(())
}

pub fn states_after(name: &str) -> anyhow::Result<()> {
    let remaining = lifecycle::states_after_named(name)?;
    if remaining.is_empty() {
        println!("(none — {name} is terminal)");
    }
    for state in remaining {
        println!("{state}");
    }
    Ok(())
}
