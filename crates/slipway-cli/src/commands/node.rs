use slipway_core::{NodeInstance, RunId, SlipwayConfig};

use super::open_store;

pub fn add(
    config: &SlipwayConfig,
    run_id: RunId,
    name: String,
    cloud: String,
    params: Vec<(String, String)>,
) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let run = store.require_run(run_id)?;
    if run.is_terminal() {
        anyhow::bail!("run {run_id} is {}; nodes can only be added to live runs", run.state);
    }
    if store.get_node(run_id, &name)?.is_some() {
        anyhow::bail!("run {run_id} already has a node named {name}");
    }

    let node = params
        .into_iter()
        .fold(NodeInstance::new(run_id, name, cloud), |node, (k, v)| {
            node.with_param(k, v)
        });
    store.put_node(&node)?;
    println!("✓ Added {}", node.display_id());
    Ok(())
}
