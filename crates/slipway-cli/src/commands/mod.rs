pub mod drive;
pub mod init;
pub mod node;
pub mod run;

use slipway_core::SlipwayConfig;
use slipway_state::RunStore;

/// Open the store named by the configuration, creating parent directories.
pub fn open_store(config: &SlipwayConfig) -> anyhow::Result<RunStore> {
    if let Some(parent) = config.store.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(RunStore::open(&config.store.path)?)
}
