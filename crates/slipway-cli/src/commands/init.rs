use std::path::Path;

use slipway_core::SlipwayConfig;

use super::open_store;

pub fn init(config_path: &Path, config: &SlipwayConfig, force: bool) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    std::fs::write(config_path, config.to_toml_string()?)?;
    println!("✓ Wrote {}", config_path.display());

    open_store(config)?;
    println!("✓ Store ready at {}", config.store.path.display());
    Ok(())
}
