//! slipway.toml configuration parser.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default number of concurrent node operations.
pub const DEFAULT_MAX_WORKERS: usize = 4;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlipwayConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Worker slots per batch.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Diagnostic verbosity, 0 (quiet) to 3 (trace). No effect on scheduling.
    #[serde(default)]
    pub verbose_level: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_store_path() -> PathBuf {
    PathBuf::from("slipway.redb")
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            verbose_level: 0,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl SlipwayConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SlipwayConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.scheduler.max_workers == 0 {
            anyhow::bail!("scheduler.max_workers must be at least 1");
        }
        Ok(())
    }
}

impl SchedulerConfig {
    /// Default `tracing` directive for this verbosity.
    pub fn log_directive(&self) -> &'static str {
        match self.verbose_level {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
