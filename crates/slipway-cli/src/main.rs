//! slipway — drive deployment and image-build runs from the command line.
//!
//! # Usage
//!
//! ```text
//! slipway init
//! slipway run create --category deployment
//! slipway node add --run <ID> --name web.1 --cloud shell --param command="echo up"
//! slipway resume --run <ID>
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use slipway_core::{RunCategory, SlipwayConfig};

mod commands;
mod connectors;

#[derive(Parser)]
#[command(
    name = "slipway",
    about = "Slipway — multi-cloud run orchestrator",
    version,
    propagate_version = true
)]
struct Cli {
    /// Configuration file. Defaults apply when it does not exist.
    #[arg(short, long, global = true, default_value = "slipway.toml")]
    config: PathBuf,

    /// Override the store path from the configuration.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Override scheduler.max_workers.
    #[arg(long, global = true)]
    max_workers: Option<usize>,

    /// Raise verbosity (-v info, -vv debug, -vvv trace). Ignored if RUST_LOG is set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default slipway.toml and create the store.
    Init {
        /// Overwrite an existing configuration file.
        #[arg(long)]
        force: bool,
    },
    /// Create and inspect runs.
    Run {
        #[command(subcommand)]
        action: RunAction,
    },
    /// Manage the nodes of a run.
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
    /// List the states a run would still pass through after STATE.
    States {
        #[arg(long)]
        after: String,
    },
    /// Drive a run from its stored state to the end.
    Resume {
        #[arg(long)]
        run: Uuid,
    },
    /// Cancel a run that has not finished.
    Cancel {
        #[arg(long)]
        run: Uuid,
    },
    /// Dispatch one batch over a run's nodes without moving the run.
    Scale {
        #[arg(long)]
        run: Uuid,
    },
}

#[derive(Subcommand)]
enum RunAction {
    /// Create a run in the Initializing state.
    Create {
        /// deployment or image_build
        #[arg(long, default_value = "deployment")]
        category: RunCategory,
    },
    /// Show a run and its nodes as JSON.
    Show {
        #[arg(long)]
        run: Uuid,
    },
    /// List every stored run.
    List,
}

#[derive(Subcommand)]
enum NodeAction {
    /// Add a node to a live run.
    Add {
        #[arg(long)]
        run: Uuid,
        #[arg(long)]
        name: String,
        /// Connector key (built in: shell, noop).
        #[arg(long)]
        cloud: String,
        /// Connector parameter, KEY=VALUE. Repeatable.
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
    if key.is_empty() {
        return Err(format!("empty key in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn load_config(cli: &Cli) -> anyhow::Result<SlipwayConfig> {
    let mut config = if cli.config.exists() {
        SlipwayConfig::from_file(&cli.config)?
    } else {
        SlipwayConfig::default()
    };
    if let Some(store) = &cli.store {
        config.store.path = store.clone();
    }
    if let Some(max_workers) = cli.max_workers {
        config.scheduler.max_workers = max_workers;
    }
    if cli.verbose > 0 {
        config.scheduler.verbose_level = cli.verbose;
    }
    config.validate()?;
    Ok(config)
}

fn init_tracing(config: &SlipwayConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.scheduler.log_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config);

    match cli.command {
        Commands::Init { force } => commands::init::init(&cli.config, &config, force),
        Commands::Run { action } => match action {
            RunAction::Create { category } => commands::run::create(&config, category),
            RunAction::Show { run } => commands::run::show(&config, run),
            RunAction::List => commands::run::list(&config),
        },
        Commands::Node { action } => match action {
            NodeAction::Add {
                run,
                name,
                cloud,
                params,
            } => commands::node::add(&config, run, name, cloud, params),
        },
        Commands::States { after } => commands::run::states_after(&after),
        Commands::Resume { run } => commands::drive::resume(&config, run).await,
        Commands::Cancel { run } => commands::drive::cancel(&config, run),
        Commands::Scale { run } => commands::drive::scale(&config, run).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn param_splits_on_first_equals() {
        assert_eq!(
            parse_param("command=echo a=b").unwrap(),
            ("command".to_string(), "echo a=b".to_string())
        );
        assert!(parse_param("no-equals").is_err());
        assert!(parse_param("=value").is_err());
    }

    #[test]
    fn flags_override_missing_config_file() {
        let cli = Cli::parse_from([
            "slipway",
            "--config",
            "/nonexistent/slipway.toml",
            "--max-workers",
            "9",
            "-vv",
            "run",
            "list",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.scheduler.max_workers, 9);
        assert_eq!(config.scheduler.log_directive(), "debug");
    }

    #[test]
    fn zero_workers_rejected() {
        let cli = Cli::parse_from([
            "slipway",
            "--config",
            "/nonexistent/slipway.toml",
            "--max-workers",
            "0",
            "run",
            "list",
        ]);
        assert!(load_config(&cli).is_err());
    }
}
