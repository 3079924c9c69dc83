//! Modhost - module host CLI.
//!
//! This is the main entry point for the module host, which:
//! - Loads configuration from TOML
//! - Sets up the module workspace
//! - Acquires, refreshes, removes, and resolves modules

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use modhost::config::ModhostConfig;
use modhost::module::{execute, EntryRegistry, ModuleArgs};

/// Modhost - module acquisition and dynamic-load pipeline
#[derive(Parser, Debug)]
#[command(name = "modhost")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run in verbose mode (debug logging)
    #[arg(short, long)]
    verbose: bool,

    #[command(flatten)]
    module: ModuleArgs,
}

fn load_config(path: Option<PathBuf>) -> Result<ModhostConfig> {
    match path {
        Some(path) => {
            let config = ModhostConfig::load(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            Ok(config)
        }
        None => Ok(ModhostConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(args.config).context("Failed to load configuration")?;

    // The standalone binary registers no entry constructors; hosts that
    // embed the pipeline build their own registry.
    let registry = Arc::new(EntryRegistry::new());

    execute(args.module, &config, registry)
        .await
        .context("Command failed")?;
    Ok(())
}
