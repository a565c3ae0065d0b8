//! Quarry CLI - Command line interface for Quarry
//!
//! Repository ingestion with a persistent workspace cache.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use quarry_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{ProjectArgs, RepoArgs};

/// Quarry: queryable snapshots of local and remote repositories
#[derive(Parser, Debug)]
#[command(name = "quarry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Workspace root directory (overrides config and env)
    #[arg(long, global = true, env = "QUARRY_WORKSPACE_ROOT")]
    workspace_root: Option<PathBuf>,

    /// Clone/fetch timeout in seconds (overrides config and env)
    #[arg(long, global = true, env = "QUARRY_FETCH_TIMEOUT_SECS")]
    fetch_timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Acquire and query repositories
    #[command(visible_alias = "r")]
    Repo(RepoArgs),

    /// Manage stored project records
    #[command(visible_alias = "p")]
    Project(ProjectArgs),

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Load configuration with overrides
    let config = Config::load_with_overrides(cli.workspace_root.clone(), cli.fetch_timeout)?;

    if cli.verbose {
        tracing::info!(
            workspace_root = %config.workspace_root()?.display(),
            fetch_timeout_secs = ?config.workspace.fetch_timeout_secs,
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("quarry {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Repo(args)) => {
            args.execute(cli.verbose, &config).await?;
        }
        Some(Commands::Project(args)) => {
            args.execute(cli.verbose, &config).await?;
        }
        Some(Commands::Config) => {
            println!("Quarry Configuration");
            println!("====================");
            println!();
            println!("Workspace:");
            println!("  root: {}", config.workspace_root()?.display());
            println!(
                "  fetch_timeout_secs: {}",
                config
                    .workspace
                    .fetch_timeout_secs
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "(none)".to_string())
            );
            println!();
            if let Some(path) = Config::default_config_path() {
                println!("Config file: {}", path.display());
                if path.exists() {
                    println!("  (exists)");
                } else {
                    println!("  (not found - using defaults)");
                }
            }
        }
        None => {
            println!("Quarry - queryable snapshots of local and remote repositories");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
