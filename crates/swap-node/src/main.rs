//! atomicswaps node: entry point.
//!
//! Runs the swap coordinator with configuration from a TOML file or defaults.

mod config;
mod demo;
mod node;
mod storage;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use config::NodeConfig;
use demo::DemoArgs;
use node::SwapNode;

/// Hash-and-time-locked cross-ledger swap coordinator
#[derive(Parser, Debug)]
#[command(name = "atomicswaps", version, about = "Hash-and-time-locked cross-ledger swap coordinator")]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, global = true, default_value = "atomicswaps.toml")]
    config: PathBuf,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default config file and exit.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Recover persisted swaps and run the coordinator until interrupted.
    Run {
        /// Override the data directory.
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Keep swap records in memory only.
        #[arg(long)]
        no_persist: bool,
    },
    /// Execute one swap between two simulated ledgers and print the outcome as JSON.
    Demo(DemoArgs),
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Handle init before anything reads the file
    if let Command::Init { force } = cli.command {
        init_tracing(cli.log_level.as_deref().unwrap_or("info"), "text");
        if cli.config.exists() && !force {
            anyhow::bail!(
                "{} already exists; pass --force to overwrite",
                cli.config.display()
            );
        }
        NodeConfig::default().save(&cli.config)?;
        tracing::info!(path = %cli.config.display(), "wrote default config");
        return Ok(());
    }

    let mut config = NodeConfig::load(&cli.config)?;
    if cli.verbose {
        config.logging.level = "debug".into();
    } else if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_tracing(&config.logging.level, &config.logging.format);

    match cli.command {
        Command::Init { .. } => Ok(()),
        Command::Run {
            data_dir,
            no_persist,
        } => {
            // Apply CLI overrides
            if let Some(data_dir) = data_dir {
                config.storage.data_dir = data_dir;
            }
            if no_persist {
                config.storage.persist = false;
            }
            run_node(config).await
        }
        Command::Demo(args) => {
            let report = demo::run_demo(&config, &args).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

async fn run_node(config: NodeConfig) -> anyhow::Result<()> {
    tracing::info!("atomicswaps node v{}", env!("CARGO_PKG_VERSION"));

    let node = SwapNode::new(config)?;
    node.start().await?;

    // Set up graceful shutdown on SIGINT/SIGTERM
    let shutdown = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
        tracing::info!("received shutdown signal");
    };

    tokio::select! {
        result = node.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "node event loop error");
            }
        }
        _ = shutdown => {
            tracing::info!("initiating graceful shutdown");
        }
    }

    node.shutdown().await?;
    tracing::info!("atomicswaps node exited cleanly");
    Ok(())
}
