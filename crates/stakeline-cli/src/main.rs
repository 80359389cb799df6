//! Stakeline CLI
//!
//! Runs the API node and inspects a local ledger database.

use clap::{Parser, Subcommand};
use serde::Serialize;
use stakeline_core::SystemClock;
use stakeline_ledger::Ledger;
use stakeline_node::config::{LogFormat, LoggingConfig, StorageKind};
use stakeline_node::NodeConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "stakeline")]
#[command(version)]
#[command(about = "Stakeline - staking and referral reward ledger", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "stakeline.toml")]
    config: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API
    Serve {
        /// Listen address, overrides the config file
        #[arg(short, long)]
        listen: Option<String>,

        /// Keep the ledger in memory instead of RocksDB
        #[arg(long)]
        in_memory: bool,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Show account statistics
    Stats {
        address: String,
    },

    /// List staking positions of an account
    Positions {
        address: String,
    },

    /// Show the reward history of an account
    Rewards {
        address: String,
    },

    /// Check balances against reward history and open positions
    Audit {
        /// Single account; all accounts when omitted
        address: Option<String>,
    },
}

fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false),
            )
            .init(),
    }
}

/// Ledger over the configured database, for offline inspection
fn open_ledger(config: &NodeConfig) -> anyhow::Result<Ledger> {
    let store = stakeline_storage::open(&config.storage.backend())?;
    Ok(Ledger::new(store, Arc::new(SystemClock), config.ledger.clone()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = NodeConfig::load(Some(cli.config.as_path()))?;
    init_logging(cli.verbose, &config.logging);

    match cli.command {
        Commands::Serve { listen, in_memory } => {
            if let Some(listen) = listen {
                config.server.listen_addr = listen;
            }
            if in_memory {
                config.storage.backend = StorageKind::Memory;
            }

            tracing::info!("Stakeline v{}", env!("CARGO_PKG_VERSION"));
            tracing::info!("Config: {:?}", cli.config);
            tracing::info!("Storage: {:?}", config.storage.backend());

            stakeline_node::serve(config).await?;
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }

        Commands::Stats { address } => {
            let ledger = open_ledger(&config)?;
            print_json(&ledger.stats(&address)?)?;
        }

        Commands::Positions { address } => {
            let ledger = open_ledger(&config)?;
            print_json(&ledger.list_positions(&address)?)?;
        }

        Commands::Rewards { address } => {
            let ledger = open_ledger(&config)?;
            print_json(&ledger.reward_history(&address)?)?;
        }

        Commands::Audit { address } => {
            let ledger = open_ledger(&config)?;
            let reports = match address {
                Some(address) => vec![ledger.audit(&address)?],
                None => ledger.audit_all()?,
            };

            let inconsistent = reports.iter().filter(|r| !r.is_consistent()).count();
            print_json(&reports)?;
            println!("Audited {} accounts, {} inconsistent", reports.len(), inconsistent);

            if inconsistent > 0 {
                anyhow::bail!("ledger audit failed for {} accounts", inconsistent);
            }
        }
    }

    Ok(())
}
