//! Tally command line: merge a wallet with its stored copies, or push a body.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

use tally_merge::MergeOptions;
use tally_node::{init_logging, LogFormat, Node, NodeConfig};
use tally_types::WalletId;

#[derive(Parser)]
#[command(name = "tally", about = "Reconcile replicated wallet ledgers", version)]
struct Cli {
    /// Home directory with wallets, copies and locks.
    /// Defaults to the config file's value, then "./tally_home".
    #[arg(long, global = true, env = "TALLY_HOME")]
    home: Option<PathBuf>,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seconds to wait for a wallet another process is working on.
    #[arg(long, global = true, env = "TALLY_LOCK_TIMEOUT")]
    lock_timeout: Option<u64>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, global = true, env = "TALLY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Merge a wallet with its stored copies; prints the modified ids.
    Merge {
        #[arg(value_parser = parse_wallet_id)]
        wallet: WalletId,

        /// Strict mode: new transactions must appear in every copy.
        #[arg(long)]
        no_baseline: bool,
    },
    /// Push a wallet body from a file; prints the affected ids.
    Push {
        #[arg(value_parser = parse_wallet_id)]
        wallet: WalletId,

        file: PathBuf,
    },
}

fn parse_wallet_id(s: &str) -> Result<WalletId, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn load_config(cli: &Cli) -> anyhow::Result<NodeConfig> {
    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => NodeConfig::default(),
    };
    if let Some(home) = &cli.home {
        config.home = home.clone();
    }
    if let Some(secs) = cli.lock_timeout {
        config.lock_timeout_secs = secs;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format.to_string();
    }
    Ok(config)
}

/// Run one command against the opened node.
async fn run(node: &Node, config: &NodeConfig, command: Command) -> anyhow::Result<Vec<WalletId>> {
    match command {
        Command::Merge { wallet, no_baseline } => {
            let options = if no_baseline {
                MergeOptions::strict()
            } else {
                config.merge_options()
            };
            node.merge(wallet, options)
                .await
                .with_context(|| format!("merge of {wallet} failed"))
        }
        Command::Push { wallet, file } => {
            let body = std::fs::read_to_string(&file)
                .with_context(|| format!("cannot read {}", file.display()))?;
            node.entrance()
                .start(|entrance| async move { entrance.push(wallet, body).await })
                .await?
                .with_context(|| format!("push of {wallet} failed"))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let format: LogFormat = config.log_format.parse().map_err(anyhow::Error::msg)?;
    init_logging(format, &config.log_level);
    if let Some(path) = &cli.config {
        tracing::info!("Loaded config from {}", path.display());
    }

    let node = Node::new(config.clone()).context("failed to open home directory")?;

    // On SIGINT the command future is dropped, which releases any wallet lock
    // it holds; a merge already running finishes before the runtime exits.
    let modified = tokio::select! {
        result = run(&node, &config, cli.command) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received SIGINT, shutting down");
            anyhow::bail!("interrupted");
        }
    };

    for id in modified {
        println!("{id}");
    }
    Ok(())
}
