//! Lumina daemon: entry point for running the governance gate.

use anyhow::Context;
use clap::Parser;
use lumina_node::{GovernanceNode, NodeConfig};
use lumina_utils::{init_logging, LogFormat};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lumina-daemon", about = "Lumina governance gate daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "LUMINA_CONFIG")]
    config: Option<PathBuf>,

    /// Log level filter, e.g. "info" or "debug,lumina_governance=trace".
    #[arg(long, env = "LUMINA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "LUMINA_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// File the journal ledger appends anchor records to.
    #[arg(long, env = "LUMINA_JOURNAL")]
    journal: Option<PathBuf>,

    /// Fraction of eligible approvers required for quorum.
    #[arg(long, env = "LUMINA_QUORUM_FRACTION")]
    quorum_fraction: Option<f64>,

    /// Coherence below this suspends governance.
    #[arg(long, env = "LUMINA_COHERENCE_MINIMUM")]
    coherence_minimum: Option<f64>,

    /// Ledger / chain name recorded on anchors.
    #[arg(long, env = "LUMINA_ANCHOR_CHAIN")]
    anchor_chain: Option<String>,

    /// Do not sweep policy decisions onto the ledger.
    #[arg(long, env = "LUMINA_DISABLE_ANCHORING")]
    disable_anchoring: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the gate until SIGINT/SIGTERM.
    Run,
    /// Print the effective configuration as TOML and exit.
    PrintConfig,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_toml_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => NodeConfig::default(),
        };

        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(journal) = &self.journal {
            config.journal_path = journal.clone();
        }
        if let Some(fraction) = self.quorum_fraction {
            config.governance.quorum_fraction = fraction;
        }
        if let Some(minimum) = self.coherence_minimum {
            config.coherence.minimum = minimum;
        }
        if let Some(chain) = &self.anchor_chain {
            config.anchor.chain = chain.clone();
        }
        if self.disable_anchoring {
            config.anchor.enabled = false;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    match cli.command {
        Command::PrintConfig => {
            print!("{}", config.to_toml_string()?);
        }
        Command::Run => {
            if let Err(e) = init_logging(config.log_format, &config.log_level) {
                eprintln!("logging already initialised: {e}");
            }
            if let Some(path) = &cli.config {
                tracing::info!("Loaded config from {}", path.display());
            }

            let mut node = GovernanceNode::open(config).await?;
            node.start().await?;

            node.shutdown.clone().wait_for_signal().await;
            tracing::info!("Shutdown signal received, stopping gate");
            node.stop().await?;

            match node.metrics.encode() {
                Ok(text) => tracing::debug!(metrics = %text, "final metrics"),
                Err(e) => tracing::warn!(error = %e, "failed to encode metrics"),
            }
            tracing::info!("Lumina daemon exited cleanly");
        }
    }

    Ok(())
}
