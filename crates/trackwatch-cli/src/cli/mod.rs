//! CLI for trackwatch.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use trackwatch_core::config;

use commands::{run_config, run_probe};

/// Top-level CLI for trackwatch.
#[derive(Debug, Parser)]
#[command(name = "trackwatch")]
#[command(about = "trackwatch: BitTorrent tracker announce tools", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Send one announce request and print the raw tracker response.
    Probe {
        /// Full HTTP/HTTPS announce URL, query string included.
        url: String,
        /// Print the body as hex instead of raw bytes.
        #[arg(long)]
        hex: bool,
    },

    /// Show the config file path and the effective configuration.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Probe { url, hex } => run_probe(&cfg, &url, hex).await?,
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}
