//! CLI for the pagefetch page fetcher.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pagefetch_core::config;
use std::path::PathBuf;

use commands::{run_canonicalize, run_config, run_fetch};

/// Top-level CLI for the pagefetch crawler page fetcher.
#[derive(Debug, Parser)]
#[command(name = "pagefetch")]
#[command(about = "pagefetch: polite, size-bounded page fetching for crawlers", long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of ~/.config/pagefetch/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch one or more pages and print one line per URL.
    Fetch {
        /// Absolute http(s) URLs.
        #[arg(required = true)]
        urls: Vec<String>,
        /// Fetch with N concurrent workers sharing one fetcher (politeness still applies globally).
        #[arg(long, default_value = "1", value_name = "N")]
        workers: usize,
    },

    /// Print the canonical form of a URL, or resolve it against a base URL.
    Canonicalize {
        url: String,
        /// Resolve URL (e.g. a Location header value) against this base.
        #[arg(long)]
        base: Option<String>,
    },

    /// Print the effective configuration as TOML.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = match &cli.config {
            Some(path) => config::load_from(path)?,
            None => config::load_or_init()?,
        };
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Fetch { urls, workers } => run_fetch(&cfg, urls, workers).await?,
            CliCommand::Canonicalize { url, base } => run_canonicalize(&url, base.as_deref())?,
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
