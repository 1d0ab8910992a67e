//! `pagefetch config` – print the effective configuration, passwords masked.

use anyhow::{Context, Result};
use pagefetch_core::FetchConfig;

pub fn run_config(cfg: &FetchConfig) -> Result<()> {
    print!("{}", render(cfg)?);
    Ok(())
}

fn render(cfg: &FetchConfig) -> Result<String> {
    toml::to_string_pretty(&cfg.redacted()).context("failed to render config")
}
