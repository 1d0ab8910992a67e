//! CLI command handlers, one file per command.

mod canonicalize;
mod config;
mod fetch;

pub use canonicalize::run_canonicalize;
pub use config::run_config;
pub use fetch::run_fetch;
