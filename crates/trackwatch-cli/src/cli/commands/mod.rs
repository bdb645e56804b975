//! CLI command handlers, one file per command.

mod config;
mod probe;

pub use config::run_config;
pub use probe::run_probe;
