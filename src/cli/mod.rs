//! CLI module
//!
//! Provides the command-line interface:
//! - start: boot the hub and serve WebSocket + HTTP traffic
//! - check: validate the configuration file and exit

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{check, run, run_command, start};
pub use errors::{CliError, CliResult};
