//! CLI argument definitions using clap
//!
//! Commands:
//! - plexus start --config <path>
//! - plexus check --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Plexus - a cross-domain event hub with real-time delivery
#[derive(Parser, Debug)]
#[command(name = "plexus")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the hub and serve WebSocket + HTTP traffic
    Start {
        /// Path to configuration file
        #[arg(long, default_value = "./plexus.json")]
        config: PathBuf,
    },

    /// Validate the configuration file and exit
    Check {
        /// Path to configuration file
        #[arg(long, default_value = "./plexus.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
