//! plexus CLI entry point
//!
//! A minimal entrypoint that parses arguments, dispatches to the CLI
//! module, prints errors to stderr, and exits non-zero on failure.
//! All real logic lives behind cli::run.

use plexus::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
