//! CLI command implementations
//!
//! `start` loads the config, wires the hub to the realtime and HTTP
//! servers, and serves until interrupted. `check` stops after config
//! validation so deploy scripts can verify a file before a restart.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use crate::catalog::CategoryCatalog;
use crate::config::Config;
use crate::http::HttpApi;
use crate::hub::EventHub;
use crate::observability::{LifecycleEvent, MetricsRegistry};
use crate::realtime::{JwtVerifier, RealtimeServer};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Start { config } => start(&config),
        Command::Check { config } => check(&config),
    }
}

/// Boot the hub and serve WebSocket + HTTP traffic until ctrl-c
pub fn start(config_path: &Path) -> CliResult<()> {
    let config = Config::load_or_default(config_path)?;

    LifecycleEvent::BootStart.emit(&[("version", env!("CARGO_PKG_VERSION"))]);

    let ws_addr = config.realtime.bind_addr.clone();
    let http_addr = config.http.socket_addr();

    let catalog = Arc::new(CategoryCatalog::builtin());
    let metrics = Arc::new(MetricsRegistry::new());
    let hub = Arc::new(EventHub::with_parts(config.hub, catalog, metrics));

    let verifier = Arc::new(JwtVerifier::new(&config.auth.secret));
    let realtime = Arc::new(RealtimeServer::new(
        config.realtime,
        Arc::clone(&hub),
        verifier,
    ));
    let http = HttpApi::new(config.http, hub, Arc::clone(realtime.presence()));

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    runtime.block_on(async {
        // Ctrl-c flips the realtime server's shutdown broadcast so the
        // accept loop exits on its graceful path.
        let signal_server = Arc::clone(&realtime);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                LifecycleEvent::ShutdownStart.emit(&[]);
                signal_server.shutdown();
            }
        });

        LifecycleEvent::BootComplete
            .emit(&[("http_addr", &http_addr), ("ws_addr", &ws_addr)]);

        tokio::select! {
            result = realtime.run() => result
                .map_err(|e| CliError::serve_failed(format!("WebSocket server failed: {}", e))),
            result = http.start() => result
                .map_err(|e| CliError::serve_failed(format!("HTTP server failed: {}", e))),
        }
    })?;

    LifecycleEvent::ShutdownComplete.emit(&[]);

    Ok(())
}

/// Validate the configuration file and exit
pub fn check(config_path: &Path) -> CliResult<()> {
    let config = Config::load_or_default(config_path)?;

    println!(
        "{}",
        json!({
            "valid": true,
            "ws_addr": config.realtime.bind_addr,
            "http_addr": config.http.socket_addr(),
            "history_capacity": config.hub.history_capacity,
            "max_propagation_depth": config.hub.max_propagation_depth,
        })
    );

    Ok(())
}
