//! # pointrelay
//!
//! Rendezvous relay binary: loads settings, starts logging, serves the
//! WebSocket relay and waits for a shutdown signal.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use pointrelay_core::logging::LogFormat;
use pointrelay_server::config::ServerConfig;
use pointrelay_server::server::RelayServer;
use pointrelay_settings::RelaySettings;

/// How long to wait for the listener and sessions to drain after a signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Rendezvous relay server.
#[derive(Parser, Debug)]
#[command(name = "pointrelay", about = "Rendezvous relay server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.pointrelay/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log filter when `RUST_LOG` is unset (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Log line format: `compact` or `json` (overrides settings).
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    /// Fold CLI flags over loaded settings.
    fn apply(&self, settings: &mut RelaySettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if let Some(format) = self.log_format {
            settings.logging.format = format;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut settings = match args.settings {
        Some(ref path) => pointrelay_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => pointrelay_settings::load_settings().with_context(|| {
            format!(
                "Failed to load settings from {}",
                pointrelay_settings::settings_path().display()
            )
        })?,
    };
    args.apply(&mut settings);

    pointrelay_core::logging::init_subscriber(&settings.logging.level, settings.logging.format);

    let server = RelayServer::new(ServerConfig::from_settings(&settings));
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("pointrelay listening on ws://{addr}");

    wait_for_signal().await?;

    tracing::info!("Shutting down...");
    let outcome = server
        .shutdown()
        .graceful_shutdown(vec![handle], Some(SHUTDOWN_GRACE))
        .await;
    tracing::info!(?outcome, "Shutdown complete");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM.
#[cfg(unix)]
async fn wait_for_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate()).context("Failed to listen for SIGTERM")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("Failed to listen for ctrl-c")?,
        _ = term.recv() => tracing::info!("received SIGTERM"),
    }
    Ok(())
}

/// Resolve on Ctrl-C.
#[cfg(not(unix))]
async fn wait_for_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")
}
