use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::EnvFilter;

use mihomo_panel::cli::Cli;
use mihomo_panel::config::PanelConfig;
use mihomo_panel::server::{self, AppState};
use mihomo_panel::settings::SettingsStore;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        2 => "trace",
        _ => "trace,hyper=debug,tower=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.verbose >= 2)
        .with_thread_ids(cli.verbose >= 3)
        .with_line_number(cli.verbose >= 3)
        .init();

    debug!("mihomo-panel started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let store = Arc::new(SettingsStore::new(&cli.env_file));
    let config = PanelConfig::resolve(&cli, &store)
        .await
        .context("Failed to resolve configuration")?;
    let addr = config.socket_addr();

    let state = AppState::load(config, store)
        .await
        .context("Failed to read the panel secret")?;
    if !state.auth.is_configured() {
        warn!("No MIHOMO_SECRET configured; settings can be changed by anyone who can reach the panel");
    }

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server started on {}", listener.local_addr()?);

    // Open streams never finish on their own, so shutdown drops the server
    // outright; each relay's process guard stops its command.
    tokio::select! {
        result = server::serve(Arc::new(state), listener) => {
            result.context("Server failed")?;
        }
        () = shutdown_signal() => {
            info!("Shutting down");
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
                return;
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
