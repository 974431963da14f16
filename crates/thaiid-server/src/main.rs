//! thaiid-server binary
//!
//! Reads `config.toml` (or the path given with `--config`), watches the
//! attached PC/SC readers and pushes card events to websocket clients on
//! `/ws`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use thaiid_card::{CardMonitor, CardReader, MonitorConfig, ReaderService};
use thaiid_server::{relay, routes, AppState, Hub, ServiceConfig};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "thaiid-server", version, about = "Thai ID card reader websocket service")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = ServiceConfig::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    init_tracing(&cfg.log.level);

    let hub = Hub::spawn();
    let app = routes::build_router(Arc::new(AppState::new(hub.clone())))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let address = cfg.server.address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("Listening on ws://{address}/ws");

    let monitor = start_monitor(MonitorConfig::from(&cfg.monitor), hub);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shutting down");
    if let Some(mut monitor) = monitor {
        // Joining the monitor thread blocks for up to one poll interval
        tokio::task::spawn_blocking(move || monitor.stop_monitoring())
            .await
            .context("failed to stop card monitor")?;
    }

    Ok(())
}

/// `RUST_LOG` wins, otherwise the configured level. Debug and trace output
/// carry source locations.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let verbose = matches!(level.to_ascii_lowercase().as_str(), "debug" | "trace");

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(verbose)
        .with_line_number(verbose)
        .init();
}

/// Start watching readers and relaying their events. Without PC/SC the
/// service keeps serving websocket clients, it just never has cards to report.
fn start_monitor(config: MonitorConfig, hub: Hub) -> Option<CardMonitor<CardReader>> {
    let reader = match CardReader::new() {
        Ok(reader) => reader,
        Err(err) => {
            warn!(error = %err, "Failed to establish PC/SC context, card monitoring disabled");
            return None;
        }
    };

    let mut monitor = CardMonitor::new(reader, config);
    let events = match monitor.start_monitoring() {
        Ok(events) => events,
        Err(err) => {
            warn!(error = %err, "Failed to start card monitor");
            return None;
        }
    };

    if let Err(err) = relay::spawn_relay(events, hub) {
        warn!(error = %err, "Failed to start event relay");
        return None;
    }

    info!("Card monitoring started");
    Some(monitor)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
