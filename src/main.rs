// ==============================================================================
// main.rs - Auth Gateway Entry Point
// ==============================================================================
// Description: Axum web server for authentication and request governance
// Author: Matt Barham
// Created: 2025-11-06
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use auth_gateway::{
    build_router,
    config::Config,
    store::{InMemoryUserStore, PgUserStore, UserStore},
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting Auth Gateway v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(Config::from_env().context("Failed to load configuration")?);
    info!(governance = ?config.governance, "Configuration loaded");

    let users: Arc<dyn UserStore> = match &config.server.database_url {
        Some(url) => Arc::new(
            PgUserStore::connect(url)
                .await
                .context("Failed to connect to PostgreSQL")?,
        ),
        None => {
            warn!("DATABASE_URL not set; user records are kept in memory and lost on restart");
            Arc::new(InMemoryUserStore::new())
        }
    };

    let state = AppState::new(config.clone(), users);

    // Start sweep task (revocations + idle rate-limit buckets)
    let sweep_state = state.clone();
    let sweep_interval = config.server.sweep_interval;
    tokio::spawn(async move {
        sweep_loop(sweep_state, sweep_interval).await;
    });

    let app = build_router(state);

    let addr = config.server.listen_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Auth Gateway listening on {}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Auth Gateway stopped");
    Ok(())
}

/// Compact logs by default, JSON when LOG_FORMAT=json; level from RUST_LOG
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }
}

async fn sweep_loop(state: AppState, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let (revocations, buckets) = state.sweep();
        debug!(revocations, buckets, "Sweep completed");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
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
