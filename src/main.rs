//! Pairs puzzle players two at a time over `/ws` and referees their rounds.
//!
//! Each socket is one connection. A `joinQueue` either waits in the single
//! queue slot or starts a session with whoever is there; the session then
//! relays moves and turns `boardCleared`/`roundLost` into damage and a bigger
//! board. Player and game records are plain REST calls backed by Supabase.

mod app;
mod config;
mod game;
mod http;
mod matchmaking;
mod store;
mod util;
mod ws;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::http::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the process env may carry everything
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    init_tracing(&config.log_level);

    let addr: SocketAddr = config.server_addr;
    let rate_limit = config.input_rate_limit;
    let router = build_router(AppState::new(config));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, rate_limit, "Puzzle duel server accepting connections on /ws");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Stopped; open sessions were dropped");
    Ok(())
}

/// `RUST_LOG` wins over `LOG_LEVEL` when both are set
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        _ = ctrl_c => "ctrl-c",
        _ = terminate => "sigterm",
    };
    info!(signal, "Shutting down, no longer accepting sockets");
}
