//! Server initialization and routing
//!
//! Router setup, middleware stack (delivery tracking, timeout), and
//! graceful shutdown handling.

use crate::config::ServerConfig;
use crate::middleware::track_delivery;
use crate::routes::{api_info, describe, health, login, not_found};
use crate::state::ServerState;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the router with all routes and middleware.
pub fn build_router(state: ServerState) -> Router {
    let timeout = state.config.timeout();
    let max_body = state.config.max_body_size();

    Router::new()
        .route("/", get(api_info))
        .route("/health", get(health::health_check))
        .route("/describe", post(describe::describe))
        .route("/login", post(login::login))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(from_fn(track_delivery))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP event handler.
///
/// Initializes structured logging, wires the pipeline from the environment,
/// and serves until SIGTERM or Ctrl+C.
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(config.tracing_filter())
        .with_target(false)
        .json()
        .init();

    let state = ServerState::new(config.clone()).map_err(|err| anyhow::anyhow!(err.to_string()))?;
    let app = build_router(state);

    let addr: SocketAddr = config.socket_addr()?;
    tracing::info!(
        addr = %addr,
        timeout_secs = config.timeout_secs,
        max_body_mb = config.max_body_size_mb,
        "starting alt-text event handler"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
