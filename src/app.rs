//! Application state, router assembly, and the serve loop.

use crate::api;
use crate::config::{Config, WsConfig};
use crate::db::DatabaseConnection;
use crate::error::{Error, Result};
use crate::registry::RoomRegistry;
use crate::ws::{self, Hub};
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub registry: Arc<RoomRegistry>,
    /// Absent when the server runs without a database (tests); the health
    /// endpoint then reports unhealthy while everything else keeps working.
    pub db: Option<DatabaseConnection>,
    pub ws: WsConfig,
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/rooms", post(api::rooms::create_room))
        .route("/api/rooms/{code}/join", post(api::rooms::join_room))
        .route("/api/health/db", get(api::health::db_health))
        .route("/ws", get(ws::ws_upgrade))
        .layer(cors_layer())
        .with_state(state)
}

// Permissive for now; a production deployment must restrict origins.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Bind the listener and serve until shutdown.
///
/// A bind failure is fatal; callers surface it at process start.
pub async fn serve(config: &Config, state: AppState) -> Result<()> {
    let addr = config.server.addr().map_err(|e| {
        Error::internal(format!(
            "invalid server address {}:{} - {}",
            config.server.host, config.server.port, e
        ))
    })?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::internal(format!("failed to bind {}: {}", addr, e)))?;

    tracing::info!(%addr, "server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::internal(format!("server error: {}", e)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => tracing::error!(error = %err, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
