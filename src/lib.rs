//! Real-time room coordination server for a turn-based social-deduction
//! game.
//!
//! The crate is organized around five cooperating pieces:
//!
//! - [`ws::envelope`] — the `{type, timestamp, data}` message envelope
//!   carried on the WebSocket transport
//! - [`registry`] — the in-memory registry of game rooms
//! - [`ws::hub`] — the coordinator that owns live connection membership per
//!   room and performs room-isolated broadcasts
//! - [`ws::connection`] — per-client read/write loops and keepalive
//! - [`api`] — the HTTP surface that creates rooms, admits players, and
//!   upgrades connections
//!
//! Game rules (role assignment, action legality, win conditions) live
//! outside this crate; phases and action payloads pass through as opaque
//! values.

pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod registry;
pub mod ws;

pub use app::{AppState, router, serve};
pub use config::{Config, ConfigBuilder, WsConfig};
pub use db::DatabaseConnection;
pub use error::{Error, Result};
pub use registry::{Room, RoomRegistry};
pub use ws::{Connection, Envelope, Hub};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults.
///
/// Reads `RUST_LOG` for the filter and `LOG_FORMAT=json` for JSON output.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing from an already-built [`Config`].
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::new(&config.logging.level);

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
