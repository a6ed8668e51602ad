//! WebSocket upgrade endpoint.
//!
//! `GET /ws?room=<code>&player=<id>&name=<name>` switches the request onto
//! the persistent transport. The room must exist and both `room` and
//! `player` must be non-empty before the protocol switch happens; refusals
//! are plain HTTP status responses.

use super::connection::{Connection, handle_socket};
use super::envelope::{self, Envelope, PlayerJoinedData};
use super::hub::Registration;
use crate::app::AppState;
use crate::error::{Error, Result};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use serde::Deserialize;
use tokio::sync::mpsc;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    room: Option<String>,
    player: Option<String>,
    name: Option<String>,
}

/// Handle the upgrade request and start the connection's loops.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    upgrade: WebSocketUpgrade,
) -> Result<Response> {
    let room_code = query
        .room
        .filter(|room| !room.is_empty())
        .ok_or_else(|| Error::invalid_request("room parameter is required"))?;
    let player_id = query
        .player
        .filter(|player| !player.is_empty())
        .ok_or_else(|| Error::invalid_request("player parameter is required"))?;
    let player_name = query.name.unwrap_or_default();

    let room = state.registry.room(&room_code)?;
    // Derived, not trusted from the client; the rules layer re-checks
    // host-only commands against the room's host id.
    let is_host = room.host_id == player_id;

    let (queue_tx, queue_rx) = mpsc::channel(state.ws.outbound_queue);
    let conn = Connection::new(
        state.hub.clone(),
        room_code.clone(),
        player_id.clone(),
        player_name.clone(),
        is_host,
        queue_tx.downgrade(),
    );

    let hub = state.hub.clone();
    let ws_config = state.ws.clone();

    Ok(upgrade
        .max_message_size(ws_config.max_frame_bytes)
        .on_upgrade(move |socket| async move {
            tracing::info!(
                room_code = %room_code,
                player_id = %player_id,
                is_host,
                "websocket connected"
            );

            hub.register(Registration {
                conn_id: conn.conn_id(),
                room_code: room_code.clone(),
                player_id: player_id.clone(),
                player_name: player_name.clone(),
                queue: queue_tx,
            });

            hub.broadcast_to_room(
                &room_code,
                Envelope::new(
                    envelope::PLAYER_JOINED,
                    PlayerJoinedData {
                        player_id,
                        player_name,
                        is_host,
                    },
                ),
            );

            handle_socket(socket, conn, queue_rx, ws_config).await;
        }))
}
