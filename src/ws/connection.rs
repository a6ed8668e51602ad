//! Per-client connection state and its two I/O loops.
//!
//! The transport is not safe for concurrent writes, so every connection
//! runs a dedicated write loop that owns the sink and serializes data
//! frames with keepalive probes. The read loop runs independently because
//! reads and writes block independently. The loops terminate each other
//! through the hub: a read-side exit unregisters the connection, the hub
//! closes the outbound queue, and the write loop observes the closure.

use super::envelope::{self, Envelope, ErrorData, HostCommandData, PlayerJoinedData};
use super::hub::Hub;
use crate::config::WsConfig;
use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use uuid::Uuid;

/// A single client connection to a room.
///
/// Holds the identity the client presented at upgrade plus a weak handle to
/// its own outbound queue for reply paths (`pong`, inline errors). The
/// strong sender lives in the hub's membership map; once the hub drops it,
/// replies silently stop and the write loop shuts down.
pub struct Connection {
    hub: Arc<Hub>,
    conn_id: Uuid,
    room_code: String,
    player_id: String,
    player_name: String,
    is_host: bool,
    outbound: mpsc::WeakSender<Envelope>,
}

impl Connection {
    pub fn new(
        hub: Arc<Hub>,
        room_code: String,
        player_id: String,
        player_name: String,
        is_host: bool,
        outbound: mpsc::WeakSender<Envelope>,
    ) -> Self {
        Self {
            hub,
            conn_id: Uuid::new_v4(),
            room_code,
            player_id,
            player_name,
            is_host,
            outbound,
        }
    }

    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }

    pub fn room_code(&self) -> &str {
        &self.room_code
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    /// Route an inbound envelope by type.
    pub(crate) fn handle_envelope(&self, message: Envelope) {
        tracing::debug!(
            player_id = %self.player_id,
            message_type = %message.message_type,
            "received message"
        );

        let Envelope {
            message_type, data, ..
        } = message;

        match message_type.as_str() {
            envelope::JOIN_ROOM => self.handle_join_room(),
            envelope::SUBMIT_ACTION => {
                // Action resolution belongs to the rules layer.
                tracing::info!(
                    room_code = %self.room_code,
                    player_id = %self.player_id,
                    data = %data,
                    "action submitted"
                );
            }
            envelope::HOST_COMMAND => self.handle_host_command(data),
            envelope::PING => self.send(Envelope::new(envelope::PONG, serde_json::Value::Null)),
            other => {
                tracing::warn!(
                    player_id = %self.player_id,
                    message_type = %other,
                    "unknown message type"
                );
                self.send_error(
                    "unknown_message_type",
                    format!("unknown message type: {}", other),
                );
            }
        }
    }

    /// A rejoining client announces itself to the rest of the room.
    fn handle_join_room(&self) {
        let data = PlayerJoinedData {
            player_id: self.player_id.clone(),
            player_name: self.player_name.clone(),
            is_host: self.is_host,
        };
        self.hub.broadcast_to_room(
            &self.room_code,
            Envelope::new(envelope::PLAYER_REJOINED, data),
        );
    }

    fn handle_host_command(&self, data: serde_json::Value) {
        if !self.is_host {
            self.send_error("not_host", "only the host can perform this action");
            return;
        }

        // Command execution belongs to the rules layer.
        match serde_json::from_value::<HostCommandData>(data) {
            Ok(command) => tracing::info!(
                room_code = %self.room_code,
                player_id = %self.player_id,
                command = %command.command,
                "host command received"
            ),
            Err(err) => tracing::warn!(
                player_id = %self.player_id,
                error = %err,
                "malformed host command payload"
            ),
        }
    }

    /// Send an envelope to this connection only.
    fn send(&self, message: Envelope) {
        let Some(queue) = self.outbound.upgrade() else {
            return; // queue already closed by the hub
        };
        if queue.try_send(message).is_err() {
            tracing::warn!(
                player_id = %self.player_id,
                "outbound queue full, dropping reply"
            );
        }
    }

    /// Send an inline error envelope to this connection only.
    fn send_error(&self, code: &str, message: impl Into<String>) {
        self.send(Envelope::new(
            envelope::ERROR,
            ErrorData {
                code: code.to_string(),
                message: message.into(),
            },
        ));
    }
}

/// Unregisters the connection when dropped, so cleanup runs on every exit
/// path out of the read loop, including panics in a dispatch handler.
struct UnregisterGuard {
    hub: Arc<Hub>,
    room_code: String,
    conn_id: Uuid,
}

impl Drop for UnregisterGuard {
    fn drop(&mut self) {
        self.hub.unregister(&self.room_code, self.conn_id);
    }
}

/// Read loop: pumps frames from the transport into the dispatcher.
///
/// Each iteration re-arms the read deadline; a peer that stays silent past
/// `pong_wait` (keepalive replies included) is treated as dead. Parse
/// errors drop the frame and keep the connection; transport errors and
/// close frames end it.
pub async fn read_loop(conn: &Connection, mut receiver: SplitStream<WebSocket>, ws: &WsConfig) {
    let _guard = UnregisterGuard {
        hub: conn.hub.clone(),
        room_code: conn.room_code.clone(),
        conn_id: conn.conn_id,
    };

    loop {
        let frame = match timeout(ws.pong_wait(), receiver.next()).await {
            Err(_) => {
                tracing::debug!(
                    room_code = %conn.room_code,
                    player_id = %conn.player_id,
                    "read deadline expired"
                );
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(err))) => {
                tracing::debug!(
                    room_code = %conn.room_code,
                    player_id = %conn.player_id,
                    error = %err,
                    "transport error"
                );
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => match serde_json::from_str::<Envelope>(text.as_str()) {
                Ok(message) => conn.handle_envelope(message),
                Err(err) => tracing::warn!(
                    player_id = %conn.player_id,
                    error = %err,
                    "dropping unparseable frame"
                ),
            },
            Message::Close(_) => break,
            // The transport layer answers pings itself; pongs matter only
            // because arriving at all re-arms the deadline above.
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Binary(_) => tracing::warn!(
                player_id = %conn.player_id,
                "ignoring binary frame"
            ),
        }
    }

    tracing::info!(
        room_code = %conn.room_code,
        player_id = %conn.player_id,
        "client disconnected"
    );
}

/// Write loop: sole owner of the transport's write half.
///
/// Drains the outbound queue and interleaves keepalive probes. Terminates
/// when the hub closes the queue (after sending a close frame) or when any
/// write fails or overruns its deadline.
pub async fn write_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Envelope>,
    ws: WsConfig,
) {
    let mut ticker = interval_at(Instant::now() + ws.ping_period(), ws.ping_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            received = outbound.recv() => match received {
                Some(message) => {
                    let text = match serde_json::to_string(&message) {
                        Ok(text) => text,
                        Err(err) => {
                            tracing::error!(error = %err, "failed to serialize envelope");
                            continue;
                        }
                    };
                    match timeout(ws.write_wait(), sender.send(Message::Text(text.into()))).await {
                        Ok(Ok(())) => {}
                        _ => return,
                    }
                }
                None => {
                    // Queue closed by the hub: say goodbye and stop.
                    let _ = timeout(ws.write_wait(), sender.send(Message::Close(None))).await;
                    return;
                }
            },
            _ = ticker.tick() => {
                match timeout(ws.write_wait(), sender.send(Message::Ping(Bytes::new()))).await {
                    Ok(Ok(())) => {}
                    _ => return,
                }
            }
        }
    }
}

/// Drive a connection after the protocol switch: spawn the write loop, run
/// the read loop to completion, then wait for the write side to notice the
/// queue closing.
pub async fn handle_socket(
    socket: WebSocket,
    conn: Connection,
    outbound_rx: mpsc::Receiver<Envelope>,
    ws: WsConfig,
) {
    let (sink, stream) = socket.split();
    let write_task = tokio::spawn(write_loop(sink, outbound_rx, ws.clone()));

    read_loop(&conn, stream, &ws).await;

    // The read loop's cleanup unregistered us; the hub has dropped the
    // queue's sender, so the write loop exits on its own.
    let _ = write_task.await;
}
