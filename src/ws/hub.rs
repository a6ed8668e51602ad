//! The hub: single coordinator for live connection membership.
//!
//! The hub owns the mapping from room code to the set of live connections.
//! Registration and unregistration flow through channels into one long-lived
//! event-loop task; room-scoped broadcasts take the membership guard
//! directly so a fan-out never waits on the event loop.
//!
//! Every enqueue into a connection's outbound queue is a non-blocking
//! attempt. A full queue marks the client as a slow consumer: the hub drops
//! its seat and the strong sender with it, which closes the queue and lets
//! the write loop shut down. One slow client never delays delivery to the
//! rest of the room.

use super::envelope::{self, Envelope, PlayerLeftData};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A connection's seat in a room: its outbound queue plus the identity
/// needed to announce its departure.
struct Seat {
    player_id: String,
    player_name: String,
    queue: mpsc::Sender<Envelope>,
}

/// Registration event: a connection entering a room.
pub struct Registration {
    pub conn_id: Uuid,
    pub room_code: String,
    pub player_id: String,
    pub player_name: String,
    /// The only strong sender for the connection's outbound queue. Dropping
    /// it is the queue-closure signal the write loop terminates on.
    pub queue: mpsc::Sender<Envelope>,
}

/// Unregistration event: a connection leaving its room.
struct Unregistration {
    conn_id: Uuid,
    room_code: String,
}

/// Coordinator for all live WebSocket connections, grouped by room.
pub struct Hub {
    /// Membership map. Only hub methods touch this; the per-entry guard is
    /// held for synchronous sections only (try_send never suspends).
    rooms: DashMap<String, HashMap<Uuid, Seat>>,
    register_tx: mpsc::UnboundedSender<Registration>,
    unregister_tx: mpsc::UnboundedSender<Unregistration>,
    broadcast_tx: mpsc::UnboundedSender<Envelope>,
}

impl Hub {
    /// Create the hub and start its event loop on a background task.
    pub fn spawn() -> Arc<Self> {
        let (register_tx, register_rx) = mpsc::unbounded_channel();
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast_rx) = mpsc::unbounded_channel();

        let hub = Arc::new(Self {
            rooms: DashMap::new(),
            register_tx,
            unregister_tx,
            broadcast_tx,
        });

        tokio::spawn(Self::run(
            hub.clone(),
            register_rx,
            unregister_rx,
            broadcast_rx,
        ));

        hub
    }

    /// Event loop: drains the three channels for the life of the process.
    async fn run(
        hub: Arc<Self>,
        mut register_rx: mpsc::UnboundedReceiver<Registration>,
        mut unregister_rx: mpsc::UnboundedReceiver<Unregistration>,
        mut broadcast_rx: mpsc::UnboundedReceiver<Envelope>,
    ) {
        loop {
            tokio::select! {
                Some(registration) = register_rx.recv() => hub.handle_register(registration),
                Some(unregistration) = unregister_rx.recv() => hub.handle_unregister(unregistration),
                Some(message) = broadcast_rx.recv() => hub.handle_broadcast(message),
                else => break,
            }
        }
    }

    /// Queue a connection for registration.
    ///
    /// Membership becomes observable once the event loop has processed the
    /// event; a broadcast issued immediately after this call may or may not
    /// reach the connection itself.
    pub fn register(&self, registration: Registration) {
        let _ = self.register_tx.send(registration);
    }

    /// Queue a connection for removal. Safe to call more than once.
    pub fn unregister(&self, room_code: &str, conn_id: Uuid) {
        let _ = self.unregister_tx.send(Unregistration {
            conn_id,
            room_code: room_code.to_string(),
        });
    }

    /// Queue an envelope for delivery to every member of every room.
    pub fn broadcast_all(&self, message: Envelope) {
        let _ = self.broadcast_tx.send(message);
    }

    /// Deliver an envelope to every member of one room.
    ///
    /// Broadcasting to a room with no members is a no-op, not an error.
    pub fn broadcast_to_room(&self, room_code: &str, message: Envelope) {
        let emptied = match self.rooms.get_mut(room_code) {
            Some(mut seats) => {
                fan_out(&mut seats, &message);
                seats.is_empty()
            }
            None => return,
        };

        if emptied {
            self.rooms.remove_if(room_code, |_, seats| seats.is_empty());
        }
    }

    /// Number of live connections in a room.
    pub fn room_connection_count(&self, room_code: &str) -> usize {
        self.rooms
            .get(room_code)
            .map(|seats| seats.len())
            .unwrap_or(0)
    }

    /// Number of rooms with at least one live connection.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn handle_register(&self, registration: Registration) {
        tracing::debug!(
            room_code = %registration.room_code,
            player_id = %registration.player_id,
            conn_id = %registration.conn_id,
            "connection registered"
        );

        self.rooms
            .entry(registration.room_code)
            .or_default()
            .insert(
                registration.conn_id,
                Seat {
                    player_id: registration.player_id,
                    player_name: registration.player_name,
                    queue: registration.queue,
                },
            );
    }

    fn handle_unregister(&self, unregistration: Unregistration) {
        let emptied = {
            let Some(mut seats) = self.rooms.get_mut(&unregistration.room_code) else {
                return;
            };
            let Some(seat) = seats.remove(&unregistration.conn_id) else {
                return;
            };

            tracing::debug!(
                room_code = %unregistration.room_code,
                player_id = %seat.player_id,
                conn_id = %unregistration.conn_id,
                "connection unregistered"
            );

            let departed = Envelope::new(
                envelope::PLAYER_LEFT,
                PlayerLeftData {
                    player_id: seat.player_id.clone(),
                    player_name: seat.player_name.clone(),
                },
            );
            fan_out(&mut seats, &departed);

            seats.is_empty()
            // The removed seat drops here, closing its outbound queue.
        };

        if emptied {
            self.rooms
                .remove_if(&unregistration.room_code, |_, seats| seats.is_empty());
        }
    }

    fn handle_broadcast(&self, message: Envelope) {
        for mut entry in self.rooms.iter_mut() {
            fan_out(entry.value_mut(), &message);
        }
        self.rooms.retain(|_, seats| !seats.is_empty());
    }
}

/// Non-blocking fan-out sweep over a room's seats.
///
/// A member whose queue is full is evicted in place: dropping the seat
/// closes the queue, so removal and closure are a single atomic step under
/// the membership guard. Remaining members of the sweep are still attempted.
fn fan_out(seats: &mut HashMap<Uuid, Seat>, message: &Envelope) {
    seats.retain(|conn_id, seat| match seat.queue.try_send(message.clone()) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!(
                conn_id = %conn_id,
                player_id = %seat.player_id,
                "outbound queue full, dropping slow consumer"
            );
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::time::Duration;

    fn registration(
        room: &str,
        player: &str,
        capacity: usize,
    ) -> (Registration, Uuid, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(capacity);
        let conn_id = Uuid::new_v4();
        (
            Registration {
                conn_id,
                room_code: room.to_string(),
                player_id: player.to_string(),
                player_name: player.to_string(),
                queue: tx,
            },
            conn_id,
            rx,
        )
    }

    async fn settle() {
        // Let the event loop drain its channels.
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_register_creates_room_entry() {
        let hub = Hub::spawn();
        let (reg, _, _rx) = registration("ROOM1", "p1", 16);

        hub.register(reg);
        settle().await;

        assert_eq!(hub.room_count(), 1);
        assert_eq!(hub.room_connection_count("ROOM1"), 1);
    }

    #[tokio::test]
    async fn test_unregister_prunes_empty_room() {
        let hub = Hub::spawn();
        let (reg, conn_id, _rx) = registration("ROOM1", "p1", 16);

        hub.register(reg);
        settle().await;
        hub.unregister("ROOM1", conn_id);
        settle().await;

        assert_eq!(hub.room_count(), 0);
        assert_eq!(hub.room_connection_count("ROOM1"), 0);
    }

    #[tokio::test]
    async fn test_unregister_closes_queue() {
        let hub = Hub::spawn();
        let (reg, conn_id, mut rx) = registration("ROOM1", "p1", 16);

        hub.register(reg);
        settle().await;
        hub.unregister("ROOM1", conn_id);
        settle().await;

        // The seat held the only strong sender; recv now reports closure.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_double_unregister_is_idempotent() {
        let hub = Hub::spawn();
        let (reg_a, conn_a, _rx_a) = registration("ROOM1", "p1", 16);
        let (reg_b, _, _rx_b) = registration("ROOM1", "p2", 16);

        hub.register(reg_a);
        hub.register(reg_b);
        settle().await;

        hub.unregister("ROOM1", conn_a);
        hub.unregister("ROOM1", conn_a);
        settle().await;

        assert_eq!(hub.room_connection_count("ROOM1"), 1);
    }

    #[tokio::test]
    async fn test_broadcast_to_room_reaches_all_members() {
        let hub = Hub::spawn();
        let (reg_a, _, mut rx_a) = registration("ROOM1", "p1", 16);
        let (reg_b, _, mut rx_b) = registration("ROOM1", "p2", 16);

        hub.register(reg_a);
        hub.register(reg_b);
        settle().await;

        hub.broadcast_to_room(
            "ROOM1",
            Envelope::new(
                envelope::SYSTEM_MESSAGE,
                crate::ws::envelope::SystemMessageData {
                    message: "the night begins".to_string(),
                    level: "info".to_string(),
                },
            ),
        );

        let received = rx_a.recv().await.unwrap();
        assert_eq!(received.message_type, envelope::SYSTEM_MESSAGE);
        assert_eq!(received.data["message"], "the night begins");
        assert_eq!(
            rx_b.recv().await.unwrap().message_type,
            envelope::SYSTEM_MESSAGE
        );
    }

    #[tokio::test]
    async fn test_broadcast_is_room_isolated() {
        let hub = Hub::spawn();
        let (reg_a, _, mut rx_a) = registration("ROOM1", "p1", 16);
        let (reg_b, _, mut rx_b) = registration("ROOM2", "p2", 16);

        hub.register(reg_a);
        hub.register(reg_b);
        settle().await;

        hub.broadcast_to_room("ROOM1", Envelope::new(envelope::SYSTEM_MESSAGE, Value::Null));
        settle().await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_preserves_order_per_caller() {
        let hub = Hub::spawn();
        let (reg, _, mut rx) = registration("ROOM1", "p1", 16);

        hub.register(reg);
        settle().await;

        hub.broadcast_to_room("ROOM1", Envelope::new("first", Value::Null));
        hub.broadcast_to_room("ROOM1", Envelope::new("second", Value::Null));

        assert_eq!(rx.recv().await.unwrap().message_type, "first");
        assert_eq!(rx.recv().await.unwrap().message_type, "second");
    }

    #[tokio::test]
    async fn test_broadcast_to_missing_room_is_noop() {
        let hub = Hub::spawn();
        hub.broadcast_to_room("NOROOM", Envelope::new(envelope::SYSTEM_MESSAGE, Value::Null));
        assert_eq!(hub.room_count(), 0);
    }

    #[tokio::test]
    async fn test_slow_consumer_is_evicted() {
        let hub = Hub::spawn();
        // A capacity-1 queue that nobody drains.
        let (reg_slow, _, mut rx_slow) = registration("ROOM1", "slow", 1);
        let (reg_peer, _, mut rx_peer) = registration("ROOM1", "peer", 16);

        hub.register(reg_slow);
        hub.register(reg_peer);
        settle().await;

        hub.broadcast_to_room("ROOM1", Envelope::new("one", Value::Null));
        hub.broadcast_to_room("ROOM1", Envelope::new("two", Value::Null));

        // The slow consumer was dropped on the second send; the peer keeps
        // receiving.
        assert_eq!(hub.room_connection_count("ROOM1"), 1);
        assert_eq!(rx_peer.recv().await.unwrap().message_type, "one");
        assert_eq!(rx_peer.recv().await.unwrap().message_type, "two");

        // Its buffered envelope is still readable, then the queue closes.
        assert_eq!(rx_slow.recv().await.unwrap().message_type, "one");
        assert!(rx_slow.recv().await.is_none());

        hub.broadcast_to_room("ROOM1", Envelope::new("three", Value::Null));
        assert_eq!(rx_peer.recv().await.unwrap().message_type, "three");
    }

    #[tokio::test]
    async fn test_unregister_announces_player_left() {
        let hub = Hub::spawn();
        let (reg_a, conn_a, _rx_a) = registration("ROOM1", "p1", 16);
        let (reg_b, _, mut rx_b) = registration("ROOM1", "p2", 16);

        hub.register(reg_a);
        hub.register(reg_b);
        settle().await;

        hub.unregister("ROOM1", conn_a);
        settle().await;

        let message = rx_b.recv().await.unwrap();
        assert_eq!(message.message_type, envelope::PLAYER_LEFT);
        let data: PlayerLeftData = serde_json::from_value(message.data).unwrap();
        assert_eq!(data.player_id, "p1");
    }

    #[tokio::test]
    async fn test_broadcast_all_reaches_every_room() {
        let hub = Hub::spawn();
        let (reg_a, _, mut rx_a) = registration("ROOM1", "p1", 16);
        let (reg_b, _, mut rx_b) = registration("ROOM2", "p2", 16);

        hub.register(reg_a);
        hub.register(reg_b);
        settle().await;

        hub.broadcast_all(Envelope::new(envelope::SYSTEM_MESSAGE, Value::Null));
        settle().await;

        assert_eq!(
            rx_a.recv().await.unwrap().message_type,
            envelope::SYSTEM_MESSAGE
        );
        assert_eq!(
            rx_b.recv().await.unwrap().message_type,
            envelope::SYSTEM_MESSAGE
        );
    }
}
