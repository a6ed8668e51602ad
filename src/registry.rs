//! In-memory room registry.
//!
//! Rooms live only here; nothing about a live room survives a restart. The
//! registry is a passive object behind a readers-writer lock — lookups take
//! the shared side, mutations the exclusive side.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Alphabet for room codes: uppercase letters and digits.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Number of characters in a room code.
const CODE_LENGTH: usize = 6;

/// Initial phase for a freshly created room.
pub const PHASE_LOBBY: &str = "LOBBY";
pub const PHASE_NIGHT: &str = "NIGHT";
pub const PHASE_DAY: &str = "DAY";

/// A game room aggregate.
///
/// The phase is an opaque string to the coordination core; only the three
/// values above participate in the built-in transition function.
#[derive(Debug, Clone)]
pub struct Room {
    pub code: String,
    pub host_id: String,
    pub phase: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of admitting a player into a room.
#[derive(Debug, Clone)]
pub struct JoinedRoom {
    pub player_id: String,
    pub phase: String,
}

/// Thread-safe registry of live rooms, keyed by room code.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Create a room with a fresh code and the given host identity.
    ///
    /// Codes are drawn uniformly from a 36-character alphabet; with six
    /// characters the collision probability stays negligible at realistic
    /// room counts, so there is no check-and-retry on insert.
    pub fn create_room(&self, host_id: &str) -> String {
        let code = generate_room_code();
        let now = Utc::now();
        let room = Room {
            code: code.clone(),
            host_id: host_id.to_string(),
            phase: PHASE_LOBBY.to_string(),
            created_at: now,
            updated_at: now,
        };

        let mut rooms = self.rooms.write().unwrap_or_else(|e| e.into_inner());
        rooms.insert(code.clone(), room);

        tracing::info!(
            room_code = %code,
            host_id = %host_id,
            total_rooms = rooms.len(),
            "room created"
        );

        code
    }

    /// Look up a room by code.
    pub fn room(&self, code: &str) -> Result<Room> {
        let rooms = self.rooms.read().unwrap_or_else(|e| e.into_inner());
        match rooms.get(code) {
            Some(room) => Ok(room.clone()),
            None => {
                tracing::debug!(room_code = %code, "room not found");
                Err(Error::RoomNotFound)
            }
        }
    }

    /// Admit a player into a room, minting a fresh player id.
    ///
    /// Player names are display-only; the registry does not enforce their
    /// uniqueness.
    pub fn join_room(&self, code: &str, player_name: &str) -> Result<JoinedRoom> {
        let rooms = self.rooms.read().unwrap_or_else(|e| e.into_inner());
        let room = match rooms.get(code) {
            Some(room) => room,
            None => {
                tracing::warn!(
                    room_code = %code,
                    player_name = %player_name,
                    "join attempt on nonexistent room"
                );
                return Err(Error::RoomNotFound);
            }
        };

        let player_id = Uuid::new_v4().to_string();

        tracing::info!(
            room_code = %code,
            player_id = %player_id,
            player_name = %player_name,
            room_phase = %room.phase,
            "player joined"
        );

        Ok(JoinedRoom {
            player_id,
            phase: room.phase.clone(),
        })
    }

    /// Advance a room's phase and return the new value.
    ///
    /// Transitions: LOBBY -> NIGHT -> DAY -> NIGHT. Any other phase value
    /// belongs to the rules layer and is left untouched.
    pub fn advance_phase(&self, code: &str) -> Result<String> {
        let mut rooms = self.rooms.write().unwrap_or_else(|e| e.into_inner());
        let room = rooms.get_mut(code).ok_or(Error::RoomNotFound)?;

        let previous = room.phase.clone();
        room.phase = next_phase(&room.phase).to_string();
        room.updated_at = Utc::now();

        tracing::info!(
            room_code = %code,
            previous_phase = %previous,
            current_phase = %room.phase,
            "phase advanced"
        );

        Ok(room.phase.clone())
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn next_phase(phase: &str) -> &str {
    match phase {
        PHASE_LOBBY => PHASE_NIGHT,
        PHASE_NIGHT => PHASE_DAY,
        PHASE_DAY => PHASE_NIGHT,
        other => other,
    }
}

/// Generate a 6-character room code from the process-wide RNG.
fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_code_shape() {
        for _ in 0..100 {
            let code = generate_room_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(
                code.bytes().all(|b| CODE_ALPHABET.contains(&b)),
                "code {} contains characters outside the alphabet",
                code
            );
        }
    }

    #[test]
    fn test_create_room_starts_in_lobby() {
        let registry = RoomRegistry::new();
        let code = registry.create_room("host-1");

        let room = registry.room(&code).unwrap();
        assert_eq!(room.code, code);
        assert_eq!(room.host_id, "host-1");
        assert_eq!(room.phase, PHASE_LOBBY);
    }

    #[test]
    fn test_room_not_found() {
        let registry = RoomRegistry::new();
        assert!(matches!(
            registry.room("FAKE99"),
            Err(Error::RoomNotFound)
        ));
    }

    #[test]
    fn test_join_room_mints_player_id() {
        let registry = RoomRegistry::new();
        let code = registry.create_room("host-1");

        let first = registry.join_room(&code, "alice").unwrap();
        let second = registry.join_room(&code, "bob").unwrap();

        assert_eq!(first.phase, PHASE_LOBBY);
        assert!(!first.player_id.is_empty());
        assert_ne!(first.player_id, second.player_id);
    }

    #[test]
    fn test_join_missing_room() {
        let registry = RoomRegistry::new();
        assert!(matches!(
            registry.join_room("FAKE99", "bob"),
            Err(Error::RoomNotFound)
        ));
    }

    #[test]
    fn test_phase_cycle() {
        let registry = RoomRegistry::new();
        let code = registry.create_room("host-1");

        let phases: Vec<String> = (0..4)
            .map(|_| registry.advance_phase(&code).unwrap())
            .collect();

        assert_eq!(phases, vec![PHASE_NIGHT, PHASE_DAY, PHASE_NIGHT, PHASE_DAY]);
    }

    #[test]
    fn test_unknown_phase_is_preserved() {
        assert_eq!(next_phase("VOTING"), "VOTING");
        assert_eq!(next_phase(""), "");
    }

    #[test]
    fn test_advance_phase_missing_room() {
        let registry = RoomRegistry::new();
        assert!(matches!(
            registry.advance_phase("FAKE99"),
            Err(Error::RoomNotFound)
        ));
    }

    #[test]
    fn test_advance_phase_touches_updated_at() {
        let registry = RoomRegistry::new();
        let code = registry.create_room("host-1");
        let before = registry.room(&code).unwrap().updated_at;

        registry.advance_phase(&code).unwrap();
        let after = registry.room(&code).unwrap().updated_at;

        assert!(after >= before);
    }
}
