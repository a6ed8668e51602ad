//! The message envelope carried on the WebSocket transport.
//!
//! Every frame, in both directions, is a JSON envelope of
//! `{type, timestamp, data}` where the shape of `data` is determined by
//! `type`. The payload structs below cover the closed set of server-to-client
//! types; inbound payloads arrive as raw values and are interpreted by the
//! connection's dispatcher.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Connection events
pub const PLAYER_JOINED: &str = "player_joined";
pub const PLAYER_LEFT: &str = "player_left";
pub const PLAYER_REJOINED: &str = "player_rejoined";

// Game phase events
pub const PHASE_CHANGED: &str = "phase_changed";
pub const GAME_STARTED: &str = "game_started";
pub const GAME_ENDED: &str = "game_ended";

// Action events
pub const ACTION_SUBMITTED: &str = "action_submitted";
pub const ACTION_DELETED: &str = "action_deleted";
pub const ACTIONS_CLEARED: &str = "actions_cleared";

// Role events
pub const ROLES_ASSIGNED: &str = "roles_assigned";
pub const ROLE_REVEALED: &str = "role_revealed";

// Host events (reserved)
pub const HOST_CHANGED: &str = "host_changed";
pub const PLAYER_KICKED: &str = "player_kicked";

// Error and system events
pub const ERROR: &str = "error";
pub const SYSTEM_MESSAGE: &str = "system_message";
pub const PONG: &str = "pong";

// Inbound types (client -> server)
pub const JOIN_ROOM: &str = "join_room";
pub const SUBMIT_ACTION: &str = "submit_action";
pub const HOST_COMMAND: &str = "host_command";
pub const PING: &str = "ping";

/// Envelope for all WebSocket messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Build an envelope stamped with the current time.
    ///
    /// The payload is serialized once here; an unserializable payload is a
    /// programming error and degrades to a null `data`.
    pub fn new(message_type: &str, data: impl Serialize) -> Self {
        Self {
            message_type: message_type.to_string(),
            timestamp: Utc::now().timestamp(),
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }
}

/// Sent when a player joins or rejoins a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoinedData {
    pub player_id: String,
    pub player_name: String,
    pub is_host: bool,
}

/// Sent when a player's connection leaves a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLeftData {
    pub player_id: String,
    pub player_name: String,
}

/// Sent when the game phase changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseChangedData {
    pub previous_phase: String,
    pub current_phase: String,
}

/// Sent when a player submits an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSubmittedData {
    pub action_id: String,
    pub player_id: String,
    pub player_name: String,
    pub action_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
}

/// Sent when the host deletes an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDeletedData {
    pub action_id: String,
}

/// Sent when the game starts and roles are assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolesAssignedData {
    pub players: Vec<PlayerRoleInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRoleInfo {
    pub player_id: String,
    pub player_name: String,
    pub role_id: i32,
    pub role_name: String,
    pub team: String,
}

/// Sent to a single client when its request fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorData {
    pub code: String,
    pub message: String,
}

/// General system notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMessageData {
    pub message: String,
    /// One of `info`, `warning`, `error`.
    pub level: String,
}

/// Inbound host command payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostCommandData {
    pub command: String,
    #[serde(default)]
    pub data: Value,
}
