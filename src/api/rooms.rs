//! Room creation and join endpoints.

use crate::app::AppState;
use crate::error::{Error, Result};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub host_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub room_code: String,
    pub host_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub player_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomResponse {
    pub player_id: String,
    pub phase: String,
}

/// `POST /api/rooms` — create a room and mint the host identity.
pub async fn create_room(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateRoomRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(request) = payload.map_err(|err| Error::invalid_request(err.body_text()))?;

    let host_id = Uuid::new_v4().to_string();
    let room_code = state.registry.create_room(&host_id);

    tracing::info!(
        room_code = %room_code,
        host_name = %request.host_name,
        "room created for host"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateRoomResponse { room_code, host_id }),
    ))
}

/// `POST /api/rooms/{code}/join` — admit a player into an existing room.
pub async fn join_room(
    State(state): State<AppState>,
    Path(code): Path<String>,
    payload: std::result::Result<Json<JoinRoomRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(request) = payload.map_err(|err| Error::invalid_request(err.body_text()))?;

    let joined = state.registry.join_room(&code, &request.player_name)?;

    Ok(Json(JoinRoomResponse {
        player_id: joined.player_id,
        phase: joined.phase,
    }))
}
