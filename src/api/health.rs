//! Database health endpoint.

use crate::app::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct DbHealthResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// `GET /api/health/db` — report whether the database answers a ping.
///
/// A missing or failing database never takes the room core down; it only
/// shows up here as unhealthy.
pub async fn db_health(State(state): State<AppState>) -> impl IntoResponse {
    let Some(db) = &state.db else {
        return unhealthy("database not connected".to_string());
    };

    match db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(DbHealthResponse {
                status: "healthy",
                error: None,
            }),
        ),
        Err(err) => unhealthy(err.to_string()),
    }
}

fn unhealthy(error: String) -> (StatusCode, Json<DbHealthResponse>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(DbHealthResponse {
            status: "unhealthy",
            error: Some(error),
        }),
    )
}
