//! Operational stats endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::http::{AppError, AppResult, AppState};
use huddle_core::{RegistryStats, RoomId, RoomSnapshot};

/// Aggregated registry statistics
///
/// Path: `GET /api/stats`
pub async fn get_stats(State(state): State<AppState>) -> Json<RegistryStats> {
    Json(state.coordinator.registry().stats().await)
}

/// Point-in-time composition of one room
///
/// Path: `GET /api/rooms/{room_id}`
pub async fn get_room_snapshot(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<Json<RoomSnapshot>> {
    let room_id = RoomId::from_string(room_id);
    let room = state
        .coordinator
        .registry()
        .get_room(&room_id)
        .map_err(AppError::from)?;
    Ok(Json(room.snapshot().await))
}
