use axum::{
    extract::{Path, State},
    response::Json,
};

use super::error::{Result as WebResult, WebError};
use crate::game_logic::RoomSummary;
use crate::state::AppState;

/// Lets a client check a code before opening a socket to join it.
pub async fn room_summary_handler(
    State(app_state): State<AppState>,
    Path(code): Path<String>,
) -> WebResult<Json<RoomSummary>> {
    tracing::debug!(room.code = %code, "HTTP: room lookup");

    app_state
        .room_manager
        .room_summary(code.clone())
        .await
        .map(Json)
        .ok_or(WebError::RoomNotFound(code))
}
