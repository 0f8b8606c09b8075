use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use banquet_shared::{LockToken, SeatHold};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HoldRequest {
    pub event_id: Uuid,
    pub table_id: Uuid,
    pub session_id: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/holds", post(acquire_hold))
        .route("/v1/holds/{token}/renew", post(renew_hold))
        .route("/v1/holds/{token}", delete(release_hold))
}

/// POST /v1/holds
/// 409 when the table is already held or booked; the client should re-read
/// availability and pick again.
pub async fn acquire_hold(
    State(state): State<AppState>,
    Json(req): Json<HoldRequest>,
) -> Result<(StatusCode, Json<SeatHold>), AppError> {
    let hold = state.holds.acquire(req.event_id, req.table_id, &req.session_id).await?;
    Ok((StatusCode::CREATED, Json(hold)))
}

/// POST /v1/holds/{token}/renew
pub async fn renew_hold(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<SeatHold>, AppError> {
    Ok(Json(state.holds.renew(&LockToken::new(token)).await?))
}

/// DELETE /v1/holds/{token}
pub async fn release_hold(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<StatusCode, AppError> {
    state.holds.release(&LockToken::new(token)).await?;
    Ok(StatusCode::NO_CONTENT)
}
