use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use banquet_shared::{EventAvailability, TableState, TableStatus};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TableStatusResponse {
    pub event_id: Uuid,
    pub table_id: Uuid,
    pub status: TableStatus,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/events/{event_id}/availability", get(get_availability))
        .route("/v1/events/{event_id}/tables", get(list_tables))
        .route("/v1/events/{event_id}/tables/{table_id}/status", get(get_table_status))
        .route("/v1/admin/events/{event_id}/sync", post(force_sync))
}

/// GET /v1/events/{event_id}/availability
/// Cached aggregate; computed on the spot when no row exists yet.
pub async fn get_availability(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<EventAvailability>, AppError> {
    Ok(Json(state.sync.cached(event_id).await?))
}

/// GET /v1/events/{event_id}/tables
pub async fn list_tables(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Vec<TableState>>, AppError> {
    Ok(Json(state.resolver.resolve_event(event_id).await?))
}

/// GET /v1/events/{event_id}/tables/{table_id}/status
pub async fn get_table_status(
    State(state): State<AppState>,
    Path((event_id, table_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<TableStatusResponse>, AppError> {
    let status = state.resolver.resolve(table_id, event_id).await?;
    Ok(Json(TableStatusResponse {
        event_id,
        table_id,
        status,
    }))
}

/// POST /v1/admin/events/{event_id}/sync
pub async fn force_sync(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<EventAvailability>, AppError> {
    tracing::info!("Forced availability sync for event {}", event_id);
    Ok(Json(state.sync.sync_event(event_id).await?))
}
