use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use banquet_booking::{DirectBooking, OpenBooking};
use banquet_core::repository::BookingFilter;
use banquet_shared::{Booking, LockToken};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub lock_token: LockToken,
    pub expected_version: i64,
    pub payment_reference: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    pub expected_version: i64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(open_booking).get(list_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/confirm", post(confirm_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/bookings/{id}/check-in", post(check_in))
        .route("/v1/admin/bookings", post(create_direct_booking))
}

// ============================================================================
// Guest Handlers
// ============================================================================

/// POST /v1/bookings
/// Opens a pending booking on a live hold.
pub async fn open_booking(
    State(state): State<AppState>,
    Json(req): Json<OpenBooking>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state.bookings.open(req).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// GET /v1/bookings?event_id=..&table_id=..&status=..&limit=..
pub async fn list_bookings(
    State(state): State<AppState>,
    Query(filter): Query<BookingFilter>,
) -> Result<Json<Vec<Booking>>, AppError> {
    if filter.limit.is_some_and(|limit| limit <= 0) {
        return Err(AppError::BadRequest("limit must be positive".into()));
    }
    Ok(Json(state.bookings.list(&filter).await?))
}

/// GET /v1/bookings/{id}
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.get(id).await?))
}

/// POST /v1/bookings/{id}/confirm
pub async fn confirm_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .bookings
        .confirm(id, &req.lock_token, req.expected_version, req.payment_reference)
        .await?;
    Ok(Json(booking))
}

/// POST /v1/bookings/{id}/cancel
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.cancel(id, req.reason).await?))
}

// ============================================================================
// Venue Staff Handlers
// ============================================================================

/// POST /v1/bookings/{id}/check-in
pub async fn check_in(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CheckInRequest>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.check_in(id, req.expected_version).await?))
}

/// POST /v1/admin/bookings
/// Admin and comp bookings still go through a hold, so they contend with
/// guests on equal terms.
pub async fn create_direct_booking(
    State(state): State<AppState>,
    Json(req): Json<DirectBooking>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state.bookings.book_directly(req).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}
