use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use banquet_core::ReservationError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Reservation(#[from] ReservationError),
    #[error("{0}")]
    BadRequest(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        let err = match self {
            AppError::BadRequest(_) => return (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::Reservation(err) => err,
        };
        match err {
            ReservationError::HoldConflict { .. } => (StatusCode::CONFLICT, "hold_conflict"),
            ReservationError::VersionConflict { .. } => (StatusCode::CONFLICT, "version_conflict"),
            ReservationError::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
            ReservationError::HoldExpired => (StatusCode::GONE, "hold_expired"),
            ReservationError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ReservationError::ValidationError(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            ReservationError::PaymentError(_) => (StatusCode::BAD_GATEWAY, "payment_error"),
            ReservationError::StorageError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let recoverable = matches!(&self, AppError::Reservation(err) if err.is_recoverable());

        let message = if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": message,
            "code": code,
            "recoverable": recoverable,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banquet_shared::BookingStatus;
    use uuid::Uuid;

    fn status_of(err: ReservationError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_reservation_errors_map_to_http_statuses() {
        let id = Uuid::new_v4();
        assert_eq!(
            status_of(ReservationError::HoldConflict { event_id: id, table_id: id }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ReservationError::VersionConflict { booking_id: id, expected: 1 }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ReservationError::InvalidTransition {
                from: BookingStatus::CheckedIn,
                to: BookingStatus::Cancelled
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(ReservationError::HoldExpired), StatusCode::GONE);
        assert_eq!(status_of(ReservationError::NotFound("Booking".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ReservationError::ValidationError("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ReservationError::StorageError("pool timed out".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_bad_request_is_not_recoverable() {
        let response = AppError::BadRequest("missing field".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
