use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use banquet_core::ReservationError;

use crate::error::AppError;
use crate::state::AppState;

const PAYMENT_SUCCEEDED: &str = "payment.succeeded";

#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: PaymentObject,
}

#[derive(Debug, Deserialize)]
pub struct PaymentObject {
    /// Provider-side payment reference.
    pub id: String,
    pub booking_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub booking_id: Uuid,
    pub status: Option<banquet_shared::BookingStatus>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payments", post(handle_payment_webhook))
}

/// POST /v1/webhooks/payments
/// Providers redeliver; replays of an applied success are acknowledged
/// without touching the booking again. A payment landing after the hold
/// lapsed is acknowledged with the booking still pending and logged for
/// manual refund, since retrying cannot succeed.
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<PaymentWebhook>,
) -> Result<Json<WebhookAck>, AppError> {
    let booking_id = payload.data.object.booking_id;
    tracing::info!("Received webhook {}: {} for booking {}", payload.id, payload.type_, booking_id);

    if payload.type_ != PAYMENT_SUCCEEDED {
        tracing::debug!("Ignoring webhook type {}", payload.type_);
        return Ok(Json(WebhookAck {
            received: true,
            booking_id,
            status: None,
        }));
    }

    let booking = match state
        .bookings
        .payment_confirmed(booking_id, &payload.data.object.id)
        .await
    {
        Ok(booking) => booking,
        Err(ReservationError::HoldExpired) => {
            tracing::warn!(
                "Payment {} arrived after the hold on booking {} lapsed; needs refund",
                payload.data.object.id,
                booking_id
            );
            state.bookings.get(booking_id).await?
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Json(WebhookAck {
        received: true,
        booking_id,
        status: Some(booking.status),
    }))
}
