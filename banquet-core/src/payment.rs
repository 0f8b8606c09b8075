use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Capture state as reported by the payment processor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Processing,
    Captured,
    NotCaptured,
}

/// Narrow interface to the external payment collaborator. The engine never
/// decides capture state itself; it only asks.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn capture_status(
        &self,
        payment_reference: &str,
    ) -> Result<PaymentStatus, Box<dyn std::error::Error + Send + Sync>>;
}

/// Treats every payment reference that reached the engine as captured.
///
/// Bookings only receive a payment reference through a verified
/// `paymentConfirmed` callback, so this is accurate for processors that
/// capture on authorization.
pub struct CapturedOnConfirmGateway;

#[async_trait]
impl PaymentGateway for CapturedOnConfirmGateway {
    async fn capture_status(
        &self,
        payment_reference: &str,
    ) -> Result<PaymentStatus, Box<dyn std::error::Error + Send + Sync>> {
        if payment_reference.trim().is_empty() {
            return Ok(PaymentStatus::NotCaptured);
        }
        Ok(PaymentStatus::Captured)
    }
}
