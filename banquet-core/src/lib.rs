pub mod clock;
pub mod events;
pub mod payment;
pub mod repository;

use banquet_shared::BookingStatus;
use uuid::Uuid;

pub use repository::{StoreError, StoreResult};

/// Outcomes of the reservation engine that callers must handle.
///
/// `HoldConflict`, `HoldExpired` and `VersionConflict` are expected results of
/// contention: the caller restarts from an availability check. None of these
/// are fatal to the process.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReservationError {
    #[error("Table {table_id} is already held or booked for event {event_id}")]
    HoldConflict { event_id: Uuid, table_id: Uuid },
    #[error("Hold expired before the booking could be confirmed")]
    HoldExpired,
    #[error("Booking {booking_id} was modified concurrently (expected version {expected})")]
    VersionConflict { booking_id: Uuid, expected: i64 },
    #[error("{0} not found")]
    NotFound(String),
    #[error("Invalid booking transition from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Storage failure: {0}")]
    StorageError(String),
    #[error("Payment collaborator failure: {0}")]
    PaymentError(String),
}

impl ReservationError {
    /// Contention outcomes that a client resolves by re-reading availability.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ReservationError::HoldConflict { .. }
                | ReservationError::HoldExpired
                | ReservationError::VersionConflict { .. }
        )
    }
}

impl From<StoreError> for ReservationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::HoldTaken { event_id, table_id }
            | StoreError::TableBooked { event_id, table_id } => {
                ReservationError::HoldConflict { event_id, table_id }
            }
            StoreError::StaleVersion { booking_id, expected } => {
                ReservationError::VersionConflict { booking_id, expected }
            }
            StoreError::HoldLapsed => ReservationError::HoldExpired,
            StoreError::NotFound(what) => ReservationError::NotFound(what),
            StoreError::Duplicate(what) => {
                ReservationError::ValidationError(format!("{} already exists", what))
            }
            StoreError::Database(msg) => ReservationError::StorageError(msg),
        }
    }
}

pub type CoreResult<T> = Result<T, ReservationError>;
