use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::booking::BookingStatus;

/// Published after every reservation state change. Consumed by the
/// notification collaborator and the live table-status feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReservationEvent {
    TableHeld {
        event_id: Uuid,
        table_id: Uuid,
        hold_expiry: DateTime<Utc>,
        at: i64,
    },
    HoldReleased {
        event_id: Uuid,
        table_id: Uuid,
        at: i64,
    },
    BookingOpened {
        event_id: Uuid,
        table_id: Uuid,
        booking_id: Uuid,
        at: i64,
    },
    BookingConfirmed {
        event_id: Uuid,
        table_id: Uuid,
        booking_id: Uuid,
        at: i64,
    },
    BookingCancelled {
        event_id: Uuid,
        table_id: Uuid,
        booking_id: Uuid,
        status: BookingStatus,
        at: i64,
    },
    GuestCheckedIn {
        event_id: Uuid,
        table_id: Uuid,
        booking_id: Uuid,
        at: i64,
    },
    AvailabilityChanged {
        event_id: Uuid,
        tables_available: i32,
        seats_available: i32,
        at: i64,
    },
}

impl ReservationEvent {
    pub fn event_id(&self) -> Uuid {
        match self {
            ReservationEvent::TableHeld { event_id, .. }
            | ReservationEvent::HoldReleased { event_id, .. }
            | ReservationEvent::BookingOpened { event_id, .. }
            | ReservationEvent::BookingConfirmed { event_id, .. }
            | ReservationEvent::BookingCancelled { event_id, .. }
            | ReservationEvent::GuestCheckedIn { event_id, .. }
            | ReservationEvent::AvailabilityChanged { event_id, .. } => *event_id,
        }
    }

    /// Topic-style name, also used as the SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            ReservationEvent::TableHeld { .. } => "table_held",
            ReservationEvent::HoldReleased { .. } => "hold_released",
            ReservationEvent::BookingOpened { .. } => "booking_opened",
            ReservationEvent::BookingConfirmed { .. } => "booking_confirmed",
            ReservationEvent::BookingCancelled { .. } => "booking_cancelled",
            ReservationEvent::GuestCheckedIn { .. } => "guest_checked_in",
            ReservationEvent::AvailabilityChanged { .. } => "availability_changed",
        }
    }
}
