use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cached per-event availability counts. Derived from bookings and holds and
/// always reconstructible; never consulted when deciding who gets a table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventAvailability {
    pub event_id: Uuid,
    pub tables_total: i32,
    pub tables_available: i32,
    pub tables_held: i32,
    pub tables_booked: i32,
    pub seats_total: i32,
    pub seats_available: i32,
    pub computed_at: DateTime<Utc>,
}

impl EventAvailability {
    pub fn empty(event_id: Uuid, computed_at: DateTime<Utc>) -> Self {
        Self {
            event_id,
            tables_total: 0,
            tables_available: 0,
            tables_held: 0,
            tables_booked: 0,
            seats_total: 0,
            seats_available: 0,
            computed_at,
        }
    }

    pub fn is_sold_out(&self) -> bool {
        self.tables_available == 0
    }
}
