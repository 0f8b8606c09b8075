use async_trait::async_trait;
use banquet_shared::{Booking, BookingStatus, EventAvailability, LockToken, ScheduledEvent, SeatHold, Table};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Failures reported by the durable stores. The conflict variants are raised by
/// constraint checks inside a single transaction, never by a prior read.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("An active hold already exists for table {table_id} at event {event_id}")]
    HoldTaken { event_id: Uuid, table_id: Uuid },
    #[error("Table {table_id} is already booked for event {event_id}")]
    TableBooked { event_id: Uuid, table_id: Uuid },
    #[error("Booking {booking_id} is no longer at version {expected}")]
    StaleVersion { booking_id: Uuid, expected: i64 },
    #[error("Hold is no longer active")]
    HoldLapsed,
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    Duplicate(String),
    #[error("Database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Atomic pending → confirmed conversion.
///
/// The store applies it in one transaction: the booking must still be at
/// `expected_version`, the hold under `lock_token` must be active, unexpired at
/// `now` and for the booking's (event, table); the booking becomes confirmed
/// with `version + 1` and the hold becomes completed.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub booking_id: Uuid,
    pub lock_token: LockToken,
    pub expected_version: i64,
    pub payment_reference: Option<String>,
    pub now: DateTime<Utc>,
}

/// Version-checked status change for every edge other than confirmation.
#[derive(Debug, Clone)]
pub struct Transition {
    pub booking_id: Uuid,
    pub expected_version: i64,
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub reason: Option<String>,
    /// Hold to expire in the same transaction (cancelling a pending booking).
    pub release_hold: Option<LockToken>,
    pub now: DateTime<Utc>,
}

/// Read-only filter for reporting and admin queries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingFilter {
    pub event_id: Option<Uuid>,
    pub table_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
    pub limit: Option<i64>,
}

impl BookingFilter {
    pub const DEFAULT_LIMIT: i64 = 100;
    pub const MAX_LIMIT: i64 = 1000;

    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn matches(&self, booking: &Booking) -> bool {
        self.event_id.map_or(true, |id| booking.event_id == id)
            && self.table_id.map_or(true, |id| booking.table_id == id)
            && self.status.map_or(true, |status| booking.status == status)
    }
}

/// Table Store: venue layout and event → venue mapping. Read-mostly.
#[async_trait]
pub trait TableRepository: Send + Sync {
    async fn get_event(&self, event_id: Uuid) -> StoreResult<Option<ScheduledEvent>>;

    async fn get_table(&self, table_id: Uuid) -> StoreResult<Option<Table>>;

    /// All tables of the venue hosting `event_id`, ordered by table number.
    async fn list_tables_for_event(&self, event_id: Uuid) -> StoreResult<Vec<Table>>;

    /// Events starting at or after `since`, oldest first. The periodic sweep
    /// keeps their aggregates fresh.
    async fn list_event_ids_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<Uuid>>;
}

/// Seat Hold Store.
#[async_trait]
pub trait HoldRepository: Send + Sync {
    /// Makes `hold` the active hold for its (event, table) pair.
    ///
    /// One transaction: an active row whose expiry is at or before `now` is
    /// marked expired, the new row is inserted under the active-hold uniqueness
    /// constraint (`HoldTaken` on violation), and the insert is rolled back with
    /// `TableBooked` if a confirmed or checked-in booking occupies the table.
    async fn insert_active(&self, hold: &SeatHold, now: DateTime<Utc>) -> StoreResult<()>;

    async fn find_by_token(&self, token: &LockToken) -> StoreResult<Option<SeatHold>>;

    /// The row persisted as active for the pair, whether or not it has lapsed.
    async fn find_active(&self, event_id: Uuid, table_id: Uuid) -> StoreResult<Option<SeatHold>>;

    async fn list_active_for_event(&self, event_id: Uuid) -> StoreResult<Vec<SeatHold>>;

    /// Moves the expiry of a live hold (and of the pending booking opened on
    /// it). `None` when the hold is unknown, no longer active or lapsed.
    async fn extend(
        &self,
        token: &LockToken,
        new_expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<SeatHold>>;

    /// Marks an active hold expired. Returns the hold if anything changed.
    async fn mark_expired(&self, token: &LockToken, now: DateTime<Utc>) -> StoreResult<Option<SeatHold>>;

    /// Marks up to `limit` lapsed active holds expired and returns them.
    async fn reap_expired(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<SeatHold>>;
}

/// Booking Store. Every status write is version-checked.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn insert_pending(&self, booking: &Booking) -> StoreResult<()>;

    async fn get_booking(&self, booking_id: Uuid) -> StoreResult<Option<Booking>>;

    async fn find_by_hold(&self, hold_id: Uuid) -> StoreResult<Option<Booking>>;

    /// The confirmed or checked-in booking for the pair, if any.
    async fn find_occupying(&self, event_id: Uuid, table_id: Uuid) -> StoreResult<Option<Booking>>;

    async fn list_occupying_for_event(&self, event_id: Uuid) -> StoreResult<Vec<Booking>>;

    async fn list(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>>;

    /// Pending bookings whose hold deadline passed before `now`.
    async fn list_lapsed_pending(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Booking>>;

    async fn commit_confirmation(&self, confirmation: &Confirmation) -> StoreResult<Booking>;

    async fn commit_transition(&self, transition: &Transition) -> StoreResult<Booking>;
}

/// Cached availability aggregates.
#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    async fn get_availability(&self, event_id: Uuid) -> StoreResult<Option<EventAvailability>>;

    /// Overwrites the row unless it already holds a newer computation.
    async fn upsert_availability(&self, availability: &EventAvailability) -> StoreResult<()>;
}

/// The four stores a reservation component may need, behind trait objects.
#[derive(Clone)]
pub struct Stores {
    pub tables: Arc<dyn TableRepository>,
    pub holds: Arc<dyn HoldRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub availability: Arc<dyn AvailabilityRepository>,
}

impl Stores {
    /// One backend serving every store, e.g. the in-memory store.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: TableRepository + HoldRepository + BookingRepository + AvailabilityRepository + 'static,
    {
        Self {
            tables: store.clone(),
            holds: store.clone(),
            bookings: store.clone(),
            availability: store,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_limit_is_clamped() {
        let mut filter = BookingFilter::default();
        assert_eq!(filter.effective_limit(), BookingFilter::DEFAULT_LIMIT);
        filter.limit = Some(0);
        assert_eq!(filter.effective_limit(), 1);
        filter.limit = Some(50_000);
        assert_eq!(filter.effective_limit(), BookingFilter::MAX_LIMIT);
    }
}
