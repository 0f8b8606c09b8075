use banquet_core::repository::StoreError;
use banquet_shared::{
    Booking, EventAvailability, LockToken, Masked, ScheduledEvent, SeatHold, Table,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(sqlx::FromRow)]
pub(crate) struct EventRow {
    id: Uuid,
    venue_id: Uuid,
    name: String,
    starts_at: DateTime<Utc>,
}

impl From<EventRow> for ScheduledEvent {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id,
            venue_id: row.venue_id,
            name: row.name,
            starts_at: row.starts_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct TableRow {
    id: Uuid,
    venue_id: Uuid,
    table_number: String,
    capacity: i32,
    geometry: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl From<TableRow> for Table {
    fn from(row: TableRow) -> Self {
        Self {
            id: row.id,
            venue_id: row.venue_id,
            table_number: row.table_number,
            capacity: row.capacity,
            geometry: row.geometry,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct HoldRow {
    id: Uuid,
    event_id: Uuid,
    table_id: Uuid,
    session_id: String,
    lock_token: String,
    hold_expiry: DateTime<Utc>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<HoldRow> for SeatHold {
    type Error = StoreError;

    fn try_from(row: HoldRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            event_id: row.event_id,
            table_id: row.table_id,
            session_id: row.session_id,
            lock_token: LockToken::new(row.lock_token),
            hold_expiry: row.hold_expiry,
            status: row.status.parse().map_err(corrupt)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct BookingRow {
    id: Uuid,
    event_id: Uuid,
    table_id: Uuid,
    hold_id: Option<Uuid>,
    party_size: i32,
    guest_id: String,
    guest_email: Option<String>,
    payment_reference: Option<String>,
    source: String,
    status: String,
    version: i64,
    lock_token: Option<String>,
    lock_expiry: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    pub(crate) fn version(&self) -> i64 {
        self.version
    }

    pub(crate) fn status(&self) -> &str {
        &self.status
    }
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            event_id: row.event_id,
            table_id: row.table_id,
            hold_id: row.hold_id,
            party_size: row.party_size,
            guest_id: row.guest_id,
            guest_email: row.guest_email.map(Masked),
            payment_reference: row.payment_reference,
            source: row.source.parse().map_err(corrupt)?,
            status: row.status.parse().map_err(corrupt)?,
            version: row.version,
            lock_token: row.lock_token.map(LockToken::new),
            lock_expiry: row.lock_expiry,
            cancel_reason: row.cancel_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct AvailabilityRow {
    event_id: Uuid,
    tables_total: i32,
    tables_available: i32,
    tables_held: i32,
    tables_booked: i32,
    seats_total: i32,
    seats_available: i32,
    computed_at: DateTime<Utc>,
}

impl From<AvailabilityRow> for EventAvailability {
    fn from(row: AvailabilityRow) -> Self {
        Self {
            event_id: row.event_id,
            tables_total: row.tables_total,
            tables_available: row.tables_available,
            tables_held: row.tables_held,
            tables_booked: row.tables_booked,
            seats_total: row.seats_total,
            seats_available: row.seats_available,
            computed_at: row.computed_at,
        }
    }
}

pub(crate) fn into_holds(rows: Vec<HoldRow>) -> Result<Vec<SeatHold>, StoreError> {
    rows.into_iter().map(SeatHold::try_from).collect()
}

pub(crate) fn into_bookings(rows: Vec<BookingRow>) -> Result<Vec<Booking>, StoreError> {
    rows.into_iter().map(Booking::try_from).collect()
}

fn corrupt(err: banquet_shared::ParseStatusError) -> StoreError {
    StoreError::Database(format!("Corrupt row: {}", err))
}
