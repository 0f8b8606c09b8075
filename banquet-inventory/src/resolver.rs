use banquet_core::clock::Clock;
use banquet_core::repository::{BookingRepository, HoldRepository, TableRepository};
use banquet_core::{CoreResult, ReservationError};
use banquet_shared::{Booking, SeatHold, TableState, TableStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Precedence that decides a table's status for one event:
/// an occupying booking wins, then a live hold, otherwise the table is free.
///
/// A hold past its deadline is ignored whatever its persisted status says, so
/// a reaper that has not run yet can never make a table look taken.
pub fn derive_status(
    booking: Option<&Booking>,
    hold: Option<&SeatHold>,
    now: DateTime<Utc>,
) -> TableStatus {
    if booking.is_some_and(|b| b.occupies_table()) {
        return TableStatus::Booked;
    }
    if hold.is_some_and(|h| h.is_live(now)) {
        return TableStatus::Held;
    }
    TableStatus::Available
}

/// Read-only projection of booking and hold state into table statuses.
pub struct TableStatusResolver {
    tables: Arc<dyn TableRepository>,
    bookings: Arc<dyn BookingRepository>,
    holds: Arc<dyn HoldRepository>,
    clock: Arc<dyn Clock>,
}

impl TableStatusResolver {
    pub fn new(
        tables: Arc<dyn TableRepository>,
        bookings: Arc<dyn BookingRepository>,
        holds: Arc<dyn HoldRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tables,
            bookings,
            holds,
            clock,
        }
    }

    pub async fn resolve(&self, table_id: Uuid, event_id: Uuid) -> CoreResult<TableStatus> {
        let (booking, hold) = tokio::try_join!(
            self.bookings.find_occupying(event_id, table_id),
            self.holds.find_active(event_id, table_id),
        )?;
        Ok(derive_status(booking.as_ref(), hold.as_ref(), self.clock.now()))
    }

    /// Resolves every table of the event's venue with two bulk reads.
    pub async fn resolve_event(&self, event_id: Uuid) -> CoreResult<Vec<TableState>> {
        if self.tables.get_event(event_id).await?.is_none() {
            return Err(ReservationError::NotFound(format!("Event {}", event_id)));
        }

        let (tables, occupying, holds) = tokio::try_join!(
            self.tables.list_tables_for_event(event_id),
            self.bookings.list_occupying_for_event(event_id),
            self.holds.list_active_for_event(event_id),
        )?;
        let now = self.clock.now();

        let bookings_by_table: HashMap<Uuid, &Booking> =
            occupying.iter().map(|b| (b.table_id, b)).collect();
        let holds_by_table: HashMap<Uuid, &SeatHold> =
            holds.iter().map(|h| (h.table_id, h)).collect();

        Ok(tables
            .into_iter()
            .map(|table| {
                let status = derive_status(
                    bookings_by_table.get(&table.id).copied(),
                    holds_by_table.get(&table.id).copied(),
                    now,
                );
                TableState { table, status }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banquet_shared::{BookingSource, BookingStatus, HoldStatus, LockToken};
    use chrono::Duration;

    fn hold(expiry: DateTime<Utc>, status: HoldStatus) -> SeatHold {
        let mut hold = SeatHold::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "session".to_string(),
            LockToken::new("tok_resolver"),
            expiry - Duration::minutes(15),
            expiry,
        );
        hold.status = status;
        hold
    }

    fn booking(status: BookingStatus, from: &SeatHold) -> Booking {
        let mut booking =
            Booking::pending_from_hold(from, 2, "guest".into(), None, BookingSource::Online, from.created_at);
        booking.status = status;
        booking
    }

    #[test]
    fn test_nothing_means_available() {
        assert_eq!(derive_status(None, None, Utc::now()), TableStatus::Available);
    }

    #[test]
    fn test_live_hold_means_held() {
        let now = Utc::now();
        let h = hold(now + Duration::minutes(5), HoldStatus::Active);
        assert_eq!(derive_status(None, Some(&h), now), TableStatus::Held);
    }

    #[test]
    fn test_lapsed_hold_is_available_whatever_its_status() {
        let now = Utc::now();
        for status in [HoldStatus::Active, HoldStatus::Completed, HoldStatus::Expired] {
            let h = hold(now - Duration::seconds(1), status);
            assert_eq!(derive_status(None, Some(&h), now), TableStatus::Available);
        }
    }

    #[test]
    fn test_confirmed_booking_beats_stale_hold_row() {
        let now = Utc::now();
        let stale = hold(now - Duration::minutes(1), HoldStatus::Active);
        let live = hold(now + Duration::minutes(1), HoldStatus::Active);
        for status in [BookingStatus::Confirmed, BookingStatus::CheckedIn] {
            let b = booking(status, &stale);
            assert_eq!(derive_status(Some(&b), Some(&stale), now), TableStatus::Booked);
            assert_eq!(derive_status(Some(&b), Some(&live), now), TableStatus::Booked);
        }
    }

    #[test]
    fn test_non_occupying_booking_is_ignored() {
        let now = Utc::now();
        let h = hold(now - Duration::minutes(1), HoldStatus::Expired);
        for status in [BookingStatus::Pending, BookingStatus::Cancelled, BookingStatus::Refunded] {
            let b = booking(status, &h);
            assert_eq!(derive_status(Some(&b), None, now), TableStatus::Available);
        }
    }
}
