use async_trait::async_trait;
use banquet_core::repository::{
    AvailabilityRepository, BookingFilter, BookingRepository, Confirmation, HoldRepository,
    StoreError, StoreResult, TableRepository, Transition,
};
use banquet_shared::{
    Booking, BookingStatus, EventAvailability, HoldStatus, LockToken, ScheduledEvent, SeatHold,
    Table,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    events: HashMap<Uuid, ScheduledEvent>,
    tables: HashMap<Uuid, Table>,
    holds: Vec<SeatHold>,
    bookings: HashMap<Uuid, Booking>,
    availability: HashMap<Uuid, EventAvailability>,
}

impl MemoryState {
    fn occupying(&self, event_id: Uuid, table_id: Uuid) -> Option<&Booking> {
        self.bookings
            .values()
            .find(|b| b.event_id == event_id && b.table_id == table_id && b.occupies_table())
    }

    fn hold_by_token_mut(&mut self, token: &LockToken) -> Option<&mut SeatHold> {
        self.holds.iter_mut().find(|h| &h.lock_token == token)
    }

    fn locked_booking(&self, booking_id: Uuid, expected_version: i64, from: BookingStatus) -> StoreResult<Booking> {
        let booking = self
            .bookings
            .get(&booking_id)
            .ok_or_else(|| StoreError::NotFound(format!("Booking {}", booking_id)))?;
        if booking.version != expected_version || booking.status != from {
            return Err(StoreError::StaleVersion {
                booking_id,
                expected: expected_version,
            });
        }
        Ok(booking.clone())
    }
}

/// Single-process store backing every repository trait. Each operation holds
/// one lock for its whole body, which gives it the same all-or-nothing
/// behaviour as a database transaction.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_event(&self, event: ScheduledEvent) {
        self.state.lock().await.events.insert(event.id, event);
    }

    pub async fn add_table(&self, table: Table) {
        self.state.lock().await.tables.insert(table.id, table);
    }

    /// Creates a venue with one table per entry of `capacities` (numbered
    /// `T1`, `T2`, ...) and an event hosted there.
    pub async fn seed_venue(
        &self,
        name: &str,
        starts_at: DateTime<Utc>,
        capacities: &[i32],
    ) -> (ScheduledEvent, Vec<Table>) {
        let venue_id = Uuid::new_v4();
        let event = ScheduledEvent::new(venue_id, name, starts_at);
        let tables: Vec<Table> = capacities
            .iter()
            .enumerate()
            .map(|(i, capacity)| Table::new(venue_id, format!("T{}", i + 1), *capacity))
            .collect();

        let mut state = self.state.lock().await;
        state.events.insert(event.id, event.clone());
        for table in &tables {
            state.tables.insert(table.id, table.clone());
        }
        (event, tables)
    }

    /// Every hold ever recorded for the pair, in insertion order.
    pub async fn hold_history(&self, event_id: Uuid, table_id: Uuid) -> Vec<SeatHold> {
        self.state
            .lock()
            .await
            .holds
            .iter()
            .filter(|h| h.event_id == event_id && h.table_id == table_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TableRepository for MemoryStore {
    async fn get_event(&self, event_id: Uuid) -> StoreResult<Option<ScheduledEvent>> {
        Ok(self.state.lock().await.events.get(&event_id).cloned())
    }

    async fn get_table(&self, table_id: Uuid) -> StoreResult<Option<Table>> {
        Ok(self.state.lock().await.tables.get(&table_id).cloned())
    }

    async fn list_tables_for_event(&self, event_id: Uuid) -> StoreResult<Vec<Table>> {
        let state = self.state.lock().await;
        let Some(event) = state.events.get(&event_id) else {
            return Ok(Vec::new());
        };
        let mut tables: Vec<Table> = state
            .tables
            .values()
            .filter(|t| t.venue_id == event.venue_id)
            .cloned()
            .collect();
        tables.sort_by(|a, b| a.table_number.cmp(&b.table_number));
        Ok(tables)
    }

    async fn list_event_ids_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        let state = self.state.lock().await;
        let mut events: Vec<&ScheduledEvent> =
            state.events.values().filter(|e| e.starts_at >= since).collect();
        events.sort_by_key(|e| e.starts_at);
        Ok(events.into_iter().map(|e| e.id).collect())
    }
}

#[async_trait]
impl HoldRepository for MemoryStore {
    async fn insert_active(&self, hold: &SeatHold, now: DateTime<Utc>) -> StoreResult<()> {
        let mut state = self.state.lock().await;

        for existing in state.holds.iter_mut().filter(|h| {
            h.event_id == hold.event_id
                && h.table_id == hold.table_id
                && h.status == HoldStatus::Active
                && h.hold_expiry <= now
        }) {
            existing.status = HoldStatus::Expired;
            existing.updated_at = now;
        }

        if state.holds.iter().any(|h| {
            h.event_id == hold.event_id && h.table_id == hold.table_id && h.status == HoldStatus::Active
        }) {
            return Err(StoreError::HoldTaken {
                event_id: hold.event_id,
                table_id: hold.table_id,
            });
        }
        if state.holds.iter().any(|h| h.lock_token == hold.lock_token) {
            return Err(StoreError::Duplicate("Hold token".to_string()));
        }
        if state.occupying(hold.event_id, hold.table_id).is_some() {
            return Err(StoreError::TableBooked {
                event_id: hold.event_id,
                table_id: hold.table_id,
            });
        }

        state.holds.push(hold.clone());
        Ok(())
    }

    async fn find_by_token(&self, token: &LockToken) -> StoreResult<Option<SeatHold>> {
        let state = self.state.lock().await;
        Ok(state.holds.iter().find(|h| &h.lock_token == token).cloned())
    }

    async fn find_active(&self, event_id: Uuid, table_id: Uuid) -> StoreResult<Option<SeatHold>> {
        let state = self.state.lock().await;
        Ok(state
            .holds
            .iter()
            .find(|h| h.event_id == event_id && h.table_id == table_id && h.status == HoldStatus::Active)
            .cloned())
    }

    async fn list_active_for_event(&self, event_id: Uuid) -> StoreResult<Vec<SeatHold>> {
        let state = self.state.lock().await;
        Ok(state
            .holds
            .iter()
            .filter(|h| h.event_id == event_id && h.status == HoldStatus::Active)
            .cloned()
            .collect())
    }

    async fn extend(
        &self,
        token: &LockToken,
        new_expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<SeatHold>> {
        let mut state = self.state.lock().await;
        let extended = match state.hold_by_token_mut(token) {
            Some(hold) if hold.is_live(now) => {
                hold.hold_expiry = new_expiry;
                hold.updated_at = now;
                hold.clone()
            }
            _ => return Ok(None),
        };

        for booking in state
            .bookings
            .values_mut()
            .filter(|b| b.hold_id == Some(extended.id) && b.status == BookingStatus::Pending)
        {
            booking.lock_expiry = Some(new_expiry);
            booking.updated_at = now;
        }
        Ok(Some(extended))
    }

    async fn mark_expired(&self, token: &LockToken, now: DateTime<Utc>) -> StoreResult<Option<SeatHold>> {
        let mut state = self.state.lock().await;
        match state.hold_by_token_mut(token) {
            Some(hold) if hold.status == HoldStatus::Active => {
                hold.status = HoldStatus::Expired;
                hold.updated_at = now;
                Ok(Some(hold.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn reap_expired(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<SeatHold>> {
        let mut state = self.state.lock().await;
        let limit = usize::try_from(limit).unwrap_or(0);
        let mut reaped = Vec::new();
        for hold in state
            .holds
            .iter_mut()
            .filter(|h| h.status == HoldStatus::Active && h.hold_expiry <= now)
            .take(limit)
        {
            hold.status = HoldStatus::Expired;
            hold.updated_at = now;
            reaped.push(hold.clone());
        }
        Ok(reaped)
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn insert_pending(&self, booking: &Booking) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.bookings.contains_key(&booking.id) {
            return Err(StoreError::Duplicate(format!("Booking {}", booking.id)));
        }
        if booking.hold_id.is_some() && state.bookings.values().any(|b| b.hold_id == booking.hold_id) {
            return Err(StoreError::Duplicate("Booking for this hold".to_string()));
        }
        state.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get_booking(&self, booking_id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.state.lock().await.bookings.get(&booking_id).cloned())
    }

    async fn find_by_hold(&self, hold_id: Uuid) -> StoreResult<Option<Booking>> {
        let state = self.state.lock().await;
        Ok(state.bookings.values().find(|b| b.hold_id == Some(hold_id)).cloned())
    }

    async fn find_occupying(&self, event_id: Uuid, table_id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.state.lock().await.occupying(event_id, table_id).cloned())
    }

    async fn list_occupying_for_event(&self, event_id: Uuid) -> StoreResult<Vec<Booking>> {
        let state = self.state.lock().await;
        Ok(state
            .bookings
            .values()
            .filter(|b| b.event_id == event_id && b.occupies_table())
            .cloned()
            .collect())
    }

    async fn list(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>> {
        let state = self.state.lock().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bookings.truncate(usize::try_from(filter.effective_limit()).unwrap_or(0));
        Ok(bookings)
    }

    async fn list_lapsed_pending(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Booking>> {
        let state = self.state.lock().await;
        let mut lapsed: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Pending)
            .filter(|b| {
                let hold = b
                    .hold_id
                    .and_then(|id| state.holds.iter().find(|h| h.id == id));
                match hold {
                    Some(hold) => !hold.is_live(now),
                    None => b.lock_expiry.map_or(true, |expiry| expiry <= now),
                }
            })
            .cloned()
            .collect();
        lapsed.sort_by_key(|b| b.created_at);
        lapsed.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(lapsed)
    }

    async fn commit_confirmation(&self, confirmation: &Confirmation) -> StoreResult<Booking> {
        let mut state = self.state.lock().await;
        let booking = state.locked_booking(
            confirmation.booking_id,
            confirmation.expected_version,
            BookingStatus::Pending,
        )?;

        let hold_ok = state.holds.iter().any(|h| {
            h.lock_token == confirmation.lock_token
                && Some(h.id) == booking.hold_id
                && h.event_id == booking.event_id
                && h.table_id == booking.table_id
                && h.is_live(confirmation.now)
        });
        if !hold_ok {
            return Err(StoreError::HoldLapsed);
        }
        if state.occupying(booking.event_id, booking.table_id).is_some() {
            return Err(StoreError::TableBooked {
                event_id: booking.event_id,
                table_id: booking.table_id,
            });
        }

        if let Some(hold) = state.hold_by_token_mut(&confirmation.lock_token) {
            hold.status = HoldStatus::Completed;
            hold.updated_at = confirmation.now;
        }

        let mut confirmed = booking;
        confirmed.status = BookingStatus::Confirmed;
        confirmed.version += 1;
        if confirmation.payment_reference.is_some() {
            confirmed.payment_reference = confirmation.payment_reference.clone();
        }
        confirmed.lock_token = None;
        confirmed.lock_expiry = None;
        confirmed.updated_at = confirmation.now;
        state.bookings.insert(confirmed.id, confirmed.clone());
        Ok(confirmed)
    }

    async fn commit_transition(&self, transition: &Transition) -> StoreResult<Booking> {
        let mut state = self.state.lock().await;
        let mut booking =
            state.locked_booking(transition.booking_id, transition.expected_version, transition.from)?;

        if let Some(token) = &transition.release_hold {
            if let Some(hold) = state.hold_by_token_mut(token) {
                if hold.status == HoldStatus::Active {
                    hold.status = HoldStatus::Expired;
                    hold.updated_at = transition.now;
                }
            }
        }

        booking.status = transition.to;
        booking.version += 1;
        if transition.reason.is_some() {
            booking.cancel_reason = transition.reason.clone();
        }
        booking.lock_token = None;
        booking.lock_expiry = None;
        booking.updated_at = transition.now;
        state.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }
}

#[async_trait]
impl AvailabilityRepository for MemoryStore {
    async fn get_availability(&self, event_id: Uuid) -> StoreResult<Option<EventAvailability>> {
        Ok(self.state.lock().await.availability.get(&event_id).cloned())
    }

    async fn upsert_availability(&self, availability: &EventAvailability) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let newer_exists = state
            .availability
            .get(&availability.event_id)
            .is_some_and(|current| current.computed_at > availability.computed_at);
        if !newer_exists {
            state
                .availability
                .insert(availability.event_id, availability.clone());
        }
        Ok(())
    }
}
