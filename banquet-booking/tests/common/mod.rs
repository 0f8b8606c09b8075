#![allow(dead_code)]

use async_trait::async_trait;
use banquet_booking::{BookingLifecycle, HoldPolicy, OpenBooking, SeatHoldManager};
use banquet_core::clock::{Clock, ManualClock};
use banquet_core::events::EventPublisher;
use banquet_core::payment::{PaymentGateway, PaymentStatus};
use banquet_core::repository::Stores;
use banquet_inventory::{AvailabilitySynchronizer, TableStatusResolver};
use banquet_shared::{Booking, BookingSource, ReservationEvent, ScheduledEvent, SeatHold, Table};
use banquet_store::MemoryStore;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<ReservationEvent>>,
}

impl RecordingPublisher {
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name()).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names().into_iter().filter(|n| *n == name).count()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: ReservationEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct FixedGateway(pub PaymentStatus);

#[async_trait]
impl PaymentGateway for FixedGateway {
    async fn capture_status(
        &self,
        _payment_reference: &str,
    ) -> Result<PaymentStatus, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.0)
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub events: Arc<RecordingPublisher>,
    pub resolver: Arc<TableStatusResolver>,
    pub sync: Arc<AvailabilitySynchronizer>,
    pub holds: Arc<SeatHoldManager>,
    pub bookings: Arc<BookingLifecycle>,
    pub event: ScheduledEvent,
    pub tables: Vec<Table>,
}

impl Harness {
    pub async fn new(capacities: &[i32]) -> Self {
        Self::with_payments(capacities, PaymentStatus::Captured).await
    }

    pub async fn with_payments(capacities: &[i32], payment: PaymentStatus) -> Self {
        let store = Arc::new(MemoryStore::new());
        let stores = Stores::shared(store.clone());
        Self::assemble(store, stores, capacities, payment).await
    }

    /// Wires every component over `stores`, which may wrap `store`.
    pub async fn assemble(
        store: Arc<MemoryStore>,
        stores: Stores,
        capacities: &[i32],
        payment: PaymentStatus,
    ) -> Self {
        let clock = Arc::new(ManualClock::default());
        let events = Arc::new(RecordingPublisher::default());
        let (event, tables) = store.seed_venue("Gala dinner", clock.now(), capacities).await;

        let resolver = Arc::new(TableStatusResolver::new(
            stores.tables.clone(),
            stores.bookings.clone(),
            stores.holds.clone(),
            clock.clone(),
        ));
        let sync = Arc::new(AvailabilitySynchronizer::new(
            resolver.clone(),
            stores.tables.clone(),
            stores.availability.clone(),
            events.clone(),
            clock.clone(),
        ));
        let holds = Arc::new(SeatHoldManager::new(
            &stores,
            sync.clone(),
            events.clone(),
            clock.clone(),
            HoldPolicy::default(),
        ));
        let bookings = Arc::new(BookingLifecycle::new(
            &stores,
            holds.clone(),
            sync.clone(),
            events.clone(),
            Arc::new(FixedGateway(payment)),
            clock.clone(),
        ));

        Self {
            store,
            clock,
            events,
            resolver,
            sync,
            holds,
            bookings,
            event,
            tables,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn table(&self, index: usize) -> &Table {
        &self.tables[index]
    }

    pub async fn hold(&self, index: usize, session: &str) -> SeatHold {
        self.holds
            .acquire(self.event.id, self.tables[index].id, session)
            .await
            .unwrap()
    }

    /// Hold plus pending booking for a party of two.
    pub async fn pending(&self, index: usize, session: &str) -> (SeatHold, Booking) {
        let hold = self.hold(index, session).await;
        let booking = self
            .bookings
            .open(OpenBooking {
                lock_token: hold.lock_token.clone(),
                party_size: 2,
                guest_id: format!("guest-{}", session),
                guest_email: Some(format!("{}@example.com", session)),
                source: BookingSource::Online,
            })
            .await
            .unwrap();
        (hold, booking)
    }

    pub async fn confirmed(&self, index: usize, session: &str) -> (SeatHold, Booking) {
        let (hold, booking) = self.pending(index, session).await;
        let confirmed = self
            .bookings
            .confirm(booking.id, &hold.lock_token, booking.version, Some(format!("pay_{}", session)))
            .await
            .unwrap();
        (hold, confirmed)
    }
}
