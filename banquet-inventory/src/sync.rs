use banquet_core::clock::Clock;
use banquet_core::events::EventPublisher;
use banquet_core::repository::{AvailabilityRepository, TableRepository};
use banquet_core::CoreResult;
use banquet_shared::{EventAvailability, ReservationEvent, TableState, TableStatus};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::resolver::TableStatusResolver;

/// Events that started longer ago than this drop out of the periodic sweep.
const SWEEP_LOOKBACK_HOURS: i64 = 12;

/// Counts tables and seats per status bucket.
pub fn tally(event_id: Uuid, states: &[TableState], computed_at: DateTime<Utc>) -> EventAvailability {
    let mut availability = EventAvailability::empty(event_id, computed_at);
    for state in states {
        let seats = state.table.capacity;
        availability.tables_total += 1;
        availability.seats_total += seats;
        match state.status {
            TableStatus::Available => {
                availability.tables_available += 1;
                availability.seats_available += seats;
            }
            TableStatus::Held => availability.tables_held += 1,
            TableStatus::Booked => availability.tables_booked += 1,
        }
    }
    availability
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub synced: usize,
    pub failed: usize,
}

/// Keeps the cached per-event availability rows in line with authoritative
/// booking and hold state. The cache is only ever a display optimisation.
pub struct AvailabilitySynchronizer {
    resolver: Arc<TableStatusResolver>,
    tables: Arc<dyn TableRepository>,
    availability: Arc<dyn AvailabilityRepository>,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
}

impl AvailabilitySynchronizer {
    pub fn new(
        resolver: Arc<TableStatusResolver>,
        tables: Arc<dyn TableRepository>,
        availability: Arc<dyn AvailabilityRepository>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            resolver,
            tables,
            availability,
            publisher,
            clock,
        }
    }

    /// Recomputes and overwrites the aggregate for one event. Safe to call
    /// redundantly.
    pub async fn sync_event(&self, event_id: Uuid) -> CoreResult<EventAvailability> {
        // Stamp before reading so a slower, older computation can never
        // replace this one.
        let computed_at = self.clock.now();
        let states = self.resolver.resolve_event(event_id).await?;
        let fresh = tally(event_id, &states, computed_at);

        let previous = self.availability.get_availability(event_id).await?;
        self.availability.upsert_availability(&fresh).await?;

        let changed = previous.as_ref().map_or(true, |p| {
            p.tables_available != fresh.tables_available || p.seats_available != fresh.seats_available
        });
        if changed {
            debug!(
                "Availability for event {}: {}/{} tables, {}/{} seats",
                event_id,
                fresh.tables_available,
                fresh.tables_total,
                fresh.seats_available,
                fresh.seats_total
            );
            self.publisher.publish(ReservationEvent::AvailabilityChanged {
                event_id,
                tables_available: fresh.tables_available,
                seats_available: fresh.seats_available,
                at: computed_at.timestamp(),
            });
        }

        Ok(fresh)
    }

    /// Display path: the cached row if present, else a live sync.
    pub async fn cached(&self, event_id: Uuid) -> CoreResult<EventAvailability> {
        match self.availability.get_availability(event_id).await? {
            Some(availability) => Ok(availability),
            None => self.sync_event(event_id).await,
        }
    }

    /// Healing sweep over every known event; individual failures are logged
    /// and counted.
    pub async fn sync_all(&self) -> CoreResult<SweepReport> {
        let mut report = SweepReport::default();
        let since = self.clock.now() - Duration::hours(SWEEP_LOOKBACK_HOURS);
        for event_id in self.tables.list_event_ids_since(since).await? {
            match self.sync_event(event_id).await {
                Ok(_) => report.synced += 1,
                Err(e) => {
                    warn!("Availability sweep failed for event {}: {}", event_id, e);
                    report.failed += 1;
                }
            }
        }
        info!("Availability sweep finished: {} synced, {} failed", report.synced, report.failed);
        Ok(report)
    }

    /// Post-mutation refresh. A failure leaves the cache stale until the next
    /// sweep and is never reported to the caller of the mutation.
    pub async fn refresh_after_change(&self, event_id: Uuid) {
        if let Err(e) = self.sync_event(event_id).await {
            warn!("Availability refresh for event {} failed, cache is stale: {}", event_id, e);
        }
    }
}
