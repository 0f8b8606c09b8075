use banquet_core::clock::Clock;
use banquet_core::events::EventPublisher;
use banquet_core::repository::{HoldRepository, Stores, TableRepository};
use banquet_core::{CoreResult, ReservationError};
use banquet_inventory::AvailabilitySynchronizer;
use banquet_shared::{LockToken, ReservationEvent, SeatHold};
use chrono::Duration;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::token::generate_lock_token;

/// How long a hold lasts. Bounded so a misconfiguration can neither make
/// holds vanish mid-checkout nor park tables for hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldPolicy {
    ttl: Duration,
}

impl HoldPolicy {
    pub const MIN_TTL_SECONDS: u64 = 60;
    pub const MAX_TTL_SECONDS: u64 = 3600;
    pub const DEFAULT_TTL_SECONDS: u64 = 900;

    pub fn new(ttl_seconds: u64) -> CoreResult<Self> {
        if !(Self::MIN_TTL_SECONDS..=Self::MAX_TTL_SECONDS).contains(&ttl_seconds) {
            return Err(ReservationError::ValidationError(format!(
                "hold ttl must be between {} and {} seconds, got {}",
                Self::MIN_TTL_SECONDS,
                Self::MAX_TTL_SECONDS,
                ttl_seconds
            )));
        }
        Ok(Self {
            ttl: Duration::seconds(ttl_seconds as i64),
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for HoldPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::seconds(Self::DEFAULT_TTL_SECONDS as i64),
        }
    }
}

/// Grants, renews and releases time-boxed exclusive claims on tables.
///
/// Exclusivity comes from the store's active-hold uniqueness constraint: an
/// acquire inserts and interprets the failure, it never checks first.
pub struct SeatHoldManager {
    tables: Arc<dyn TableRepository>,
    holds: Arc<dyn HoldRepository>,
    sync: Arc<AvailabilitySynchronizer>,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    policy: HoldPolicy,
}

impl SeatHoldManager {
    pub fn new(
        stores: &Stores,
        sync: Arc<AvailabilitySynchronizer>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        policy: HoldPolicy,
    ) -> Self {
        Self {
            tables: stores.tables.clone(),
            holds: stores.holds.clone(),
            sync,
            publisher,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> HoldPolicy {
        self.policy
    }

    pub async fn acquire(&self, event_id: Uuid, table_id: Uuid, session_id: &str) -> CoreResult<SeatHold> {
        if session_id.trim().is_empty() {
            return Err(ReservationError::ValidationError("session_id is required".into()));
        }
        let event = self
            .tables
            .get_event(event_id)
            .await?
            .ok_or_else(|| ReservationError::NotFound(format!("Event {}", event_id)))?;
        let table = self
            .tables
            .get_table(table_id)
            .await?
            .ok_or_else(|| ReservationError::NotFound(format!("Table {}", table_id)))?;
        if table.venue_id != event.venue_id {
            return Err(ReservationError::ValidationError(format!(
                "table {} is not part of the venue for event {}",
                table_id, event_id
            )));
        }

        let now = self.clock.now();
        let hold = SeatHold::new(
            event_id,
            table_id,
            session_id.to_string(),
            generate_lock_token(),
            now,
            now + self.policy.ttl,
        );

        if let Err(e) = self.holds.insert_active(&hold, now).await {
            let err = ReservationError::from(e);
            if err.is_recoverable() {
                debug!("Hold on table {} for event {} refused: {}", table_id, event_id, err);
            }
            return Err(err);
        }

        info!(
            "Table {} held for event {} until {} (session {})",
            table_id, event_id, hold.hold_expiry, session_id
        );
        self.publisher.publish(ReservationEvent::TableHeld {
            event_id,
            table_id,
            hold_expiry: hold.hold_expiry,
            at: now.timestamp(),
        });
        self.sync.refresh_after_change(event_id).await;
        Ok(hold)
    }

    /// Pushes the deadline of a live hold out to now + ttl. Never revives a
    /// lapsed hold.
    pub async fn renew(&self, lock_token: &LockToken) -> CoreResult<SeatHold> {
        let now = self.clock.now();
        let hold = self
            .holds
            .find_by_token(lock_token)
            .await?
            .ok_or_else(|| ReservationError::NotFound("Hold".into()))?;
        if !hold.is_live(now) {
            return Err(ReservationError::HoldExpired);
        }

        let renewed = self
            .holds
            .extend(lock_token, now + self.policy.ttl, now)
            .await?
            .ok_or(ReservationError::HoldExpired)?;
        debug!("Hold on table {} renewed until {}", renewed.table_id, renewed.hold_expiry);
        Ok(renewed)
    }

    /// Idempotent. Unknown or already finished holds are left alone.
    pub async fn release(&self, lock_token: &LockToken) -> CoreResult<()> {
        let now = self.clock.now();
        let Some(hold) = self.holds.mark_expired(lock_token, now).await? else {
            debug!("Release of {:?} was a no-op", lock_token);
            return Ok(());
        };

        info!("Hold on table {} for event {} released", hold.table_id, hold.event_id);
        self.publisher.publish(ReservationEvent::HoldReleased {
            event_id: hold.event_id,
            table_id: hold.table_id,
            at: now.timestamp(),
        });
        self.sync.refresh_after_change(hold.event_id).await;
        Ok(())
    }

    /// Housekeeping only: status reads already treat lapsed holds as absent.
    pub async fn reap_expired(&self, batch_size: i64) -> CoreResult<Vec<SeatHold>> {
        let now = self.clock.now();
        let reaped = self.holds.reap_expired(now, batch_size).await?;
        if reaped.is_empty() {
            return Ok(reaped);
        }

        let mut events = BTreeSet::new();
        for hold in &reaped {
            events.insert(hold.event_id);
            self.publisher.publish(ReservationEvent::HoldReleased {
                event_id: hold.event_id,
                table_id: hold.table_id,
                at: now.timestamp(),
            });
        }
        for event_id in events {
            self.sync.refresh_after_change(event_id).await;
        }
        info!("Reaped {} lapsed holds", reaped.len());
        Ok(reaped)
    }
}
