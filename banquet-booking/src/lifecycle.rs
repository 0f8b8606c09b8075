use banquet_core::clock::Clock;
use banquet_core::events::EventPublisher;
use banquet_core::payment::{PaymentGateway, PaymentStatus};
use banquet_core::repository::{
    BookingFilter, BookingRepository, Confirmation, HoldRepository, StoreError, Stores,
    TableRepository, Transition,
};
use banquet_core::{CoreResult, ReservationError};
use banquet_inventory::AvailabilitySynchronizer;
use banquet_shared::{
    Booking, BookingSource, BookingStatus, HoldStatus, LockToken, ReservationEvent,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::holds::SeatHoldManager;

const LAPSED_REASON: &str = "hold expired";

#[derive(Debug, Clone, Deserialize)]
pub struct OpenBooking {
    pub lock_token: LockToken,
    pub party_size: i32,
    pub guest_id: String,
    #[serde(default)]
    pub guest_email: Option<String>,
    #[serde(default)]
    pub source: BookingSource,
}

/// Admin or comp booking placed straight onto a table.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectBooking {
    pub event_id: Uuid,
    pub table_id: Uuid,
    pub party_size: i32,
    pub guest_id: String,
    #[serde(default)]
    pub guest_email: Option<String>,
    pub source: BookingSource,
}

/// Drives bookings through
/// pending → confirmed → {checked_in, cancelled, refunded} and pending → cancelled.
///
/// Every status write is a version-checked update in the store; nothing here
/// holds a lock across awaits.
pub struct BookingLifecycle {
    tables: Arc<dyn TableRepository>,
    holds: Arc<dyn HoldRepository>,
    bookings: Arc<dyn BookingRepository>,
    hold_manager: Arc<SeatHoldManager>,
    sync: Arc<AvailabilitySynchronizer>,
    publisher: Arc<dyn EventPublisher>,
    payments: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
}

impl BookingLifecycle {
    pub fn new(
        stores: &Stores,
        hold_manager: Arc<SeatHoldManager>,
        sync: Arc<AvailabilitySynchronizer>,
        publisher: Arc<dyn EventPublisher>,
        payments: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tables: stores.tables.clone(),
            holds: stores.holds.clone(),
            bookings: stores.bookings.clone(),
            hold_manager,
            sync,
            publisher,
            payments,
            clock,
        }
    }

    pub async fn get(&self, booking_id: Uuid) -> CoreResult<Booking> {
        self.bookings
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| ReservationError::NotFound(format!("Booking {}", booking_id)))
    }

    pub async fn list(&self, filter: &BookingFilter) -> CoreResult<Vec<Booking>> {
        Ok(self.bookings.list(filter).await?)
    }

    /// Opens a pending booking on a live hold. Opening twice on the same hold
    /// returns the booking already opened.
    pub async fn open(&self, request: OpenBooking) -> CoreResult<Booking> {
        let now = self.clock.now();
        let hold = self
            .holds
            .find_by_token(&request.lock_token)
            .await?
            .ok_or_else(|| ReservationError::NotFound("Hold".into()))?;

        if let Some(existing) = self.bookings.find_by_hold(hold.id).await? {
            return Ok(existing);
        }
        if !hold.is_live(now) {
            return Err(ReservationError::HoldExpired);
        }
        if request.guest_id.trim().is_empty() {
            return Err(ReservationError::ValidationError("guest_id is required".into()));
        }
        let table = self
            .tables
            .get_table(hold.table_id)
            .await?
            .ok_or_else(|| ReservationError::NotFound(format!("Table {}", hold.table_id)))?;
        if request.party_size < 1 || request.party_size > table.capacity {
            return Err(ReservationError::ValidationError(format!(
                "party size {} does not fit table {} (capacity {})",
                request.party_size, table.table_number, table.capacity
            )));
        }

        let booking = Booking::pending_from_hold(
            &hold,
            request.party_size,
            request.guest_id,
            request.guest_email,
            request.source,
            now,
        );
        match self.bookings.insert_pending(&booking).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(what)) => {
                // Lost a double-open race on the same hold.
                return self
                    .bookings
                    .find_by_hold(hold.id)
                    .await?
                    .ok_or_else(|| ReservationError::ValidationError(format!("{} already exists", what)));
            }
            Err(e) => return Err(e.into()),
        }

        info!("Booking {} opened on table {} for event {}", booking.id, booking.table_id, booking.event_id);
        self.publisher.publish(ReservationEvent::BookingOpened {
            event_id: booking.event_id,
            table_id: booking.table_id,
            booking_id: booking.id,
            at: now.timestamp(),
        });
        Ok(booking)
    }

    /// Converts a pending booking into a confirmed one.
    ///
    /// Replaying a successful confirmation with the same token returns the
    /// confirmed booking unchanged. Two callers racing on the same version
    /// are decided by the store: one wins, the other gets `VersionConflict`.
    pub async fn confirm(
        &self,
        booking_id: Uuid,
        lock_token: &LockToken,
        expected_version: i64,
        payment_reference: Option<String>,
    ) -> CoreResult<Booking> {
        let now = self.clock.now();
        let booking = self.get(booking_id).await?;
        let hold = self.holds.find_by_token(lock_token).await?;

        if booking.version != expected_version || booking.status != BookingStatus::Pending {
            let same_hold = hold
                .as_ref()
                .is_some_and(|h| Some(h.id) == booking.hold_id && h.status == HoldStatus::Completed);
            if booking.occupies_table() && same_hold {
                debug!("Booking {} already confirmed, replay ignored", booking_id);
                return Ok(booking);
            }
            if booking.version == expected_version {
                return Err(ReservationError::InvalidTransition {
                    from: booking.status,
                    to: BookingStatus::Confirmed,
                });
            }
            return Err(ReservationError::VersionConflict {
                booking_id,
                expected: expected_version,
            });
        }

        let hold_matches = hold.as_ref().is_some_and(|h| {
            Some(h.id) == booking.hold_id
                && h.event_id == booking.event_id
                && h.table_id == booking.table_id
                && h.is_live(now)
        });
        if !hold_matches {
            return Err(ReservationError::HoldExpired);
        }

        let confirmed = self
            .bookings
            .commit_confirmation(&Confirmation {
                booking_id,
                lock_token: lock_token.clone(),
                expected_version,
                payment_reference,
                now,
            })
            .await?;

        info!(
            "Booking {} confirmed on table {} for event {} (v{})",
            confirmed.id, confirmed.table_id, confirmed.event_id, confirmed.version
        );
        self.publisher.publish(ReservationEvent::BookingConfirmed {
            event_id: confirmed.event_id,
            table_id: confirmed.table_id,
            booking_id: confirmed.id,
            at: now.timestamp(),
        });
        self.sync.refresh_after_change(confirmed.event_id).await;
        Ok(confirmed)
    }

    /// Payment collaborator callback. Safe to deliver more than once.
    pub async fn payment_confirmed(&self, booking_id: Uuid, payment_reference: &str) -> CoreResult<Booking> {
        if payment_reference.trim().is_empty() {
            return Err(ReservationError::ValidationError("payment_reference is required".into()));
        }

        let mut retried = false;
        loop {
            let booking = self.get(booking_id).await?;
            match booking.status {
                BookingStatus::Confirmed | BookingStatus::CheckedIn => return Ok(booking),
                BookingStatus::Cancelled | BookingStatus::Refunded => {
                    warn!("Payment {} arrived for {} booking {}", payment_reference, booking.status, booking_id);
                    return Err(ReservationError::InvalidTransition {
                        from: booking.status,
                        to: BookingStatus::Confirmed,
                    });
                }
                BookingStatus::Pending => {}
            }

            let Some(token) = booking.lock_token.clone() else {
                return Err(ReservationError::HoldExpired);
            };
            match self
                .confirm(booking_id, &token, booking.version, Some(payment_reference.to_string()))
                .await
            {
                Err(ReservationError::VersionConflict { .. }) if !retried => {
                    debug!("Booking {} changed under the payment callback, retrying", booking_id);
                    retried = true;
                }
                outcome => return outcome,
            }
        }
    }

    /// Pending bookings are cancelled and their hold released. Confirmed
    /// bookings are refunded when the payment was captured, else cancelled.
    pub async fn cancel(&self, booking_id: Uuid, reason: Option<String>) -> CoreResult<Booking> {
        let booking = self.get(booking_id).await?;
        let (to, release_hold) = match booking.status {
            BookingStatus::Cancelled | BookingStatus::Refunded => return Ok(booking),
            BookingStatus::CheckedIn => {
                return Err(ReservationError::InvalidTransition {
                    from: booking.status,
                    to: BookingStatus::Cancelled,
                })
            }
            BookingStatus::Pending => (BookingStatus::Cancelled, booking.lock_token.clone()),
            BookingStatus::Confirmed => (self.refund_or_cancel(&booking).await?, None),
        };

        let now = self.clock.now();
        let cancelled = self
            .bookings
            .commit_transition(&Transition {
                booking_id,
                expected_version: booking.version,
                from: booking.status,
                to,
                reason,
                release_hold,
                now,
            })
            .await?;

        info!("Booking {} {} (was {})", booking_id, cancelled.status, booking.status);
        self.publisher.publish(ReservationEvent::BookingCancelled {
            event_id: cancelled.event_id,
            table_id: cancelled.table_id,
            booking_id,
            status: cancelled.status,
            at: now.timestamp(),
        });
        self.sync.refresh_after_change(cancelled.event_id).await;
        Ok(cancelled)
    }

    async fn refund_or_cancel(&self, booking: &Booking) -> CoreResult<BookingStatus> {
        let Some(reference) = booking.payment_reference.as_deref() else {
            return Ok(BookingStatus::Cancelled);
        };
        let status = self
            .payments
            .capture_status(reference)
            .await
            .map_err(|e| ReservationError::PaymentError(e.to_string()))?;
        Ok(match status {
            PaymentStatus::Captured => BookingStatus::Refunded,
            PaymentStatus::Processing | PaymentStatus::NotCaptured => BookingStatus::Cancelled,
        })
    }

    pub async fn check_in(&self, booking_id: Uuid, expected_version: i64) -> CoreResult<Booking> {
        let booking = self.get(booking_id).await?;
        if booking.version != expected_version {
            return Err(ReservationError::VersionConflict {
                booking_id,
                expected: expected_version,
            });
        }
        if !booking.status.can_transition_to(BookingStatus::CheckedIn) {
            return Err(ReservationError::InvalidTransition {
                from: booking.status,
                to: BookingStatus::CheckedIn,
            });
        }

        let now = self.clock.now();
        let checked_in = self
            .bookings
            .commit_transition(&Transition {
                booking_id,
                expected_version,
                from: booking.status,
                to: BookingStatus::CheckedIn,
                reason: None,
                release_hold: None,
                now,
            })
            .await?;

        info!("Guest checked in for booking {}", booking_id);
        self.publisher.publish(ReservationEvent::GuestCheckedIn {
            event_id: checked_in.event_id,
            table_id: checked_in.table_id,
            booking_id,
            at: now.timestamp(),
        });
        Ok(checked_in)
    }

    /// Holds, opens and confirms in one go for staff-placed bookings. The
    /// table is claimed through the same hold path as online guests.
    pub async fn book_directly(&self, request: DirectBooking) -> CoreResult<Booking> {
        if request.source == BookingSource::Online {
            return Err(ReservationError::ValidationError(
                "direct bookings must be admin or comp".into(),
            ));
        }

        let session = format!("{}:{}", request.source.as_str(), request.guest_id);
        let hold = self
            .hold_manager
            .acquire(request.event_id, request.table_id, &session)
            .await?;

        let opened = self
            .open(OpenBooking {
                lock_token: hold.lock_token.clone(),
                party_size: request.party_size,
                guest_id: request.guest_id,
                guest_email: request.guest_email,
                source: request.source,
            })
            .await;
        let booking = match opened {
            Ok(booking) => booking,
            Err(e) => {
                self.hold_manager.release(&hold.lock_token).await?;
                return Err(e);
            }
        };

        self.confirm(booking.id, &hold.lock_token, booking.version, None).await
    }

    /// Cancels pending bookings whose hold lapsed. They could never be
    /// confirmed anyway; this only tidies reporting.
    pub async fn abandon_lapsed(&self, batch_size: i64) -> CoreResult<usize> {
        let now = self.clock.now();
        let lapsed = self.bookings.list_lapsed_pending(now, batch_size).await?;

        let mut abandoned = 0;
        for booking in lapsed {
            let result = self
                .bookings
                .commit_transition(&Transition {
                    booking_id: booking.id,
                    expected_version: booking.version,
                    from: BookingStatus::Pending,
                    to: BookingStatus::Cancelled,
                    reason: Some(LAPSED_REASON.to_string()),
                    release_hold: booking.lock_token.clone(),
                    now,
                })
                .await;
            match result {
                Ok(cancelled) => {
                    abandoned += 1;
                    self.publisher.publish(ReservationEvent::BookingCancelled {
                        event_id: cancelled.event_id,
                        table_id: cancelled.table_id,
                        booking_id: cancelled.id,
                        status: cancelled.status,
                        at: now.timestamp(),
                    });
                }
                Err(StoreError::StaleVersion { .. }) => {
                    debug!("Booking {} moved on before it could be abandoned", booking.id)
                }
                Err(e) => warn!("Could not abandon booking {}: {}", booking.id, e),
            }
        }

        if abandoned > 0 {
            info!("Abandoned {} pending bookings with lapsed holds", abandoned);
        }
        Ok(abandoned)
    }
}
