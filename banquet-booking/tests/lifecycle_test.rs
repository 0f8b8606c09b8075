mod common;

use banquet_booking::{DirectBooking, OpenBooking};
use banquet_core::payment::PaymentStatus;
use banquet_core::repository::{AvailabilityRepository, BookingFilter, HoldRepository};
use banquet_core::ReservationError;
use banquet_shared::{BookingSource, BookingStatus, HoldStatus, LockToken, TableStatus};
use chrono::Duration;
use common::Harness;
use uuid::Uuid;

#[tokio::test]
async fn test_second_session_waits_out_the_first_hold() {
    let h = Harness::new(&[4]).await;
    let table_id = h.table(0).id;

    // t=0: session A holds and opens a booking
    let (hold_a, booking_a) = h.pending(0, "a").await;

    // t=1m: session B is refused
    h.clock.advance(Duration::minutes(1));
    let err = h.holds.acquire(h.event.id, table_id, "b").await.unwrap_err();
    assert_eq!(
        err,
        ReservationError::HoldConflict {
            event_id: h.event.id,
            table_id
        }
    );

    // t=16m: A's hold has lapsed, B gets the table
    h.clock.advance(Duration::minutes(15));
    let hold_b = h.holds.acquire(h.event.id, table_id, "b").await.unwrap();
    assert_ne!(hold_b.lock_token, hold_a.lock_token);
    assert_eq!(h.resolver.resolve(table_id, h.event.id).await.unwrap(), TableStatus::Held);

    // A's late confirmation fails
    let err = h
        .bookings
        .confirm(booking_a.id, &hold_a.lock_token, booking_a.version, None)
        .await
        .unwrap_err();
    assert_eq!(err, ReservationError::HoldExpired);
    assert!(err.is_recoverable());
    assert_eq!(h.bookings.get(booking_a.id).await.unwrap().status, BookingStatus::Pending);
}

#[tokio::test]
async fn test_confirm_replay_returns_the_confirmed_booking_unchanged() {
    let h = Harness::new(&[4]).await;
    let (hold, booking) = h.pending(0, "a").await;

    let first = h
        .bookings
        .confirm(booking.id, &hold.lock_token, 1, Some("pay_1".into()))
        .await
        .unwrap();
    let second = h
        .bookings
        .confirm(booking.id, &hold.lock_token, 1, Some("pay_1".into()))
        .await
        .unwrap();

    assert_eq!(first.version, 2);
    assert_eq!(second.version, 2);
    assert_eq!(second.updated_at, first.updated_at);
    assert_eq!(h.events.count("booking_confirmed"), 1);
}

#[tokio::test]
async fn test_confirm_with_stale_version_from_another_caller_conflicts() {
    let h = Harness::new(&[4]).await;
    let (hold, booking) = h.pending(0, "a").await;
    let stranger = LockToken::new("hold_not_the_right_one");

    let err = h
        .bookings
        .confirm(booking.id, &stranger, booking.version + 1, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ReservationError::VersionConflict { .. }));

    let err = h
        .bookings
        .confirm(booking.id, &stranger, booking.version, None)
        .await
        .unwrap_err();
    assert_eq!(err, ReservationError::HoldExpired);

    h.bookings
        .confirm(booking.id, &hold.lock_token, booking.version, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cancelling_a_paid_booking_refunds_and_frees_the_table_at_once() {
    let h = Harness::new(&[4, 6]).await;
    let table_id = h.table(0).id;
    let (_, confirmed) = h.confirmed(0, "a").await;
    assert_eq!(h.resolver.resolve(table_id, h.event.id).await.unwrap(), TableStatus::Booked);

    let cancelled = h
        .bookings
        .cancel(confirmed.id, Some("guest request".into()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Refunded);
    assert_eq!(cancelled.version, confirmed.version + 1);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("guest request"));
    assert_eq!(h.resolver.resolve(table_id, h.event.id).await.unwrap(), TableStatus::Available);

    h.holds.acquire(h.event.id, table_id, "b").await.unwrap();
}

#[tokio::test]
async fn test_cancelling_an_uncaptured_booking_cancels() {
    let h = Harness::with_payments(&[4], PaymentStatus::NotCaptured).await;
    let (_, confirmed) = h.confirmed(0, "a").await;
    let cancelled = h.bookings.cancel(confirmed.id, None).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
}

#[tokio::test]
async fn test_cancelling_a_pending_booking_releases_its_hold() {
    let h = Harness::new(&[4]).await;
    let (hold, booking) = h.pending(0, "a").await;

    let cancelled = h.bookings.cancel(booking.id, None).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    let released = h.store.find_by_token(&hold.lock_token).await.unwrap().unwrap();
    assert_eq!(released.status, HoldStatus::Expired);
    assert_eq!(
        h.resolver.resolve(h.table(0).id, h.event.id).await.unwrap(),
        TableStatus::Available
    );
}

#[tokio::test]
async fn test_cancel_of_a_finished_booking_is_a_no_op() {
    let h = Harness::new(&[4]).await;
    let (_, booking) = h.pending(0, "a").await;
    let cancelled = h.bookings.cancel(booking.id, None).await.unwrap();
    let again = h.bookings.cancel(booking.id, Some("twice".into())).await.unwrap();
    assert_eq!(again.version, cancelled.version);
    assert_eq!(again.cancel_reason, None);
    assert_eq!(h.events.count("booking_cancelled"), 1);
}

#[tokio::test]
async fn test_check_in_is_terminal() {
    let h = Harness::new(&[4]).await;
    let (_, confirmed) = h.confirmed(0, "a").await;

    let stale = h.bookings.check_in(confirmed.id, confirmed.version - 1).await.unwrap_err();
    assert!(matches!(stale, ReservationError::VersionConflict { .. }));

    let checked_in = h.bookings.check_in(confirmed.id, confirmed.version).await.unwrap();
    assert_eq!(checked_in.status, BookingStatus::CheckedIn);
    assert_eq!(
        h.resolver.resolve(h.table(0).id, h.event.id).await.unwrap(),
        TableStatus::Booked
    );

    let err = h.bookings.cancel(confirmed.id, None).await.unwrap_err();
    assert_eq!(
        err,
        ReservationError::InvalidTransition {
            from: BookingStatus::CheckedIn,
            to: BookingStatus::Cancelled
        }
    );
}

#[tokio::test]
async fn test_check_in_requires_a_confirmed_booking() {
    let h = Harness::new(&[4]).await;
    let (_, booking) = h.pending(0, "a").await;
    let err = h.bookings.check_in(booking.id, booking.version).await.unwrap_err();
    assert_eq!(
        err,
        ReservationError::InvalidTransition {
            from: BookingStatus::Pending,
            to: BookingStatus::CheckedIn
        }
    );
}

#[tokio::test]
async fn test_payment_callback_confirms_once_and_replays_cleanly() {
    let h = Harness::new(&[4]).await;
    let (_, booking) = h.pending(0, "a").await;

    let confirmed = h.bookings.payment_confirmed(booking.id, "pi_123").await.unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);
    assert_eq!(confirmed.payment_reference.as_deref(), Some("pi_123"));

    let replay = h.bookings.payment_confirmed(booking.id, "pi_123").await.unwrap();
    assert_eq!(replay.version, confirmed.version);
    assert_eq!(h.events.count("booking_confirmed"), 1);

    assert!(matches!(
        h.bookings.payment_confirmed(booking.id, " ").await,
        Err(ReservationError::ValidationError(_))
    ));
    assert!(matches!(
        h.bookings.payment_confirmed(Uuid::new_v4(), "pi_1").await,
        Err(ReservationError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_payment_callback_for_a_cancelled_booking_is_rejected() {
    let h = Harness::new(&[4]).await;
    let (_, booking) = h.pending(0, "a").await;
    h.bookings.cancel(booking.id, None).await.unwrap();

    let err = h.bookings.payment_confirmed(booking.id, "pi_late").await.unwrap_err();
    assert_eq!(
        err,
        ReservationError::InvalidTransition {
            from: BookingStatus::Cancelled,
            to: BookingStatus::Confirmed
        }
    );
}

#[tokio::test]
async fn test_abandoned_pending_booking_is_never_promoted() {
    let h = Harness::new(&[4, 4]).await;
    let (hold, booking) = h.pending(0, "a").await;
    let (live_hold, live) = h.pending(1, "b").await;
    h.clock.advance(Duration::minutes(14));
    h.holds.renew(&live_hold.lock_token).await.unwrap();
    h.clock.advance(Duration::minutes(2));

    assert_eq!(h.bookings.abandon_lapsed(100).await.unwrap(), 1);
    let abandoned = h.bookings.get(booking.id).await.unwrap();
    assert_eq!(abandoned.status, BookingStatus::Cancelled);
    assert_eq!(abandoned.cancel_reason.as_deref(), Some("hold expired"));
    assert_eq!(h.bookings.get(live.id).await.unwrap().status, BookingStatus::Pending);

    let err = h
        .bookings
        .confirm(booking.id, &hold.lock_token, booking.version, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ReservationError::VersionConflict { .. }));
    assert!(h.bookings.payment_confirmed(booking.id, "pi_1").await.is_err());
    assert_eq!(h.bookings.abandon_lapsed(100).await.unwrap(), 0);
}

#[tokio::test]
async fn test_open_is_validated_and_idempotent() {
    let h = Harness::new(&[4]).await;
    let hold = h.hold(0, "a").await;
    let request = |party_size| OpenBooking {
        lock_token: hold.lock_token.clone(),
        party_size,
        guest_id: "guest-a".into(),
        guest_email: None,
        source: BookingSource::Online,
    };

    assert!(matches!(
        h.bookings.open(request(5)).await,
        Err(ReservationError::ValidationError(_))
    ));
    assert!(matches!(
        h.bookings.open(request(0)).await,
        Err(ReservationError::ValidationError(_))
    ));

    let first = h.bookings.open(request(4)).await.unwrap();
    let second = h.bookings.open(request(3)).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.party_size, 4);
    assert_eq!(first.lock_expiry, Some(hold.hold_expiry));

    let unknown = OpenBooking {
        lock_token: LockToken::new("hold_unknown"),
        ..request(2)
    };
    assert!(matches!(
        h.bookings.open(unknown).await,
        Err(ReservationError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_open_on_a_lapsed_hold_fails() {
    let h = Harness::new(&[4]).await;
    let hold = h.hold(0, "a").await;
    h.clock.advance(Duration::minutes(15));
    let err = h
        .bookings
        .open(OpenBooking {
            lock_token: hold.lock_token,
            party_size: 2,
            guest_id: "guest".into(),
            guest_email: None,
            source: BookingSource::Online,
        })
        .await
        .unwrap_err();
    assert_eq!(err, ReservationError::HoldExpired);
}

#[tokio::test]
async fn test_renew_extends_live_holds_only() {
    let h = Harness::new(&[4]).await;
    let (hold, booking) = h.pending(0, "a").await;

    h.clock.advance(Duration::minutes(10));
    let renewed = h.holds.renew(&hold.lock_token).await.unwrap();
    assert_eq!(renewed.hold_expiry, h.now() + Duration::minutes(15));
    let reloaded = h.bookings.get(booking.id).await.unwrap();
    assert_eq!(reloaded.lock_expiry, Some(renewed.hold_expiry));
    assert_eq!(reloaded.version, booking.version);

    h.clock.advance(Duration::minutes(16));
    assert_eq!(
        h.holds.renew(&hold.lock_token).await.unwrap_err(),
        ReservationError::HoldExpired
    );
    assert!(matches!(
        h.holds.renew(&LockToken::new("hold_missing")).await,
        Err(ReservationError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_release_is_idempotent_and_frees_the_table() {
    let h = Harness::new(&[4]).await;
    let hold = h.hold(0, "a").await;

    h.holds.release(&hold.lock_token).await.unwrap();
    h.holds.release(&hold.lock_token).await.unwrap();
    h.holds.release(&LockToken::new("hold_never_issued")).await.unwrap();
    assert_eq!(h.events.count("hold_released"), 1);

    h.holds.acquire(h.event.id, h.table(0).id, "b").await.unwrap();
}

#[tokio::test]
async fn test_reaper_expires_lapsed_holds_and_heals_the_aggregate() {
    let h = Harness::new(&[4, 6, 8]).await;
    h.hold(0, "a").await;
    h.hold(1, "b").await;

    let cached = h.store.get_availability(h.event.id).await.unwrap().unwrap();
    assert_eq!(cached.tables_held, 2);

    h.clock.advance(Duration::minutes(20));
    let reaped = h.holds.reap_expired(100).await.unwrap();
    assert_eq!(reaped.len(), 2);
    assert!(h.holds.reap_expired(100).await.unwrap().is_empty());

    let healed = h.store.get_availability(h.event.id).await.unwrap().unwrap();
    assert_eq!(healed.tables_available, 3);
    assert_eq!(healed.seats_available, 18);
}

#[tokio::test]
async fn test_acquire_validates_inputs() {
    let h = Harness::new(&[4]).await;
    let (other_event, other_tables) = h.store.seed_venue("Other", h.now(), &[2]).await;

    assert!(matches!(
        h.holds.acquire(h.event.id, h.table(0).id, "  ").await,
        Err(ReservationError::ValidationError(_))
    ));
    assert!(matches!(
        h.holds.acquire(Uuid::new_v4(), h.table(0).id, "a").await,
        Err(ReservationError::NotFound(_))
    ));
    assert!(matches!(
        h.holds.acquire(h.event.id, Uuid::new_v4(), "a").await,
        Err(ReservationError::NotFound(_))
    ));
    assert!(matches!(
        h.holds.acquire(h.event.id, other_tables[0].id, "a").await,
        Err(ReservationError::ValidationError(_))
    ));
    h.holds
        .acquire(other_event.id, other_tables[0].id, "a")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_comp_booking_occupies_the_table_like_a_paid_one() {
    let h = Harness::new(&[4, 6]).await;
    let table_id = h.table(0).id;
    let direct = |source| DirectBooking {
        event_id: h.event.id,
        table_id,
        party_size: 4,
        guest_id: "vip".into(),
        guest_email: None,
        source,
    };

    assert!(matches!(
        h.bookings.book_directly(direct(BookingSource::Online)).await,
        Err(ReservationError::ValidationError(_))
    ));

    let comp = h.bookings.book_directly(direct(BookingSource::Comp)).await.unwrap();
    assert_eq!(comp.status, BookingStatus::Confirmed);
    assert_eq!(comp.source, BookingSource::Comp);
    assert_eq!(comp.payment_reference, None);
    assert_eq!(h.resolver.resolve(table_id, h.event.id).await.unwrap(), TableStatus::Booked);

    assert!(matches!(
        h.bookings.book_directly(direct(BookingSource::Admin)).await,
        Err(ReservationError::HoldConflict { .. })
    ));
    assert!(matches!(
        h.holds.acquire(h.event.id, table_id, "guest").await,
        Err(ReservationError::HoldConflict { .. })
    ));
}

#[tokio::test]
async fn test_direct_booking_that_fails_validation_releases_its_hold() {
    let h = Harness::new(&[4]).await;
    let err = h
        .bookings
        .book_directly(DirectBooking {
            event_id: h.event.id,
            table_id: h.table(0).id,
            party_size: 12,
            guest_id: "vip".into(),
            guest_email: None,
            source: BookingSource::Admin,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ReservationError::ValidationError(_)));
    h.holds.acquire(h.event.id, h.table(0).id, "a").await.unwrap();
}

#[tokio::test]
async fn test_booking_listing_filters_by_status() {
    let h = Harness::new(&[4, 4, 4]).await;
    h.confirmed(0, "a").await;
    h.pending(1, "b").await;
    h.confirmed(2, "c").await;

    let confirmed = h
        .bookings
        .list(&BookingFilter {
            event_id: Some(h.event.id),
            status: Some(BookingStatus::Confirmed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(confirmed.len(), 2);
    assert!(confirmed.iter().all(|b| b.status == BookingStatus::Confirmed));
}
