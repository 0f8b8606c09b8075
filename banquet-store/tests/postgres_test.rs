//! Runs against a real database when `DATABASE_URL` is set; otherwise each
//! test returns immediately.

use banquet_core::repository::{
    BookingRepository, Confirmation, HoldRepository, StoreError, TableRepository,
};
use banquet_shared::{Booking, BookingSource, BookingStatus, LockToken, ScheduledEvent, SeatHold, Table};
use banquet_store::{DbClient, PgBookingRepository, PgHoldRepository, PgTableRepository};
use chrono::{Duration, Utc};
use uuid::Uuid;

async fn connect() -> Option<DbClient> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let db = DbClient::new(&url, 5).await.expect("connect");
    db.migrate().await.expect("migrate");
    Some(db)
}

async fn seed(tables_repo: &PgTableRepository) -> (ScheduledEvent, Table) {
    let venue_id = Uuid::new_v4();
    let event = ScheduledEvent::new(venue_id, "Gala", Utc::now() + Duration::days(1));
    let table = Table::new(venue_id, "T1", 6);
    tables_repo.insert_event(&event).await.unwrap();
    tables_repo.insert_table(&table).await.unwrap();
    (event, table)
}

fn token() -> LockToken {
    LockToken::new(format!("tok_{}", Uuid::new_v4().simple()))
}

#[tokio::test]
async fn test_pg_active_hold_uniqueness_and_confirmation() {
    let Some(db) = connect().await else {
        return;
    };
    let tables = PgTableRepository::new(db.pool.clone());
    let holds = PgHoldRepository::new(db.pool.clone());
    let bookings = PgBookingRepository::new(db.pool.clone());
    let (event, table) = seed(&tables).await;
    let now = Utc::now();

    let first = SeatHold::new(event.id, table.id, "s1".into(), token(), now, now + Duration::minutes(15));
    holds.insert_active(&first, now).await.unwrap();
    let second = SeatHold::new(event.id, table.id, "s2".into(), token(), now, now + Duration::minutes(15));
    assert!(matches!(
        holds.insert_active(&second, now).await,
        Err(StoreError::HoldTaken { .. })
    ));

    let booking = Booking::pending_from_hold(&first, 6, "guest-1".into(), None, BookingSource::Online, now);
    bookings.insert_pending(&booking).await.unwrap();
    let confirmed = bookings
        .commit_confirmation(&Confirmation {
            booking_id: booking.id,
            lock_token: first.lock_token.clone(),
            expected_version: 1,
            payment_reference: Some("pay_pg".into()),
            now,
        })
        .await
        .unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);
    assert_eq!(confirmed.version, 2);

    let occupying = bookings.find_occupying(event.id, table.id).await.unwrap().unwrap();
    assert_eq!(occupying.id, booking.id);

    let later = now + Duration::minutes(20);
    let third = SeatHold::new(event.id, table.id, "s3".into(), token(), later, later + Duration::minutes(15));
    assert!(matches!(
        holds.insert_active(&third, later).await,
        Err(StoreError::TableBooked { .. })
    ));
    assert_eq!(tables.list_tables_for_event(event.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_pg_reap_expires_lapsed_holds() {
    let Some(db) = connect().await else {
        return;
    };
    let tables = PgTableRepository::new(db.pool.clone());
    let holds = PgHoldRepository::new(db.pool.clone());
    let (event, table) = seed(&tables).await;
    let now = Utc::now();

    let hold = SeatHold::new(event.id, table.id, "s1".into(), token(), now, now + Duration::minutes(1));
    holds.insert_active(&hold, now).await.unwrap();

    let reaped = holds.reap_expired(now + Duration::minutes(2), 1000).await.unwrap();
    assert!(reaped.iter().any(|h| h.id == hold.id));
    assert!(holds.find_active(event.id, table.id).await.unwrap().is_none());
}
