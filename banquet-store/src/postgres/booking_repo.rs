use async_trait::async_trait;
use banquet_core::repository::{
    BookingFilter, BookingRepository, Confirmation, StoreError, StoreResult, Transition,
};
use banquet_shared::{Booking, BookingStatus};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::rows::{into_bookings, BookingRow};
use super::{db_error, unique_violation, BOOKING_HOLD_CONSTRAINT, OCCUPYING_BOOKING_CONSTRAINT};

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Locks the booking row and checks it is still where the caller saw it.
async fn lock_booking(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: Uuid,
    expected_version: i64,
    from: BookingStatus,
) -> StoreResult<BookingRow> {
    let row: Option<BookingRow> = sqlx::query_as("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
        .bind(booking_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_error)?;
    let row = row.ok_or_else(|| StoreError::NotFound(format!("Booking {}", booking_id)))?;
    if row.version() != expected_version || row.status() != from.as_str() {
        return Err(StoreError::StaleVersion {
            booking_id,
            expected: expected_version,
        });
    }
    Ok(row)
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn insert_pending(&self, booking: &Booking) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, event_id, table_id, hold_id, party_size, guest_id, guest_email,
                payment_reference, source, status, version, lock_token, lock_expiry,
                cancel_reason, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(booking.id)
        .bind(booking.event_id)
        .bind(booking.table_id)
        .bind(booking.hold_id)
        .bind(booking.party_size)
        .bind(&booking.guest_id)
        .bind(booking.guest_email.as_ref().map(|e| e.inner().as_str()))
        .bind(&booking.payment_reference)
        .bind(booking.source.as_str())
        .bind(booking.status.as_str())
        .bind(booking.version)
        .bind(booking.lock_token.as_ref().map(|t| t.as_str()))
        .bind(booking.lock_expiry)
        .bind(&booking.cancel_reason)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(BOOKING_HOLD_CONSTRAINT) => StoreError::Duplicate("Booking for this hold".to_string()),
            Some(_) => StoreError::Duplicate(format!("Booking {}", booking.id)),
            None => db_error(e),
        })?;
        Ok(())
    }

    async fn get_booking(&self, booking_id: Uuid) -> StoreResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as("SELECT * FROM bookings WHERE id = $1")
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(Booking::try_from).transpose()
    }

    async fn find_by_hold(&self, hold_id: Uuid) -> StoreResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as("SELECT * FROM bookings WHERE hold_id = $1")
            .bind(hold_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(Booking::try_from).transpose()
    }

    async fn find_occupying(&self, event_id: Uuid, table_id: Uuid) -> StoreResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as(
            r#"
            SELECT * FROM bookings
            WHERE event_id = $1 AND table_id = $2 AND status IN ('confirmed', 'checked_in')
            "#,
        )
        .bind(event_id)
        .bind(table_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.map(Booking::try_from).transpose()
    }

    async fn list_occupying_for_event(&self, event_id: Uuid) -> StoreResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(
            "SELECT * FROM bookings WHERE event_id = $1 AND status IN ('confirmed', 'checked_in')",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        into_bookings(rows)
    }

    async fn list(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM bookings WHERE TRUE");
        if let Some(event_id) = filter.event_id {
            query.push(" AND event_id = ").push_bind(event_id);
        }
        if let Some(table_id) = filter.table_id {
            query.push(" AND table_id = ").push_bind(table_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.effective_limit());

        let rows: Vec<BookingRow> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        into_bookings(rows)
    }

    async fn list_lapsed_pending(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Booking>> {
        // The hold row is authoritative for the deadline; lock_expiry only
        // covers pending rows whose hold is gone.
        let rows: Vec<BookingRow> = sqlx::query_as(
            r#"
            SELECT b.*
            FROM bookings b
            LEFT JOIN seat_holds h ON h.id = b.hold_id
            WHERE b.status = 'pending'
              AND CASE
                    WHEN h.id IS NULL THEN COALESCE(b.lock_expiry <= $1, TRUE)
                    ELSE h.status <> 'active' OR h.hold_expiry <= $1
                  END
            ORDER BY b.created_at
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        into_bookings(rows)
    }

    async fn commit_confirmation(&self, confirmation: &Confirmation) -> StoreResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let current = Booking::try_from(
            lock_booking(
                &mut tx,
                confirmation.booking_id,
                confirmation.expected_version,
                BookingStatus::Pending,
            )
            .await?,
        )?;

        let completed = sqlx::query(
            r#"
            UPDATE seat_holds SET status = 'completed', updated_at = $1
            WHERE lock_token = $2 AND id = $3 AND event_id = $4 AND table_id = $5
              AND status = 'active' AND hold_expiry > $1
            "#,
        )
        .bind(confirmation.now)
        .bind(confirmation.lock_token.as_str())
        .bind(current.hold_id)
        .bind(current.event_id)
        .bind(current.table_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        if completed.rows_affected() == 0 {
            return Err(StoreError::HoldLapsed);
        }

        let row: BookingRow = sqlx::query_as(
            r#"
            UPDATE bookings
            SET status = 'confirmed',
                version = version + 1,
                payment_reference = COALESCE($2, payment_reference),
                lock_token = NULL,
                lock_expiry = NULL,
                updated_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(confirmation.booking_id)
        .bind(&confirmation.payment_reference)
        .bind(confirmation.now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(OCCUPYING_BOOKING_CONSTRAINT) => StoreError::TableBooked {
                event_id: current.event_id,
                table_id: current.table_id,
            },
            _ => db_error(e),
        })?;

        tx.commit().await.map_err(db_error)?;
        Booking::try_from(row)
    }

    async fn commit_transition(&self, transition: &Transition) -> StoreResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        lock_booking(
            &mut tx,
            transition.booking_id,
            transition.expected_version,
            transition.from,
        )
        .await?;

        if let Some(token) = &transition.release_hold {
            sqlx::query(
                r#"
                UPDATE seat_holds SET status = 'expired', updated_at = $2
                WHERE lock_token = $1 AND status = 'active'
                "#,
            )
            .bind(token.as_str())
            .bind(transition.now)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        let row: BookingRow = sqlx::query_as(
            r#"
            UPDATE bookings
            SET status = $2,
                version = version + 1,
                cancel_reason = COALESCE($3, cancel_reason),
                lock_token = NULL,
                lock_expiry = NULL,
                updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(transition.booking_id)
        .bind(transition.to.as_str())
        .bind(&transition.reason)
        .bind(transition.now)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Booking::try_from(row)
    }
}
