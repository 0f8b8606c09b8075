use async_trait::async_trait;
use banquet_core::repository::{HoldRepository, StoreError, StoreResult};
use banquet_shared::{LockToken, SeatHold};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::rows::{into_holds, HoldRow};
use super::{db_error, unique_violation, ACTIVE_HOLD_CONSTRAINT, HOLD_TOKEN_CONSTRAINT};

pub struct PgHoldRepository {
    pool: PgPool,
}

impl PgHoldRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HoldRepository for PgHoldRepository {
    async fn insert_active(&self, hold: &SeatHold, now: DateTime<Utc>) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let lapsed = sqlx::query(
            r#"
            UPDATE seat_holds SET status = 'expired', updated_at = $3
            WHERE event_id = $1 AND table_id = $2 AND status = 'active' AND hold_expiry <= $3
            "#,
        )
        .bind(hold.event_id)
        .bind(hold.table_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        if lapsed.rows_affected() > 0 {
            debug!("Lapsed hold on table {} cleared before insert", hold.table_id);
        }

        sqlx::query(
            r#"
            INSERT INTO seat_holds (id, event_id, table_id, session_id, lock_token, hold_expiry, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(hold.id)
        .bind(hold.event_id)
        .bind(hold.table_id)
        .bind(&hold.session_id)
        .bind(hold.lock_token.as_str())
        .bind(hold.hold_expiry)
        .bind(hold.status.as_str())
        .bind(hold.created_at)
        .bind(hold.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(ACTIVE_HOLD_CONSTRAINT) => StoreError::HoldTaken {
                event_id: hold.event_id,
                table_id: hold.table_id,
            },
            Some(HOLD_TOKEN_CONSTRAINT) => StoreError::Duplicate("Hold token".to_string()),
            _ => db_error(e),
        })?;

        let booked: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM bookings
                WHERE event_id = $1 AND table_id = $2 AND status IN ('confirmed', 'checked_in')
            )
            "#,
        )
        .bind(hold.event_id)
        .bind(hold.table_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;
        if booked {
            // Dropping the transaction rolls the insert back.
            return Err(StoreError::TableBooked {
                event_id: hold.event_id,
                table_id: hold.table_id,
            });
        }

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn find_by_token(&self, token: &LockToken) -> StoreResult<Option<SeatHold>> {
        let row: Option<HoldRow> = sqlx::query_as("SELECT * FROM seat_holds WHERE lock_token = $1")
            .bind(token.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(SeatHold::try_from).transpose()
    }

    async fn find_active(&self, event_id: Uuid, table_id: Uuid) -> StoreResult<Option<SeatHold>> {
        let row: Option<HoldRow> = sqlx::query_as(
            "SELECT * FROM seat_holds WHERE event_id = $1 AND table_id = $2 AND status = 'active'",
        )
        .bind(event_id)
        .bind(table_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.map(SeatHold::try_from).transpose()
    }

    async fn list_active_for_event(&self, event_id: Uuid) -> StoreResult<Vec<SeatHold>> {
        let rows: Vec<HoldRow> =
            sqlx::query_as("SELECT * FROM seat_holds WHERE event_id = $1 AND status = 'active'")
                .bind(event_id)
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
        into_holds(rows)
    }

    async fn extend(
        &self,
        token: &LockToken,
        new_expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<SeatHold>> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let row: Option<HoldRow> = sqlx::query_as(
            r#"
            UPDATE seat_holds SET hold_expiry = $2, updated_at = $3
            WHERE lock_token = $1 AND status = 'active' AND hold_expiry > $3
            RETURNING *
            "#,
        )
        .bind(token.as_str())
        .bind(new_expiry)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let hold = SeatHold::try_from(row)?;

        sqlx::query(
            "UPDATE bookings SET lock_expiry = $2, updated_at = $3 WHERE hold_id = $1 AND status = 'pending'",
        )
        .bind(hold.id)
        .bind(new_expiry)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(Some(hold))
    }

    async fn mark_expired(&self, token: &LockToken, now: DateTime<Utc>) -> StoreResult<Option<SeatHold>> {
        let row: Option<HoldRow> = sqlx::query_as(
            r#"
            UPDATE seat_holds SET status = 'expired', updated_at = $2
            WHERE lock_token = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(token.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.map(SeatHold::try_from).transpose()
    }

    async fn reap_expired(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<SeatHold>> {
        // SKIP LOCKED lets several reapers share the backlog.
        let rows: Vec<HoldRow> = sqlx::query_as(
            r#"
            UPDATE seat_holds SET status = 'expired', updated_at = $1
            WHERE id IN (
                SELECT id FROM seat_holds
                WHERE status = 'active' AND hold_expiry <= $1
                ORDER BY hold_expiry
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        into_holds(rows)
    }
}
