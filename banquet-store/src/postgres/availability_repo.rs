use async_trait::async_trait;
use banquet_core::repository::{AvailabilityRepository, StoreResult};
use banquet_shared::EventAvailability;
use sqlx::PgPool;
use uuid::Uuid;

use super::db_error;
use super::rows::AvailabilityRow;

pub struct PgAvailabilityRepository {
    pool: PgPool,
}

impl PgAvailabilityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AvailabilityRepository for PgAvailabilityRepository {
    async fn get_availability(&self, event_id: Uuid) -> StoreResult<Option<EventAvailability>> {
        let row: Option<AvailabilityRow> =
            sqlx::query_as("SELECT * FROM event_availability WHERE event_id = $1")
                .bind(event_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(EventAvailability::from))
    }

    async fn upsert_availability(&self, availability: &EventAvailability) -> StoreResult<()> {
        // The WHERE on the update arm drops computations older than the row.
        sqlx::query(
            r#"
            INSERT INTO event_availability (
                event_id, tables_total, tables_available, tables_held, tables_booked,
                seats_total, seats_available, computed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (event_id) DO UPDATE SET
                tables_total = EXCLUDED.tables_total,
                tables_available = EXCLUDED.tables_available,
                tables_held = EXCLUDED.tables_held,
                tables_booked = EXCLUDED.tables_booked,
                seats_total = EXCLUDED.seats_total,
                seats_available = EXCLUDED.seats_available,
                computed_at = EXCLUDED.computed_at
            WHERE event_availability.computed_at <= EXCLUDED.computed_at
            "#,
        )
        .bind(availability.event_id)
        .bind(availability.tables_total)
        .bind(availability.tables_available)
        .bind(availability.tables_held)
        .bind(availability.tables_booked)
        .bind(availability.seats_total)
        .bind(availability.seats_available)
        .bind(availability.computed_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}
