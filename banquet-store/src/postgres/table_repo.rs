use async_trait::async_trait;
use banquet_core::repository::{StoreResult, TableRepository};
use banquet_shared::{ScheduledEvent, Table};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::db_error;
use super::rows::{EventRow, TableRow};

pub struct PgTableRepository {
    pool: PgPool,
}

impl PgTableRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Layout seeding for demos and tests; venue management lives elsewhere.
    pub async fn insert_event(&self, event: &ScheduledEvent) -> StoreResult<()> {
        sqlx::query("INSERT INTO events (id, venue_id, name, starts_at) VALUES ($1, $2, $3, $4)")
            .bind(event.id)
            .bind(event.venue_id)
            .bind(&event.name)
            .bind(event.starts_at)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    pub async fn insert_table(&self, table: &Table) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tables (id, venue_id, table_number, capacity, geometry, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(table.id)
        .bind(table.venue_id)
        .bind(&table.table_number)
        .bind(table.capacity)
        .bind(&table.geometry)
        .bind(table.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}

#[async_trait]
impl TableRepository for PgTableRepository {
    async fn get_event(&self, event_id: Uuid) -> StoreResult<Option<ScheduledEvent>> {
        let row: Option<EventRow> = sqlx::query_as("SELECT * FROM events WHERE id = $1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.map(ScheduledEvent::from))
    }

    async fn get_table(&self, table_id: Uuid) -> StoreResult<Option<Table>> {
        let row: Option<TableRow> = sqlx::query_as("SELECT * FROM tables WHERE id = $1")
            .bind(table_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.map(Table::from))
    }

    async fn list_tables_for_event(&self, event_id: Uuid) -> StoreResult<Vec<Table>> {
        let rows: Vec<TableRow> = sqlx::query_as(
            r#"
            SELECT t.*
            FROM tables t
            JOIN events e ON e.venue_id = t.venue_id
            WHERE e.id = $1
            ORDER BY t.table_number
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(Table::from).collect())
    }

    async fn list_event_ids_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        sqlx::query_scalar("SELECT id FROM events WHERE starts_at >= $1 ORDER BY starts_at")
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)
    }
}
