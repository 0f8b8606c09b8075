use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{info, warn};

use crate::app_config::ReservationConfig;
use crate::postgres::{
    PgAvailabilityRepository, PgBookingRepository, PgHoldRepository, PgTableRepository,
};
use banquet_core::repository::Stores;
use std::sync::Arc;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    rule_key: String,
    rule_value: serde_json::Value,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Postgres-backed repositories sharing this pool.
    pub fn stores(&self) -> Stores {
        Stores {
            tables: Arc::new(PgTableRepository::new(self.pool.clone())),
            holds: Arc::new(PgHoldRepository::new(self.pool.clone())),
            bookings: Arc::new(PgBookingRepository::new(self.pool.clone())),
            availability: Arc::new(PgAvailabilityRepository::new(self.pool.clone())),
        }
    }

    /// Overlays operator-tunable rules from `reservation_rules` onto the file
    /// configuration. Rows look like `{"value": <number>}`.
    pub async fn fetch_reservation_rules(
        &self,
        defaults: ReservationConfig,
    ) -> Result<ReservationConfig, sqlx::Error> {
        let rows: Vec<RuleRow> = sqlx::query_as("SELECT rule_key, rule_value FROM reservation_rules")
            .fetch_all(&self.pool)
            .await?;

        Ok(apply_rules(defaults, rows))
    }
}

fn apply_rules(mut rules: ReservationConfig, rows: Vec<RuleRow>) -> ReservationConfig {
    for row in rows {
        let Some(value) = row.rule_value.get("value").and_then(|v| v.as_u64()) else {
            warn!("Ignoring malformed reservation rule {}", row.rule_key);
            continue;
        };
        match row.rule_key.as_str() {
            "hold_ttl_seconds" => rules.hold_ttl_seconds = value,
            "reaper_interval_seconds" => rules.reaper_interval_seconds = value,
            "sweep_interval_seconds" => rules.sweep_interval_seconds = value,
            "reap_batch_size" => rules.reap_batch_size = value as i64,
            other => warn!("Unknown reservation rule {}", other),
        }
    }
    rules
}
