use anyhow::Context;
use banquet_api::{app, AppState, MaintenanceWorker};
use banquet_booking::HoldPolicy;
use banquet_core::clock::SystemClock;
use banquet_core::payment::CapturedOnConfirmGateway;
use banquet_core::repository::Stores;
use banquet_store::app_config::{Config, StorageBackend};
use banquet_store::{DbClient, MemoryStore, RedisClient};
use chrono::{Duration, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "banquet_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Banquet API on port {}", config.server.port);

    let (stores, rules) = match config.storage.backend {
        StorageBackend::Postgres => {
            let db = DbClient::new(&config.database.url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            let rules = match db.fetch_reservation_rules(config.reservation.clone()).await {
                Ok(rules) => rules,
                Err(e) => {
                    tracing::warn!("Could not read reservation rules, using file config: {}", e);
                    config.reservation.clone()
                }
            };
            (db.stores(), rules)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory store; reservations are lost on restart");
            let store = Arc::new(MemoryStore::new());
            if config.storage.seed_demo_layout {
                let (event, tables) = store
                    .seed_venue("Gala Dinner", Utc::now() + Duration::days(7), &[2, 2, 4, 4, 6, 8, 10])
                    .await;
                tracing::info!("Seeded demo event {} with {} tables", event.id, tables.len());
            }
            (Stores::shared(store), config.reservation.clone())
        }
    };

    let policy = HoldPolicy::new(rules.hold_ttl_seconds).context("Invalid hold ttl")?;
    let mut state = AppState::new(
        &stores,
        Arc::new(CapturedOnConfirmGateway),
        Arc::new(SystemClock),
        policy,
    );

    if let Some(url) = config.redis.url.as_deref() {
        match RedisClient::new(url).await {
            Ok(redis) => state = state.with_rate_limit(Arc::new(redis), config.rate_limit.clone()),
            Err(e) => tracing::warn!("Redis unavailable, rate limiting disabled: {}", e),
        }
    }

    let worker = MaintenanceWorker::new(
        state.holds.clone(),
        state.bookings.clone(),
        state.sync.clone(),
        rules,
    );
    tokio::spawn(worker.run());

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
