use banquet_booking::{BookingLifecycle, HoldPolicy, SeatHoldManager};
use banquet_core::clock::Clock;
use banquet_core::payment::PaymentGateway;
use banquet_core::repository::Stores;
use banquet_inventory::{AvailabilitySynchronizer, TableStatusResolver};
use banquet_store::app_config::RateLimitConfig;
use banquet_store::{BroadcastPublisher, RedisClient};
use std::sync::Arc;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<TableStatusResolver>,
    pub sync: Arc<AvailabilitySynchronizer>,
    pub holds: Arc<SeatHoldManager>,
    pub bookings: Arc<BookingLifecycle>,
    pub events: BroadcastPublisher,
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit: RateLimitConfig,
}

impl AppState {
    /// Wires the reservation components over `stores`. Rate limiting stays
    /// off until [`AppState::with_rate_limit`] supplies a Redis client.
    pub fn new(
        stores: &Stores,
        payments: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        policy: HoldPolicy,
    ) -> Self {
        let events = BroadcastPublisher::new(EVENT_CHANNEL_CAPACITY);
        let publisher = Arc::new(events.clone());

        let resolver = Arc::new(TableStatusResolver::new(
            stores.tables.clone(),
            stores.bookings.clone(),
            stores.holds.clone(),
            clock.clone(),
        ));
        let sync = Arc::new(AvailabilitySynchronizer::new(
            resolver.clone(),
            stores.tables.clone(),
            stores.availability.clone(),
            publisher.clone(),
            clock.clone(),
        ));
        let holds = Arc::new(SeatHoldManager::new(
            stores,
            sync.clone(),
            publisher.clone(),
            clock.clone(),
            policy,
        ));
        let bookings = Arc::new(BookingLifecycle::new(
            stores,
            holds.clone(),
            sync.clone(),
            publisher,
            payments,
            clock,
        ));

        Self {
            resolver,
            sync,
            holds,
            bookings,
            events,
            redis: None,
            rate_limit: RateLimitConfig::default(),
        }
    }

    pub fn with_rate_limit(mut self, redis: Arc<RedisClient>, rate_limit: RateLimitConfig) -> Self {
        self.redis = Some(redis);
        self.rate_limit = rate_limit;
        self
    }
}
