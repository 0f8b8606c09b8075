use banquet_booking::{BookingLifecycle, SeatHoldManager};
use banquet_inventory::AvailabilitySynchronizer;
use banquet_store::app_config::ReservationConfig;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

/// Background housekeeping. Correctness never depends on it: expired holds
/// already read as absent and the cache is display-only.
pub struct MaintenanceWorker {
    holds: Arc<SeatHoldManager>,
    bookings: Arc<BookingLifecycle>,
    sync: Arc<AvailabilitySynchronizer>,
    config: ReservationConfig,
}

impl MaintenanceWorker {
    pub fn new(
        holds: Arc<SeatHoldManager>,
        bookings: Arc<BookingLifecycle>,
        sync: Arc<AvailabilitySynchronizer>,
        config: ReservationConfig,
    ) -> Self {
        Self {
            holds,
            bookings,
            sync,
            config,
        }
    }

    pub async fn run(self) {
        let mut reaper = interval(Duration::from_secs(self.config.reaper_interval_seconds.max(1)));
        let mut sweep = interval(Duration::from_secs(self.config.sweep_interval_seconds.max(1)));
        reaper.set_missed_tick_behavior(MissedTickBehavior::Skip);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Maintenance worker started (reaper every {}s, sweep every {}s)",
            self.config.reaper_interval_seconds, self.config.sweep_interval_seconds
        );

        loop {
            tokio::select! {
                _ = reaper.tick() => self.reap_once().await,
                _ = sweep.tick() => self.sweep_once().await,
            }
        }
    }

    /// Expires lapsed holds, then abandons pending bookings left on them.
    pub async fn reap_once(&self) {
        if let Err(e) = self.holds.reap_expired(self.config.reap_batch_size).await {
            error!("Hold reaper failed: {}", e);
        }
        match self.bookings.abandon_lapsed(self.config.reap_batch_size).await {
            Ok(0) => {}
            Ok(n) => info!("Abandoned {} pending bookings with lapsed holds", n),
            Err(e) => error!("Abandoning lapsed bookings failed: {}", e),
        }
    }

    pub async fn sweep_once(&self) {
        if let Err(e) = self.sync.sync_all().await {
            error!("Availability sweep failed: {}", e);
        }
    }
}
