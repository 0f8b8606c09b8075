use banquet_core::events::EventPublisher;
use banquet_shared::ReservationEvent;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// In-process fan-out of reservation events. Slow subscribers lag and lose
/// the oldest events; publishing never blocks a mutation.
#[derive(Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<ReservationEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReservationEvent> {
        self.tx.subscribe()
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: ReservationEvent) {
        let name = event.name();
        match self.tx.send(event) {
            Ok(receivers) => debug!("Published {} to {} subscribers", name, receivers),
            Err(_) => trace!("Dropped {}: no subscribers", name),
        }
    }
}
