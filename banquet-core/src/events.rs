use banquet_shared::ReservationEvent;

/// Hand-off point to the notification collaborator. Publishing is best effort
/// and must never fail or block a reservation.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: ReservationEvent);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, event: ReservationEvent) {
        tracing::trace!("Dropping reservation event {}", event.name());
    }
}
