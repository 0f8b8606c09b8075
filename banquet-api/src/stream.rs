use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures_util::{Stream, StreamExt};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/events/{event_id}/stream", get(event_stream))
}

/// GET /v1/events/{event_id}/stream
/// Server-sent reservation events for one event. Slow subscribers skip what
/// they missed and should re-read availability.
pub async fn event_stream(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.event_id() == event_id => {
                match Event::default().event(event.name()).json_data(&event) {
                    Ok(sse) => Some(Ok(sse)),
                    Err(e) => {
                        tracing::warn!("Dropping unserializable event {}: {}", event.name(), e);
                        None
                    }
                }
            }
            Ok(_) => None,
            Err(lagged) => {
                tracing::debug!("SSE subscriber for event {} lagged: {}", event_id, lagged);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
