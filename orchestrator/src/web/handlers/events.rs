// Live run lifecycle events over SSE

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use tracing::debug;

use crate::constants::events::KEEP_ALIVE_INTERVAL;
use crate::web::AppState;

pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let subscription = state.events.subscribe();
    debug!("New event subscriber, {} total", state.events.subscriber_count());

    let stream = subscription
        .into_stream()
        .map(|event| Event::default().json_data(&event));

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}
