use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::notify::Notification;
use crate::state::SharedState;

/// GET /notifications: currently visible notifications, newest first.
pub async fn list(State(state): State<SharedState>) -> Json<Vec<Notification>> {
    Json(state.notifier.list().await)
}

/// GET /notifications/stream: SSE of added and dismissed notifications.
pub async fn stream(
    State(state): State<SharedState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.notifier.subscribe();
    let stream = BroadcastStream::new(rx);

    let event_stream = stream.filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().event("notification").data(data)))
        }
        Err(_) => None, // lagged
    });

    Sse::new(event_stream).keep_alive(KeepAlive::default())
}
