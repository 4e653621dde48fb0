use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use serde::Serialize;
use std::collections::BTreeSet;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{sleep, Duration};
use tracing::debug;

use crate::routes::views::render_view;
use crate::state::SharedState;
use crate::view::RenderedView;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum PushMessage<'a> {
    View { id: &'a str, view: RenderedView },
    Unmounted { id: &'a str },
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: SharedState) {
    // Subscribe before the initial push so no change slips in between.
    let mut rx = state.view_tx.subscribe();
    let mut shutdown_rx = state.shutdown_tx.subscribe();

    let ids: Vec<String> = state.views.read().await.keys().cloned().collect();
    for id in &ids {
        if !push_view(&mut socket, &state, id).await {
            return;
        }
    }

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                send_shutdown(&mut socket).await;
                break;
            }
            result = rx.recv() => {
                let mut changed = BTreeSet::new();
                match result {
                    Ok(id) => {
                        changed.insert(id);
                    }
                    // Lagged: resend every view.
                    Err(RecvError::Lagged(_)) => {
                        changed.extend(state.views.read().await.keys().cloned());
                    }
                    Err(RecvError::Closed) => break,
                }

                // Debounce: coalesce changes arriving within 100ms
                tokio::select! {
                    _ = sleep(Duration::from_millis(100)) => {}
                    _ = shutdown_rx.recv() => {
                        send_shutdown(&mut socket).await;
                        break;
                    }
                }
                while let Ok(id) = rx.try_recv() {
                    changed.insert(id);
                }

                let mut open = true;
                for id in &changed {
                    if !push_view(&mut socket, &state, id).await {
                        open = false;
                        break;
                    }
                }
                if !open {
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    debug!("WebSocket client disconnected");
}

async fn send_shutdown(socket: &mut WebSocket) {
    let _ = socket
        .send(Message::Text(r#"{"type":"shutdown"}"#.into()))
        .await;
    let _ = socket.send(Message::Close(None)).await;
}

/// Send the current rendering of one view. Returns false once the socket is gone.
async fn push_view(socket: &mut WebSocket, state: &SharedState, id: &str) -> bool {
    let message = match render_view(state, id).await {
        Ok(view) => PushMessage::View { id, view },
        Err(_) => PushMessage::Unmounted { id },
    };
    match serde_json::to_string(&message) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(_) => true,
    }
}
