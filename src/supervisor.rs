//! Websocket connection supervision for one mounted view.
//!
//! The backend pushes deltas without any subscribe handshake. A dropped or
//! refused connection is retried forever after the delay the
//! [`ReconnectPolicy`] hands out.

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace};

use crate::events::DeltaEvent;

/// Decides how long to wait before the next connection attempt.
pub trait ReconnectPolicy: Send + Sync + 'static {
    /// `attempt` counts consecutive failures, starting at 1.
    fn next_delay(&self, attempt: u32) -> Duration;
}

/// Same delay every time, no jitter, no cap.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl ReconnectPolicy for FixedDelay {
    fn next_delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorEvent {
    /// A socket is open. `reconnect` is set when an earlier one was lost.
    Connected { reconnect: bool },
    Delta(DeltaEvent),
    Disconnected,
}

pub struct ConnectionSupervisor {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ConnectionSupervisor {
    pub fn spawn<P: ReconnectPolicy>(
        url: String,
        policy: P,
        events: mpsc::Sender<SupervisorEvent>,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run(url, policy, events, stop_rx));
        ConnectionSupervisor { stop_tx, task }
    }

    /// Close the socket and wait for the supervision task to exit.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.task.await;
    }
}

async fn run<P: ReconnectPolicy>(
    url: String,
    policy: P,
    events: mpsc::Sender<SupervisorEvent>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ever_connected = false;
    let mut attempt: u32 = 0;

    loop {
        if *stop_rx.borrow() {
            break;
        }

        let connected = tokio::select! {
            result = tokio_tungstenite::connect_async(url.as_str()) => result,
            _ = stop_rx.changed() => break,
        };

        match connected {
            Ok((stream, _)) => {
                info!("Websocket connected: {}", url);
                attempt = 0;
                if events
                    .send(SupervisorEvent::Connected {
                        reconnect: ever_connected,
                    })
                    .await
                    .is_err()
                {
                    break;
                }
                ever_connected = true;

                let stopped = pump(stream, &events, &mut stop_rx).await;
                if stopped {
                    break;
                }
                info!("Websocket closed: {}", url);
                if events.send(SupervisorEvent::Disconnected).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("Websocket connect to {} failed: {}", url, e);
            }
        }

        attempt = attempt.saturating_add(1);
        let delay = policy.next_delay(attempt);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop_rx.changed() => break,
        }
    }

    debug!("Websocket supervisor for {} stopped", url);
}

/// Forward frames until the socket closes. Returns true when stopped from
/// our side (or the view is gone), false when the peer dropped us.
async fn pump<S>(
    stream: tokio_tungstenite::WebSocketStream<S>,
    events: &mpsc::Sender<SupervisorEvent>,
    stop_rx: &mut watch::Receiver<bool>,
) -> bool
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            _ = stop_rx.changed() => {
                let _ = write.send(Message::Close(None)).await;
                return true;
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => match DeltaEvent::parse(&text) {
                    Ok(event) => {
                        trace!("Delta: {:?}", event);
                        tokio::select! {
                            sent = events.send(SupervisorEvent::Delta(event)) => {
                                if sent.is_err() {
                                    return true;
                                }
                            }
                            _ = stop_rx.changed() => {
                                let _ = write.send(Message::Close(None)).await;
                                return true;
                            }
                        }
                    }
                    Err(e) => debug!("Dropping malformed delta: {}", e),
                },
                Some(Ok(Message::Close(_))) | None => return false,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Websocket read error: {}", e);
                    return false;
                }
            }
        }
    }
}
