use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationResult {
    Info,
    Danger,
}

/// A transient message about one job, dismissed automatically.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Notification {
    pub uid: String,
    pub result: NotificationResult,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum NotificationEvent {
    Added(Notification),
    Dismissed { uid: String },
}

#[derive(Clone)]
pub struct Notifier {
    entries: Arc<RwLock<VecDeque<Notification>>>,
    sender: broadcast::Sender<NotificationEvent>,
    timeout: Duration,
}

impl Notifier {
    pub fn new(timeout: Duration) -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            entries: Arc::new(RwLock::new(VecDeque::new())),
            sender,
            timeout,
        }
    }

    /// Show a notification and schedule its removal after the timeout.
    pub async fn notify(&self, uid: &str, result: NotificationResult, message: impl Into<String>) {
        let notification = Notification {
            uid: uid.to_string(),
            result,
            message: message.into(),
            created_at: Utc::now(),
        };
        info!("Notification [{:?}] {}", result, notification.message);

        self.entries.write().await.push_front(notification.clone());
        let _ = self.sender.send(NotificationEvent::Added(notification));

        let notifier = self.clone();
        let uid = uid.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(notifier.timeout).await;
            notifier.dismiss(&uid).await;
        });
    }

    /// Remove every notification about `uid`.
    pub async fn dismiss(&self, uid: &str) -> usize {
        let removed = {
            let mut entries = self.entries.write().await;
            let before = entries.len();
            entries.retain(|n| n.uid != uid);
            before - entries.len()
        };
        if removed > 0 {
            debug!("Dismissed {} notification(s) for {}", removed, uid);
            let _ = self.sender.send(NotificationEvent::Dismissed {
                uid: uid.to_string(),
            });
        }
        removed
    }

    /// Newest first.
    pub async fn list(&self) -> Vec<Notification> {
        self.entries.read().await.iter().cloned().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.sender.subscribe()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
