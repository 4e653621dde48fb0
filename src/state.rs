use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use crate::client::CiClient;
use crate::config::WatchConfig;
use crate::error::WatchError;
use crate::live::{self, ViewContext, ViewHandle, ViewKind};
use crate::notify::Notifier;
use crate::permissions::{self, Permission};
use crate::settings::{self, UserCredentials};

pub type SharedState = Arc<WatchState>;

pub struct WatchState {
    pub config: WatchConfig,
    pub client: CiClient,
    pub views: RwLock<BTreeMap<String, ViewHandle>>,
    pub notifier: Notifier,
    pub user: RwLock<UserSession>,
    /// Carries the id of every view whose state changed.
    pub view_tx: broadcast::Sender<String>,
    pub shutdown_tx: broadcast::Sender<()>,
    next_view_id: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSession {
    #[serde(flatten)]
    pub credentials: UserCredentials,
    pub permission: Permission,
}

impl UserSession {
    pub fn new(credentials: UserCredentials) -> Self {
        UserSession {
            credentials,
            permission: Permission::Unknown,
        }
    }
}

/// Summary line of one mounted view.
#[derive(Debug, Clone, Serialize)]
pub struct ViewSummary {
    pub id: String,
    pub kind: ViewKind,
    pub jobs: usize,
    pub fetched: bool,
}

impl WatchState {
    pub fn new(config: WatchConfig) -> Result<Self, WatchError> {
        let client = CiClient::new(&config.backend_url)?;
        let credentials = settings::load_user(&config.credentials_file);
        let (view_tx, _) = broadcast::channel(256);
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            notifier: Notifier::new(config.notification_timeout),
            user: RwLock::new(UserSession::new(credentials)),
            views: RwLock::new(BTreeMap::new()),
            client,
            config,
            view_tx,
            shutdown_tx,
            next_view_id: AtomicU64::new(1),
        })
    }

    pub async fn mount_view(&self, kind: ViewKind) -> String {
        let id = format!("v{}", self.next_view_id.fetch_add(1, Ordering::Relaxed));
        let ctx = ViewContext::from_config(&self.config, self.client.clone(), self.view_tx.clone());
        let handle = live::mount(id.clone(), kind, ctx);
        self.views.write().await.insert(id.clone(), handle);
        id
    }

    pub async fn unmount_view(&self, id: &str) -> Result<(), WatchError> {
        let handle = self
            .views
            .write()
            .await
            .remove(id)
            .ok_or_else(|| WatchError::ViewNotFound(id.to_string()))?;
        handle.unmount().await;
        let _ = self.view_tx.send(id.to_string());
        Ok(())
    }

    pub async fn unmount_all(&self) {
        let handles: Vec<ViewHandle> = {
            let mut views = self.views.write().await;
            std::mem::take(&mut *views).into_values().collect()
        };
        for handle in handles {
            handle.unmount().await;
        }
    }

    pub async fn view_summaries(&self) -> Vec<ViewSummary> {
        let views = self.views.read().await;
        let mut out = Vec::with_capacity(views.len());
        for (id, handle) in views.iter() {
            let state = handle.read().await;
            out.push(ViewSummary {
                id: id.clone(),
                kind: handle.kind().clone(),
                jobs: state.snapshot.len(),
                fetched: state.fetched,
            });
        }
        out
    }

    /// Look up push permission for the stored user. Stays unknown when no
    /// repository is configured.
    pub async fn refresh_permission(&self) -> Permission {
        let credentials = self.user.read().await.credentials.clone();
        let permission = match &self.config.github_repo {
            Some(repo) => {
                permissions::fetch_permission(
                    self.client.http(),
                    &self.config.github_api_url,
                    repo,
                    &credentials,
                )
                .await
            }
            None => {
                debug!("No GitHub repository configured, permission stays unknown");
                Permission::Unknown
            }
        };
        let mut user = self.user.write().await;
        // A login or logout may have happened while the lookup ran.
        if user.credentials == credentials {
            user.permission = permission;
        }
        permission
    }

    pub async fn login(&self, credentials: UserCredentials) -> Permission {
        settings::save_user(&self.config.credentials_file, &credentials);
        info!("Stored credentials for {}", credentials.login);
        *self.user.write().await = UserSession::new(credentials);
        self.refresh_permission().await
    }

    pub async fn logout(&self) {
        settings::remove_user(&self.config.credentials_file);
        let mut user = self.user.write().await;
        info!("Logged out {}", user.credentials.login);
        *user = UserSession {
            credentials: UserCredentials::anonymous(),
            permission: Permission::No,
        };
    }

    /// Token to send with a mutating request, if the user may act at all.
    pub async fn action_token(&self) -> Result<String, WatchError> {
        let user = self.user.read().await;
        if user.credentials.is_anonymous() {
            return Err(WatchError::Forbidden("Not logged in".to_string()));
        }
        if user.permission == Permission::No {
            return Err(WatchError::Forbidden(format!(
                "{} has no push permission",
                user.credentials.login
            )));
        }
        Ok(user.credentials.token.clone())
    }
}
