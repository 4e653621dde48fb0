use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

pub const ANONYMOUS_LOGIN: &str = "anonymous";

/// Stored GitHub login. The token is only ever sent on mutating requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCredentials {
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub token: String,
    /// `None` never expires.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Default for UserCredentials {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl UserCredentials {
    pub fn anonymous() -> Self {
        UserCredentials {
            login: ANONYMOUS_LOGIN.to_string(),
            avatar_url: String::new(),
            token: String::new(),
            expires_at: None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.login == ANONYMOUS_LOGIN || self.token.is_empty()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }
}

/// Load the stored user. Missing, unreadable or expired credentials load as
/// the anonymous user.
pub fn load_user(path: &Path) -> UserCredentials {
    let user: UserCredentials = match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
        Err(_) => return UserCredentials::anonymous(),
    };
    if user.is_expired_at(Utc::now()) {
        debug!("Stored credentials for {} expired", user.login);
        return UserCredentials::anonymous();
    }
    user
}

pub fn save_user(path: &Path, user: &UserCredentials) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("Failed to create {:?}: {}", parent, e);
            return;
        }
    }
    match serde_json::to_string_pretty(user) {
        Ok(json) => {
            if let Err(e) = std::fs::write(path, json) {
                warn!("Failed to save credentials to {:?}: {}", path, e);
            }
        }
        Err(e) => {
            warn!("Failed to serialize credentials: {}", e);
        }
    }
}

pub fn remove_user(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove credentials {:?}: {}", path, e),
    }
}
