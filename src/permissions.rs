//! Push permission lookup on the GitHub repository the CI builds.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::WatchError;
use crate::settings::UserCredentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Not looked up yet.
    Unknown,
    No,
    Push,
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    #[serde(default)]
    permissions: Option<RepoPermissions>,
}

#[derive(Debug, Deserialize)]
struct RepoPermissions {
    #[serde(default)]
    push: bool,
}

/// Ask GitHub whether `user` can push to `repo`. Any failure means no.
pub async fn fetch_permission(
    http: &reqwest::Client,
    api_url: &str,
    repo: &str,
    user: &UserCredentials,
) -> Permission {
    if user.is_anonymous() {
        return Permission::No;
    }
    match query_push(http, api_url, repo, &user.token).await {
        Ok(true) => Permission::Push,
        Ok(false) => {
            debug!("{} has no push permission on {}", user.login, repo);
            Permission::No
        }
        Err(e) => {
            warn!("Permission lookup for {} failed: {}", user.login, e);
            Permission::No
        }
    }
}

async fn query_push(
    http: &reqwest::Client,
    api_url: &str,
    repo: &str,
    token: &str,
) -> Result<bool, WatchError> {
    let url = format!("{}/repos/{}", api_url.trim_end_matches('/'), repo);
    let resp = http
        .get(&url)
        .header(reqwest::header::AUTHORIZATION, format!("token {}", token))
        .header(reqwest::header::USER_AGENT, "jobwatch")
        .header(reqwest::header::ACCEPT, "application/vnd.github+json")
        .send()
        .await?;
    if !resp.status().is_success() {
        return Err(WatchError::Status {
            status: resp.status().as_u16(),
            url,
        });
    }
    let repo: RepoResponse = resp.json().await?;
    Ok(repo.permissions.is_some_and(|p| p.push))
}
