use std::sync::Arc;
use tempfile::TempDir;

use jobwatch::config::WatchConfig;
use jobwatch::error::WatchError;
use jobwatch::permissions::Permission;
use jobwatch::settings::{save_user, UserCredentials};
use jobwatch::state::WatchState;

fn test_config(dir: &TempDir) -> WatchConfig {
    let mut config = WatchConfig::for_backend("http://127.0.0.1:9").unwrap();
    config.credentials_file = dir.path().join("user.json");
    config
}

fn alice() -> UserCredentials {
    UserCredentials {
        login: "alice".to_string(),
        avatar_url: String::new(),
        token: "gho_token".to_string(),
        expires_at: None,
    }
}

#[tokio::test]
async fn test_state_creation() {
    let dir = TempDir::new().unwrap();
    let state = WatchState::new(test_config(&dir)).unwrap();

    assert!(state.views.read().await.is_empty());
    assert!(state.notifier.list().await.is_empty());

    let user = state.user.read().await;
    assert!(user.credentials.is_anonymous());
    assert_eq!(user.permission, Permission::Unknown);
}

#[tokio::test]
async fn test_stored_credentials_are_loaded() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    save_user(&config.credentials_file, &alice());

    let state = WatchState::new(config).unwrap();
    assert_eq!(state.user.read().await.credentials.login, "alice");
}

#[tokio::test]
async fn test_anonymous_user_cannot_act() {
    let dir = TempDir::new().unwrap();
    let state = WatchState::new(test_config(&dir)).unwrap();
    assert!(matches!(state.action_token().await, Err(WatchError::Forbidden(_))));
}

#[tokio::test]
async fn test_login_without_repo_keeps_permission_unknown() {
    let dir = TempDir::new().unwrap();
    let state = WatchState::new(test_config(&dir)).unwrap();

    let permission = state.login(alice()).await;
    assert_eq!(permission, Permission::Unknown);
    assert!(dir.path().join("user.json").exists());
    // Unknown permission leaves the decision to the backend.
    assert_eq!(state.action_token().await.unwrap(), "gho_token");

    state.logout().await;
    assert!(!dir.path().join("user.json").exists());
    assert_eq!(state.user.read().await.permission, Permission::No);
    assert!(state.action_token().await.is_err());
}

#[tokio::test]
async fn test_denied_permission_blocks_actions() {
    let dir = TempDir::new().unwrap();
    let state = WatchState::new(test_config(&dir)).unwrap();
    {
        let mut user = state.user.write().await;
        user.credentials = alice();
        user.permission = Permission::No;
    }
    assert!(matches!(state.action_token().await, Err(WatchError::Forbidden(_))));
}

#[tokio::test]
async fn test_unmount_unknown_view() {
    let dir = TempDir::new().unwrap();
    let state = Arc::new(WatchState::new(test_config(&dir)).unwrap());
    assert!(matches!(
        state.unmount_view("v99").await,
        Err(WatchError::ViewNotFound(_))
    ));
}
