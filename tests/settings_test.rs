use chrono::{Duration, Utc};
use jobwatch::settings::{load_user, remove_user, save_user, UserCredentials, ANONYMOUS_LOGIN};
use tempfile::TempDir;

fn user(expires_in: Option<Duration>) -> UserCredentials {
    UserCredentials {
        login: "alice".to_string(),
        avatar_url: "https://avatars.example.org/alice".to_string(),
        token: "gho_secret".to_string(),
        expires_at: expires_in.map(|d| Utc::now() + d),
    }
}

#[test]
fn test_load_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nonexistent.json");
    let loaded = load_user(&path);
    assert_eq!(loaded.login, ANONYMOUS_LOGIN);
    assert!(loaded.is_anonymous());
}

#[test]
fn test_load_invalid_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "not json at all {{{").unwrap();
    // Should return the anonymous user instead of panicking
    assert!(load_user(&path).is_anonymous());
}

#[test]
fn test_save_and_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("user.json");

    let stored = user(Some(Duration::hours(8)));
    save_user(&path, &stored);
    let loaded = load_user(&path);

    assert_eq!(loaded, stored);
    assert!(!loaded.is_anonymous());
}

#[test]
fn test_never_expiring_user() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("user.json");
    std::fs::write(&path, r#"{"login": "bob", "token": "t"}"#).unwrap();

    let loaded = load_user(&path);
    assert_eq!(loaded.login, "bob");
    assert!(loaded.expires_at.is_none());
    assert!(loaded.avatar_url.is_empty());
}

#[test]
fn test_expired_user_loads_as_anonymous() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("user.json");
    save_user(&path, &user(Some(Duration::minutes(-5))));
    assert!(load_user(&path).is_anonymous());
}

#[test]
fn test_remove_user() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("user.json");
    save_user(&path, &user(None));
    remove_user(&path);
    assert!(!path.exists());
    // Removing twice is fine.
    remove_user(&path);
    assert!(load_user(&path).is_anonymous());
}
