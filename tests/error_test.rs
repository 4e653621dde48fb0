use axum::http::StatusCode;
use axum::response::IntoResponse;

use jobwatch::error::WatchError;

fn status_of(err: WatchError) -> StatusCode {
    err.into_response().status()
}

#[test]
fn test_backend_status_passes_through() {
    let err = WatchError::Status {
        status: 403,
        url: "http://ci/jobs/queued/u1".to_string(),
    };
    assert_eq!(err.to_string(), "http://ci/jobs/queued/u1 returned 403");
    assert_eq!(status_of(err), StatusCode::FORBIDDEN);
}

#[test]
fn test_local_errors_map_to_status_codes() {
    assert_eq!(status_of(WatchError::NotFound("x".into())), StatusCode::NOT_FOUND);
    assert_eq!(status_of(WatchError::ViewNotFound("v9".into())), StatusCode::NOT_FOUND);
    assert_eq!(status_of(WatchError::Forbidden("anonymous".into())), StatusCode::FORBIDDEN);
    assert_eq!(status_of(WatchError::InvalidRequest("bad".into())), StatusCode::BAD_REQUEST);

    let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    assert_eq!(status_of(WatchError::from(decode)), StatusCode::BAD_GATEWAY);
}

#[test]
fn test_absence_is_only_a_404() {
    let missing = WatchError::Status {
        status: 404,
        url: "u".to_string(),
    };
    let broken = WatchError::Status {
        status: 500,
        url: "u".to_string(),
    };
    assert!(missing.is_absence());
    assert!(WatchError::NotFound("x".into()).is_absence());
    assert!(!broken.is_absence());
    assert!(!WatchError::ViewNotFound("v1".into()).is_absence());
}
