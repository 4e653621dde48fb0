use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::error::WatchError;
use crate::settings::UserCredentials;
use crate::state::{SharedState, UserSession};

/// GET /user. The token is never echoed back.
pub async fn get_user(State(state): State<SharedState>) -> Json<UserSession> {
    let mut session = state.user.read().await.clone();
    session.credentials.token.clear();
    Json(session)
}

/// PUT /user: store credentials and look up their permission.
pub async fn put_user(
    State(state): State<SharedState>,
    Json(credentials): Json<UserCredentials>,
) -> Result<Json<UserSession>, WatchError> {
    if credentials.is_anonymous() {
        return Err(WatchError::InvalidRequest(
            "Credentials need a login and a token".to_string(),
        ));
    }
    state.login(credentials).await;
    Ok(get_user(State(state)).await)
}

/// DELETE /user
pub async fn delete_user(State(state): State<SharedState>) -> StatusCode {
    state.logout().await;
    StatusCode::NO_CONTENT
}
