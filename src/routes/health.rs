use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::permissions::Permission;
use crate::state::SharedState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub backend_url: String,
    pub ws_url: String,
    pub views: usize,
    pub user: UserHealth,
    pub version: String,
}

#[derive(Serialize)]
pub struct UserHealth {
    pub login: String,
    pub permission: Permission,
}

pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(build_health_response(&state).await)
}

pub async fn build_health_response(state: &SharedState) -> HealthResponse {
    let views = state.views.read().await.len();
    let user = state.user.read().await;

    HealthResponse {
        status: "ok".to_string(),
        backend_url: state.config.backend_url.clone(),
        ws_url: state.config.ws_url.clone(),
        views,
        user: UserHealth {
            login: user.credentials.login.clone(),
            permission: user.permission,
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}
