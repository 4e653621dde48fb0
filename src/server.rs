use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(crate::routes::health::health))
        // Views
        .route(
            "/views",
            get(crate::routes::views::list_views).post(crate::routes::views::mount_view),
        )
        .route(
            "/views/{id}",
            get(crate::routes::views::get_view).delete(crate::routes::views::unmount_view),
        )
        .route("/views/{id}/more", post(crate::routes::views::display_more))
        .route("/views/{id}/search", post(crate::routes::views::search))
        .route("/views/{id}/refresh", post(crate::routes::views::refresh))
        .route(
            "/views/{id}/jobs/{uid}/resources/{kind}",
            get(crate::routes::views::get_resource),
        )
        // Per-application results and actions
        .route(
            "/jobs/{uid}/results/{result_type}/{application}",
            get(crate::routes::jobs::application_results),
        )
        .route(
            "/jobs/{uid}/results/{result_type}/{application}/{target}/{toolchain}/log",
            get(crate::routes::jobs::target_log),
        )
        .route("/jobs/{uid}/{action}", post(crate::routes::jobs::run_action))
        // User
        .route(
            "/user",
            get(crate::routes::user::get_user)
                .put(crate::routes::user::put_user)
                .delete(crate::routes::user::delete_user),
        )
        // Notifications
        .route("/notifications", get(crate::routes::notifications::list))
        .route("/notifications/stream", get(crate::routes::notifications::stream))
        // Push channel
        .route("/ws", get(crate::routes::ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
