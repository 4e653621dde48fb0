use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}")]
    Status { status: u16, url: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("View not found: {0}")]
    ViewNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl WatchError {
    /// A 404 from the backend means the resource does not exist for this job,
    /// which callers render as "unavailable" rather than as a failure.
    pub fn is_absence(&self) -> bool {
        match self {
            WatchError::NotFound(_) => true,
            WatchError::Status { status, .. } => *status == 404,
            WatchError::Http(e) => e.status().map(|s| s.as_u16() == 404).unwrap_or(false),
            _ => false,
        }
    }
}

impl IntoResponse for WatchError {
    fn into_response(self) -> Response {
        let status = match &self {
            WatchError::Http(_) => StatusCode::BAD_GATEWAY,
            WatchError::Status { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            WatchError::NotFound(_) => StatusCode::NOT_FOUND,
            WatchError::Decode(_) => StatusCode::BAD_GATEWAY,
            WatchError::Forbidden(_) => StatusCode::FORBIDDEN,
            WatchError::ViewNotFound(_) => StatusCode::NOT_FOUND,
            WatchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}
