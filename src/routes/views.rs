use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::WatchError;
use crate::live::{ViewCommand, ViewKind};
use crate::loader::Slot;
use crate::model::{JobState, ResourceKind};
use crate::query::{JobQuery, JobType};
use crate::state::{SharedState, ViewSummary};
use crate::view::RenderedView;

#[derive(Deserialize)]
pub struct MountRequest {
    /// `dashboard`, `list` or `job:<uid>`.
    pub view: String,
}

#[derive(Serialize)]
pub struct MountResponse {
    pub id: String,
    pub kind: ViewKind,
}

#[derive(Serialize)]
pub struct ViewResponse {
    pub id: String,
    #[serde(flatten)]
    pub view: RenderedView,
}

/// Body of `POST /views/{id}/search`. Omitted fields fall back to defaults.
#[derive(Deserialize, Default)]
pub struct SearchRequest {
    pub limit: Option<usize>,
    pub states: Option<Vec<JobState>>,
    pub job_type: Option<JobType>,
    pub prnum: Option<String>,
    pub branch: Option<String>,
    pub tag: Option<String>,
    pub sha: Option<String>,
    pub author: Option<String>,
}

impl SearchRequest {
    pub fn into_query(self, page_size: usize) -> JobQuery {
        JobQuery {
            limit: self.limit.unwrap_or(page_size),
            states: self.states,
            job_type: self.job_type.unwrap_or_default(),
            prnum: self.prnum,
            branch: self.branch,
            tag: self.tag,
            sha: self.sha,
            author: self.author,
        }
    }
}

/// GET /views
pub async fn list_views(State(state): State<SharedState>) -> Json<Vec<ViewSummary>> {
    Json(state.view_summaries().await)
}

/// POST /views
pub async fn mount_view(
    State(state): State<SharedState>,
    Json(req): Json<MountRequest>,
) -> Result<(StatusCode, Json<MountResponse>), WatchError> {
    let kind: ViewKind = req.view.parse()?;
    let id = state.mount_view(kind.clone()).await;
    Ok((StatusCode::CREATED, Json(MountResponse { id, kind })))
}

/// GET /views/{id}
pub async fn get_view(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ViewResponse>, WatchError> {
    let view = render_view(&state, &id).await?;
    Ok(Json(ViewResponse { id, view }))
}

pub async fn render_view(state: &SharedState, id: &str) -> Result<RenderedView, WatchError> {
    let views = state.views.read().await;
    let handle = views
        .get(id)
        .ok_or_else(|| WatchError::ViewNotFound(id.to_string()))?;
    Ok(handle.render().await)
}

/// DELETE /views/{id}
pub async fn unmount_view(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, WatchError> {
    state.unmount_view(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /views/{id}/more
pub async fn display_more(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, WatchError> {
    send_command(&state, &id, ViewCommand::DisplayMore).await
}

/// POST /views/{id}/search
pub async fn search(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<SearchRequest>,
) -> Result<StatusCode, WatchError> {
    let query = req.into_query(state.config.page_size);
    send_command(&state, &id, ViewCommand::Search(query)).await
}

/// POST /views/{id}/refresh
pub async fn refresh(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, WatchError> {
    send_command(&state, &id, ViewCommand::Refresh).await
}

async fn send_command(
    state: &SharedState,
    id: &str,
    command: ViewCommand,
) -> Result<StatusCode, WatchError> {
    let views = state.views.read().await;
    let handle = views
        .get(id)
        .ok_or_else(|| WatchError::ViewNotFound(id.to_string()))?;
    handle.send(command).await?;
    Ok(StatusCode::ACCEPTED)
}

/// GET /views/{id}/jobs/{uid}/resources/{kind}
pub async fn get_resource(
    State(state): State<SharedState>,
    Path((id, uid, kind)): Path<(String, String, String)>,
) -> Result<Json<Slot>, WatchError> {
    let kind: ResourceKind = kind.parse()?;
    let views = state.views.read().await;
    let handle = views
        .get(&id)
        .ok_or_else(|| WatchError::ViewNotFound(id.clone()))?;
    let view = handle.read().await;
    view.cache
        .slot(&uid, kind)
        .cloned()
        .map(Json)
        .ok_or_else(|| WatchError::NotFound(format!("{} of job {} in view {}", kind, uid, id)))
}
