use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use tracing::info;

use crate::actions::{self, JobAction};
use crate::error::WatchError;
use crate::model::{ApplicationResults, ResultType};
use crate::state::SharedState;

#[derive(Serialize)]
pub struct ActionResponse {
    pub uid: String,
    pub action: JobAction,
}

/// Application names travel with `:` in place of `/`.
pub fn decode_application(application: &str) -> String {
    application.replace(':', "/")
}

/// GET /jobs/{uid}/results/{result_type}/{application}
pub async fn application_results(
    State(state): State<SharedState>,
    Path((uid, result_type, application)): Path<(String, String, String)>,
) -> Result<Json<ApplicationResults>, WatchError> {
    let result_type: ResultType = result_type.parse()?;
    let application = decode_application(&application);
    state
        .client
        .fetch_application_results(&uid, result_type, &application)
        .await?
        .map(Json)
        .ok_or_else(|| WatchError::NotFound(format!("{} results for {}", application, uid)))
}

/// GET /jobs/{uid}/results/{result_type}/{application}/{target}/{toolchain}/log
pub async fn target_log(
    State(state): State<SharedState>,
    Path((uid, result_type, application, target, toolchain)): Path<(
        String,
        String,
        String,
        String,
        String,
    )>,
) -> Result<impl IntoResponse, WatchError> {
    let result_type: ResultType = result_type.parse()?;
    let application = decode_application(&application);
    let log = state
        .client
        .fetch_target_log(&uid, result_type, &application, &target, &toolchain)
        .await?
        .ok_or_else(|| {
            WatchError::NotFound(format!("{} log on {}:{} for {}", application, target, toolchain, uid))
        })?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], log))
}

/// POST /jobs/{uid}/{cancel|abort|restart}
pub async fn run_action(
    State(state): State<SharedState>,
    Path((uid, action)): Path<(String, String)>,
) -> Result<Json<ActionResponse>, WatchError> {
    let action: JobAction = action.parse()?;
    let token = state.action_token().await?;

    let job = state.client.fetch_job(&uid).await.map_err(|e| {
        if e.is_absence() {
            WatchError::NotFound(format!("Job {}", uid))
        } else {
            e
        }
    })?;
    if !action.applies_to(job.state) {
        return Err(WatchError::InvalidRequest(format!(
            "Cannot {} a {} job",
            action, job.state
        )));
    }

    actions::perform(&state.client, &state.notifier, &job, action, &token).await?;
    info!("{} of job {} accepted", action, uid);
    Ok(Json(ActionResponse { uid, action }))
}
