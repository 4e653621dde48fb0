//! Cancel, abort and restart.
//!
//! Actions never touch view state: the backend answers a successful action
//! with a `reload` delta, which is what updates the views.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::client::{CiClient, RemoveFrom};
use crate::error::WatchError;
use crate::model::{Job, JobState};
use crate::notify::{NotificationResult, Notifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobAction {
    Cancel,
    Abort,
    Restart,
}

impl JobAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobAction::Cancel => "cancel",
            JobAction::Abort => "abort",
            JobAction::Restart => "restart",
        }
    }

    fn past_tense(&self) -> &'static str {
        match self {
            JobAction::Cancel => "canceled",
            JobAction::Abort => "aborted",
            JobAction::Restart => "restarted",
        }
    }

    /// Queued jobs can be canceled, running ones aborted, finished ones
    /// restarted.
    pub fn applies_to(&self, state: JobState) -> bool {
        match self {
            JobAction::Cancel => state == JobState::Queued,
            JobAction::Abort => state == JobState::Running,
            JobAction::Restart => state.is_finished(),
        }
    }
}

impl fmt::Display for JobAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobAction {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cancel" => Ok(JobAction::Cancel),
            "abort" => Ok(JobAction::Abort),
            "restart" => Ok(JobAction::Restart),
            other => Err(WatchError::InvalidRequest(format!("Unknown action: {}", other))),
        }
    }
}

/// Run `action` against `job` and report the outcome as a notification.
pub async fn perform(
    client: &CiClient,
    notifier: &Notifier,
    job: &Job,
    action: JobAction,
    token: &str,
) -> Result<(), WatchError> {
    let label = format!("{} {}", job.short_sha(), job.context());
    info!("Requesting {} of job {} {}", action, job.commit.sha, job.context());

    let result = match action {
        JobAction::Cancel => client.remove_job(RemoveFrom::Queued, &job.uid, token).await,
        JobAction::Abort => client.remove_job(RemoveFrom::Running, &job.uid, token).await,
        JobAction::Restart => client.restart_job(&job.uid, token).await,
    };

    match result {
        Ok(()) => {
            notifier
                .notify(
                    &job.uid,
                    NotificationResult::Info,
                    format!("Job {} {}", label, action.past_tense()),
                )
                .await;
            Ok(())
        }
        Err(e) => {
            warn!("Failed to {} job {}: {}", action, job.uid, e);
            notifier
                .notify(
                    &job.uid,
                    NotificationResult::Danger,
                    format!("Failed to {} job {}", action, label),
                )
                .await;
            Err(e)
        }
    }
}
