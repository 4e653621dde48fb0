use serde::{Deserialize, Serialize};

use crate::model::JobStatus;

/// A server-pushed change notification, discriminated by `cmd`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum DeltaEvent {
    /// The visible job set is stale and must be re-fetched.
    Reload,
    /// Replaces the status of one job.
    Status { uid: String, status: JobStatus },
    /// Appends one chunk of process output to one job.
    Output { uid: String, line: String },
    /// Any `cmd` this client does not know about.
    #[serde(other)]
    Unknown,
}

impl DeltaEvent {
    pub fn parse(text: &str) -> Result<DeltaEvent, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn uid(&self) -> Option<&str> {
        match self {
            DeltaEvent::Status { uid, .. } | DeltaEvent::Output { uid, .. } => Some(uid),
            DeltaEvent::Reload | DeltaEvent::Unknown => None,
        }
    }
}
