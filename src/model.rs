//! Wire shapes emitted by the CI backend.
//!
//! Every field the backend may omit is optional here; the client mirrors what
//! it is sent and never fills in server-owned data.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::WatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Passed,
    Errored,
    Stopped,
}

impl JobState {
    pub const ALL: [JobState; 5] = [
        JobState::Queued,
        JobState::Running,
        JobState::Passed,
        JobState::Errored,
        JobState::Stopped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Passed => "passed",
            JobState::Errored => "errored",
            JobState::Stopped => "stopped",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Passed | JobState::Errored | JobState::Stopped)
    }

    /// Build and test results are final once a job passed or errored.
    pub fn has_final_results(&self) -> bool {
        matches!(self, JobState::Passed | JobState::Errored)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| WatchError::InvalidRequest(format!("Unknown job state: {}", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub author: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrInfo {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_merged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// One failure discovered while a job runs. Generic jobs carry `name`/`href`,
/// build and test failures carry the application/target/toolchain triple.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FailedItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(default, alias = "board", skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_jobs: Vec<FailedItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_builds: Vec<FailedItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_tests: Vec<FailedItem>,
}

/// Which progress phase a status describes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusPhase<'a> {
    Counting {
        total: u64,
        passed: u64,
        failed: u64,
        eta: Option<f64>,
    },
    Descriptive(&'a str),
    Empty,
}

impl JobStatus {
    pub fn counting(total: u64, passed: u64, failed: u64) -> Self {
        JobStatus {
            total: Some(total),
            passed: Some(passed),
            failed: Some(failed),
            ..Default::default()
        }
    }

    pub fn descriptive(text: impl Into<String>) -> Self {
        JobStatus {
            status: Some(text.into()),
            ..Default::default()
        }
    }

    /// Counting requires all three counters and `total >= passed + failed`;
    /// anything else falls back to the free-text status, if any.
    pub fn phase(&self) -> StatusPhase<'_> {
        if let (Some(total), Some(passed), Some(failed)) = (self.total, self.passed, self.failed) {
            if total >= passed.saturating_add(failed) {
                return StatusPhase::Counting {
                    total,
                    passed,
                    failed,
                    eta: self.eta,
                };
            }
        }
        match self.status.as_deref() {
            Some(text) => StatusPhase::Descriptive(text),
            None => StatusPhase::Empty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub uid: String,
    pub state: JobState,
    pub commit: Commit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prinfo: Option<PrInfo>,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_text_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fasttracked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
}

/// What triggered a job: a pull request or a branch/tag push.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JobOrigin<'a> {
    PullRequest(&'a PrInfo),
    Ref(&'a str),
}

impl Job {
    pub fn origin(&self) -> Result<JobOrigin<'_>, WatchError> {
        match (&self.prinfo, &self.git_ref) {
            (Some(pr), None) => Ok(JobOrigin::PullRequest(pr)),
            (None, Some(r)) => Ok(JobOrigin::Ref(r)),
            (Some(_), Some(_)) => Err(WatchError::InvalidRequest(format!(
                "Job {} has both a pull request and a ref",
                self.uid
            ))),
            (None, None) => Err(WatchError::InvalidRequest(format!(
                "Job {} has neither a pull request nor a ref",
                self.uid
            ))),
        }
    }

    pub fn short_sha(&self) -> &str {
        truncate_chars(&self.commit.sha, 7)
    }

    /// `(PR #12)` or `(main)`, used in notification messages.
    pub fn context(&self) -> String {
        match self.origin() {
            Ok(JobOrigin::PullRequest(pr)) => format!("(PR #{})", pr.number),
            Ok(JobOrigin::Ref(r)) => format!("({})", ref_repr(r)),
            Err(_) => format!("({})", self.short_sha()),
        }
    }
}

/// `refs/heads/feature/x` becomes `feature/x`; bare names are cut to 15 chars.
pub fn ref_repr(git_ref: &str) -> String {
    if git_ref.starts_with("refs/") {
        git_ref.split('/').skip(2).collect::<Vec<_>>().join("/")
    } else {
        truncate_chars(git_ref, 15).to_string()
    }
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// `GET /jobs` answers either grouped by state or as a flat list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JobsResponse {
    Flat(Vec<Job>),
    Grouped {
        #[serde(default)]
        queued: Vec<Job>,
        #[serde(default)]
        running: Vec<Job>,
        #[serde(default)]
        finished: Vec<Job>,
    },
}

impl JobsResponse {
    /// Flatten in display order: queued, running, then finished.
    pub fn into_jobs(self) -> Vec<Job> {
        match self {
            JobsResponse::Grouped {
                queued,
                running,
                finished,
            } => queued.into_iter().chain(running).chain(finished).collect(),
            JobsResponse::Flat(jobs) => jobs,
        }
    }
}

// --- Result sub-resources ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Builds,
    Tests,
    BuildFailures,
    TestFailures,
    Stats,
    Output,
}

impl ResourceKind {
    pub const RESULTS: [ResourceKind; 5] = [
        ResourceKind::Builds,
        ResourceKind::BuildFailures,
        ResourceKind::Tests,
        ResourceKind::TestFailures,
        ResourceKind::Stats,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Builds => "builds",
            ResourceKind::Tests => "tests",
            ResourceKind::BuildFailures => "build_failures",
            ResourceKind::TestFailures => "test_failures",
            ResourceKind::Stats => "stats",
            ResourceKind::Output => "output",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "builds" => Ok(ResourceKind::Builds),
            "tests" => Ok(ResourceKind::Tests),
            "build_failures" => Ok(ResourceKind::BuildFailures),
            "test_failures" => Ok(ResourceKind::TestFailures),
            "stats" => Ok(ResourceKind::Stats),
            "output" => Ok(ResourceKind::Output),
            other => Err(WatchError::InvalidRequest(format!(
                "Unknown resource kind: {}",
                other
            ))),
        }
    }
}

/// Per-application pass/fail counts from `builds.json` / `tests.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSummary {
    pub application: String,
    #[serde(default, alias = "build_success", alias = "test_success")]
    pub success: u64,
    #[serde(default, alias = "build_failures", alias = "test_failures")]
    pub failures: u64,
}

/// One application/target/toolchain outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetResult {
    #[serde(default)]
    pub application: String,
    #[serde(alias = "board")]
    pub target: String,
    pub toolchain: String,
    #[serde(default)]
    pub worker: Option<String>,
    #[serde(default)]
    pub runtime: Option<f64>,
    #[serde(default)]
    pub status: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub name: String,
    #[serde(default)]
    pub runtime_avg: f64,
    #[serde(default)]
    pub runtime_min: f64,
    #[serde(default)]
    pub runtime_max: f64,
    #[serde(default)]
    pub total_cpu_time: f64,
    #[serde(default)]
    pub jobs_passed: u64,
    #[serde(default)]
    pub jobs_failed: u64,
    #[serde(default)]
    pub jobs_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStats {
    #[serde(default)]
    pub total_builds: u64,
    #[serde(default)]
    pub total_tests: u64,
    #[serde(default)]
    pub total_jobs: u64,
    /// Reported verbatim; the backend has sent both numbers and strings here.
    #[serde(default)]
    pub total_time: serde_json::Value,
    #[serde(default)]
    pub workers: Vec<WorkerStats>,
}

/// `app.json` for one application: every target result plus the failures.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApplicationResults {
    #[serde(default)]
    pub jobs: Vec<TargetResult>,
    #[serde(default)]
    pub failures: Vec<TargetResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Resource {
    Builds(Vec<ApplicationSummary>),
    Tests(Vec<ApplicationSummary>),
    BuildFailures(Vec<TargetResult>),
    TestFailures(Vec<TargetResult>),
    Stats(JobStats),
    Output(String),
}

impl Resource {
    /// Decode a JSON results document into the shape `kind` expects.
    pub fn decode(kind: ResourceKind, body: &str) -> Result<Resource, WatchError> {
        Ok(match kind {
            ResourceKind::Builds => Resource::Builds(serde_json::from_str(body)?),
            ResourceKind::Tests => Resource::Tests(serde_json::from_str(body)?),
            ResourceKind::BuildFailures => Resource::BuildFailures(serde_json::from_str(body)?),
            ResourceKind::TestFailures => Resource::TestFailures(serde_json::from_str(body)?),
            ResourceKind::Stats => Resource::Stats(serde_json::from_str(body)?),
            ResourceKind::Output => Resource::Output(body.to_string()),
        })
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Builds(_) => ResourceKind::Builds,
            Resource::Tests(_) => ResourceKind::Tests,
            Resource::BuildFailures(_) => ResourceKind::BuildFailures,
            Resource::TestFailures(_) => ResourceKind::TestFailures,
            Resource::Stats(_) => ResourceKind::Stats,
            Resource::Output(_) => ResourceKind::Output,
        }
    }
}

/// Result family used in per-application URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    Builds,
    Tests,
}

impl ResultType {
    /// Directory name under `/results/{uid}/output/`.
    pub fn output_dir(&self) -> &'static str {
        match self {
            ResultType::Builds => "compile",
            ResultType::Tests => "run_test",
        }
    }
}

impl FromStr for ResultType {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "builds" => Ok(ResultType::Builds),
            "tests" => Ok(ResultType::Tests),
            other => Err(WatchError::InvalidRequest(format!(
                "Unknown result type: {}",
                other
            ))),
        }
    }
}
