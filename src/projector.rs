//! Presentation state derived from a job and its latest status.
//!
//! Everything here is a pure function of its arguments: no clock reads, no
//! shared state. Views re-project after every delta.

use serde::Serialize;

use crate::model::{ref_repr, Job, JobOrigin, JobState, JobStatus, StatusPhase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub label: &'static str,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub is_build_in_progress: bool,
    pub progress_percent: u32,
    pub eta_text: Option<String>,
    pub counts_text: Option<String>,
    pub status_text: Option<String>,
    pub runtime_text: Option<String>,
    pub badge: Badge,
    pub title: String,
    pub short_sha: String,
}

pub fn badge(state: JobState) -> Badge {
    let (label, color) = match state {
        JobState::Errored => ("Failed", "danger"),
        JobState::Passed => ("Success", "success"),
        JobState::Queued => ("Queued", "info"),
        JobState::Running => ("Running", "warning"),
        JobState::Stopped => ("Stopped", "secondary"),
    };
    Badge { label, color }
}

/// Project a job using its embedded status.
pub fn project_job(job: &Job) -> Projection {
    project(job, job.status.as_ref())
}

/// Project a job against an explicit status, which may be newer than the one
/// embedded in the job.
pub fn project(job: &Job, status: Option<&JobStatus>) -> Projection {
    let phase = status.map(JobStatus::phase).unwrap_or(StatusPhase::Empty);

    let mut projection = Projection {
        is_build_in_progress: false,
        progress_percent: 0,
        eta_text: None,
        counts_text: None,
        status_text: None,
        runtime_text: None,
        badge: badge(job.state),
        title: title(job),
        short_sha: job.short_sha().to_string(),
    };

    match phase {
        StatusPhase::Counting {
            total,
            passed,
            failed,
            eta,
        } => {
            let done = passed + failed;
            projection.is_build_in_progress = true;
            projection.progress_percent = progress_percent(done, total);
            projection.counts_text = Some(format!(
                "fail: {} pass: {} done: {}/{}",
                failed, passed, done, total
            ));
            projection.eta_text = eta.map(humanize_relative);
        }
        StatusPhase::Descriptive(text) => {
            projection.status_text = Some(text.to_string());
        }
        StatusPhase::Empty => {}
    }

    if job.state != JobState::Running {
        projection.runtime_text = job.runtime.map(humanize);
    }

    projection
}

/// `round(done * 100 / total)` with halves rounded up; 0 for an empty total.
pub fn progress_percent(done: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    let scaled = (done as u128 * 200 + total as u128) / (2 * total as u128);
    scaled.min(100) as u32
}

pub fn title(job: &Job) -> String {
    match job.origin() {
        Ok(JobOrigin::PullRequest(pr)) => format!("PR #{}: {}", pr.number, pr.title),
        Ok(JobOrigin::Ref(r)) => ref_repr(r),
        Err(_) => job.short_sha().to_string(),
    }
}

/// "in 5 minutes" for positive offsets, "5 minutes ago" otherwise.
pub fn humanize_relative(seconds: f64) -> String {
    let text = humanize(seconds);
    if seconds > 0.0 {
        format!("in {}", text)
    } else {
        format!("{} ago", text)
    }
}

/// Humanize a duration in seconds, ignoring its sign ("a few seconds",
/// "an hour", "3 days").
pub fn humanize(seconds: f64) -> String {
    let abs = seconds.abs();
    let secs = round_half_up(abs);
    let minutes = round_half_up(abs / 60.0);
    let hours = round_half_up(abs / 3600.0);
    let days_exact = abs / 86_400.0;
    let days = round_half_up(days_exact);
    let months_exact = days_exact * 4800.0 / 146_097.0;
    let months = round_half_up(months_exact);
    let years = round_half_up(months_exact / 12.0);

    if secs < 45 {
        "a few seconds".to_string()
    } else if minutes <= 1 {
        "a minute".to_string()
    } else if minutes < 45 {
        format!("{} minutes", minutes)
    } else if hours <= 1 {
        "an hour".to_string()
    } else if hours < 22 {
        format!("{} hours", hours)
    } else if days <= 1 {
        "a day".to_string()
    } else if days < 26 {
        format!("{} days", days)
    } else if months <= 1 {
        "a month".to_string()
    } else if months < 11 {
        format!("{} months", months)
    } else if years <= 1 {
        "a year".to_string()
    } else {
        format!("{} years", years)
    }
}

fn round_half_up(value: f64) -> u64 {
    (value + 0.5).floor() as u64
}
