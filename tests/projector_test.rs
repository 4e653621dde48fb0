use jobwatch::model::{Commit, Job, JobState, JobStatus, PrInfo};
use jobwatch::projector::{badge, humanize, humanize_relative, progress_percent, project, project_job, title};

fn pr_job(state: JobState, status: Option<JobStatus>) -> Job {
    Job {
        uid: "5f1d1e7a9c2b4d0e8f3a6b7c8d9e0f1a".to_string(),
        state,
        commit: Commit {
            sha: "0123456789abcdef0123456789abcdef01234567".to_string(),
            author: "alice".to_string(),
            message: "boards: add foo".to_string(),
        },
        prinfo: Some(PrInfo {
            number: 17234,
            title: "boards: add foo".to_string(),
            url: None,
            labels: vec![],
            state: None,
            is_merged: None,
            user: None,
        }),
        git_ref: None,
        status,
        output: None,
        output_text_url: None,
        runtime: None,
        creation_time: None,
        since: None,
        triggered_by: None,
        trigger: None,
        fasttracked: None,
        env: None,
    }
}

#[test]
fn test_progress_rounds_half_up() {
    assert_eq!(progress_percent(103, 123), 84);
    assert_eq!(progress_percent(1, 8), 13); // 12.5
    assert_eq!(progress_percent(0, 10), 0);
    assert_eq!(progress_percent(10, 10), 100);
}

#[test]
fn test_progress_zero_total() {
    assert_eq!(progress_percent(0, 0), 0);

    let job = pr_job(JobState::Running, Some(JobStatus::counting(0, 0, 0)));
    let p = project_job(&job);
    assert!(p.is_build_in_progress);
    assert_eq!(p.progress_percent, 0);
}

#[test]
fn test_in_progress_requires_consistent_counts() {
    let job = pr_job(JobState::Running, Some(JobStatus::counting(123, 101, 2)));
    let p = project_job(&job);
    assert!(p.is_build_in_progress);
    assert_eq!(p.progress_percent, 84);
    assert_eq!(p.counts_text.as_deref(), Some("fail: 2 pass: 101 done: 103/123"));

    let job = pr_job(JobState::Running, Some(JobStatus::counting(10, 5, 6)));
    let p = project_job(&job);
    assert!(!p.is_build_in_progress);
    assert_eq!(p.progress_percent, 0);
    assert!(p.counts_text.is_none());
}

#[test]
fn test_missing_counter_is_not_in_progress() {
    let status = JobStatus {
        total: Some(10),
        passed: Some(3),
        failed: None,
        ..Default::default()
    };
    let job = pr_job(JobState::Running, Some(status));
    assert!(!project_job(&job).is_build_in_progress);
}

#[test]
fn test_descriptive_status() {
    let job = pr_job(JobState::Running, Some(JobStatus::descriptive("collecting jobs")));
    let p = project_job(&job);
    assert!(!p.is_build_in_progress);
    assert_eq!(p.status_text.as_deref(), Some("collecting jobs"));
    assert!(p.eta_text.is_none());
}

#[test]
fn test_eta_only_while_in_progress() {
    let mut status = JobStatus::counting(10, 2, 0);
    status.eta = Some(300.0);
    let job = pr_job(JobState::Running, Some(status));
    assert_eq!(project_job(&job).eta_text.as_deref(), Some("in 5 minutes"));

    let mut status = JobStatus::descriptive("canceled");
    status.eta = Some(300.0);
    let job = pr_job(JobState::Stopped, Some(status));
    assert!(project_job(&job).eta_text.is_none());
}

#[test]
fn test_projection_is_idempotent() {
    let mut status = JobStatus::counting(50, 20, 3);
    status.eta = Some(95.5);
    let mut job = pr_job(JobState::Running, Some(status.clone()));
    job.runtime = Some(4000.0);

    let first = project(&job, Some(&status));
    for _ in 0..10 {
        assert_eq!(project(&job, Some(&status)), first);
    }
}

#[test]
fn test_runtime_hidden_while_running() {
    let mut job = pr_job(JobState::Running, None);
    job.runtime = Some(7200.0);
    assert!(project_job(&job).runtime_text.is_none());

    job.state = JobState::Passed;
    assert_eq!(project_job(&job).runtime_text.as_deref(), Some("2 hours"));
}

#[test]
fn test_badges() {
    assert_eq!(badge(JobState::Errored).label, "Failed");
    assert_eq!(badge(JobState::Errored).color, "danger");
    assert_eq!(badge(JobState::Passed).label, "Success");
    assert_eq!(badge(JobState::Queued).color, "info");
    assert_eq!(badge(JobState::Running).color, "warning");
    assert_eq!(badge(JobState::Stopped).label, "Stopped");
    assert_eq!(badge(JobState::Stopped).color, "secondary");
}

#[test]
fn test_titles() {
    let job = pr_job(JobState::Queued, None);
    assert_eq!(title(&job), "PR #17234: boards: add foo");

    let mut job = pr_job(JobState::Queued, None);
    job.prinfo = None;
    job.git_ref = Some("refs/heads/feature/net".to_string());
    assert_eq!(title(&job), "feature/net");

    job.git_ref = Some("refs/tags/2024.01".to_string());
    assert_eq!(title(&job), "2024.01");

    job.git_ref = Some("a-very-long-bare-ref-name".to_string());
    assert_eq!(title(&job), "a-very-long-bar");
}

#[test]
fn test_inconsistent_job_title_falls_back_to_sha() {
    let mut job = pr_job(JobState::Queued, None);
    job.git_ref = Some("refs/heads/main".to_string());
    assert_eq!(title(&job), "0123456");
    assert_eq!(project_job(&job).short_sha, "0123456");
}

#[test]
fn test_humanize_thresholds() {
    assert_eq!(humanize(10.0), "a few seconds");
    assert_eq!(humanize(50.0), "a minute");
    assert_eq!(humanize(300.0), "5 minutes");
    assert_eq!(humanize(3000.0), "an hour");
    assert_eq!(humanize(3.0 * 3600.0), "3 hours");
    assert_eq!(humanize(23.0 * 3600.0), "a day");
    assert_eq!(humanize(3.0 * 86_400.0), "3 days");
    assert_eq!(humanize(30.0 * 86_400.0), "a month");
    assert_eq!(humanize(90.0 * 86_400.0), "3 months");
    assert_eq!(humanize(365.0 * 86_400.0), "a year");
    assert_eq!(humanize(3.0 * 365.0 * 86_400.0), "3 years");
}

#[test]
fn test_humanize_relative_direction() {
    assert_eq!(humanize_relative(120.0), "in 2 minutes");
    assert_eq!(humanize_relative(-120.0), "2 minutes ago");
    assert_eq!(humanize_relative(0.0), "a few seconds ago");
}

#[test]
fn test_status_delta_to_complete_counts() {
    let mut job = pr_job(JobState::Running, Some(JobStatus::counting(10, 3, 1)));
    let before = project_job(&job);
    assert!(before.is_build_in_progress);
    assert_eq!(before.progress_percent, 40);

    // 10 >= 10 + 0 still satisfies the counting rule.
    job.status = Some(JobStatus::counting(10, 10, 0));
    let after = project_job(&job);
    assert!(after.is_build_in_progress);
    assert_eq!(after.progress_percent, 100);
    assert_eq!(after.counts_text.as_deref(), Some("fail: 0 pass: 10 done: 10/10"));
}
