use serde::{Deserialize, Serialize};

use crate::model::JobState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    #[default]
    All,
    Pr,
    Branch,
    Tag,
}

/// Filters and page size sent with `GET /jobs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobQuery {
    pub limit: usize,
    /// `None` leaves state filtering to the server.
    #[serde(default)]
    pub states: Option<Vec<JobState>>,
    #[serde(default)]
    pub job_type: JobType,
    #[serde(default)]
    pub prnum: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}

impl JobQuery {
    pub fn new(limit: usize) -> Self {
        JobQuery {
            limit,
            states: None,
            job_type: JobType::All,
            prnum: None,
            branch: None,
            tag: None,
            sha: None,
            author: None,
        }
    }

    /// The list view's defaults: every state, every job type.
    pub fn all_states(limit: usize) -> Self {
        JobQuery {
            states: Some(JobState::ALL.to_vec()),
            ..JobQuery::new(limit)
        }
    }

    /// The dashboard's defaults: pull requests only.
    pub fn pull_requests(limit: usize) -> Self {
        JobQuery {
            job_type: JobType::Pr,
            ..JobQuery::new(limit)
        }
    }

    /// Toggle one state in or out of the filter.
    pub fn toggle_state(&mut self, state: JobState) {
        let states = self.states.get_or_insert_with(|| JobState::ALL.to_vec());
        if let Some(pos) = states.iter().position(|s| *s == state) {
            states.remove(pos);
        } else {
            states.push(state);
        }
    }

    /// Query pairs in the order the backend documents them. Name filters only
    /// apply to their own job type; sha and author apply to every type.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("limit", self.limit.to_string())];

        if let Some(states) = &self.states {
            // Form encoding turns the spaces into the `+` separator.
            let joined = states
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            pairs.push(("states", joined));
        }

        match self.job_type {
            JobType::All => {}
            JobType::Pr => pairs.push(("is_pr", "true".to_string())),
            JobType::Branch => pairs.push(("is_branch", "true".to_string())),
            JobType::Tag => pairs.push(("is_tag", "true".to_string())),
        }

        let scoped = match self.job_type {
            JobType::Pr => non_empty(&self.prnum).map(|v| ("prnum", v)),
            JobType::Branch => non_empty(&self.branch).map(|v| ("branch", v)),
            JobType::Tag => non_empty(&self.tag).map(|v| ("tag", v)),
            JobType::All => None,
        };
        pairs.extend(scoped);

        if let Some(sha) = non_empty(&self.sha) {
            pairs.push(("sha", sha));
        }
        if let Some(author) = non_empty(&self.author) {
            pairs.push(("author", author));
        }

        pairs
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
