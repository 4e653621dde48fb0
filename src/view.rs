//! Per-view state and the reducer that applies deltas to it.
//!
//! `ViewState` is only ever mutated by its owning view task. Every mutation
//! goes through a method here and reports an [`Effect`] the task carries out;
//! nothing in this module touches the network.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, trace};

use crate::error::WatchError;
use crate::events::DeltaEvent;
use crate::loader::{LoadOutcome, Slot, SubResourceCache};
use crate::model::{Job, ResourceKind};
use crate::projector::{self, Projection};
use crate::query::JobQuery;
use crate::store::SnapshotStore;
use crate::supervisor::{ConnectionState, SupervisorEvent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ViewKind {
    /// Pull request jobs, grouped by state on the backend.
    Dashboard,
    /// Every job, filterable.
    List,
    /// One job with its results.
    Job { uid: String },
}

impl ViewKind {
    /// Only the detail view loads result documents.
    pub fn wants_results(&self) -> bool {
        matches!(self, ViewKind::Job { .. })
    }

    pub fn default_query(&self, page_size: usize) -> JobQuery {
        match self {
            ViewKind::Dashboard => JobQuery::pull_requests(page_size),
            ViewKind::List => JobQuery::all_states(page_size),
            ViewKind::Job { .. } => JobQuery::new(1),
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewKind::Dashboard => f.write_str("dashboard"),
            ViewKind::List => f.write_str("list"),
            ViewKind::Job { uid } => write!(f, "job:{}", uid),
        }
    }
}

impl FromStr for ViewKind {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dashboard" => Ok(ViewKind::Dashboard),
            "list" => Ok(ViewKind::List),
            other => match other.strip_prefix("job:") {
                Some(uid) if !uid.is_empty() => Ok(ViewKind::Job {
                    uid: uid.to_string(),
                }),
                _ => Err(WatchError::InvalidRequest(format!(
                    "Unknown view '{}' (expected dashboard, list or job:<uid>)",
                    other
                ))),
            },
        }
    }
}

/// A sub-resource request the view task should issue.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub job: Job,
    pub kind: ResourceKind,
}

/// Follow-up work produced by a state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    /// Discard the snapshot and fetch it again.
    Refetch,
    /// Fetch these sub-resources. Their cache slots are already reserved.
    Load(Vec<LoadRequest>),
}

#[derive(Debug, Clone)]
pub struct ViewState {
    pub kind: ViewKind,
    pub query: JobQuery,
    pub snapshot: SnapshotStore,
    pub cache: SubResourceCache,
    pub connection: ConnectionState,
    /// Set after the first fetch attempt completes, successful or not.
    pub fetched: bool,
    pub loading: bool,
    pub last_error: Option<String>,
    pub track_output: bool,
    pub output_cap: Option<usize>,
}

impl ViewState {
    pub fn new(kind: ViewKind, page_size: usize) -> Self {
        let query = kind.default_query(page_size);
        ViewState {
            kind,
            query,
            snapshot: SnapshotStore::new(),
            cache: SubResourceCache::new(),
            connection: ConnectionState::Connecting,
            fetched: false,
            loading: false,
            last_error: None,
            track_output: true,
            output_cap: None,
        }
    }

    pub fn with_output_cap(mut self, cap: Option<usize>) -> Self {
        self.output_cap = cap;
        self
    }

    /// Apply one server-pushed delta.
    pub fn apply(&mut self, event: &DeltaEvent) -> Effect {
        match event {
            DeltaEvent::Reload => Effect::Refetch,
            DeltaEvent::Status { uid, status } => {
                if !self.fetched {
                    return Effect::None;
                }
                match self.snapshot.find_mut(uid) {
                    Some(job) => job.status = Some(status.clone()),
                    None => trace!("Status for unknown job {}", uid),
                }
                Effect::None
            }
            DeltaEvent::Output { uid, line } => {
                if !self.fetched || !self.track_output {
                    return Effect::None;
                }
                match self.snapshot.find_mut(uid) {
                    Some(job) => {
                        let output = job.output.get_or_insert_with(String::new);
                        output.push_str(line);
                        if let Some(cap) = self.output_cap {
                            keep_tail(output, cap);
                        }
                    }
                    None => trace!("Output for unknown job {}", uid),
                }
                Effect::None
            }
            DeltaEvent::Unknown => Effect::None,
        }
    }

    /// React to a connection lifecycle change or forward a delta.
    pub fn handle(&mut self, event: &SupervisorEvent) -> Effect {
        match event {
            SupervisorEvent::Connected { reconnect } => {
                self.connection = ConnectionState::Connected;
                if *reconnect {
                    debug!("Reconnected, refetching {}", self.kind);
                    Effect::Refetch
                } else {
                    Effect::None
                }
            }
            SupervisorEvent::Disconnected => {
                self.connection = ConnectionState::Disconnected;
                Effect::None
            }
            SupervisorEvent::Delta(delta) => self.apply(delta),
        }
    }

    pub fn begin_fetch(&mut self) {
        self.loading = true;
    }

    /// Swap in a fresh snapshot, drop cache entries of departed jobs and
    /// reserve the loads the new snapshot calls for.
    pub fn replace_snapshot(&mut self, jobs: Vec<Job>) -> Effect {
        let removed = self.snapshot.replace(jobs);
        if !removed.is_empty() {
            let snapshot = &self.snapshot;
            self.cache.retain(|uid| snapshot.contains(uid));
        }
        self.fetched = true;
        self.loading = false;
        self.last_error = None;

        let requests = self.pending_loads();
        if requests.is_empty() {
            Effect::None
        } else {
            Effect::Load(requests)
        }
    }

    /// Keep the stale snapshot and record the failure.
    pub fn fetch_failed(&mut self, error: &WatchError) {
        self.fetched = true;
        self.loading = false;
        self.last_error = Some(error.to_string());
    }

    pub fn complete_load(&mut self, uid: &str, kind: ResourceKind, outcome: LoadOutcome) -> bool {
        self.cache.complete(uid, kind, outcome)
    }

    fn pending_loads(&mut self) -> Vec<LoadRequest> {
        let mut requests = Vec::new();
        for job in self.snapshot.iter() {
            for kind in wanted_kinds(&self.kind, job) {
                if self.cache.begin(&job.uid, kind) {
                    requests.push(LoadRequest {
                        job: job.clone(),
                        kind,
                    });
                }
            }
        }
        requests
    }

    /// Finished jobs shown against the current limit.
    pub fn finished_count(&self) -> usize {
        self.snapshot.iter().filter(|j| j.state.is_finished()).count()
    }

    /// Jobs counted against the page limit. The dashboard pages over its
    /// finished column only; the list pages over every job it shows.
    fn paged_count(&self) -> Option<usize> {
        match self.kind {
            ViewKind::Dashboard => Some(self.finished_count()),
            ViewKind::List => Some(self.snapshot.len()),
            ViewKind::Job { .. } => None,
        }
    }

    /// "Show more" is offered while a full page is shown.
    pub fn can_show_more(&self) -> bool {
        self.paged_count()
            .is_some_and(|count| count >= self.query.limit)
    }

    /// Grow the page by `step` jobs.
    pub fn show_more(&mut self, step: usize) -> Effect {
        match self.paged_count() {
            Some(count) => {
                self.query.limit = count + step;
                Effect::Refetch
            }
            None => Effect::None,
        }
    }

    /// Replace the filters and fetch again.
    pub fn search(&mut self, query: JobQuery) -> Effect {
        if matches!(self.kind, ViewKind::Job { .. }) {
            return Effect::None;
        }
        self.query = query;
        Effect::Refetch
    }

    pub fn render(&self) -> RenderedView {
        let jobs = self
            .snapshot
            .iter()
            .map(|job| RenderedJob {
                projection: projector::project_job(job),
                resources: self
                    .cache
                    .slots_for(&job.uid)
                    .into_iter()
                    .map(|(kind, slot)| (kind, slot.clone()))
                    .collect(),
                job: job.clone(),
            })
            .collect();

        RenderedView {
            kind: self.kind.clone(),
            query: self.query.clone(),
            connection: self.connection,
            fetched: self.fetched,
            loading: self.loading,
            error: self.last_error.clone(),
            can_show_more: self.can_show_more(),
            jobs,
        }
    }
}

/// Sub-resources a job in this kind of view should have loaded.
fn wanted_kinds(view: &ViewKind, job: &Job) -> Vec<ResourceKind> {
    if !view.wants_results() {
        return Vec::new();
    }
    let mut kinds = Vec::new();
    if job.state.has_final_results() {
        kinds.extend(ResourceKind::RESULTS);
    }
    let has_live_output = job.output.as_deref().is_some_and(|o| !o.is_empty());
    if job.state.is_finished() && !has_live_output && job.output_text_url.is_some() {
        kinds.push(ResourceKind::Output);
    }
    kinds
}

/// Drop leading bytes so at most `cap` remain, cutting on a char boundary.
pub fn keep_tail(text: &mut String, cap: usize) {
    if text.len() <= cap {
        return;
    }
    let mut start = text.len() - cap;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text.drain(..start);
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedJob {
    #[serde(flatten)]
    pub job: Job,
    pub projection: Projection,
    pub resources: BTreeMap<ResourceKind, Slot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedView {
    pub kind: ViewKind,
    pub query: JobQuery,
    pub connection: ConnectionState,
    pub fetched: bool,
    pub loading: bool,
    pub error: Option<String>,
    pub can_show_more: bool,
    pub jobs: Vec<RenderedJob>,
}
