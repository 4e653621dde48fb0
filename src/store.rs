use std::collections::HashSet;
use tracing::warn;

use crate::model::Job;

/// The last fetched job collection of one view, kept in server order.
#[derive(Debug, Default, Clone)]
pub struct SnapshotStore {
    jobs: Vec<Job>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a freshly fetched collection and return the uids that are no
    /// longer present, so callers can drop state keyed by them.
    pub fn replace(&mut self, jobs: Vec<Job>) -> Vec<String> {
        for job in &jobs {
            if let Err(e) = job.origin() {
                warn!("Mirroring inconsistent job: {}", e);
            }
        }

        let incoming: HashSet<&str> = jobs.iter().map(|j| j.uid.as_str()).collect();
        let removed = self
            .jobs
            .iter()
            .filter(|j| !incoming.contains(j.uid.as_str()))
            .map(|j| j.uid.clone())
            .collect();

        self.jobs = jobs;
        removed
    }

    pub fn find(&self, uid: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.uid == uid)
    }

    pub fn find_mut(&mut self, uid: &str) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.uid == uid)
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.find(uid).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
