//! Lazily fetched per-job result documents.
//!
//! Each `(uid, kind)` pair is requested at most once per mounted view. A slot
//! is reserved with [`SubResourceCache::begin`] before the request goes out so
//! concurrent triggers do not duplicate it, and filled by
//! [`SubResourceCache::complete`] when the answer arrives.

use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, warn};

use crate::client::CiClient;
use crate::error::WatchError;
use crate::model::{Job, Resource, ResourceKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "resource", rename_all = "snake_case")]
pub enum LoadOutcome {
    Loaded(Resource),
    /// The backend has no such document for this job.
    NotFound,
    /// The request failed; not retried while the view stays mounted.
    Unavailable,
}

impl LoadOutcome {
    /// Classify a fetch result. Absence is not an error.
    pub fn from_result(result: Result<Option<Resource>, WatchError>) -> Self {
        match result {
            Ok(Some(resource)) => LoadOutcome::Loaded(resource),
            Ok(None) => LoadOutcome::NotFound,
            Err(e) if e.is_absence() => LoadOutcome::NotFound,
            Err(e) => {
                warn!("Sub-resource unavailable: {}", e);
                LoadOutcome::Unavailable
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Slot {
    Pending,
    Ready { outcome: LoadOutcome },
}

/// Source of sub-resources. Implemented by [`CiClient`] and by test doubles.
pub trait ResourceFetcher: Send + Sync {
    fn fetch(
        &self,
        job: &Job,
        kind: ResourceKind,
    ) -> impl Future<Output = Result<Option<Resource>, WatchError>> + Send;
}

impl ResourceFetcher for CiClient {
    async fn fetch(&self, job: &Job, kind: ResourceKind) -> Result<Option<Resource>, WatchError> {
        match kind {
            ResourceKind::Output => match job.output_text_url.as_deref() {
                Some(url) => Ok(self.fetch_output_text(url).await?.map(Resource::Output)),
                None => Ok(None),
            },
            _ => self.fetch_resource(&job.uid, kind).await,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct SubResourceCache {
    slots: HashMap<(String, ResourceKind), Slot>,
}

impl SubResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the slot for `(uid, kind)`. Returns false when it is already
    /// pending or filled, in which case no request should be made.
    pub fn begin(&mut self, uid: &str, kind: ResourceKind) -> bool {
        let key = (uid.to_string(), kind);
        if self.slots.contains_key(&key) {
            return false;
        }
        self.slots.insert(key, Slot::Pending);
        true
    }

    /// Fill a pending slot. Completions for slots that were dropped in the
    /// meantime (the job left the snapshot) are discarded.
    pub fn complete(&mut self, uid: &str, kind: ResourceKind, outcome: LoadOutcome) -> bool {
        match self.slots.get_mut(&(uid.to_string(), kind)) {
            Some(slot @ Slot::Pending) => {
                *slot = Slot::Ready { outcome };
                true
            }
            Some(Slot::Ready { .. }) => false,
            None => {
                debug!("Discarding {} for departed job {}", kind, uid);
                false
            }
        }
    }

    pub fn slot(&self, uid: &str, kind: ResourceKind) -> Option<&Slot> {
        self.slots.get(&(uid.to_string(), kind))
    }

    pub fn get(&self, uid: &str, kind: ResourceKind) -> Option<&LoadOutcome> {
        match self.slot(uid, kind) {
            Some(Slot::Ready { outcome }) => Some(outcome),
            _ => None,
        }
    }

    pub fn is_pending(&self, uid: &str, kind: ResourceKind) -> bool {
        matches!(self.slot(uid, kind), Some(Slot::Pending))
    }

    /// All slots held for one job, in kind order.
    pub fn slots_for(&self, uid: &str) -> Vec<(ResourceKind, &Slot)> {
        let mut out: Vec<_> = self
            .slots
            .iter()
            .filter(|((u, _), _)| u == uid)
            .map(|((_, kind), slot)| (*kind, slot))
            .collect();
        out.sort_by_key(|(kind, _)| *kind);
        out
    }

    /// Keep only the entries whose uid satisfies `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.slots.retain(|(uid, _), _| keep(uid));
    }

    /// Drop every entry of one job.
    pub fn invalidate(&mut self, uid: &str) {
        self.retain(|u| u != uid);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Load `(job.uid, kind)` through `fetcher` unless it was already
    /// requested. Returns `None` while another request for it is pending.
    pub async fn ensure_loaded<F: ResourceFetcher>(
        &mut self,
        fetcher: &F,
        job: &Job,
        kind: ResourceKind,
    ) -> Option<LoadOutcome> {
        match self.slot(&job.uid, kind) {
            Some(Slot::Ready { outcome }) => return Some(outcome.clone()),
            Some(Slot::Pending) => return None,
            None => {}
        }

        self.begin(&job.uid, kind);
        let outcome = LoadOutcome::from_result(fetcher.fetch(job, kind).await);
        self.complete(&job.uid, kind, outcome.clone());
        Some(outcome)
    }
}
