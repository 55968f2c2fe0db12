//! In-memory store of tracked scan jobs.
//!
//! This is the single owner of the job list. Everything that changes it goes
//! through `insert`, `merge` or `replace_all`; readers take `snapshot()`
//! clones. The list is kept newest first and a merge updates a record in
//! place, so display order never shifts under the user.
//!
//! The store is cheap to clone and shared between the UI and the poll loop.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{RwLock, watch};
use tracing::{debug, warn};

use super::error::TrackerError;
use super::models::{JobStatus, JobUpdate, ScanJob};

/// What a call to [`JobStore::merge`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A pending job moved to the update's terminal status.
    Applied,
    /// The job was already terminal; nothing changed.
    AlreadyTerminal,
    /// The update reported the job as still pending; nothing changed.
    StillPending,
    /// No job with this id is tracked, e.g. it was dropped by a refresh.
    UnknownJob,
    /// The store has been closed; the update was thrown away.
    Discarded,
}

#[derive(Default)]
struct StoreInner {
    jobs: Vec<ScanJob>,
    generation: u64,
    closed: bool,
}

impl StoreInner {
    fn position(&self, id: &str) -> Option<usize> {
        self.jobs.iter().position(|job| job.id == id)
    }
}

/// Thread-safe ordered collection of [`ScanJob`]s.
#[derive(Clone)]
pub struct JobStore {
    inner: Arc<RwLock<StoreInner>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
            revision: Arc::new(revision),
        }
    }

    /// Track a newly submitted job at the head of the list.
    pub async fn insert(&self, job: ScanJob) -> Result<(), TrackerError> {
        let mut inner = self.inner.write().await;
        if inner.closed {
            return Err(TrackerError::Closed);
        }
        if inner.position(&job.id).is_some() {
            return Err(TrackerError::DuplicateId(job.id));
        }

        debug!(job_id = %job.id, domain = %job.domain, "Tracking new job");
        inner.jobs.insert(0, job);
        self.bump();
        Ok(())
    }

    /// Apply a status update to the job with the same id.
    ///
    /// Only `pending -> terminal` transitions are applied. Repeating an update,
    /// or sending a different terminal update for a resolved job, is a no-op.
    pub async fn merge(&self, update: JobUpdate) -> MergeOutcome {
        let mut inner = self.inner.write().await;
        if inner.closed {
            return MergeOutcome::Discarded;
        }

        let Some(idx) = inner.position(&update.id) else {
            debug!(job_id = %update.id, "Update for untracked job ignored");
            return MergeOutcome::UnknownJob;
        };

        let job = &mut inner.jobs[idx];
        if job.is_terminal() {
            return MergeOutcome::AlreadyTerminal;
        }
        if update.status == JobStatus::Pending {
            return MergeOutcome::StillPending;
        }

        job.status = update.status;
        job.result = update.result;
        job.completed_at = Some(update.completed_at.unwrap_or_else(Utc::now));
        if update.summary.is_some() {
            job.summary = update.summary;
        }
        debug!(job_id = %job.id, status = %job.status, "Job resolved");

        self.bump();
        MergeOutcome::Applied
    }

    /// Drop the current list and adopt `jobs` in the given order.
    ///
    /// Returns the number of jobs now tracked. If `jobs` repeats an id, only
    /// the first occurrence is kept.
    pub async fn replace_all(&self, jobs: Vec<ScanJob>) -> usize {
        let mut inner = self.inner.write().await;
        if inner.closed {
            return 0;
        }

        let mut seen = HashSet::with_capacity(jobs.len());
        let mut adopted = Vec::with_capacity(jobs.len());
        for job in jobs {
            if seen.insert(job.id.clone()) {
                adopted.push(job);
            } else {
                warn!(job_id = %job.id, "Duplicate job id in refreshed list, keeping first");
            }
        }

        inner.jobs = adopted;
        inner.generation += 1;
        let count = inner.jobs.len();
        self.bump();
        count
    }

    /// Ordered copy of every tracked job.
    pub async fn snapshot(&self) -> Vec<ScanJob> {
        self.inner.read().await.jobs.clone()
    }

    /// Ordered copy of the jobs still waiting on the scan service.
    pub async fn pending(&self) -> Vec<ScanJob> {
        let inner = self.inner.read().await;
        inner
            .jobs
            .iter()
            .filter(|job| !job.is_terminal())
            .cloned()
            .collect()
    }

    pub async fn get(&self, id: &str) -> Option<ScanJob> {
        let inner = self.inner.read().await;
        inner.jobs.iter().find(|job| job.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.jobs.is_empty()
    }

    /// Number of `replace_all` calls so far.
    pub async fn generation(&self) -> u64 {
        self.inner.read().await.generation
    }

    /// Subscribe to a counter that moves on every effective change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Current value of the change counter.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Tear the store down. Later merges are discarded and inserts fail.
    pub async fn close(&self) {
        let mut inner = self.inner.write().await;
        inner.closed = true;
        drop(inner);
        // Wake waiters so they can observe the closed state.
        self.bump();
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.read().await.closed
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}
