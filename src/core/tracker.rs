use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::error::TrackerError;
use super::export::{self, ExportFormat};
use super::models::ScanJob;
use super::poller::{PollPolicy, PollScheduler, TickReport};
use super::store::JobStore;
use super::validator::validate_domain;
use crate::client::ScanBackend;

/// Tracks submitted scans until the scan service reports a result.
///
/// Ties together validation, the scan service client, the job store and the
/// poll loop. Dropping the tracker stops polling; [`ScanTracker::shutdown`]
/// also waits for the loop to exit and closes the store.
pub struct ScanTracker {
    backend: Arc<dyn ScanBackend>,
    store: JobStore,
    scheduler: PollScheduler,
}

impl ScanTracker {
    pub fn new(backend: Arc<dyn ScanBackend>, policy: PollPolicy) -> Self {
        let store = JobStore::new();
        let scheduler = PollScheduler::new(store.clone(), Arc::clone(&backend), policy);
        Self {
            backend,
            store,
            scheduler,
        }
    }

    /// Validate `domain`, submit it, and start tracking the new job.
    pub async fn submit(&self, domain: &str) -> Result<ScanJob, TrackerError> {
        let domain = validate_domain(domain)?;

        let ticket = self.backend.submit(domain).await?;
        let job = ScanJob::pending(ticket, domain);
        self.store.insert(job.clone()).await?;

        info!(job_id = %job.id, domain = %job.domain, "Scan submitted");
        Ok(job)
    }

    /// Replace the tracked set with the scan service's full list.
    ///
    /// On failure the current jobs are left as they are.
    pub async fn refresh(&self) -> Result<usize, TrackerError> {
        let jobs = match self.backend.fetch_all().await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(error = %e, "Refresh failed, keeping current jobs");
                return Err(e);
            }
        };

        let count = self.store.replace_all(jobs).await;
        info!(count, "Job list refreshed");
        Ok(count)
    }

    /// Start background polling.
    pub fn start(&mut self) {
        self.scheduler.start();
    }

    /// Run one poll pass immediately.
    pub async fn poll_now(&self) -> TickReport {
        self.scheduler.tick().await
    }

    /// Stop polling and close the store. Late poll answers are discarded.
    pub async fn shutdown(&mut self) {
        self.scheduler.stop().await;
        self.store.close().await;
        info!("Tracker shut down");
    }

    /// Wait until job `id` reaches a terminal status.
    pub async fn wait_for(&self, id: &str) -> Result<ScanJob, TrackerError> {
        let mut changes = self.store.subscribe();
        loop {
            match self.store.get(id).await {
                Some(job) if job.is_terminal() => return Ok(job),
                Some(_) => {}
                None => return Err(TrackerError::UnknownJob(id.to_string())),
            }
            if self.store.is_closed().await {
                return Err(TrackerError::Closed);
            }
            if changes.changed().await.is_err() {
                return Err(TrackerError::Closed);
            }
        }
    }

    pub async fn snapshot(&self) -> Vec<ScanJob> {
        self.store.snapshot().await
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn is_polling(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Export the current snapshot to `path`.
    pub async fn export_to_file(
        &self,
        path: &Path,
        format: ExportFormat,
    ) -> Result<usize, TrackerError> {
        let jobs = self.store.snapshot().await;
        let written = export::export_to_file(path, &jobs, format)?;
        info!(path = %path.display(), rows = written, "Scans exported");
        Ok(written)
    }
}
