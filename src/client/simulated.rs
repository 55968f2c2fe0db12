use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ClientError, ScanBackend};
use crate::core::{JobStatus, JobUpdate, ScanJob, ScanTicket, TrackerError};

/// How a simulated scan should end.
#[derive(Debug, Clone)]
pub enum SimulatedOutcome {
    Complete(Value),
    Fail(String),
}

#[derive(Default)]
struct SimState {
    // Submission order, oldest first, like the real service's table.
    scans: Vec<ScanJob>,
    auto_resolve: Option<Duration>,
    latency: Option<Duration>,
    unreachable: bool,
    submit_calls: u32,
    list_calls: u32,
    status_calls: HashMap<String, u32>,
}

impl SimState {
    fn find_mut(&mut self, id: &str) -> Option<&mut ScanJob> {
        self.scans.iter_mut().find(|job| job.id == id)
    }
}

/// In-memory stand-in for the scan service.
///
/// Clones share state, so a test can keep one handle to steer outcomes while
/// the tracker owns another.
#[derive(Clone, Default)]
pub struct SimulatedBackend {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans finish on their own once `delay` has passed since submission.
    pub fn with_auto_resolve(delay: Duration) -> Self {
        let state = SimState {
            auto_resolve: Some(delay),
            ..SimState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Delay every call by `latency` before answering.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        self.state.lock().await.latency = latency;
    }

    /// Make every call fail with a transport error until switched back.
    pub async fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().await.unreachable = unreachable;
    }

    /// Finish a pending scan. Returns false if the id is unknown or already done.
    pub async fn resolve(&self, id: &str, outcome: SimulatedOutcome) -> bool {
        let mut state = self.state.lock().await;
        match state.find_mut(id) {
            Some(job) if !job.is_terminal() => {
                apply_outcome(job, outcome);
                true
            }
            _ => false,
        }
    }

    /// Drop a scan so it answers 404 from now on.
    pub async fn forget(&self, id: &str) -> bool {
        let mut state = self.state.lock().await;
        let before = state.scans.len();
        state.scans.retain(|job| job.id != id);
        state.scans.len() != before
    }

    /// Add a scan directly, bypassing `submit`.
    pub async fn seed(&self, job: ScanJob) {
        self.state.lock().await.scans.push(job);
    }

    pub async fn submit_calls(&self) -> u32 {
        self.state.lock().await.submit_calls
    }

    pub async fn list_calls(&self) -> u32 {
        self.state.lock().await.list_calls
    }

    pub async fn status_calls(&self, id: &str) -> u32 {
        let state = self.state.lock().await;
        state.status_calls.get(id).copied().unwrap_or(0)
    }

    pub async fn total_status_calls(&self) -> u32 {
        self.state.lock().await.status_calls.values().sum()
    }

    async fn delay(&self) {
        let latency = self.state.lock().await.latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn apply_outcome(job: &mut ScanJob, outcome: SimulatedOutcome) {
    match outcome {
        SimulatedOutcome::Complete(result) => {
            job.status = JobStatus::Completed;
            job.result = Some(result);
            job.summary = Some(format!("Simulated scan of {}", job.domain));
        }
        SimulatedOutcome::Fail(message) => {
            job.status = JobStatus::Error;
            job.result = Some(json!({ "error": message }));
        }
    }
    job.completed_at = Some(Utc::now());
}

fn simulated_result(domain: &str) -> Value {
    json!({
        "subdomains": [format!("www.{}", domain), format!("mail.{}", domain)],
        "emails": [format!("admin@{}", domain)],
        "hosts": [],
    })
}

fn update_from(job: &ScanJob) -> JobUpdate {
    JobUpdate {
        id: job.id.clone(),
        status: job.status,
        result: job.result.clone(),
        completed_at: job.completed_at,
        summary: job.summary.clone(),
    }
}

fn due(created_at: DateTime<Utc>, delay: Duration) -> bool {
    Utc::now()
        .signed_duration_since(created_at)
        .to_std()
        .map(|elapsed| elapsed >= delay)
        .unwrap_or(false)
}

#[async_trait]
impl ScanBackend for SimulatedBackend {
    async fn submit(&self, domain: &str) -> Result<ScanTicket, TrackerError> {
        self.delay().await;
        let mut state = self.state.lock().await;
        state.submit_calls += 1;
        if state.unreachable {
            return Err(TrackerError::Submission(ClientError::Unavailable));
        }

        let ticket = ScanTicket {
            id: Uuid::now_v7().to_string(),
            started_at: Utc::now(),
        };
        state.scans.push(ScanJob::pending(ticket.clone(), domain));
        Ok(ticket)
    }

    async fn fetch_status(&self, id: &str) -> Result<JobUpdate, TrackerError> {
        self.delay().await;
        let mut state = self.state.lock().await;
        *state.status_calls.entry(id.to_string()).or_default() += 1;
        if state.unreachable {
            return Err(TrackerError::Poll {
                id: id.to_string(),
                source: ClientError::Unavailable,
            });
        }

        let auto_resolve = state.auto_resolve;
        let job = state
            .find_mut(id)
            .ok_or_else(|| TrackerError::UnknownJob(id.to_string()))?;

        if let Some(delay) = auto_resolve {
            if !job.is_terminal() && due(job.created_at, delay) {
                let result = simulated_result(&job.domain);
                apply_outcome(job, SimulatedOutcome::Complete(result));
            }
        }

        Ok(update_from(job))
    }

    async fn fetch_all(&self) -> Result<Vec<ScanJob>, TrackerError> {
        self.delay().await;
        let mut state = self.state.lock().await;
        state.list_calls += 1;
        if state.unreachable {
            return Err(TrackerError::List(ClientError::Unavailable));
        }

        let mut jobs = state.scans.clone();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }
}
