//! Periodic reconciliation of pending jobs against the scan service.
//!
//! One loop for all jobs rather than a timer per job. Every tick re-reads the
//! store, asks the service about each pending job, and merges the answers one
//! at a time. Transient failures are logged and retried on the next tick.
//!
//! A job that never resolves is not polled forever: once it hits the attempt
//! cap or the pending age ceiling of its [`PollPolicy`] it is marked
//! `stalled` locally. Age is measured on the local clock from the first tick
//! that saw the job, never from the service's timestamps.
//!
//! Shutdown is cooperative. [`PollScheduler::stop`] cancels a token that the
//! loop checks before and after every network call; calls already on the wire
//! run to completion on their own but the tick stops waiting for them and
//! their answers are dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::TrackerError;
use super::models::{JobUpdate, ScanJob};
use super::store::{JobStore, MergeOutcome};
use crate::client::ScanBackend;
use crate::config::AppConfig;

/// Timing and give-up rules for the poll loop.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Status fetches allowed per job before it is marked stalled.
    pub max_attempts: Option<u32>,
    /// Time since the poller first saw a job after which it is marked stalled.
    pub max_pending_age: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: Some(40),
            max_pending_age: Some(Duration::from_secs(600)),
        }
    }
}

impl From<&AppConfig> for PollPolicy {
    fn from(config: &AppConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            // 0 turns a limit off.
            max_attempts: config.max_poll_attempts.filter(|n| *n > 0),
            max_pending_age: config
                .max_pending_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }
}

/// Counters for a single tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Status fetches issued
    pub polled: usize,
    /// Jobs that reached a terminal status from a poll answer
    pub resolved: usize,
    /// Jobs given up on by the policy
    pub stalled: usize,
    /// Transient fetch failures
    pub failed: usize,
    /// Jobs the service or the store did not recognise
    pub unknown: usize,
    /// Answers dropped because of shutdown
    pub discarded: usize,
}

/// Runs ticks; owns the per-job attempt counters and first-seen times.
struct Reconciler {
    store: JobStore,
    backend: Arc<dyn ScanBackend>,
    policy: PollPolicy,
    attempts: HashMap<String, u32>,
    first_seen: HashMap<String, Instant>,
    shutdown: CancellationToken,
}

impl Reconciler {
    async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        if self.shutdown.is_cancelled() {
            return report;
        }

        // Fresh read every tick; never reuse a list from an earlier tick.
        let pending = self.store.pending().await;
        self.attempts
            .retain(|id, _| pending.iter().any(|job| &job.id == id));
        self.first_seen
            .retain(|id, _| pending.iter().any(|job| &job.id == id));

        let mut in_flight = JoinSet::new();
        for job in pending {
            let seen = *self
                .first_seen
                .entry(job.id.clone())
                .or_insert_with(Instant::now);
            if let Some(reason) = self.stall_reason(&job, seen) {
                warn!(job_id = %job.id, domain = %job.domain, reason = %reason, "Giving up on scan");
                if self.store.merge(JobUpdate::stalled(&job.id, reason)).await
                    == MergeOutcome::Applied
                {
                    report.stalled += 1;
                }
                self.attempts.remove(&job.id);
                self.first_seen.remove(&job.id);
                continue;
            }

            *self.attempts.entry(job.id.clone()).or_default() += 1;
            report.polled += 1;

            let backend = Arc::clone(&self.backend);
            let shutdown = self.shutdown.clone();
            in_flight.spawn(async move {
                if shutdown.is_cancelled() {
                    return None;
                }
                let result = backend.fetch_status(&job.id).await;
                Some((job.id, result))
            });
        }

        loop {
            let joined = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    // Let the remaining calls finish on their own; ignore their answers.
                    report.discarded += in_flight.len();
                    in_flight.detach_all();
                    break;
                }
                joined = in_flight.join_next() => match joined {
                    Some(joined) => joined,
                    None => break,
                },
            };
            if self.shutdown.is_cancelled() {
                report.discarded += 1 + in_flight.len();
                in_flight.detach_all();
                break;
            }

            let (id, result) = match joined {
                Ok(Some(answer)) => answer,
                Ok(None) => {
                    report.discarded += 1;
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "Status fetch task failed");
                    report.failed += 1;
                    continue;
                }
            };

            match result {
                Ok(update) => match self.store.merge(update).await {
                    MergeOutcome::Applied => {
                        self.attempts.remove(&id);
                        self.first_seen.remove(&id);
                        report.resolved += 1;
                    }
                    MergeOutcome::UnknownJob => report.unknown += 1,
                    MergeOutcome::Discarded => report.discarded += 1,
                    MergeOutcome::AlreadyTerminal | MergeOutcome::StillPending => {}
                },
                Err(TrackerError::UnknownJob(_)) => {
                    debug!(job_id = %id, "Scan service does not know this job");
                    report.unknown += 1;
                }
                Err(e) => {
                    warn!(job_id = %id, error = %e, "Poll failed, will retry");
                    report.failed += 1;
                }
            }
        }

        if report != TickReport::default() {
            debug!(?report, "Poll tick finished");
        }
        report
    }

    fn stall_reason(&self, job: &ScanJob, first_seen: Instant) -> Option<String> {
        if let Some(max) = self.policy.max_attempts {
            let attempts = self.attempts.get(&job.id).copied().unwrap_or(0);
            if attempts >= max {
                return Some(format!("no result after {} status checks", attempts));
            }
        }

        if let Some(max_age) = self.policy.max_pending_age {
            let age = first_seen.elapsed();
            if age > max_age {
                return Some(format!("still pending after {}s", age.as_secs()));
            }
        }

        None
    }
}

/// Owns the background poll loop and its start/stop lifecycle.
pub struct PollScheduler {
    reconciler: Arc<Mutex<Reconciler>>,
    interval: Duration,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PollScheduler {
    pub fn new(store: JobStore, backend: Arc<dyn ScanBackend>, policy: PollPolicy) -> Self {
        let shutdown = CancellationToken::new();
        let interval = policy.interval;
        let reconciler = Reconciler {
            store,
            backend,
            policy,
            attempts: HashMap::new(),
            first_seen: HashMap::new(),
            shutdown: shutdown.clone(),
        };

        Self {
            reconciler: Arc::new(Mutex::new(reconciler)),
            interval,
            shutdown,
            handle: None,
        }
    }

    /// Run one reconciliation pass now.
    ///
    /// Ticks never overlap: a manual tick waits for a running one to finish.
    pub async fn tick(&self) -> TickReport {
        self.reconciler.lock().await.tick().await
    }

    /// Spawn the background loop. Calling it again while running is a no-op.
    pub fn start(&mut self) {
        if self.handle.is_some() || self.shutdown.is_cancelled() {
            return;
        }

        let reconciler = Arc::clone(&self.reconciler);
        let shutdown = self.shutdown.clone();
        let period = self.interval;

        info!(interval_ms = period.as_millis() as u64, "Starting poll loop");
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        reconciler.lock().await.tick().await;
                    }
                }
            }

            debug!("Poll loop stopped");
        }));
    }

    /// Stop the loop and wait for it to exit. No fetch is issued afterwards.
    pub async fn stop(&mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Poll loop ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{SimulatedBackend, SimulatedOutcome};
    use crate::core::models::{JobStatus, ScanTicket};
    use chrono::Utc;
    use serde_json::json;

    fn policy() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(20),
            max_attempts: None,
            max_pending_age: None,
        }
    }

    async fn submit(backend: &SimulatedBackend, store: &JobStore, domain: &str) -> String {
        let ticket = backend.submit(domain).await.unwrap();
        let id = ticket.id.clone();
        store.insert(ScanJob::pending(ticket, domain)).await.unwrap();
        id
    }

    #[tokio::test]
    async fn tick_polls_each_pending_job_once() {
        let backend = SimulatedBackend::new();
        let store = JobStore::new();
        for domain in ["a.com", "b.com", "c.com"] {
            submit(&backend, &store, domain).await;
        }

        let scheduler = PollScheduler::new(store, Arc::new(backend.clone()), policy());
        let report = scheduler.tick().await;

        assert_eq!(report.polled, 3);
        assert_eq!(backend.total_status_calls().await, 3);
    }

    #[tokio::test]
    async fn resolved_jobs_are_not_polled_again() {
        let backend = SimulatedBackend::new();
        let store = JobStore::new();
        let done = submit(&backend, &store, "a.com").await;
        let open = submit(&backend, &store, "b.com").await;
        backend
            .resolve(&done, SimulatedOutcome::Complete(json!({"info": "x"})))
            .await;

        let scheduler = PollScheduler::new(store.clone(), Arc::new(backend.clone()), policy());
        let first = scheduler.tick().await;
        assert_eq!(first.resolved, 1);

        let second = scheduler.tick().await;
        assert_eq!(second.polled, 1);
        assert_eq!(backend.status_calls(&done).await, 1);
        assert_eq!(backend.status_calls(&open).await, 2);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let backend = SimulatedBackend::new();
        let store = JobStore::new();
        let id = submit(&backend, &store, "a.com").await;
        let scheduler = PollScheduler::new(store.clone(), Arc::new(backend.clone()), policy());

        backend.set_unreachable(true).await;
        let report = scheduler.tick().await;
        assert_eq!(report.failed, 1);
        assert_eq!(store.get(&id).await.unwrap().status, JobStatus::Pending);

        backend.set_unreachable(false).await;
        backend
            .resolve(&id, SimulatedOutcome::Fail("timed out".into()))
            .await;
        let report = scheduler.tick().await;
        assert_eq!(report.resolved, 1);
        assert_eq!(store.get(&id).await.unwrap().status, JobStatus::Error);
    }

    #[tokio::test]
    async fn unknown_job_is_a_noop() {
        let backend = SimulatedBackend::new();
        let store = JobStore::new();
        let id = submit(&backend, &store, "a.com").await;
        backend.forget(&id).await;

        let scheduler = PollScheduler::new(store.clone(), Arc::new(backend.clone()), policy());
        let report = scheduler.tick().await;

        assert_eq!(report.unknown, 1);
        assert_eq!(store.get(&id).await.unwrap().status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn stalls_after_max_attempts() {
        let backend = SimulatedBackend::new();
        let store = JobStore::new();
        let id = submit(&backend, &store, "a.com").await;

        let policy = PollPolicy {
            max_attempts: Some(2),
            ..policy()
        };
        let scheduler = PollScheduler::new(store.clone(), Arc::new(backend.clone()), policy);

        assert_eq!(scheduler.tick().await.polled, 1);
        assert_eq!(scheduler.tick().await.polled, 1);
        let report = scheduler.tick().await;
        assert_eq!(report.stalled, 1);
        assert_eq!(report.polled, 0);

        let job = store.get(&id).await.unwrap();
        assert_eq!(job.status, JobStatus::Stalled);
        assert!(job.completed_at.is_some());
        assert_eq!(backend.status_calls(&id).await, 2);
    }

    #[tokio::test]
    async fn stalls_on_pending_age() {
        let backend = SimulatedBackend::new();
        let store = JobStore::new();
        let id = submit(&backend, &store, "a.com").await;

        let policy = PollPolicy {
            max_pending_age: Some(Duration::from_millis(50)),
            ..policy()
        };
        let scheduler = PollScheduler::new(store.clone(), Arc::new(backend.clone()), policy);
        assert_eq!(scheduler.tick().await.polled, 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        let report = scheduler.tick().await;

        assert_eq!(report.stalled, 1);
        assert_eq!(report.polled, 0);
        assert_eq!(backend.status_calls(&id).await, 1);
        assert_eq!(store.get(&id).await.unwrap().status, JobStatus::Stalled);
    }

    #[tokio::test]
    async fn old_service_timestamp_does_not_stall_new_job() {
        let backend = SimulatedBackend::new();
        let store = JobStore::new();
        let job = ScanJob::pending(
            ScanTicket {
                id: "behind-clock".to_string(),
                started_at: Utc::now() - chrono::Duration::hours(3),
            },
            "a.com",
        );
        backend.seed(job.clone()).await;
        store.insert(job).await.unwrap();

        let policy = PollPolicy {
            max_pending_age: Some(Duration::from_secs(60)),
            ..policy()
        };
        let scheduler = PollScheduler::new(store.clone(), Arc::new(backend.clone()), policy);
        let report = scheduler.tick().await;

        assert_eq!(report.polled, 1);
        assert_eq!(report.stalled, 0);
        assert_eq!(backend.status_calls("behind-clock").await, 1);
        assert_eq!(
            store.get("behind-clock").await.unwrap().status,
            JobStatus::Pending
        );
    }

    #[tokio::test]
    async fn zero_limits_in_config_disable_stalling() {
        let config = AppConfig {
            max_poll_attempts: Some(0),
            max_pending_secs: Some(0),
            ..AppConfig::default()
        };
        let policy = PollPolicy::from(&config);
        assert_eq!(policy.max_attempts, None);
        assert_eq!(policy.max_pending_age, None);

        let backend = SimulatedBackend::new();
        let store = JobStore::new();
        let id = submit(&backend, &store, "a.com").await;
        let scheduler = PollScheduler::new(store.clone(), Arc::new(backend.clone()), policy);

        for _ in 0..3 {
            let report = scheduler.tick().await;
            assert_eq!(report.polled, 1);
            assert_eq!(report.stalled, 0);
        }
        assert_eq!(store.get(&id).await.unwrap().status, JobStatus::Pending);
    }

    #[test]
    fn config_limits_carry_into_policy() {
        let policy = PollPolicy::from(&AppConfig::default());
        assert_eq!(policy.interval, Duration::from_millis(3000));
        assert_eq!(policy.max_attempts, Some(40));
        assert_eq!(policy.max_pending_age, Some(Duration::from_secs(600)));
    }

    #[tokio::test]
    async fn background_loop_resolves_and_stops() {
        let backend = SimulatedBackend::new();
        let store = JobStore::new();
        let id = submit(&backend, &store, "a.com").await;
        backend
            .resolve(&id, SimulatedOutcome::Complete(json!({"ok": true})))
            .await;

        let mut scheduler = PollScheduler::new(store.clone(), Arc::new(backend.clone()), policy());
        let mut changes = store.subscribe();
        scheduler.start();
        assert!(scheduler.is_running());

        tokio::time::timeout(Duration::from_secs(2), async {
            while store.get(&id).await.unwrap().status == JobStatus::Pending {
                changes.changed().await.unwrap();
            }
        })
        .await
        .expect("job should resolve");

        scheduler.stop().await;
        assert!(!scheduler.is_running());
        assert!(scheduler.is_stopped());

        let pending = submit(&backend, &store, "b.com").await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(backend.status_calls(&pending).await, 0);
    }

    #[tokio::test]
    async fn answers_arriving_after_stop_are_discarded() {
        let backend = SimulatedBackend::new();
        let store = JobStore::new();
        let id = submit(&backend, &store, "a.com").await;
        backend
            .resolve(&id, SimulatedOutcome::Complete(json!({"ok": true})))
            .await;
        backend.set_latency(Some(Duration::from_millis(200))).await;

        let scheduler = Arc::new(PollScheduler::new(
            store.clone(),
            Arc::new(backend.clone()),
            policy(),
        ));
        let ticking = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.tick().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.shutdown.cancel();

        let report = ticking.await.unwrap();
        assert_eq!(report.polled, 1);
        assert_eq!(report.discarded, 1);
        assert_eq!(store.get(&id).await.unwrap().status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn stop_does_not_wait_for_slow_calls() {
        let backend = SimulatedBackend::new();
        let store = JobStore::new();
        let id = submit(&backend, &store, "a.com").await;
        backend.set_latency(Some(Duration::from_secs(5))).await;

        let mut scheduler = PollScheduler::new(store.clone(), Arc::new(backend.clone()), policy());
        scheduler.start();
        // First interval tick fires at once; the fetch is now in flight.
        tokio::time::sleep(Duration::from_millis(50)).await;

        tokio::time::timeout(Duration::from_millis(500), scheduler.stop())
            .await
            .expect("stop should not wait for the in-flight call");
        assert!(!scheduler.is_running());
        assert_eq!(store.get(&id).await.unwrap().status, JobStatus::Pending);
    }
}
