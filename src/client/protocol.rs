//! Wire types of the scan service HTTP API.
//!
//! - `POST /scan` with [`SubmitRequest`] answers [`SubmitResponse`]
//! - `GET /scan/{id}` answers [`StatusResponse`]
//! - `GET /scan/all` answers a list of [`JobRecord`]
//!
//! Failures carry an [`ErrorBody`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{JobStatus, JobUpdate, ScanJob, ScanTicket};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub scan_id: String,
    /// Older servers only send `created_at`.
    #[serde(default, alias = "created_at")]
    pub start_time: Option<DateTime<Utc>>,
}

impl SubmitResponse {
    pub fn into_ticket(self) -> ScanTicket {
        ScanTicket {
            id: self.scan_id,
            started_at: self.start_time.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: JobStatus,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl StatusResponse {
    pub fn into_update(self, id: &str) -> JobUpdate {
        let pending = self.status == JobStatus::Pending;
        JobUpdate {
            id: id.to_string(),
            status: self.status,
            result: if pending { None } else { self.result },
            completed_at: if pending { None } else { self.completed_at },
            summary: non_empty(self.summary),
        }
    }
}

/// Full record as returned by `GET /scan/all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub scan_id: String,
    pub domain: String,
    pub created_at: DateTime<Utc>,
    pub status: JobStatus,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl From<JobRecord> for ScanJob {
    fn from(record: JobRecord) -> Self {
        let pending = record.status == JobStatus::Pending;
        ScanJob {
            id: record.scan_id,
            domain: record.domain,
            status: record.status,
            created_at: record.created_at,
            completed_at: if pending { None } else { record.completed_at },
            result: if pending { None } else { record.result },
            summary: non_empty(record.summary),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Convert a list response into newest-first jobs.
///
/// The service does not promise an order, so sort by creation time. The sort
/// is stable, so records sharing a timestamp keep their relative order.
pub fn normalize_list(records: Vec<JobRecord>) -> Vec<ScanJob> {
    let mut jobs: Vec<ScanJob> = records.into_iter().map(ScanJob::from).collect();
    jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    jobs
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
