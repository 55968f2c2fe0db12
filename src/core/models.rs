use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of a tracked scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Submitted, outcome not known yet.
    #[serde(alias = "in_progress")]
    Pending,
    Completed,
    Error,
    /// Given up on locally after the poll policy ran out.
    Stalled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::Stalled => "stalled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One tracked scan and its lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: String,
    pub domain: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    pub summary: Option<String>,
}

impl ScanJob {
    /// A freshly submitted job, as recorded right after the submit call succeeds.
    pub fn pending(ticket: ScanTicket, domain: impl Into<String>) -> Self {
        Self {
            id: ticket.id,
            domain: domain.into(),
            status: JobStatus::Pending,
            created_at: ticket.started_at,
            completed_at: None,
            result: None,
            summary: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Short id used in log lines and list views.
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(8) {
            Some((idx, _)) => &self.id[..idx],
            None => &self.id,
        }
    }
}

/// Returned by the scan service when a scan is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTicket {
    pub id: String,
    pub started_at: DateTime<Utc>,
}

/// Server-reported state of a single job, fed into [`JobStore::merge`](super::JobStore::merge).
#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    pub id: String,
    pub status: JobStatus,
    pub result: Option<Value>,
    pub completed_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

impl JobUpdate {
    /// Local terminal update used when the poll policy gives up on a job.
    pub fn stalled(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Stalled,
            result: Some(serde_json::json!({ "error": reason.into() })),
            completed_at: Some(Utc::now()),
            summary: None,
        }
    }
}
