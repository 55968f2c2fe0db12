use thiserror::Error;

use crate::client::ClientError;

/// Errors surfaced by the tracker core.
///
/// None of these are fatal: each one is scoped to the single operation that
/// produced it. Duplicate terminal merges are not errors at all and never show
/// up here.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Bad domain syntax. Shown to the user, nothing is sent or stored.
    #[error("{0}")]
    Validation(String),

    /// The scan service refused or never received a submission.
    #[error("Failed to submit scan: {0}")]
    Submission(#[source] ClientError),

    /// Transient status fetch failure. Swallowed by the poller and retried.
    #[error("Failed to poll job {id}: {source}")]
    Poll {
        id: String,
        #[source]
        source: ClientError,
    },

    /// The scan service (or the local store) does not know this job id.
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    /// Bootstrap/refresh list fetch failed. Local state is left as it was.
    #[error("Failed to fetch scan list: {0}")]
    List(#[source] ClientError),

    #[error("Job already tracked: {0}")]
    DuplicateId(String),

    /// The tracker has been shut down.
    #[error("Tracker is closed")]
    Closed,

    #[error("Failed to export scans: {0}")]
    Export(String),
}
