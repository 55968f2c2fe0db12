//! Clients for the remote scan service.
//!
//! ## Architecture
//!
//! - `protocol`: JSON request/response types of the scan service
//! - `http`: reqwest-backed client talking to a real service
//! - `simulated`: in-memory service used by `--simulation` and tests
//!
//! Each operation is one round trip with no retry of its own; retrying is the
//! poller's job.

mod http;
pub mod protocol;
mod simulated;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::{JobUpdate, ScanJob, ScanTicket, TrackerError};

pub use http::HttpScanClient;
pub use simulated::{SimulatedBackend, SimulatedOutcome};

/// Transport-level failure talking to the scan service.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection, timeout or TLS failure
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Service answered with a non-success status
    #[error("service responded with {status}: {message}")]
    Status { status: u16, message: String },
    /// Response body did not match the expected shape
    #[error("unexpected response: {0}")]
    Decode(String),
    /// Service could not be reached at all (simulated outage)
    #[error("service unavailable")]
    Unavailable,
}

/// The three calls the tracker makes against the scan service.
#[async_trait]
pub trait ScanBackend: Send + Sync {
    /// Start a scan. No local record may be created if this fails.
    async fn submit(&self, domain: &str) -> Result<ScanTicket, TrackerError>;

    /// Current state of one scan. A 404 maps to [`TrackerError::UnknownJob`].
    async fn fetch_status(&self, id: &str) -> Result<JobUpdate, TrackerError>;

    /// Every scan the service knows about, newest first.
    async fn fetch_all(&self) -> Result<Vec<ScanJob>, TrackerError>;
}
