pub mod error;
pub mod export;
pub mod models;
pub mod poller;
pub mod store;
pub mod tracker;
pub mod validator;

pub use error::TrackerError;
pub use export::{ExportFormat, ExportRow};
pub use models::{JobStatus, JobUpdate, ScanJob, ScanTicket};
pub use poller::{PollPolicy, PollScheduler, TickReport};
pub use store::{JobStore, MergeOutcome};
pub use tracker::ScanTracker;
pub use validator::{is_valid_domain, validate_domain};
