//! Client-side tracker for asynchronous domain scans.
//!
//! Submits domains to a scan service, polls until each scan resolves, and
//! keeps an ordered, exportable view of every known scan.

pub mod cli;
pub mod client;
pub mod config;
pub mod context;
pub mod core;
pub mod logging;
