use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::client::{HttpScanClient, ScanBackend, SimulatedBackend};
use crate::config::AppConfig;
use crate::core::{PollPolicy, ScanTracker};

/// How long a simulated scan takes to finish.
const SIMULATED_SCAN_TIME: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub backend: Arc<dyn ScanBackend>,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Result<Self> {
        let backend: Arc<dyn ScanBackend> = if config.simulation {
            Arc::new(SimulatedBackend::with_auto_resolve(SIMULATED_SCAN_TIME))
        } else {
            let timeout = Duration::from_secs(config.request_timeout_secs.max(1));
            Arc::new(
                HttpScanClient::new(config.server_url.clone(), timeout)
                    .context("Failed to build HTTP client")?,
            )
        };

        Ok(Self::with_backend(config, backend))
    }

    pub fn with_backend(config: AppConfig, backend: Arc<dyn ScanBackend>) -> Self {
        Self {
            config: Arc::new(config),
            backend,
        }
    }

    /// A tracker using this context's backend and poll settings. Not started.
    pub fn tracker(&self) -> ScanTracker {
        ScanTracker::new(
            Arc::clone(&self.backend),
            PollPolicy::from(self.config.as_ref()),
        )
    }

    /// Where the scan service lives, for display.
    pub fn service_label(&self) -> String {
        if self.config.simulation {
            "simulated".to_string()
        } else {
            self.config.server_url.clone()
        }
    }
}
