use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

/// Config file read from the working directory when no other path is given.
pub const DEFAULT_CONFIG_FILE: &str = "scanwatch.toml";
/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "SCANWATCH_CONFIG";
const ENV_PREFIX: &str = "SCANWATCH_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the scan service
    pub server_url: String,
    pub poll_interval_ms: u64,
    pub request_timeout_secs: u64,
    /// Status checks per job before it is marked stalled (0: no cap)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_poll_attempts: Option<u32>,
    /// Seconds a job may stay pending before it is marked stalled (0: no ceiling)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pending_secs: Option<u64>,
    /// Use the in-memory scan service instead of `server_url`
    pub simulation: bool,
    pub verbose: bool,
    pub json_logs: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8010".to_string(),
            poll_interval_ms: 3000,
            request_timeout_secs: 10,
            max_poll_attempts: Some(40),
            max_pending_secs: Some(600),
            simulation: false,
            verbose: false,
            json_logs: false,
            log_file: None,
        }
    }
}

impl AppConfig {
    /// Load configuration: defaults, then the TOML file, then `SCANWATCH_*`
    /// environment variables, then `overrides` (usually CLI arguments).
    pub fn new<T: Serialize>(overrides: Option<&T>) -> Result<Self, figment::Error> {
        Self::figment(None, overrides).extract()
    }

    /// Same as [`AppConfig::new`] but reading `path` instead of the default file.
    pub fn from_path<T: Serialize>(
        path: Option<PathBuf>,
        overrides: Option<&T>,
    ) -> Result<Self, figment::Error> {
        Self::figment(path, overrides).extract()
    }

    fn figment<T: Serialize>(path: Option<PathBuf>, overrides: Option<&T>) -> Figment {
        let path = path
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]));

        if let Some(overrides) = overrides {
            figment = figment.merge(Serialized::defaults(overrides));
        }
        figment
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
