//! Client configuration
//!
//! Every knob of the API access layer lives in `ClientConfig`, with the
//! defaults spelled out rather than inferred from missing values.

use std::path::PathBuf;
use std::time::Duration;

/// Base URL used when neither `--api-url` nor `CHURN_API_URL` is given
pub const DEFAULT_BASE_URL: &str = "http://localhost:5001";

/// Environment variable holding the API base URL
pub const API_URL_ENV: &str = "CHURN_API_URL";

/// Configuration for the API client
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Root of the backend REST API; every request path is joined onto it
    pub base_url: String,
    /// Deadline for cheap reads and all writes
    pub standard_timeout: Duration,
    /// Deadline for calls that make the server do heavy work
    pub extended_timeout: Duration,
    /// Added to the extended deadline for each additional survival-curve attempt
    pub survival_timeout_margin: Duration,
    /// Retry N waits `N * retry_backoff_step` before the next attempt
    pub retry_backoff_step: Duration,
    /// Where the bearer token is persisted; `None` keeps it in memory only
    pub token_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            standard_timeout: Duration::from_secs(10),
            extended_timeout: Duration::from_secs(60),
            survival_timeout_margin: Duration::from_secs(30),
            retry_backoff_step: Duration::from_secs(1),
            token_path: None,
        }
    }
}

impl ClientConfig {
    /// Creates a default configuration pointed at `base_url`
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}
