/// Client configuration: backend address, HTTP timeouts and progress timing.
///
/// Values come from the environment (after loading `.env`), falling back to
/// the built-in defaults when a variable is missing or unparsable.
use std::path::PathBuf;
use std::time::Duration;

use crate::api_protocol::{Endpoints, DEFAULT_BACKEND_URL};
use crate::errors::ConfigError;

/// Timing and thresholds of the displayed progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressConfig {
    /// Shown as soon as a download is requested, before the first poll.
    pub seed: f64,
    /// Highest value the server phase may display.
    pub server_ceiling: f64,
    /// Floor applied when the backend reports `done`.
    pub done_floor: f64,
    /// Increment of each client tail step.
    pub tail_step: f64,
    pub tail_interval: Duration,
    pub poll_interval: Duration,
    /// Delay between settling at 100 and resetting to 0.
    pub reset_delay: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            seed: 5.0,
            server_ceiling: 80.0,
            done_floor: 90.0,
            tail_step: 2.5,
            tail_interval: Duration::from_millis(150),
            poll_interval: Duration::from_millis(800),
            reset_delay: Duration::from_millis(1000),
        }
    }
}

/// Full client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub backend_url: String,
    pub request_timeout: Duration,
    pub download_dir: PathBuf,
    pub progress: ProgressConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            download_dir: PathBuf::from("./downloads"),
            progress: ProgressConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Read configuration from `SOCIALDL_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let backend_url = lookup("SOCIALDL_BACKEND_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.backend_url);
        let request_timeout = lookup("SOCIALDL_REQUEST_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);
        let download_dir = lookup("SOCIALDL_DOWNLOAD_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.download_dir);

        let mut progress = defaults.progress;
        if let Some(ms) = lookup("SOCIALDL_POLL_INTERVAL_MS").and_then(|s| s.trim().parse::<u64>().ok()) {
            if ms > 0 {
                progress.poll_interval = Duration::from_millis(ms);
            }
        }

        Self {
            backend_url,
            request_timeout,
            download_dir,
            progress,
        }
    }

    /// Validated endpoint builder for the configured backend.
    pub fn endpoints(&self) -> Result<Endpoints, ConfigError> {
        Endpoints::new(&self.backend_url)
    }
}
