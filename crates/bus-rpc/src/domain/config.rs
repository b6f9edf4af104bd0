//! Request/reply configuration with validation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest accepted `request_timeout_secs` (one day).
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 86_400;

/// Tunables for the request/reply client and responders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Default wait for a reply (seconds)
    pub request_timeout_secs: u64,
    /// Publish requests as persistent messages
    pub persistent_requests: bool,
    /// Publish replies as persistent messages
    pub persistent_replies: bool,
    /// How often the registry sweeper runs (seconds, 0 disables it)
    pub sweep_interval_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 45,
            persistent_requests: true,
            persistent_replies: false,
            sweep_interval_secs: 5,
        }
    }
}

impl RpcConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// `None` when the sweeper is disabled.
    #[must_use]
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), RpcConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(RpcConfigError::InvalidTimeout(
                "request_timeout_secs cannot be 0".into(),
            ));
        }
        if self.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS {
            return Err(RpcConfigError::InvalidTimeout(format!(
                "request_timeout_secs {} exceeds {MAX_REQUEST_TIMEOUT_SECS}",
                self.request_timeout_secs
            )));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcConfigError {
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}
