//! Client configuration.
//!
//! The only required value is the API base URL. An optional timeout bounds
//! each HTTP round-trip; without one the transport's defaults apply.

use std::time::Duration;

use url::Url;

use crate::http::TransportError;

/// Environment variable holding the API base URL.
pub const BASE_URL_ENV: &str = "TASK_API_BASE_URL";
/// Environment variable holding the optional request timeout in seconds.
pub const TIMEOUT_ENV: &str = "TASK_API_TIMEOUT_SECS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("TASK_API_BASE_URL is not set")]
    MissingBaseUrl,

    #[error("invalid API base URL {value:?}: {source}")]
    InvalidBaseUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("API base URL {0:?} must use http or https")]
    UnsupportedScheme(String),

    #[error("invalid TASK_API_TIMEOUT_SECS value {0:?}: expected a positive number of seconds")]
    InvalidTimeout(String),

    #[error("failed to build HTTP transport: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL without a trailing slash.
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let trimmed = base_url.trim();
        let parsed = Url::parse(trimmed).map_err(|source| ConfigError::InvalidBaseUrl {
            value: trimmed.to_string(),
            source,
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(trimmed.to_string()));
        }

        Ok(Self {
            base_url: trimmed.trim_end_matches('/').to_string(),
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Read `TASK_API_BASE_URL` and `TASK_API_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(BASE_URL_ENV)
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingBaseUrl)?;
        let mut config = Self::new(&base_url)?;

        if let Some(raw) = lookup(TIMEOUT_ENV).filter(|value| !value.trim().is_empty()) {
            let seconds: u64 = raw
                .trim()
                .parse()
                .ok()
                .filter(|seconds| *seconds > 0)
                .ok_or_else(|| ConfigError::InvalidTimeout(raw.clone()))?;
            config.timeout = Some(Duration::from_secs(seconds));
        }

        Ok(config)
    }
}
