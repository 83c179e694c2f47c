//! Library-wide defaults applied to new sessions and sessionless requests.
//!
//! ## Example Configuration
//!
//! ```toml
//! timeout = 10.0
//! verify = true
//!
//! [retry]
//! max_retries = 3
//! backoff_factor = 0.1
//! status_list = [502, 503, 504]
//! method_list = ["GET", "PUT", "DELETE"]
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::error::{KeywordError, Result};

/// Methods retried by default; all of them are idempotent.
pub const DEFAULT_RETRY_METHODS: [&str; 6] = ["DELETE", "GET", "HEAD", "OPTIONS", "PUT", "TRACE"];

/// Upper bound for a single backoff interval.
pub const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// Retry policy for transient failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt; zero disables retrying (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff interval in seconds, doubled on each retry (default: 0.1)
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Response statuses that trigger a retry (default: none)
    #[serde(default)]
    pub status_list: Vec<u16>,

    /// Methods eligible for retry (default: [`DEFAULT_RETRY_METHODS`])
    #[serde(default = "default_method_list")]
    pub method_list: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_factor: default_backoff_factor(),
            status_list: Vec::new(),
            method_list: default_method_list(),
        }
    }
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_backoff_factor() -> f64 {
    0.1
}

fn default_method_list() -> Vec<String> {
    DEFAULT_RETRY_METHODS.iter().map(ToString::to_string).collect()
}

const fn default_verify() -> bool {
    true
}

impl RetryConfig {
    /// Sets the number of retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the backoff factor in seconds.
    #[must_use]
    pub const fn with_backoff_factor(mut self, backoff_factor: f64) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    /// Sets the statuses that trigger a retry.
    #[must_use]
    pub fn with_status_list(mut self, status_list: impl Into<Vec<u16>>) -> Self {
        self.status_list = status_list.into();
        self
    }

    /// Sets the methods eligible for retry.
    #[must_use]
    pub fn with_method_list<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.method_list = methods.into_iter().map(Into::into).collect();
        self
    }

    /// Whether a request with `method` may be retried.
    #[must_use]
    pub fn applies_to(&self, method: &Method) -> bool {
        self.max_retries > 0
            && self
                .method_list
                .iter()
                .any(|m| m.eq_ignore_ascii_case(method.as_str()))
    }

    /// First backoff interval.
    ///
    /// Only meaningful once [`validate`](Self::validate) has passed.
    #[must_use]
    pub fn initial_backoff(&self) -> Duration {
        Duration::try_from_secs_f64(self.backoff_factor).unwrap_or_default()
    }

    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The backoff factor is negative, not finite, or above [`MAX_BACKOFF`]
    /// - A listed status is outside 100..=999
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_factor.is_finite()
            || self.backoff_factor < 0.0
            || self.backoff_factor > MAX_BACKOFF.as_secs_f64()
        {
            return Err(KeywordError::ConfigurationError(format!(
                "backoff_factor must be between 0 and {} seconds, got {}",
                MAX_BACKOFF.as_secs(),
                self.backoff_factor
            )));
        }

        if let Some(status) = self.status_list.iter().find(|s| !(100..=999).contains(*s)) {
            return Err(KeywordError::ConfigurationError(format!(
                "Invalid retry status {status}"
            )));
        }

        Ok(())
    }
}

/// Library-wide defaults, loaded from TOML or built in code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Request timeout in seconds; `None` waits forever (default: none)
    #[serde(default)]
    pub timeout: Option<f64>,

    /// Whether TLS certificates are verified (default: true)
    #[serde(default = "default_verify")]
    pub verify: bool,

    /// Retry policy (default: [`RetryConfig::default`])
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            verify: default_verify(),
            retry: RetryConfig::default(),
        }
    }
}

impl LibraryConfig {
    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist or cannot be read
    /// - Deserialization fails
    /// - Validation fails
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(KeywordError::ConfigurationError(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Sets the default timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: f64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enables or disables certificate verification.
    #[must_use]
    pub const fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout or the retry policy is invalid.
    pub fn validate(&self) -> Result<()> {
        if let Some(timeout) = self.timeout {
            timeout_duration(timeout)?;
        }
        self.retry.validate()
    }

    /// Default timeout as a duration.
    pub(crate) fn timeout(&self) -> Result<Option<Duration>> {
        self.timeout.map(timeout_duration).transpose()
    }
}

/// Converts a timeout in seconds into a duration.
///
/// # Errors
///
/// Returns an error if `secs` is negative or not finite.
pub fn timeout_duration(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|_| {
        KeywordError::ConfigurationError(format!(
            "timeout must be a finite, non-negative number of seconds, got {secs}"
        ))
    })
}
