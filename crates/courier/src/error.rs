//! Error types for the keyword library.

use thiserror::Error;

/// Errors that can occur while creating sessions, sending requests or
/// asserting on responses.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KeywordError {
    /// Network or HTTP transport failure.
    ///
    /// Connection refused, DNS failure, TLS failure or timeout.
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Error raised inside the retry middleware stack.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),

    /// JSON serialization or deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration file could not be parsed.
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// A file (certificate, key, CA bundle, upload) could not be read.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// No session is registered under the alias.
    #[error("Non-existing index or alias '{0}'.")]
    SessionNotFound(String),

    /// A session base URL or merged request URL could not be parsed.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Invalid session or library settings.
    ///
    /// Negative timeouts, unknown proxy schemes, bad retry bounds.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The request options could not be turned into a request.
    ///
    /// Invalid header names, or files combined with a non-form body.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The response carried a 4xx or 5xx status and no status was expected.
    #[error("{status} {kind} Error: {reason} for url: {url}")]
    HttpError {
        /// Numeric status code.
        status: u16,
        /// `Client` for 4xx, `Server` for 5xx.
        kind: &'static str,
        /// Canonical reason phrase.
        reason: String,
        /// Final URL of the response.
        url: String,
    },

    /// The response status differs from the expected one.
    #[error(
        "{}Url: {url} Expected status: {actual} != {expected}",
        .msg.as_deref().map_or_else(String::new, |msg| format!("{msg} "))
    )]
    StatusMismatch {
        /// Caller supplied message prepended to the error.
        msg: Option<String>,
        /// Final URL of the response.
        url: String,
        /// Status the server returned.
        actual: u16,
        /// Status the caller expected.
        expected: u16,
    },

    /// An expected status could not be understood as a code or a name.
    #[error("Invalid expected status: '{0}'")]
    InvalidExpectedStatus(String),

    /// A status assertion was made before any request was sent.
    #[error("No response available to check")]
    NoResponse,

    /// The server sent a Digest challenge this client cannot answer.
    #[error("Digest authentication error: {0}")]
    DigestError(#[from] courier_common::DigestError),
}

impl KeywordError {
    /// Returns the HTTP status attached to this error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::HttpError { status, .. } | Self::StatusMismatch { actual: status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Whether this error is a failed status assertion.
    #[must_use]
    pub const fn is_status_error(&self) -> bool {
        matches!(self, Self::HttpError { .. } | Self::StatusMismatch { .. })
    }
}

/// Result alias used throughout the keyword library.
pub type Result<T> = std::result::Result<T, KeywordError>;
