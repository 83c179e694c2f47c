//! Error types for the echo server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

/// Errors raised while starting the server or handling a request.
#[derive(Debug, Error)]
pub enum EchoError {
    /// I/O error (binding, reading config).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A status code, or a `code:weight` list, could not be parsed.
    #[error("Invalid status code")]
    InvalidStatusCode,

    /// Malformed request input.
    #[error("{0}")]
    BadRequest(String),
}

/// Result type alias using `EchoError`.
pub type Result<T> = std::result::Result<T, EchoError>;

impl IntoResponse for EchoError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidStatusCode | Self::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            other => {
                error!("Request failed: {other}");
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response()
            }
        }
    }
}
