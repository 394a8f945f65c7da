//! Error types for fanout-relay
//!
//! This module provides the error taxonomy for the relay:
//! - [`UpstreamError`]: a single item's fetch failed. Inside the fan-out engine this
//!   is data, never control flow: it is rendered in place of the item's payload.
//! - [`Error`]: request-level failures such as bad configuration, an unsupported
//!   transport, a closed client connection or server shutdown
//! - HTTP status code mapping and a structured JSON error body for the API

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for fanout-relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for fanout-relay
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "streaming.num_workers")
        key: Option<String>,
    },

    /// The response transport cannot deliver incremental, flushed writes
    #[error("streaming unsupported")]
    StreamingUnsupported,

    /// The client stopped reading the response before it was complete
    #[error("transport closed by client")]
    TransportClosed,

    /// The server shut down before the request finished
    #[error("request cancelled by server shutdown")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error while building or using the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Failure of one upstream fetch, tagged with the item index it belongs to.
///
/// The `Display` output (`Error <index>: <cause>`) is the placeholder text clients
/// see in place of the item's payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Error {index}: {cause}")]
pub struct UpstreamError {
    /// Index of the item whose fetch failed
    pub index: usize,
    /// Why the fetch failed
    pub cause: UpstreamCause,
}

impl UpstreamError {
    /// Create a new upstream error for `index`
    pub fn new(index: usize, cause: UpstreamCause) -> Self {
        Self { index, cause }
    }
}

/// Reason an upstream fetch failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamCause {
    /// Could not reach the upstream (DNS, refused connection, reset, ...)
    #[error("connection failed: {0}")]
    Connect(String),

    /// The fetch did not complete within the per-call timeout
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The upstream answered with a non-success status code
    #[error("upstream returned status {0}")]
    Status(u16),

    /// The response body could not be read
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "streaming_unsupported",
///     "message": "streaming unsupported"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "config_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Error::Config { .. } => 400,

            // 500 Internal Server Error
            Error::StreamingUnsupported => 500,
            Error::TransportClosed => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - the upstream client could not be set up
            Error::Network(_) => 502,

            // 503 Service Unavailable
            Error::Cancelled => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::StreamingUnsupported => "streaming_unsupported",
            Error::TransportClosed => "transport_closed",
            Error::Cancelled => "cancelled",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
