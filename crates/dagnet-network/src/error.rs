//! Network error taxonomy
//!
//! A closed set of failure kinds; callers are expected to switch on the
//! variant. Only `Timeout`, `ConnectionFailed` and 5xx responses are ever
//! retried, and only by the transport.

use dagnet_core::ValidationError;
use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by the transport and the read API
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    /// DNS, TCP or TLS level failure before a response arrived
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The configured deadline elapsed
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered outside the 2xx range
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// The body could not be decoded into the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A 4xx rejection carrying a machine-readable reason
    #[error("rejected ({code}): {message}")]
    Rejected {
        /// Rejection code reported by the network
        code: String,
        /// Human-readable rejection message
        message: String,
    },

    /// Input failed local validation before any request was made
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl NetworkError {
    /// Whether the transport retry policy applies to this failure
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::ConnectionFailed(_) => true,
            Self::HttpStatus { status, .. } => (500..600).contains(status),
            _ => false,
        }
    }

    /// Short machine-readable kind tag, used by batch results
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionFailed(_) => "connection",
            Self::Timeout(_) => "timeout",
            Self::HttpStatus { .. } => "http",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Rejected { .. } => "rejected",
            Self::Validation(_) => "validation",
        }
    }
}
