//! Client-layer error types

use thiserror::Error;

/// Event stream failures
#[derive(Error, Debug, Clone)]
pub enum StreamError {
    /// The stream reached its final disconnect; it cannot be reconnected
    #[error("stream is closed")]
    Closed,

    /// Push connection handshake failed
    #[error("push connection failed: {0}")]
    Handshake(String),
}
