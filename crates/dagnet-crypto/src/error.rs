//! Error types for key management and signing

use dagnet_core::ValidationError;
use thiserror::Error;

/// Cryptographic failures
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Key material is malformed or outside the valid scalar range
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    /// The signing primitive itself failed (non-recoverable for the call)
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// A proof did not verify against the envelope's canonical hash
    #[error("signature verification failed: {0}")]
    BadSignature(String),

    /// The envelope was structurally invalid before signatures were checked
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
