//! Error types for Dagnet core operations

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failure carrying the offending field and a readable reason.
///
/// Every validator in this crate reports failures through this type so that
/// callers can surface the exact input that needs fixing.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    /// Name of the offending field
    pub field: String,
    /// Human-readable explanation
    pub reason: String,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
