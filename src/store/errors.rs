//! Store client errors
//!
//! These describe failures of a whole store call. Per-item failures inside a
//! bulk write are not errors at this level; they come back as
//! `BulkOutcome::Failed` and are judged by an error policy.

use thiserror::Error;

use crate::model::DocumentKey;

/// Result type for store calls
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Conditional create found the key already present.
    #[error("document already exists: {0}")]
    AlreadyExists(DocumentKey),

    /// The store could not be reached or refused the call.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store request failed: {0}")]
    Request(String),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::AlreadyExists(_) => "STORE_ALREADY_EXISTS",
            StoreError::Unavailable(_) => "STORE_UNAVAILABLE",
            StoreError::Request(_) => "STORE_REQUEST_FAILED",
        }
    }
}
