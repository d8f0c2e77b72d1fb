//! Coordinator error taxonomy
//!
//! | Error            | When                      | Store mutated? |
//! |------------------|---------------------------|----------------|
//! | IndexMissing     | before locking            | no             |
//! | LockConflict     | locking                   | no             |
//! | VersionConflict  | validation                | no             |
//! | Serialization    | before phase 1            | no             |
//! | BulkWriteFailure | phase 1 or phase 2        | compensated    |
//! | Store            | any store call            | compensated if after phase 1 started |
//!
//! Compensation failures are logged and counted, never returned: the caller
//! always sees the error that triggered compensation.

use thiserror::Error;

use super::state::CommitStateError;
use crate::bulk::CommitError;
use crate::store::{SerializeError, StoreError};
use crate::validator::ValidationError;

/// Result type for coordinator operations
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error("index not found: {0}")]
    IndexMissing(String),

    /// Another commit holds the index. Retry later.
    #[error("unable to lock the index {index}")]
    LockConflict { index: String },

    #[error("{0}")]
    VersionConflict(#[from] ValidationError),

    #[error("{0}")]
    BulkWriteFailure(#[from] CommitError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Serialization(#[from] SerializeError),

    #[error(transparent)]
    State(#[from] CommitStateError),
}

impl CoordinatorError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            CoordinatorError::IndexMissing(_) => "COMMIT_INDEX_MISSING",
            CoordinatorError::LockConflict { .. } => "COMMIT_LOCK_CONFLICT",
            CoordinatorError::VersionConflict(_) => "COMMIT_VERSION_CONFLICT",
            CoordinatorError::BulkWriteFailure(_) => "COMMIT_BULK_WRITE_FAILURE",
            CoordinatorError::Store(_) => "COMMIT_STORE_FAILURE",
            CoordinatorError::Serialization(_) => "COMMIT_SERIALIZATION_FAILURE",
            CoordinatorError::State(_) => "COMMIT_FORBIDDEN_TRANSITION",
        }
    }

    /// Only a lock conflict goes away by itself.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoordinatorError::LockConflict { .. })
    }

    /// Fatal per-key failures, for bulk write failures.
    pub fn commit_error(&self) -> Option<&CommitError> {
        match self {
            CoordinatorError::BulkWriteFailure(error) => Some(error),
            _ => None,
        }
    }
}
