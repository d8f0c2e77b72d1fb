//! Model construction errors

use thiserror::Error;

use super::key::DocumentKey;

/// Result type for model construction
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while building records, batches and bundles.
///
/// Every check happens once, at `build()`. A value that exists is valid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("record for {0} has no body")]
    MissingBody(DocumentKey),

    #[error("batch contains no records")]
    EmptyBatch,

    #[error("no user given for batch")]
    MissingUser,

    #[error("batch must target a single index: found {expected} and {found}")]
    MixedIndices { expected: String, found: String },

    #[error("bundle contains no records")]
    EmptyBundle,
}

impl ModelError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ModelError::MissingBody(_) => "MODEL_MISSING_BODY",
            ModelError::EmptyBatch => "MODEL_EMPTY_BATCH",
            ModelError::MissingUser => "MODEL_MISSING_USER",
            ModelError::MixedIndices { .. } => "MODEL_MIXED_INDICES",
            ModelError::EmptyBundle => "MODEL_EMPTY_BUNDLE",
        }
    }
}
