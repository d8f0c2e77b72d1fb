//! Validation errors

use std::fmt;

use crate::model::DocumentKey;

/// A record disagrees with the store about the document's version.
///
/// Raised before anything is written, so nothing needs compensating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Offending key, without version
    pub key: DocumentKey,
    /// Version the record declared, if any
    pub expected: Option<u64>,
    /// Version the store holds; `None` when the document does not exist
    pub current: Option<u64>,
}

impl ValidationError {
    pub fn version_conflict(key: &DocumentKey, expected: Option<u64>, current: Option<u64>) -> Self {
        Self {
            key: key.without_version(),
            expected,
            current,
        }
    }

    /// True when the document the record refers to does not exist.
    pub fn is_missing_document(&self) -> bool {
        self.current.is_none()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.expected, self.current) {
            (_, None) => write!(f, "version conflict on {}: document does not exist", self.key),
            (Some(expected), Some(current)) => write!(
                f,
                "version conflict on {}: expected version {} but store has {}",
                self.key, expected, current
            ),
            (None, Some(current)) => write!(
                f,
                "version conflict on {}: store has version {}",
                self.key, current
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Result type for validation
pub type ValidationResult<T> = Result<T, ValidationError>;
