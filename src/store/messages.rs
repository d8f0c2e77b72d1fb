//! Per-item failure messages
//!
//! Bulk items fail with free-form strings. Stores that speak this vocabulary
//! let the lenient error policy recognise the benign cases by prefix.

use crate::model::DocumentKey;

pub const ALREADY_EXISTS: &str = "DocumentAlreadyExists";
pub const VERSION_CONFLICT: &str = "VersionConflict";
pub const DOCUMENT_MISSING: &str = "DocumentMissing";

pub fn already_exists(key: &DocumentKey) -> String {
    format!("{}[{}]: document already exists", ALREADY_EXISTS, key.without_version())
}

pub fn version_conflict(key: &DocumentKey, current: u64, provided: u64) -> String {
    format!(
        "{}[{}]: current version [{}] is different than the one provided [{}]",
        VERSION_CONFLICT,
        key.without_version(),
        current,
        provided
    )
}

pub fn document_missing(key: &DocumentKey) -> String {
    format!("{}[{}]: document missing", DOCUMENT_MISSING, key.without_version())
}
