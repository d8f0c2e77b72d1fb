//! Document store client abstraction
//!
//! The coordinator talks to the backing store through this trait only. The
//! store is expected to:
//! - version every document, starting at 1 and incrementing on each write
//! - adjudicate conditional creates atomically (first writer wins)
//! - apply bulk operations in submission order and report per-item outcomes
//! - serve realtime gets, while searches only see refreshed data

use serde_json::Value;

use super::errors::StoreResult;
use crate::model::{CurrentDoc, DocumentKey};

/// Version handling for a put.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// Write regardless of current state.
    Any,
    /// Fail if the document exists.
    CreateOnly,
    /// Fail unless the current version equals the given one.
    IfVersion(u64),
    /// Write and set the version to exactly the given one.
    Force(u64),
}

/// One operation of a bulk write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Put {
        key: DocumentKey,
        body: Value,
        mode: PutMode,
    },
    Delete {
        key: DocumentKey,
        if_version: Option<u64>,
    },
}

impl WriteOp {
    pub fn put(key: DocumentKey, body: Value) -> Self {
        WriteOp::Put {
            key,
            body,
            mode: PutMode::Any,
        }
    }

    pub fn create(key: DocumentKey, body: Value) -> Self {
        WriteOp::Put {
            key,
            body,
            mode: PutMode::CreateOnly,
        }
    }

    pub fn forced(key: DocumentKey, body: Value, version: u64) -> Self {
        WriteOp::Put {
            key,
            body,
            mode: PutMode::Force(version),
        }
    }

    pub fn delete(key: DocumentKey) -> Self {
        WriteOp::Delete { key, if_version: None }
    }

    pub fn key(&self) -> &DocumentKey {
        match self {
            WriteOp::Put { key, .. } | WriteOp::Delete { key, .. } => key,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WriteOp::Put { .. } => "put",
            WriteOp::Delete { .. } => "delete",
        }
    }
}

/// Outcome of a single bulk item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOutcome {
    /// Applied; the store assigned this version.
    Applied(u64),
    /// Rejected with the store's failure message.
    Failed(String),
}

/// Per-item result, in the same position as its operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItem {
    /// Version-less key the operation targeted.
    pub key: DocumentKey,
    pub outcome: BulkOutcome,
}

impl BulkItem {
    pub fn applied(key: DocumentKey, version: u64) -> Self {
        Self {
            key: key.without_version(),
            outcome: BulkOutcome::Applied(version),
        }
    }

    pub fn failed(key: DocumentKey, message: impl Into<String>) -> Self {
        Self {
            key: key.without_version(),
            outcome: BulkOutcome::Failed(message.into()),
        }
    }

    pub fn failure_message(&self) -> Option<&str> {
        match &self.outcome {
            BulkOutcome::Failed(message) => Some(message),
            BulkOutcome::Applied(_) => None,
        }
    }

    pub fn version(&self) -> Option<u64> {
        match self.outcome {
            BulkOutcome::Applied(version) => Some(version),
            BulkOutcome::Failed(_) => None,
        }
    }
}

/// Result of a bulk write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResponse {
    pub items: Vec<BulkItem>,
}

impl BulkResponse {
    pub fn new(items: Vec<BulkItem>) -> Self {
        Self { items }
    }

    pub fn has_failures(&self) -> bool {
        self.items.iter().any(|i| i.failure_message().is_some())
    }

    /// Applied versions in submission order, skipping failed items.
    pub fn versions(&self) -> Vec<u64> {
        self.items.iter().filter_map(BulkItem::version).collect()
    }
}

/// The backing document store.
pub trait DocumentStoreClient: Send + Sync {
    /// Existence check for a logical index.
    fn index_exists(&self, index: &str) -> StoreResult<bool>;

    /// Create `key` only if absent; `StoreError::AlreadyExists` otherwise.
    /// Returns the assigned version.
    fn conditional_create(&self, key: &DocumentKey, body: Value) -> StoreResult<u64>;

    /// Delete `key`. Absence is not an error.
    fn delete(&self, key: &DocumentKey) -> StoreResult<()>;

    /// Apply `ops` in order. When `force_refresh` is set, touched indices are
    /// refreshed before returning.
    fn bulk_write(&self, ops: &[WriteOp], force_refresh: bool) -> StoreResult<BulkResponse>;

    /// Make all writes to `indices` visible to searches.
    fn refresh(&self, indices: &[String]) -> StoreResult<()>;

    /// Realtime fetch. Keys not found are omitted.
    fn fetch_by_keys(&self, keys: &[DocumentKey]) -> StoreResult<Vec<CurrentDoc>>;
}
