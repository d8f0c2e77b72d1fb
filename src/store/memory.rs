//! In-memory document store
//!
//! A reference `DocumentStoreClient` that behaves like a versioned, refresh-based
//! search store:
//! - versions start at 1 and grow by one per write, deletes included
//! - a deleted key remembers its last version, so a re-create continues from it
//! - `fetch_by_keys` is realtime; `visible_*` only sees refreshed writes
//!
//! Faults can be injected per key (bulk items fail with a chosen message) and
//! for refresh and fetch calls, which is what the commit tests rely on.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use super::client::{BulkItem, BulkResponse, DocumentStoreClient, PutMode, WriteOp};
use super::errors::{StoreError, StoreResult};
use super::messages;
use crate::model::{CurrentDoc, DocumentKey};

#[derive(Debug, Clone)]
struct StoredDoc {
    version: u64,
    body: Value,
}

#[derive(Debug, Default)]
struct IndexState {
    live: BTreeMap<DocumentKey, StoredDoc>,
    visible: BTreeMap<DocumentKey, StoredDoc>,
    tombstones: HashMap<DocumentKey, u64>,
}

impl IndexState {
    fn next_version(&self, key: &DocumentKey) -> u64 {
        match self.live.get(key) {
            Some(doc) => doc.version + 1,
            None => self.tombstones.get(key).map_or(1, |v| v + 1),
        }
    }

    fn put(&mut self, key: &DocumentKey, body: Value, mode: PutMode) -> Result<u64, String> {
        let current = self.live.get(key).map(|d| d.version);
        let version = match (mode, current) {
            (PutMode::Any, _) => self.next_version(key),
            (PutMode::CreateOnly, Some(_)) => return Err(messages::already_exists(key)),
            (PutMode::CreateOnly, None) => self.next_version(key),
            (PutMode::IfVersion(_), None) => return Err(messages::document_missing(key)),
            (PutMode::IfVersion(expected), Some(actual)) if expected != actual => {
                return Err(messages::version_conflict(key, actual, expected))
            }
            (PutMode::IfVersion(_), Some(_)) => self.next_version(key),
            (PutMode::Force(version), _) => version,
        };
        self.tombstones.remove(key);
        self.live.insert(key.clone(), StoredDoc { version, body });
        Ok(version)
    }

    fn delete(&mut self, key: &DocumentKey, if_version: Option<u64>) -> Result<u64, String> {
        let current = match self.live.get(key) {
            Some(doc) => doc.version,
            None => return Err(messages::document_missing(key)),
        };
        if let Some(expected) = if_version {
            if expected != current {
                return Err(messages::version_conflict(key, current, expected));
            }
        }
        self.live.remove(key);
        let version = current + 1;
        self.tombstones.insert(key.clone(), version);
        Ok(version)
    }

    fn refresh(&mut self) {
        self.visible = self.live.clone();
    }
}

#[derive(Debug, Default)]
struct Inner {
    indices: BTreeMap<String, IndexState>,
    injected: HashMap<DocumentKey, String>,
    fail_refresh: bool,
    fail_fetch: bool,
    bulk_log: Vec<Vec<WriteOp>>,
    refresh_count: u64,
}

impl Inner {
    fn index_mut(&mut self, index: &str) -> &mut IndexState {
        self.indices.entry(index.to_string()).or_default()
    }
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the given indices already present.
    pub fn with_indices<I, S>(indices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for index in indices {
            store.create_index(index);
        }
        store
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    /// Create an empty index. Existing indices are left untouched.
    pub fn create_index(&self, index: impl Into<String>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.indices.entry(index.into()).or_default();
        }
    }

    /// Write a document outside of any bulk call and make it visible.
    pub fn seed(&self, key: &DocumentKey, body: Value) -> StoreResult<u64> {
        let mut inner = self.lock()?;
        let key = key.without_version();
        let state = inner.index_mut(&key.index);
        let version = state.put(&key, body, PutMode::Any).map_err(StoreError::Request)?;
        state.refresh();
        Ok(version)
    }

    /// Make every bulk item touching `key` fail with `message`.
    pub fn fail_writes_to(&self, key: &DocumentKey, message: impl Into<String>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.injected.insert(key.without_version(), message.into());
        }
    }

    pub fn clear_write_failures(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.injected.clear();
        }
    }

    pub fn fail_refresh(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_refresh = fail;
        }
    }

    pub fn fail_fetch(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_fetch = fail;
        }
    }

    /// Realtime view of a document.
    pub fn document(&self, key: &DocumentKey) -> Option<CurrentDoc> {
        let inner = self.inner.lock().ok()?;
        let key = key.without_version();
        let doc = inner.indices.get(&key.index)?.live.get(&key)?;
        Some(CurrentDoc::new(key, doc.version, doc.body.clone()))
    }

    /// Refreshed view of a document.
    pub fn visible_document(&self, key: &DocumentKey) -> Option<CurrentDoc> {
        let inner = self.inner.lock().ok()?;
        let key = key.without_version();
        let doc = inner.indices.get(&key.index)?.visible.get(&key)?;
        Some(CurrentDoc::new(key, doc.version, doc.body.clone()))
    }

    /// Keys visible in `index` after the last refresh, in key order.
    pub fn visible_keys(&self, index: &str) -> Vec<DocumentKey> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| {
                inner
                    .indices
                    .get(index)
                    .map(|state| state.visible.keys().cloned().collect())
            })
            .unwrap_or_default()
    }

    /// Every bulk request received, in order.
    pub fn bulk_log(&self) -> Vec<Vec<WriteOp>> {
        self.inner
            .lock()
            .map(|inner| inner.bulk_log.clone())
            .unwrap_or_default()
    }

    pub fn refresh_count(&self) -> u64 {
        self.inner.lock().map(|inner| inner.refresh_count).unwrap_or(0)
    }
}

impl DocumentStoreClient for InMemoryStore {
    fn index_exists(&self, index: &str) -> StoreResult<bool> {
        Ok(self.lock()?.indices.contains_key(index))
    }

    fn conditional_create(&self, key: &DocumentKey, body: Value) -> StoreResult<u64> {
        let mut inner = self.lock()?;
        let key = key.without_version();
        inner
            .index_mut(&key.index)
            .put(&key, body, PutMode::CreateOnly)
            .map_err(|_| StoreError::AlreadyExists(key.clone()))
    }

    fn delete(&self, key: &DocumentKey) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let key = key.without_version();
        // Absence is fine
        let _ = inner.index_mut(&key.index).delete(&key, None);
        Ok(())
    }

    fn bulk_write(&self, ops: &[WriteOp], force_refresh: bool) -> StoreResult<BulkResponse> {
        let mut inner = self.lock()?;
        inner.bulk_log.push(ops.to_vec());

        let mut items = Vec::with_capacity(ops.len());
        let mut touched: Vec<String> = Vec::new();

        for op in ops {
            let key = op.key().without_version();
            if let Some(message) = inner.injected.get(&key) {
                items.push(BulkItem::failed(key, message.clone()));
                continue;
            }

            let state = inner.index_mut(&key.index);
            let result = match op {
                WriteOp::Put { body, mode, .. } => state.put(&key, body.clone(), *mode),
                WriteOp::Delete { if_version, .. } => state.delete(&key, *if_version),
            };
            if !touched.contains(&key.index) {
                touched.push(key.index.clone());
            }
            items.push(match result {
                Ok(version) => BulkItem::applied(key, version),
                Err(message) => BulkItem::failed(key, message),
            });
        }

        if force_refresh {
            for index in &touched {
                inner.index_mut(index).refresh();
            }
            inner.refresh_count += 1;
        }

        Ok(BulkResponse::new(items))
    }

    fn refresh(&self, indices: &[String]) -> StoreResult<()> {
        let mut inner = self.lock()?;
        if inner.fail_refresh {
            return Err(StoreError::Unavailable("refresh rejected".to_string()));
        }
        for index in indices {
            if let Some(state) = inner.indices.get_mut(index) {
                state.refresh();
            }
        }
        inner.refresh_count += 1;
        Ok(())
    }

    fn fetch_by_keys(&self, keys: &[DocumentKey]) -> StoreResult<Vec<CurrentDoc>> {
        let inner = self.lock()?;
        if inner.fail_fetch {
            return Err(StoreError::Unavailable("fetch rejected".to_string()));
        }
        Ok(keys
            .iter()
            .map(DocumentKey::without_version)
            .filter_map(|key| {
                let doc = inner.indices.get(&key.index)?.live.get(&key)?;
                Some(CurrentDoc::new(key, doc.version, doc.body.clone()))
            })
            .collect())
    }
}
