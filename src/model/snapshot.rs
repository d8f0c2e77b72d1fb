//! Pre-commit snapshot of current documents

use std::collections::BTreeMap;

use serde_json::Value;

use super::key::DocumentKey;

/// A document as the store currently holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentDoc {
    key: DocumentKey,
    version: u64,
    body: Value,
}

impl CurrentDoc {
    /// `key` may or may not carry a version; it is stored without one.
    pub fn new(key: DocumentKey, version: u64, body: Value) -> Self {
        Self {
            key: key.without_version(),
            version,
            body,
        }
    }

    /// Version-less key.
    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Key carrying the current version.
    pub fn versioned_key(&self) -> DocumentKey {
        self.key.with_version(self.version)
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Value of a top-level field, if the body is an object.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }
}

/// Current documents for a set of keys.
///
/// Keys the store did not return are simply absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    docs: BTreeMap<DocumentKey, CurrentDoc>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_docs(docs: impl IntoIterator<Item = CurrentDoc>) -> Self {
        Self {
            docs: docs.into_iter().map(|d| (d.key.clone(), d)).collect(),
        }
    }

    /// Lookup ignoring any version on `key`.
    pub fn get(&self, key: &DocumentKey) -> Option<&CurrentDoc> {
        match key.version {
            None => self.docs.get(key),
            Some(_) => self.docs.get(&key.without_version()),
        }
    }

    pub fn contains(&self, key: &DocumentKey) -> bool {
        self.get(key).is_some()
    }

    pub fn docs(&self) -> impl Iterator<Item = &CurrentDoc> {
        self.docs.values()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}
