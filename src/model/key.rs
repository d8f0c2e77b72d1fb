//! Document identity
//!
//! A `DocumentKey` addresses one document in the store. Keys coming back from
//! the store carry the version the store assigned; keys built by callers
//! usually don't. Use `without_version()` before comparing the two.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a single stored document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentKey {
    /// Logical index the document lives in
    pub index: String,
    /// Document type within the index
    pub doc_type: String,
    /// Document id, unique per (index, type)
    pub id: String,
    /// Parent id for join relationships. Carried through, never interpreted here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Store-assigned version, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl DocumentKey {
    /// Create an unversioned key without a parent.
    pub fn new(index: impl Into<String>, doc_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            doc_type: doc_type.into(),
            id: id.into(),
            parent: None,
            version: None,
        }
    }

    /// Return a copy of this key attached to `parent`.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Return a copy of this key carrying `version`.
    pub fn with_version(&self, version: u64) -> Self {
        Self {
            version: Some(version),
            ..self.clone()
        }
    }

    /// Return a copy of this key with the version stripped.
    pub fn without_version(&self) -> Self {
        Self {
            version: None,
            ..self.clone()
        }
    }

    /// True if both keys address the same document, ignoring versions.
    pub fn same_document(&self, other: &DocumentKey) -> bool {
        self.index == other.index
            && self.doc_type == other.doc_type
            && self.id == other.id
            && self.parent == other.parent
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.index, self.doc_type, self.id)?;
        if let Some(ref parent) = self.parent {
            write!(f, "^{}", parent)?;
        }
        if let Some(version) = self.version {
            write!(f, "@{}", version)?;
        }
        Ok(())
    }
}
