//! History layout
//!
//! Superseded versions are kept next to the live documents of the same index,
//! under a suffixed type, one entry per (id, version). An entry is written by
//! phase 1 of a commit and removed again if the commit is compensated.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::model::fields::{
    COMMENT_FIELD, STATUS_FIELD, SUPERSEDED_VERSION_FIELD, TIMESTAMP_FIELD, USER_FIELD,
};
use crate::model::{CurrentDoc, DocStatus, DocumentKey};
use crate::store::WriteOp;

/// Where and how history entries are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryLayout {
    suffix: String,
}

impl HistoryLayout {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self { suffix: suffix.into() }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// History key for the current version of `doc`.
    pub fn key_for(&self, doc: &CurrentDoc) -> DocumentKey {
        let key = doc.key();
        DocumentKey {
            index: key.index.clone(),
            doc_type: format!("{}{}", key.doc_type, self.suffix),
            id: format!("{}@{}", key.id, doc.version()),
            parent: key.parent.clone(),
            version: None,
        }
    }

    /// Entry demoting `doc` to `status`.
    pub fn entry_for(&self, doc: &CurrentDoc, demotion: &Demotion<'_>) -> WriteOp {
        let mut body = match doc.body() {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other.clone());
                map
            }
        };
        body.insert(STATUS_FIELD.to_string(), Value::from(demotion.status.as_str()));
        match demotion.comment {
            Some(comment) => body.insert(COMMENT_FIELD.to_string(), Value::from(comment)),
            None => body.remove(COMMENT_FIELD),
        };
        body.insert(USER_FIELD.to_string(), Value::from(demotion.user));
        body.insert(
            TIMESTAMP_FIELD.to_string(),
            Value::from(demotion.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        body.insert(SUPERSEDED_VERSION_FIELD.to_string(), Value::from(doc.version()));

        WriteOp::create(self.key_for(doc), Value::Object(body))
    }
}

impl Default for HistoryLayout {
    fn default() -> Self {
        Self::new("$history")
    }
}

/// What a history entry records about the superseding commit.
#[derive(Debug, Clone, Copy)]
pub struct Demotion<'a> {
    pub status: DocStatus,
    pub comment: Option<&'a str>,
    pub user: &'a str,
    pub timestamp: DateTime<Utc>,
}
