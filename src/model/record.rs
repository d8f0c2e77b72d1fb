//! Records: one proposed mutation of one document
//!
//! Records are immutable. They are created through the named factories on
//! `Record`, which fix the fields each action requires:
//! - updates always carry a post-update status (`Expired` unless overridden)
//! - deletes always carry an empty body
//!
//! Two records with the same key and action are the same record, whatever
//! their bodies or comments say.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::errors::{ModelError, ModelResult};
use super::key::DocumentKey;

/// The mutation a record proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordAction {
    /// Document must not exist yet
    Create,
    /// Replace an existing document
    Update,
    /// Remove an existing document
    Delete,
}

impl RecordAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordAction::Create => "CREATE",
            RecordAction::Update => "UPDATE",
            RecordAction::Delete => "DELETE",
        }
    }

    /// True for actions that have no prior version to compare against.
    pub fn is_new(&self) -> bool {
        matches!(self, RecordAction::Create)
    }

    /// True for actions that supersede a prior version.
    pub fn is_update(&self) -> bool {
        !self.is_new()
    }
}

impl fmt::Display for RecordAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a document or history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocStatus {
    Live,
    Pending,
    PendingDelete,
    Expired,
    Deleted,
    Rejected,
    Discarded,
}

impl DocStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocStatus::Live => "LIVE",
            DocStatus::Pending => "PENDING",
            DocStatus::PendingDelete => "PENDING_DELETE",
            DocStatus::Expired => "EXPIRED",
            DocStatus::Deleted => "DELETED",
            DocStatus::Rejected => "REJECTED",
            DocStatus::Discarded => "DISCARDED",
        }
    }

    /// Parse the stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LIVE" => Some(DocStatus::Live),
            "PENDING" => Some(DocStatus::Pending),
            "PENDING_DELETE" => Some(DocStatus::PendingDelete),
            "EXPIRED" => Some(DocStatus::Expired),
            "DELETED" => Some(DocStatus::Deleted),
            "REJECTED" => Some(DocStatus::Rejected),
            "DISCARDED" => Some(DocStatus::Discarded),
            _ => None,
        }
    }

    /// Statuses a history entry may end in. These never return to live.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DocStatus::Expired | DocStatus::Deleted | DocStatus::Rejected | DocStatus::Discarded
        )
    }
}

impl fmt::Display for DocStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single proposed mutation.
#[derive(Debug, Clone)]
pub struct Record {
    key: DocumentKey,
    action: RecordAction,
    status: Option<DocStatus>,
    update_status: Option<DocStatus>,
    base_version: Option<u64>,
    comment: Option<String>,
    update_comment: Option<String>,
    body: String,
}

impl Record {
    /// A create record with the given serialized body.
    pub fn create(key: DocumentKey, body: impl Into<String>) -> Self {
        Self::from_parts(key, RecordAction::Create, RecordParts::with_body(body))
    }

    /// Builder for a create record.
    pub fn create_builder(key: DocumentKey) -> RecordBuilder {
        RecordBuilder::new(key, RecordAction::Create)
    }

    /// An update record with the given serialized body.
    pub fn update(key: DocumentKey, body: impl Into<String>) -> Self {
        Self::from_parts(
            key,
            RecordAction::Update,
            RecordParts {
                update_status: Some(DocStatus::Expired),
                ..RecordParts::with_body(body)
            },
        )
    }

    /// An update record that also sets the live status and a comment.
    pub fn update_with_status(
        key: DocumentKey,
        status: DocStatus,
        comment: Option<String>,
        body: impl Into<String>,
    ) -> Self {
        Self::from_parts(
            key,
            RecordAction::Update,
            RecordParts {
                status: Some(status),
                update_status: Some(DocStatus::Expired),
                comment,
                ..RecordParts::with_body(body)
            },
        )
    }

    /// Builder for an update record. Post-update status defaults to `Expired`.
    pub fn update_builder(key: DocumentKey) -> RecordBuilder {
        RecordBuilder::new(key, RecordAction::Update).update_status(DocStatus::Expired)
    }

    /// A delete record. The superseded version ends up `Deleted`.
    pub fn delete(key: DocumentKey) -> Self {
        Self::delete_with(key, None, DocStatus::Deleted)
    }

    /// A delete record with an explicit post-delete status and comment.
    pub fn delete_with(key: DocumentKey, update_comment: Option<String>, update_status: DocStatus) -> Self {
        Self::from_parts(
            key,
            RecordAction::Delete,
            RecordParts {
                update_status: Some(update_status),
                update_comment,
                ..RecordParts::with_body(String::new())
            },
        )
    }

    /// This record, guarded by the version the caller last saw.
    pub fn with_base_version(self, base_version: u64) -> Self {
        Self {
            base_version: Some(base_version),
            ..self
        }
    }

    fn from_parts(key: DocumentKey, action: RecordAction, parts: RecordParts) -> Self {
        Self {
            key,
            action,
            status: parts.status,
            update_status: parts.update_status,
            base_version: parts.base_version,
            comment: parts.comment,
            update_comment: parts.update_comment,
            body: parts.body,
        }
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn action(&self) -> RecordAction {
        self.action
    }

    pub fn status(&self) -> Option<DocStatus> {
        self.status
    }

    /// Status given to the superseded version in history.
    pub fn update_status(&self) -> Option<DocStatus> {
        self.update_status
    }

    /// Version the caller believes the document is at.
    pub fn base_version(&self) -> Option<u64> {
        self.base_version
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn update_comment(&self) -> Option<&str> {
        self.update_comment.as_deref()
    }

    /// Serialized document body. Empty for deletes.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn is_new(&self) -> bool {
        self.action.is_new()
    }

    pub fn is_update(&self) -> bool {
        self.action.is_update()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.action == other.action
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.action.hash(state);
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.key)
    }
}

#[derive(Default)]
struct RecordParts {
    status: Option<DocStatus>,
    update_status: Option<DocStatus>,
    base_version: Option<u64>,
    comment: Option<String>,
    update_comment: Option<String>,
    body: String,
}

impl RecordParts {
    fn with_body(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }
}

/// Consuming builder for create and update records.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    key: DocumentKey,
    action: RecordAction,
    status: Option<DocStatus>,
    update_status: Option<DocStatus>,
    base_version: Option<u64>,
    comment: Option<String>,
    update_comment: Option<String>,
    body: Option<String>,
}

impl RecordBuilder {
    fn new(key: DocumentKey, action: RecordAction) -> Self {
        Self {
            key,
            action,
            status: None,
            update_status: None,
            base_version: None,
            comment: None,
            update_comment: None,
            body: None,
        }
    }

    pub fn status(mut self, status: DocStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn update_status(mut self, status: DocStatus) -> Self {
        self.update_status = Some(status);
        self
    }

    pub fn base_version(mut self, version: u64) -> Self {
        self.base_version = Some(version);
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn update_comment(mut self, comment: impl Into<String>) -> Self {
        self.update_comment = Some(comment.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Validate and freeze the record.
    pub fn build(self) -> ModelResult<Record> {
        let body = self.body.ok_or_else(|| ModelError::MissingBody(self.key.clone()))?;
        Ok(Record {
            key: self.key,
            action: self.action,
            status: self.status,
            update_status: self.update_status,
            base_version: self.base_version,
            comment: self.comment,
            update_comment: self.update_comment,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn key(id: &str) -> DocumentKey {
        DocumentKey::new("trades", "trade", id)
    }

    #[test]
    fn test_identity_is_key_and_action() {
        let a = Record::create(key("t1"), r#"{"a":1}"#);
        let b = Record::create(key("t1"), r#"{"a":2}"#);
        let c = Record::update(key("t1"), r#"{"a":1}"#);

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<Record> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_update_defaults_to_expired() {
        let record = Record::update(key("t1"), "{}");
        assert_eq!(record.update_status(), Some(DocStatus::Expired));

        let built = Record::update_builder(key("t1")).body("{}").build().unwrap();
        assert_eq!(built.update_status(), Some(DocStatus::Expired));
    }

    #[test]
    fn test_delete_clears_body() {
        let record = Record::delete_with(key("t1"), Some("gone".into()), DocStatus::Discarded);
        assert_eq!(record.body(), "");
        assert_eq!(record.update_status(), Some(DocStatus::Discarded));
        assert_eq!(record.update_comment(), Some("gone"));
        assert!(record.is_update());
    }

    #[test]
    fn test_builder_requires_body() {
        let result = Record::create_builder(key("t1")).comment("no body").build();
        assert_eq!(result.unwrap_err(), ModelError::MissingBody(key("t1")));
    }

    #[test]
    fn test_builder_carries_base_version() {
        let record = Record::update_builder(key("t1"))
            .base_version(4)
            .update_status(DocStatus::Rejected)
            .body("{}")
            .build()
            .unwrap();
        assert_eq!(record.base_version(), Some(4));
        assert_eq!(record.update_status(), Some(DocStatus::Rejected));
    }

    #[test]
    fn test_status_round_trip_strings() {
        for status in [DocStatus::Live, DocStatus::PendingDelete, DocStatus::Discarded] {
            assert_eq!(DocStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DocStatus::parse("UNKNOWN"), None);
        assert!(DocStatus::Expired.is_terminal());
        assert!(!DocStatus::Pending.is_terminal());
    }
}
