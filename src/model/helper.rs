//! Review workflow batches
//!
//! Builds batches that move current documents through review outcomes. Each
//! record is pinned to the version it was built from, so a document changed
//! in the meantime makes the commit fail with a version conflict.
//!
//! Pending documents sit next to their base document in the same index, under
//! the base type plus `PENDING_SUFFIX` and the same id. Their `_base_version`
//! names the base version they were drafted against; it is absent for drafts
//! of new documents.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::batch::Batch;
use super::errors::ModelResult;
use super::fields::{strip_hidden, APPROVAL_ROLES_FIELD, BASE_VERSION_FIELD, STATUS_FIELD};
use super::key::DocumentKey;
use super::record::{DocStatus, Record};
use super::snapshot::CurrentDoc;
use crate::store::{DocumentSerializer, SerializeError};

/// Appended to a document type to form the type of its pending drafts.
pub const PENDING_SUFFIX: &str = "$pending";

/// Error building a review batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReviewError {
    #[error(transparent)]
    Model(#[from] super::errors::ModelError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error("not a pending document: {0}")]
    NotPending(DocumentKey),

    #[error("no approval role for {0}")]
    ApprovalDenied(DocumentKey),
}

/// Base document a pending draft stands for.
pub fn base_key(pending: &DocumentKey) -> Result<DocumentKey, ReviewError> {
    let doc_type = pending
        .doc_type
        .strip_suffix(PENDING_SUFFIX)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ReviewError::NotPending(pending.without_version()))?;
    Ok(DocumentKey {
        doc_type: doc_type.to_string(),
        ..pending.without_version()
    })
}

/// Promote every pending draft onto its base document.
///
/// The draft itself is deleted, leaving a `Live` history entry (or `Deleted`
/// for an approved deletion) carrying `comment`. The base document is then
/// created, updated at its `_base_version`, or deleted.
pub fn approval_batch<'a>(
    docs: impl IntoIterator<Item = &'a CurrentDoc>,
    comment: &str,
    user: &str,
    timestamp: DateTime<Utc>,
    serializer: &dyn DocumentSerializer,
) -> Result<Batch, ReviewError> {
    let mut builder = Batch::builder().user(user).timestamp(timestamp);
    for doc in docs {
        let base = base_key(doc.key())?;
        let base_version = doc.field(BASE_VERSION_FIELD).and_then(Value::as_u64);
        let deleting = doc
            .field(STATUS_FIELD)
            .and_then(Value::as_str)
            .and_then(DocStatus::parse)
            == Some(DocStatus::PendingDelete);

        let outcome = if deleting { DocStatus::Deleted } else { DocStatus::Live };
        builder = builder.record(
            Record::delete_with(doc.key().clone(), Some(comment.to_string()), outcome)
                .with_base_version(doc.version()),
        );

        let record = if deleting {
            match base_version {
                Some(version) => Record::delete(base).with_base_version(version),
                None => Record::delete(base),
            }
        } else {
            let body = serializer.encode(&strip_hidden(doc.body()))?;
            match base_version {
                Some(version) => Record::update(base, body).with_base_version(version),
                None => Record::create(base, body),
            }
        };
        builder = builder.record(record);
    }
    Ok(builder.build()?)
}

/// Check that `user_roles` may approve every document.
///
/// A document without `_approval_roles`, or with an empty list, is open to
/// anyone. Otherwise one of the user's roles must be listed.
pub fn validate_approval_roles<'a, R: AsRef<str>>(
    docs: impl IntoIterator<Item = &'a CurrentDoc>,
    user_roles: &[R],
) -> Result<(), ReviewError> {
    for doc in docs {
        let allowed: Vec<&str> = doc
            .field(APPROVAL_ROLES_FIELD)
            .and_then(Value::as_array)
            .map(|roles| roles.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if allowed.is_empty() {
            continue;
        }
        if !user_roles.iter().any(|role| allowed.contains(&role.as_ref())) {
            return Err(ReviewError::ApprovalDenied(doc.key().without_version()));
        }
    }
    Ok(())
}

/// Mark every document `Rejected`, keeping its content.
pub fn rejection_batch<'a>(
    docs: impl IntoIterator<Item = &'a CurrentDoc>,
    comment: &str,
    user: &str,
    timestamp: DateTime<Utc>,
    serializer: &dyn DocumentSerializer,
) -> Result<Batch, ReviewError> {
    let mut builder = Batch::builder().user(user).timestamp(timestamp);
    for doc in docs {
        let body = serializer.encode(&strip_hidden(doc.body()))?;
        let record = Record::update_builder(doc.key().clone())
            .status(DocStatus::Rejected)
            .comment(comment)
            .base_version(doc.version())
            .body(body)
            .build()?;
        builder = builder.record(record);
    }
    Ok(builder.build()?)
}

/// Delete every document, leaving a `Discarded` history entry behind.
pub fn discard_batch<'a>(
    docs: impl IntoIterator<Item = &'a CurrentDoc>,
    user: &str,
    timestamp: DateTime<Utc>,
) -> ModelResult<Batch> {
    let mut builder = Batch::builder().user(user).timestamp(timestamp);
    for doc in docs {
        let record = Record::delete_with(doc.key().clone(), None, DocStatus::Discarded)
            .with_base_version(doc.version());
        builder = builder.record(record);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordAction;
    use crate::store::JsonSerializer;
    use serde_json::json;

    fn doc(id: &str, version: u64) -> CurrentDoc {
        CurrentDoc::new(
            DocumentKey::new("trades", "trade", id),
            version,
            json!({"name": id, "_status": "PENDING", "_user": "bob"}),
        )
    }

    #[test]
    fn test_rejection_batch() {
        let docs = vec![doc("a", 2), doc("b", 5)];
        let batch = rejection_batch(&docs, "not ok", "carol", Utc::now(), &JsonSerializer).unwrap();

        assert_eq!(batch.len(), 2);
        let first = &batch.records()[0];
        assert_eq!(first.status(), Some(DocStatus::Rejected));
        assert_eq!(first.comment(), Some("not ok"));
        assert_eq!(first.base_version(), Some(2));
        assert_eq!(first.body(), r#"{"name":"a"}"#);
        assert_eq!(batch.records()[1].base_version(), Some(5));
    }

    #[test]
    fn test_discard_batch() {
        let docs = vec![doc("a", 3)];
        let batch = discard_batch(&docs, "carol", Utc::now()).unwrap();

        let record = &batch.records()[0];
        assert!(record.body().is_empty());
        assert_eq!(record.update_status(), Some(DocStatus::Discarded));
        assert_eq!(record.base_version(), Some(3));
    }

    fn pending(id: &str, version: u64, body: serde_json::Value) -> CurrentDoc {
        CurrentDoc::new(DocumentKey::new("trades", "trade$pending", id), version, body)
    }

    #[test]
    fn test_base_key() {
        let base = base_key(&DocumentKey::new("trades", "trade$pending", "a").with_version(4)).unwrap();
        assert_eq!(base, DocumentKey::new("trades", "trade", "a"));

        assert!(matches!(
            base_key(&DocumentKey::new("trades", "trade", "a")),
            Err(ReviewError::NotPending(_))
        ));
        assert!(base_key(&DocumentKey::new("trades", "$pending", "a")).is_err());
    }

    #[test]
    fn test_approval_of_update() {
        let docs = vec![pending(
            "a",
            2,
            json!({"qty": 5, "_status": "PENDING", "_base_version": 7, "_approval_roles": ["desk"]}),
        )];
        let batch = approval_batch(&docs, "looks fine", "carol", Utc::now(), &JsonSerializer).unwrap();
        assert_eq!(batch.len(), 2);

        let draft = &batch.records()[0];
        assert_eq!(draft.key(), &DocumentKey::new("trades", "trade$pending", "a"));
        assert_eq!(draft.action(), RecordAction::Delete);
        assert_eq!(draft.update_status(), Some(DocStatus::Live));
        assert_eq!(draft.update_comment(), Some("looks fine"));
        assert_eq!(draft.base_version(), Some(2));

        let base = &batch.records()[1];
        assert_eq!(base.key(), &DocumentKey::new("trades", "trade", "a"));
        assert_eq!(base.action(), RecordAction::Update);
        assert_eq!(base.base_version(), Some(7));
        assert_eq!(base.body(), r#"{"qty":5}"#);
    }

    #[test]
    fn test_approval_of_new_and_deleted() {
        let docs = vec![
            pending("n", 1, json!({"qty": 1, "_status": "PENDING"})),
            pending("d", 3, json!({"_status": "PENDING_DELETE", "_base_version": 2})),
        ];
        let batch = approval_batch(&docs, "ok", "carol", Utc::now(), &JsonSerializer).unwrap();
        let records = batch.records();
        assert_eq!(records.len(), 4);

        assert_eq!(records[1].action(), RecordAction::Create);
        assert_eq!(records[1].base_version(), None);

        assert_eq!(records[2].update_status(), Some(DocStatus::Deleted));
        assert_eq!(records[3].key(), &DocumentKey::new("trades", "trade", "d"));
        assert_eq!(records[3].action(), RecordAction::Delete);
        assert_eq!(records[3].base_version(), Some(2));
    }

    #[test]
    fn test_approval_requires_pending_type() {
        let docs = vec![doc("a", 1)];
        let err = approval_batch(&docs, "ok", "carol", Utc::now(), &JsonSerializer).unwrap_err();
        assert_eq!(err, ReviewError::NotPending(DocumentKey::new("trades", "trade", "a")));
    }

    #[test]
    fn test_validate_approval_roles() {
        let open = pending("a", 1, json!({"_status": "PENDING"}));
        let empty = pending("b", 1, json!({"_approval_roles": []}));
        let desk = pending("c", 1, json!({"_approval_roles": ["desk", "risk"]}));

        assert!(validate_approval_roles([&open, &empty], &[] as &[&str]).is_ok());
        assert!(validate_approval_roles([&open, &desk], &["risk"]).is_ok());
        assert_eq!(
            validate_approval_roles([&open, &desk], &["ops".to_string()]),
            Err(ReviewError::ApprovalDenied(DocumentKey::new("trades", "trade$pending", "c")))
        );
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let docs: Vec<CurrentDoc> = Vec::new();
        assert!(discard_batch(&docs, "carol", Utc::now()).is_err());
    }
}
