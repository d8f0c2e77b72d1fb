//! Record to store operation translation
//!
//! Live writes carry the coordinator's hidden fields next to the caller's
//! content. Updates and deletes are guarded by the version observed in the
//! snapshot, so a write that slipped past the lock fails the bulk item instead
//! of being overwritten.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::model::fields::{
    BASE_VERSION_FIELD, COMMENT_FIELD, STATUS_FIELD, TIMESTAMP_FIELD, USER_FIELD,
};
use crate::model::{Batch, DocStatus, DocumentKey, Record, RecordAction, Snapshot};
use crate::store::{DocumentSerializer, PutMode, SerializeError, WriteOp};

/// Hidden-field values shared by every record of a write.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Stamp<'a> {
    pub user: &'a str,
    pub timestamp: DateTime<Utc>,
}

/// Phase 2 operations for `batch`, in record order.
pub(crate) fn live_ops(
    batch: &Batch,
    snapshot: &Snapshot,
    serializer: &dyn DocumentSerializer,
) -> Result<Vec<WriteOp>, SerializeError> {
    let stamp = Stamp {
        user: batch.user(),
        timestamp: batch.timestamp(),
    };
    batch
        .records()
        .iter()
        .map(|record| {
            let guard = snapshot.get(record.key()).map(|doc| doc.version());
            record_op(record, guard, &stamp, serializer)
        })
        .collect()
}

/// Unguarded operations for the records of a bulk index.
pub(crate) fn unguarded_ops<'r>(
    records: impl IntoIterator<Item = &'r Record>,
    stamp: &Stamp<'_>,
    serializer: &dyn DocumentSerializer,
) -> Result<Vec<WriteOp>, SerializeError> {
    records
        .into_iter()
        .map(|record| record_op(record, record.base_version(), stamp, serializer))
        .collect()
}

/// Operations putting every key of `keys` back to its snapshot state.
///
/// Snapshot documents are forced back at their snapshot version. Keys the
/// snapshot does not hold are deleted.
pub(crate) fn restore_ops(keys: &[DocumentKey], snapshot: &Snapshot) -> Vec<WriteOp> {
    keys.iter()
        .map(|key| match snapshot.get(key) {
            Some(doc) => WriteOp::forced(doc.key().clone(), doc.body().clone(), doc.version()),
            None => WriteOp::delete(key.without_version()),
        })
        .collect()
}

fn record_op(
    record: &Record,
    guard: Option<u64>,
    stamp: &Stamp<'_>,
    serializer: &dyn DocumentSerializer,
) -> Result<WriteOp, SerializeError> {
    let key = record.key().without_version();
    let op = match record.action() {
        RecordAction::Create => WriteOp::Put {
            key,
            body: live_body(record, stamp, serializer)?,
            mode: PutMode::CreateOnly,
        },
        RecordAction::Update => WriteOp::Put {
            key,
            body: live_body(record, stamp, serializer)?,
            mode: guard.map_or(PutMode::Any, PutMode::IfVersion),
        },
        RecordAction::Delete => WriteOp::Delete {
            key,
            if_version: guard,
        },
    };
    Ok(op)
}

fn live_body(
    record: &Record,
    stamp: &Stamp<'_>,
    serializer: &dyn DocumentSerializer,
) -> Result<Value, SerializeError> {
    let mut body = match serializer.decode(record.body())? {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };

    let status = record.status().unwrap_or(DocStatus::Live);
    body.insert(STATUS_FIELD.to_string(), Value::from(status.as_str()));
    match record.comment() {
        Some(comment) => body.insert(COMMENT_FIELD.to_string(), Value::from(comment)),
        None => body.remove(COMMENT_FIELD),
    };
    body.insert(USER_FIELD.to_string(), Value::from(stamp.user));
    body.insert(
        TIMESTAMP_FIELD.to_string(),
        Value::from(stamp.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    match record.base_version() {
        Some(base) => body.insert(BASE_VERSION_FIELD.to_string(), Value::from(base)),
        None => body.remove(BASE_VERSION_FIELD),
    };
    Ok(Value::Object(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CurrentDoc;
    use crate::store::JsonSerializer;
    use chrono::TimeZone;
    use serde_json::json;

    fn key(id: &str) -> DocumentKey {
        DocumentKey::new("trades", "trade", id)
    }

    fn batch(records: Vec<Record>) -> Batch {
        Batch::builder()
            .user("alice")
            .timestamp(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
            .records(records)
            .build()
            .unwrap()
    }

    #[test]
    fn test_live_ops_per_action() {
        let snapshot = Snapshot::from_docs([
            CurrentDoc::new(key("u"), 4, json!({"qty": 1})),
            CurrentDoc::new(key("d"), 9, json!({"qty": 2})),
        ]);
        let batch = batch(vec![
            Record::create(key("c"), r#"{"qty": 3}"#),
            Record::update(key("u"), r#"{"qty": 5}"#).with_base_version(4),
            Record::delete(key("d")),
        ]);

        let ops = live_ops(&batch, &snapshot, &JsonSerializer).unwrap();
        assert_eq!(ops.len(), 3);

        match &ops[0] {
            WriteOp::Put { key: k, body, mode } => {
                assert_eq!(k, &key("c"));
                assert_eq!(*mode, PutMode::CreateOnly);
                assert_eq!(body["qty"], 3);
                assert_eq!(body["_status"], "LIVE");
                assert_eq!(body["_user"], "alice");
                assert_eq!(body["_timestamp"], "2024-03-01T12:00:00.000Z");
                assert!(body.get("_base_version").is_none());
            }
            other => panic!("unexpected op {:?}", other),
        }
        match &ops[1] {
            WriteOp::Put { mode, body, .. } => {
                assert_eq!(*mode, PutMode::IfVersion(4));
                assert_eq!(body["_base_version"], 4);
            }
            other => panic!("unexpected op {:?}", other),
        }
        assert_eq!(
            ops[2],
            WriteOp::Delete {
                key: key("d"),
                if_version: Some(9)
            }
        );
    }

    #[test]
    fn test_status_and_comment_are_written() {
        let record = Record::update_with_status(
            key("u"),
            DocStatus::Pending,
            Some("needs review".to_string()),
            r#"{"qty": 1, "_comment": "stale"}"#,
        );
        let ops = live_ops(&batch(vec![record]), &Snapshot::new(), &JsonSerializer).unwrap();
        match &ops[0] {
            WriteOp::Put { body, mode, .. } => {
                assert_eq!(*mode, PutMode::Any);
                assert_eq!(body["_status"], "PENDING");
                assert_eq!(body["_comment"], "needs review");
            }
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn test_bad_body_fails_before_any_op() {
        let batch = batch(vec![
            Record::create(key("a"), r#"{"ok": true}"#),
            Record::create(key("b"), "not json"),
        ]);
        assert!(live_ops(&batch, &Snapshot::new(), &JsonSerializer).is_err());
    }

    #[test]
    fn test_restore_ops() {
        let snapshot = Snapshot::from_docs([CurrentDoc::new(key("a"), 3, json!({"qty": 1}))]);
        let ops = restore_ops(&[key("a"), key("b").with_version(1)], &snapshot);
        assert_eq!(
            ops,
            vec![
                WriteOp::forced(key("a"), json!({"qty": 1}), 3),
                WriteOp::delete(key("b")),
            ]
        );
    }
}
