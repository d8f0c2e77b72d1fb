//! Version validation and bookkeeping construction
//!
//! Validation runs after the index lock is held and the current documents are
//! fetched, and before anything is written. A conflict aborts the commit with
//! nothing to undo.
//!
//! Rules for each record:
//! - CREATE: nothing to compare; the store rejects it later if the key exists
//! - UPDATE / DELETE: the document must exist, and if the record declares a
//!   base version it must equal the current one

use crate::model::{Batch, CurrentDoc, DocStatus, Record, RecordAction, Snapshot};
use crate::store::WriteOp;

use super::errors::{ValidationError, ValidationResult};
use super::history::{Demotion, HistoryLayout};

/// Phase 1 of a commit: history entries written before the live documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookkeepingWrite {
    /// Operations to apply, in record order
    pub ops: Vec<WriteOp>,
    /// Keys the operations create; removed again on compensation
    pub history_keys: Vec<crate::model::DocumentKey>,
}

impl BookkeepingWrite {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn push(&mut self, op: WriteOp) {
        self.history_keys.push(op.key().clone());
        self.ops.push(op);
    }
}

/// Decides whether a batch is consistent with the store and what phase 1 writes.
pub trait VersionValidator: Send + Sync {
    fn validate(
        &self,
        batch: &Batch,
        snapshot: &Snapshot,
        history: &HistoryLayout,
    ) -> ValidationResult<BookkeepingWrite>;
}

/// Check one record against the snapshot, returning the superseded document.
fn check_record<'s>(record: &Record, snapshot: &'s Snapshot) -> ValidationResult<Option<&'s CurrentDoc>> {
    if record.action() == RecordAction::Create {
        return Ok(None);
    }

    let current = snapshot.get(record.key()).ok_or_else(|| {
        ValidationError::version_conflict(record.key(), record.base_version(), None)
    })?;

    match record.base_version() {
        Some(base) if base != current.version() => Err(ValidationError::version_conflict(
            record.key(),
            Some(base),
            Some(current.version()),
        )),
        _ => Ok(Some(current)),
    }
}

/// Checks versions and demotes every superseded document into history.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardValidator;

impl VersionValidator for StandardValidator {
    fn validate(
        &self,
        batch: &Batch,
        snapshot: &Snapshot,
        history: &HistoryLayout,
    ) -> ValidationResult<BookkeepingWrite> {
        let mut write = BookkeepingWrite::default();

        for record in batch.records() {
            let Some(current) = check_record(record, snapshot)? else {
                continue;
            };
            let demotion = Demotion {
                status: record.update_status().unwrap_or(match record.action() {
                    RecordAction::Delete => DocStatus::Deleted,
                    _ => DocStatus::Expired,
                }),
                comment: record.update_comment(),
                user: batch.user(),
                timestamp: batch.timestamp(),
            };
            write.push(history.entry_for(current, &demotion));
        }

        Ok(write)
    }
}

/// Checks versions only. For indices that keep no history.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHistoryValidator;

impl VersionValidator for NoHistoryValidator {
    fn validate(
        &self,
        batch: &Batch,
        snapshot: &Snapshot,
        _history: &HistoryLayout,
    ) -> ValidationResult<BookkeepingWrite> {
        for record in batch.records() {
            check_record(record, snapshot)?;
        }
        Ok(BookkeepingWrite::default())
    }
}
