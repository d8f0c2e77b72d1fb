//! Observable events
//!
//! Every line the coordinator logs names one of these.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    ConfigLoaded,

    // Locking
    LockAcquired,
    LockConflict,
    LockReleased,
    /// Sentinel could not be deleted; the index stays locked
    LockReleaseFailed,

    // Commit
    CommitBegin,
    CommitStateChanged,
    VersionConflict,
    BookkeepingWritten,
    LiveWritten,
    CommitComplete,
    CommitFailed,

    // Compensation
    CompensationBegin,
    CompensationComplete,
    CompensationFailed,

    // Refresh
    RefreshFailed,

    // Bulk paths
    BulkIndex,
    Reindex,

    // Sequences
    SequenceIssued,
    SequenceBlockIssued,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::LockAcquired => "LOCK_ACQUIRED",
            Event::LockConflict => "LOCK_CONFLICT",
            Event::LockReleased => "LOCK_RELEASED",
            Event::LockReleaseFailed => "LOCK_RELEASE_FAILED",

            Event::CommitBegin => "COMMIT_BEGIN",
            Event::CommitStateChanged => "COMMIT_STATE",
            Event::VersionConflict => "VERSION_CONFLICT",
            Event::BookkeepingWritten => "BOOKKEEPING_WRITTEN",
            Event::LiveWritten => "LIVE_WRITTEN",
            Event::CommitComplete => "COMMIT_COMPLETE",
            Event::CommitFailed => "COMMIT_FAILED",

            Event::CompensationBegin => "COMPENSATION_BEGIN",
            Event::CompensationComplete => "COMPENSATION_COMPLETE",
            Event::CompensationFailed => "COMPENSATION_FAILED",

            Event::RefreshFailed => "REFRESH_FAILED",

            Event::BulkIndex => "BULK_INDEX",
            Event::Reindex => "REINDEX",

            Event::SequenceIssued => "SEQUENCE_ISSUED",
            Event::SequenceBlockIssued => "SEQUENCE_BLOCK_ISSUED",
        }
    }

    /// Severity the event is logged at.
    pub fn severity(&self) -> Severity {
        match self {
            Event::CommitStateChanged | Event::SequenceIssued => Severity::Trace,
            Event::LockConflict | Event::VersionConflict => Severity::Warn,
            Event::CommitFailed
            | Event::CompensationBegin
            | Event::CompensationFailed
            | Event::RefreshFailed => Severity::Error,
            // An index left locked needs an operator
            Event::LockReleaseFailed => Severity::Fatal,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
