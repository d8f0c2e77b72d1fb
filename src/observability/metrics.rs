//! Commit metrics
//!
//! Counters only. Monotonic, reset only when the registry is created.
//! Relaxed atomics: values are exact once the counted calls have returned.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct CommitMetrics {
    commits_started: AtomicU64,
    commits_succeeded: AtomicU64,
    commits_failed: AtomicU64,
    lock_conflicts: AtomicU64,
    version_conflicts: AtomicU64,
    compensations: AtomicU64,
    compensation_failures: AtomicU64,
    bulk_writes: AtomicU64,
    documents_written: AtomicU64,
    sequences_issued: AtomicU64,
}

impl CommitMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_commits_started(&self) {
        self.commits_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_commits_succeeded(&self) {
        self.commits_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_commits_failed(&self) {
        self.commits_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_lock_conflicts(&self) {
        self.lock_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_version_conflicts(&self) {
        self.version_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_compensations(&self) {
        self.compensations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_compensation_failures(&self) {
        self.compensation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one bulk request carrying `documents` operations.
    pub fn record_bulk_write(&self, documents: usize) {
        self.bulk_writes.fetch_add(1, Ordering::Relaxed);
        self.documents_written.fetch_add(documents as u64, Ordering::Relaxed);
    }

    pub fn add_sequences_issued(&self, count: u64) {
        self.sequences_issued.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commits_started: self.commits_started.load(Ordering::Relaxed),
            commits_succeeded: self.commits_succeeded.load(Ordering::Relaxed),
            commits_failed: self.commits_failed.load(Ordering::Relaxed),
            lock_conflicts: self.lock_conflicts.load(Ordering::Relaxed),
            version_conflicts: self.version_conflicts.load(Ordering::Relaxed),
            compensations: self.compensations.load(Ordering::Relaxed),
            compensation_failures: self.compensation_failures.load(Ordering::Relaxed),
            bulk_writes: self.bulk_writes.load(Ordering::Relaxed),
            documents_written: self.documents_written.load(Ordering::Relaxed),
            sequences_issued: self.sequences_issued.load(Ordering::Relaxed),
        }
    }

    pub fn to_json(&self) -> String {
        // Plain integers only; cannot fail
        serde_json::to_string(&self.snapshot()).unwrap_or_default()
    }
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub commits_started: u64,
    pub commits_succeeded: u64,
    pub commits_failed: u64,
    pub lock_conflicts: u64,
    pub version_conflicts: u64,
    pub compensations: u64,
    pub compensation_failures: u64,
    pub bulk_writes: u64,
    pub documents_written: u64,
    pub sequences_issued: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_are_zero() {
        assert_eq!(CommitMetrics::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_counters() {
        let metrics = CommitMetrics::new();
        metrics.increment_commits_started();
        metrics.increment_commits_started();
        metrics.increment_commits_failed();
        metrics.increment_lock_conflicts();
        metrics.record_bulk_write(3);
        metrics.record_bulk_write(2);
        metrics.add_sequences_issued(5);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.commits_started, 2);
        assert_eq!(snapshot.commits_failed, 1);
        assert_eq!(snapshot.lock_conflicts, 1);
        assert_eq!(snapshot.bulk_writes, 2);
        assert_eq!(snapshot.documents_written, 5);
        assert_eq!(snapshot.sequences_issued, 5);
    }

    #[test]
    fn test_to_json() {
        let metrics = CommitMetrics::new();
        metrics.increment_compensations();
        let parsed: serde_json::Value = serde_json::from_str(&metrics.to_json()).unwrap();
        assert_eq!(parsed["compensations"], 1);
        assert_eq!(parsed["commits_started"], 0);
    }
}
