//! Mutual Exclusion Tests
//!
//! At most one commit per index is between lock and unlock at any time:
//! - a commit started while another holds the lock fails with LockConflict
//! - the failed commit leaves no trace and does not release the holder's lock
//! - commits on different indices do not contend

use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use serde_json::Value;

use commitgate::store::{BulkResponse, StoreResult};
use commitgate::{
    Batch, CommitCoordinator, CoordinatorError, CurrentDoc, DocumentKey, DocumentStoreClient,
    InMemoryStore, Record, WriteOp,
};

/// Pauses the first snapshot fetch until the test lets it continue.
///
/// The fetch happens right after the lock is taken, so a paused commit holds
/// the lock for as long as the test wants.
struct GatedStore {
    inner: Arc<InMemoryStore>,
    gate: Mutex<Option<(Arc<Barrier>, Arc<Barrier>)>>,
}

impl GatedStore {
    fn new(inner: Arc<InMemoryStore>, reached: Arc<Barrier>, resume: Arc<Barrier>) -> Self {
        Self {
            inner,
            gate: Mutex::new(Some((reached, resume))),
        }
    }
}

impl DocumentStoreClient for GatedStore {
    fn index_exists(&self, index: &str) -> StoreResult<bool> {
        self.inner.index_exists(index)
    }

    fn conditional_create(&self, key: &DocumentKey, body: Value) -> StoreResult<u64> {
        self.inner.conditional_create(key, body)
    }

    fn delete(&self, key: &DocumentKey) -> StoreResult<()> {
        self.inner.delete(key)
    }

    fn bulk_write(&self, ops: &[WriteOp], force_refresh: bool) -> StoreResult<BulkResponse> {
        self.inner.bulk_write(ops, force_refresh)
    }

    fn refresh(&self, indices: &[String]) -> StoreResult<()> {
        self.inner.refresh(indices)
    }

    fn fetch_by_keys(&self, keys: &[DocumentKey]) -> StoreResult<Vec<CurrentDoc>> {
        let gate = self.gate.lock().unwrap().take();
        if let Some((reached, resume)) = gate {
            reached.wait();
            resume.wait();
        }
        self.inner.fetch_by_keys(keys)
    }
}

fn key(index: &str, id: &str) -> DocumentKey {
    DocumentKey::new(index, "trade", id)
}

fn create_batch(index: &str, id: &str, user: &str) -> Batch {
    Batch::builder()
        .user(user)
        .record(Record::create(key(index, id), r#"{"qty": 1}"#))
        .build()
        .unwrap()
}

// =============================================================================
// Concurrent Commits on One Index
// =============================================================================

/// A commit on a locked index fails immediately and leaves nothing behind.
#[test]
fn test_second_commit_conflicts_while_first_holds_lock() {
    let store = Arc::new(InMemoryStore::with_indices(["trades"]));
    let reached = Arc::new(Barrier::new(2));
    let resume = Arc::new(Barrier::new(2));
    let gated = Arc::new(GatedStore::new(store.clone(), reached.clone(), resume.clone()));
    let coordinator = Arc::new(CommitCoordinator::new(gated));

    let first = {
        let coordinator = coordinator.clone();
        thread::spawn(move || coordinator.commit(&create_batch("trades", "a", "alice")))
    };

    // A now holds the lock and is paused in its snapshot fetch
    reached.wait();
    let lock = DocumentKey::new("trades", "$lock", "global");
    assert!(store.document(&lock).is_some());

    let err = coordinator
        .commit(&create_batch("trades", "b", "bob"))
        .unwrap_err();
    assert_eq!(err, CoordinatorError::LockConflict { index: "trades".into() });
    assert!(err.is_retryable());

    // B neither wrote nor released A's lock
    assert!(store.bulk_log().is_empty());
    assert!(store.document(&lock).is_some());

    resume.wait();
    let accepted = first.join().unwrap().unwrap();
    assert_eq!(accepted, vec![key("trades", "a").with_version(1)]);

    assert!(store.document(&key("trades", "b")).is_none());
    assert!(store.document(&lock).is_none());

    // Retrying B after A finished succeeds
    coordinator.commit(&create_batch("trades", "b", "bob")).unwrap();
    assert!(store.visible_document(&key("trades", "b")).is_some());
}

/// Racing commits either win or fail with LockConflict; every winner's write
/// is present and no loser's is.
#[test]
fn test_racing_commits_are_serialized() {
    const WRITERS: usize = 8;

    let store = Arc::new(InMemoryStore::with_indices(["trades"]));
    let coordinator = Arc::new(CommitCoordinator::new(store.clone()));
    let start = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let coordinator = coordinator.clone();
            let start = start.clone();
            thread::spawn(move || {
                let id = format!("w{}", i);
                start.wait();
                (id.clone(), coordinator.commit(&create_batch("trades", &id, &id)))
            })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        let (id, result) = handle.join().unwrap();
        match result {
            Ok(accepted) => {
                winners += 1;
                assert_eq!(accepted, vec![key("trades", &id).with_version(1)]);
                assert!(store.document(&key("trades", &id)).is_some());
            }
            Err(CoordinatorError::LockConflict { .. }) => {
                assert!(store.document(&key("trades", &id)).is_none());
            }
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }

    assert!(winners >= 1);
    let metrics = coordinator.metrics().snapshot();
    assert_eq!(metrics.commits_succeeded as usize, winners);
    assert_eq!(metrics.lock_conflicts as usize, WRITERS - winners);
    assert!(store
        .document(&DocumentKey::new("trades", "$lock", "global"))
        .is_none());
}

// =============================================================================
// Independent Indices
// =============================================================================

/// Holding the lock on one index does not block another.
#[test]
fn test_locks_are_per_index() {
    let store = Arc::new(InMemoryStore::with_indices(["trades", "orders"]));
    let coordinator = CommitCoordinator::new(store.clone());

    let _held = coordinator.lock_index("trades", "ops").unwrap();

    assert!(matches!(
        coordinator.commit(&create_batch("trades", "a", "alice")),
        Err(CoordinatorError::LockConflict { .. })
    ));
    coordinator
        .commit(&create_batch("orders", "o1", "alice"))
        .unwrap();
    assert!(store.visible_document(&key("orders", "o1")).is_some());
}

/// A lock left behind by a crashed holder blocks until cleared by hand.
#[test]
fn test_abandoned_lock_requires_unlock() {
    let store = Arc::new(InMemoryStore::with_indices(["trades"]));
    let coordinator = CommitCoordinator::new(store.clone());

    std::mem::forget(coordinator.lock_index("trades", "crashed").unwrap());

    assert!(coordinator.commit(&create_batch("trades", "a", "alice")).is_err());
    coordinator.unlock_index("trades").unwrap();
    assert!(coordinator.commit(&create_batch("trades", "a", "alice")).is_ok());
}
