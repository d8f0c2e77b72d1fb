//! Per-index write lock
//!
//! The lock is a sentinel document created with a conditional create. The
//! store adjudicates concurrent creates, so exactly one holder exists at a
//! time. The sentinel carries a random holder token for diagnostics.
//!
//! There is no lease: a holder that dies without releasing leaves the index
//! locked until an operator removes the sentinel.

use chrono::{SecondsFormat, Utc};
use serde_json::json;
use uuid::Uuid;

use super::errors::{CoordinatorError, CoordinatorResult};
use crate::model::DocumentKey;
use crate::observability::{log_event, Event};
use crate::store::{DocumentStoreClient, StoreError, StoreResult};

/// Held index lock. Released explicitly or on drop.
#[must_use = "the index is unlocked as soon as the guard is dropped"]
pub struct IndexLock<'a> {
    store: &'a dyn DocumentStoreClient,
    key: DocumentKey,
    holder: Uuid,
    released: bool,
}

impl<'a> IndexLock<'a> {
    /// Create the sentinel at `key`.
    ///
    /// Fails with `LockConflict` if it already exists.
    pub fn acquire(
        store: &'a dyn DocumentStoreClient,
        key: DocumentKey,
        user: &str,
    ) -> CoordinatorResult<Self> {
        let holder = Uuid::new_v4();
        let body = json!({
            "holder": holder.to_string(),
            "user": user,
            "acquired_at": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });

        match store.conditional_create(&key, body) {
            Ok(_) => {
                log_event(
                    Event::LockAcquired,
                    &[("index", &key.index), ("holder", &holder.to_string()), ("user", user)],
                );
                Ok(Self {
                    store,
                    key,
                    holder,
                    released: false,
                })
            }
            Err(StoreError::AlreadyExists(_)) => {
                log_event(Event::LockConflict, &[("index", &key.index), ("user", user)]);
                Err(CoordinatorError::LockConflict { index: key.index })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn holder(&self) -> Uuid {
        self.holder
    }

    /// Delete the sentinel.
    pub fn release(mut self) -> StoreResult<()> {
        self.released = true;
        self.delete_sentinel()
    }

    fn delete_sentinel(&self) -> StoreResult<()> {
        let holder = self.holder.to_string();
        match self.store.delete(&self.key) {
            Ok(()) => {
                log_event(Event::LockReleased, &[("index", &self.key.index), ("holder", &holder)]);
                Ok(())
            }
            Err(e) => {
                log_event(
                    Event::LockReleaseFailed,
                    &[
                        ("index", &self.key.index),
                        ("holder", &holder),
                        ("error", &e.to_string()),
                    ],
                );
                Err(e)
            }
        }
    }
}

impl Drop for IndexLock<'_> {
    fn drop(&mut self) {
        if !self.released {
            // Failure already logged
            let _ = self.delete_sentinel();
        }
    }
}

impl std::fmt::Debug for IndexLock<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexLock")
            .field("key", &self.key)
            .field("holder", &self.holder)
            .field("released", &self.released)
            .finish()
    }
}
