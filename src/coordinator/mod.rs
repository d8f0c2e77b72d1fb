//! Commit Coordinator
//!
//! This module provides:
//! - `CommitCoordinator` - lock, validate, two-phase write, compensate
//! - `CommitState` - the per-attempt state machine
//! - `IndexLock` - the store-side per-index write lock
//! - `CoordinatorError` - the caller-visible error taxonomy
//!
//! Non-transactional paths (`bulk_index`, `force_reindex`) live on the same
//! type but bypass the lock and validation entirely.

mod coordinator;
mod errors;
mod lock;
mod ops;
mod state;

pub use coordinator::CommitCoordinator;
pub use errors::{CoordinatorError, CoordinatorResult};
pub use lock::IndexLock;
pub use state::{CommitState, CommitStateError};
