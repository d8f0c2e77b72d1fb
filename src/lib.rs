//! commitgate - A strict two-phase write coordinator for versioned document stores
//!
//! Batches of document mutations bound to a single index are committed under an
//! index-wide sentinel lock, validated against the current store versions, written
//! in two phases (history bookkeeping, then live documents) and compensated on
//! partial failure so a refreshed reader observes all of the batch or none of it.

pub mod bulk;
pub mod config;
pub mod coordinator;
pub mod model;
pub mod observability;
pub mod sequence;
pub mod store;
pub mod validator;

pub use bulk::{accepted_keys, classify, CommitError, ErrorPolicy};
pub use config::{ConfigError, CoordinatorConfig};
pub use coordinator::{CommitCoordinator, CommitState, CoordinatorError, CoordinatorResult, IndexLock};
pub use model::{Batch, Bundle, CurrentDoc, DocStatus, DocumentKey, Record, RecordAction, Snapshot};
pub use sequence::SequenceGenerator;
pub use store::{DocumentStoreClient, InMemoryStore, StoreError, WriteOp};
pub use validator::{StandardValidator, VersionValidator};
