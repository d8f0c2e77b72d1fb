//! Write model
//!
//! Immutable values describing what a caller wants written:
//! - `DocumentKey` - document identity
//! - `Record` - one create/update/delete
//! - `Batch` - records bound to a single index, committed atomically
//! - `Bundle` - records across indices, written without isolation
//! - `Snapshot` - the store's current documents for a set of keys

mod batch;
mod errors;
pub mod fields;
pub mod helper;
mod key;
mod record;
mod snapshot;

pub use batch::{Batch, BatchBuilder, Bundle, BundleBuilder};
pub use errors::{ModelError, ModelResult};
pub use key::DocumentKey;
pub use record::{DocStatus, Record, RecordAction, RecordBuilder};
pub use snapshot::{CurrentDoc, Snapshot};
