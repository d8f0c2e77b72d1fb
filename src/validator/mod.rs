//! Version Validation
//!
//! Compares a batch against the store's current documents and builds the
//! bookkeeping half of the two-phase write.

mod errors;
mod history;
mod validator;

pub use errors::{ValidationError, ValidationResult};
pub use history::{Demotion, HistoryLayout};
pub use validator::{BookkeepingWrite, NoHistoryValidator, StandardValidator, VersionValidator};
