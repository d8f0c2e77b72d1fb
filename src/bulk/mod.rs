//! Bulk error classification
//!
//! Stores report bulk failures per item, as strings. This module turns them
//! into a decision: tolerated (dropped) or fatal (collected per key).

mod classifier;
mod policy;

pub use classifier::{accepted_keys, classify, CommitError};
pub use policy::ErrorPolicy;
