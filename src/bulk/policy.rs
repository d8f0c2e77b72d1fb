//! Error policies
//!
//! A policy decides which per-item failure messages are noise. Strict
//! tolerates nothing and guards both phases of a commit. Lenient guards
//! compensation and re-indexing, where the target may already be in the
//! wanted state or already gone.

use crate::store::messages;

/// Predicate over raw bulk failure messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPolicy {
    tolerated: Vec<String>,
}

impl ErrorPolicy {
    /// Tolerate nothing.
    pub fn strict() -> Self {
        Self { tolerated: Vec::new() }
    }

    /// Tolerate duplicate, stale-version and missing-document failures.
    pub fn lenient() -> Self {
        Self::tolerating([
            messages::ALREADY_EXISTS,
            messages::VERSION_CONFLICT,
            messages::DOCUMENT_MISSING,
        ])
    }

    /// Tolerate messages containing any of `patterns`.
    pub fn tolerating<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tolerated: patterns
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    pub fn is_strict(&self) -> bool {
        self.tolerated.is_empty()
    }

    /// True if a failure with `message` should be ignored.
    pub fn tolerates(&self, message: &str) -> bool {
        self.tolerated.iter().any(|p| message.contains(p.as_str()))
    }

    pub fn patterns(&self) -> &[String] {
        &self.tolerated
    }
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self::strict()
    }
}
