//! Bulk result classification
//!
//! Failed items are either dropped (tolerated by the policy) or collected into
//! a `CommitError` keyed by document. An empty collection means success.

use std::collections::BTreeMap;
use std::fmt;

use super::policy::ErrorPolicy;
use crate::model::DocumentKey;
use crate::store::{BulkOutcome, BulkResponse};

/// Fatal per-document failures of one bulk write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitError {
    failures: BTreeMap<DocumentKey, String>,
}

impl CommitError {
    pub fn new(failures: BTreeMap<DocumentKey, String>) -> Self {
        Self { failures }
    }

    pub fn failures(&self) -> &BTreeMap<DocumentKey, String> {
        &self.failures
    }

    pub fn keys(&self) -> impl Iterator<Item = &DocumentKey> {
        self.failures.keys()
    }

    pub fn message_for(&self, key: &DocumentKey) -> Option<&str> {
        self.failures.get(&key.without_version()).map(String::as_str)
    }

    pub fn contains(&self, key: &DocumentKey) -> bool {
        self.failures.contains_key(&key.without_version())
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for CommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bulk write failed for {} document(s)", self.failures.len())?;
        for (key, message) in &self.failures {
            write!(f, "; {}: {}", key, message)?;
        }
        Ok(())
    }
}

impl std::error::Error for CommitError {}

/// Collect the failures `policy` does not tolerate.
///
/// Returns `None` when nothing fatal remains.
pub fn classify(response: &BulkResponse, policy: &ErrorPolicy) -> Option<CommitError> {
    let failures: BTreeMap<DocumentKey, String> = response
        .items
        .iter()
        .filter_map(|item| match &item.outcome {
            BulkOutcome::Failed(message) if !policy.tolerates(message) => {
                Some((item.key.without_version(), message.clone()))
            }
            _ => None,
        })
        .collect();

    if failures.is_empty() {
        None
    } else {
        Some(CommitError::new(failures))
    }
}

/// Keys of applied items, each carrying its assigned version, in response order.
pub fn accepted_keys(response: &BulkResponse) -> Vec<DocumentKey> {
    response
        .items
        .iter()
        .filter_map(|item| item.version().map(|v| item.key.with_version(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{messages, BulkItem};

    fn key(id: &str) -> DocumentKey {
        DocumentKey::new("trades", "trade", id)
    }

    #[test]
    fn test_no_failures_is_none() {
        let response = BulkResponse::new(vec![BulkItem::applied(key("a"), 1)]);
        assert!(classify(&response, &ErrorPolicy::strict()).is_none());
    }

    #[test]
    fn test_tolerated_and_fatal_split() {
        let response = BulkResponse::new(vec![
            BulkItem::applied(key("a"), 1),
            BulkItem::failed(key("b"), messages::already_exists(&key("b"))),
            BulkItem::failed(key("c"), "MapperParsingException: bad field"),
        ]);

        let policy = ErrorPolicy::tolerating([messages::ALREADY_EXISTS]);
        let error = classify(&response, &policy).unwrap();

        assert_eq!(error.len(), 1);
        assert!(error.contains(&key("c")));
        assert!(!error.contains(&key("b")));
        assert_eq!(error.message_for(&key("c")), Some("MapperParsingException: bad field"));
    }

    #[test]
    fn test_strict_keeps_everything() {
        let response = BulkResponse::new(vec![
            BulkItem::failed(key("a"), messages::document_missing(&key("a"))),
            BulkItem::failed(key("b"), "boom"),
        ]);
        let error = classify(&response, &ErrorPolicy::strict()).unwrap();
        assert_eq!(error.keys().cloned().collect::<Vec<_>>(), vec![key("a"), key("b")]);
    }

    #[test]
    fn test_accepted_keys_skip_failures() {
        let response = BulkResponse::new(vec![
            BulkItem::applied(key("a"), 4),
            BulkItem::failed(key("b"), "boom"),
        ]);
        assert_eq!(accepted_keys(&response), vec![key("a").with_version(4)]);
    }

    #[test]
    fn test_display_lists_keys() {
        let response = BulkResponse::new(vec![BulkItem::failed(key("a"), "boom")]);
        let error = classify(&response, &ErrorPolicy::strict()).unwrap();
        let text = error.to_string();
        assert!(text.contains("1 document(s)"));
        assert!(text.contains("trades/trade/a: boom"));
    }
}
