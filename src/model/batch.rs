//! Batches and bundles
//!
//! A `Batch` is the unit of a two-phase commit. Every record in it targets the
//! same index (the unary index), which is what lets a single index lock
//! isolate the whole commit.
//!
//! A `Bundle` drops that constraint. It may span several indices and is only
//! ever written with a single bulk request, without locking or compensation.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::errors::{ModelError, ModelResult};
use super::key::DocumentKey;
use super::record::Record;

/// Immutable, ordered set of records bound to one index.
#[derive(Debug, Clone)]
pub struct Batch {
    unary_index: String,
    records: Vec<Record>,
    user: String,
    timestamp: DateTime<Utc>,
}

impl Batch {
    pub fn builder() -> BatchBuilder {
        BatchBuilder::default()
    }

    /// The single index every record targets.
    pub fn unary_index(&self) -> &str {
        &self.unary_index
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Record keys in submission order.
    pub fn keys(&self) -> Vec<DocumentKey> {
        self.records.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Append-only builder for `Batch`.
#[derive(Debug, Clone, Default)]
pub struct BatchBuilder {
    records: Vec<Record>,
    user: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

impl BatchBuilder {
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }

    pub fn records(mut self, records: impl IntoIterator<Item = Record>) -> Self {
        self.records.extend(records);
        self
    }

    /// Validate and freeze the batch.
    ///
    /// Duplicate records (same key and action) are dropped; the first one wins.
    /// The timestamp defaults to now.
    pub fn build(self) -> ModelResult<Batch> {
        let user = self.user.ok_or(ModelError::MissingUser)?;
        let records = dedup(self.records);

        let first = records.first().ok_or(ModelError::EmptyBatch)?;
        let unary_index = first.key().index.clone();

        if let Some(stray) = records.iter().find(|r| r.key().index != unary_index) {
            return Err(ModelError::MixedIndices {
                expected: unary_index,
                found: stray.key().index.clone(),
            });
        }

        Ok(Batch {
            unary_index,
            records,
            user,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        })
    }
}

/// Records that may span several indices, written without isolation.
#[derive(Debug, Clone)]
pub struct Bundle {
    records: Vec<Record>,
    user: String,
    timestamp: DateTime<Utc>,
}

impl Bundle {
    pub fn builder() -> BundleBuilder {
        BundleBuilder::default()
    }

    /// Build a bundle from a batch. Useful for re-indexing a batch without the
    /// commit protocol.
    pub fn from_batch(batch: Batch) -> Self {
        Self {
            records: batch.records,
            user: batch.user,
            timestamp: batch.timestamp,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn keys(&self) -> Vec<DocumentKey> {
        self.records.iter().map(|r| r.key().clone()).collect()
    }

    /// Distinct indices touched, in first-seen order.
    pub fn indices(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .map(|r| &r.key().index)
            .filter(|index| seen.insert(index.as_str()))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Append-only builder for `Bundle`.
#[derive(Debug, Clone, Default)]
pub struct BundleBuilder {
    records: Vec<Record>,
    user: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

impl BundleBuilder {
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }

    pub fn records(mut self, records: impl IntoIterator<Item = Record>) -> Self {
        self.records.extend(records);
        self
    }

    pub fn build(self) -> ModelResult<Bundle> {
        let user = self.user.ok_or(ModelError::MissingUser)?;
        let records = dedup(self.records);
        if records.is_empty() {
            return Err(ModelError::EmptyBundle);
        }
        Ok(Bundle {
            records,
            user,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        })
    }
}

fn dedup(records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert((r.key().clone(), r.action())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn key(index: &str, id: &str) -> DocumentKey {
        DocumentKey::new(index, "trade", id)
    }

    #[test]
    fn test_batch_keeps_order_and_index() {
        let batch = Batch::builder()
            .user("alice")
            .record(Record::create(key("trades", "b"), "{}"))
            .record(Record::create(key("trades", "a"), "{}"))
            .build()
            .unwrap();

        assert_eq!(batch.unary_index(), "trades");
        assert_eq!(batch.keys(), vec![key("trades", "b"), key("trades", "a")]);
        assert_eq!(batch.user(), "alice");
    }

    #[test]
    fn test_batch_rejects_mixed_indices() {
        let result = Batch::builder()
            .user("alice")
            .record(Record::create(key("trades", "a"), "{}"))
            .record(Record::create(key("orders", "b"), "{}"))
            .build();

        assert_eq!(
            result.unwrap_err(),
            ModelError::MixedIndices {
                expected: "trades".into(),
                found: "orders".into()
            }
        );
    }

    #[test]
    fn test_batch_requires_records_and_user() {
        assert_eq!(Batch::builder().user("alice").build().unwrap_err(), ModelError::EmptyBatch);
        let no_user = Batch::builder().record(Record::create(key("trades", "a"), "{}")).build();
        assert_eq!(no_user.unwrap_err(), ModelError::MissingUser);
    }

    #[test]
    fn test_batch_dedups_first_wins() {
        let batch = Batch::builder()
            .user("alice")
            .record(Record::create(key("trades", "a"), r#"{"n":1}"#))
            .record(Record::create(key("trades", "a"), r#"{"n":2}"#))
            .record(Record::delete(key("trades", "a")))
            .build()
            .unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.records()[0].body(), r#"{"n":1}"#);
    }

    #[test]
    fn test_batch_timestamp_is_kept() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let batch = Batch::builder()
            .user("alice")
            .timestamp(ts)
            .record(Record::create(key("trades", "a"), "{}"))
            .build()
            .unwrap();
        assert_eq!(batch.timestamp(), ts);
    }

    #[test]
    fn test_bundle_spans_indices() {
        let bundle = Bundle::builder()
            .user("bob")
            .record(Record::create(key("trades", "a"), "{}"))
            .record(Record::create(key("orders", "b"), "{}"))
            .record(Record::create(key("trades", "c"), "{}"))
            .build()
            .unwrap();

        assert_eq!(bundle.indices(), vec!["trades".to_string(), "orders".to_string()]);
        assert_eq!(bundle.len(), 3);
    }

    #[test]
    fn test_bundle_requires_records() {
        assert_eq!(Bundle::builder().user("bob").build().unwrap_err(), ModelError::EmptyBundle);
    }
}
