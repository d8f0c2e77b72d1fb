//! Store-backed sequence numbers
//!
//! A counter is a document whose body never matters. Every unconditional put
//! bumps its version by one, so the version returned by the store is the next
//! number. Uniqueness and monotonicity are the store's guarantees, not ours.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::bulk::{classify, ErrorPolicy};
use crate::coordinator::{CoordinatorError, CoordinatorResult};
use crate::model::DocumentKey;
use crate::observability::{log_event, CommitMetrics, Event};
use crate::store::{DocumentStoreClient, StoreError, WriteOp};

pub struct SequenceGenerator {
    store: Arc<dyn DocumentStoreClient>,
    metrics: Arc<CommitMetrics>,
}

impl SequenceGenerator {
    pub fn new(store: Arc<dyn DocumentStoreClient>) -> Self {
        Self {
            store,
            metrics: Arc::new(CommitMetrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<CommitMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Next number of the counter at `key`.
    pub fn next(&self, key: &DocumentKey) -> CoordinatorResult<u64> {
        let mut versions = self.issue(key, 1, false)?;
        let value = versions.pop().ok_or_else(|| missing_item(key))?;
        log_event(
            Event::SequenceIssued,
            &[("counter", &key.to_string()), ("value", &value.to_string())],
        );
        Ok(value)
    }

    /// `count` consecutive numbers of the counter at `key`, in one request.
    ///
    /// The counter is refreshed with the write. `count == 0` touches nothing.
    pub fn next_block(&self, key: &DocumentKey, count: usize) -> CoordinatorResult<Vec<u64>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let values = self.issue(key, count, true)?;
        if let (Some(first), Some(last)) = (values.first(), values.last()) {
            log_event(
                Event::SequenceBlockIssued,
                &[
                    ("counter", &key.to_string()),
                    ("count", &values.len().to_string()),
                    ("first", &first.to_string()),
                    ("last", &last.to_string()),
                ],
            );
        }
        Ok(values)
    }

    fn issue(&self, key: &DocumentKey, count: usize, refresh: bool) -> CoordinatorResult<Vec<u64>> {
        let key = key.without_version();
        let ops: Vec<WriteOp> = (0..count).map(|_| WriteOp::put(key.clone(), counter_body())).collect();

        self.metrics.record_bulk_write(ops.len());
        let response = self.store.bulk_write(&ops, refresh)?;
        if let Some(error) = classify(&response, &ErrorPolicy::strict()) {
            return Err(error.into());
        }

        let versions = response.versions();
        if versions.len() != count {
            return Err(missing_item(&key));
        }
        self.metrics.add_sequences_issued(count as u64);
        Ok(versions)
    }
}

fn counter_body() -> Value {
    json!({})
}

fn missing_item(key: &DocumentKey) -> CoordinatorError {
    CoordinatorError::Store(StoreError::Request(format!(
        "bulk response for counter {} is missing items",
        key
    )))
}
