//! Commit coordinator
//!
//! Applies a batch to one index as if it were a transaction:
//!
//! 1. lock the index
//! 2. fetch the current documents of every batch key
//! 3. validate versions and build the history entries (phase 1)
//! 4. write phase 1, then the live documents (phase 2), both strictly
//! 5. on a phase 1 or phase 2 failure, delete the history entries this commit
//!    created and force the batch keys back to the fetched snapshot
//! 6. always unlock and refresh the index once the lock was taken
//!
//! Readers may observe intermediate states between phase 1 and the end of
//! compensation. Only writers going through the lock are serialized.

use std::sync::Arc;

use super::errors::{CoordinatorError, CoordinatorResult};
use super::lock::IndexLock;
use super::ops::{self, Stamp};
use super::state::{CommitState, CommitStateError};
use crate::bulk::{accepted_keys, classify, ErrorPolicy};
use crate::config::{ConfigResult, CoordinatorConfig};
use crate::model::{Batch, Bundle, DocumentKey, Snapshot};
use crate::observability::{log_event, CommitMetrics, Event, Logger, ObservationScope};
use crate::sequence::SequenceGenerator;
use crate::store::{
    BulkResponse, DocumentSerializer, DocumentStoreClient, JsonSerializer, StoreResult, WriteOp,
};
use crate::validator::{BookkeepingWrite, HistoryLayout, StandardValidator, VersionValidator};

/// Transactional writer in front of a `DocumentStoreClient`.
///
/// Safe to share across threads; commits on different indices proceed in
/// parallel, commits on the same index are serialized by the store-side lock.
pub struct CommitCoordinator {
    store: Arc<dyn DocumentStoreClient>,
    serializer: Arc<dyn DocumentSerializer>,
    validator: Arc<dyn VersionValidator>,
    config: CoordinatorConfig,
    history: HistoryLayout,
    lenient: ErrorPolicy,
    metrics: Arc<CommitMetrics>,
}

impl CommitCoordinator {
    /// Coordinator with the default configuration, JSON bodies and the
    /// standard validator.
    pub fn new(store: Arc<dyn DocumentStoreClient>) -> Self {
        let config = CoordinatorConfig::default();
        Self {
            store,
            serializer: Arc::new(JsonSerializer),
            validator: Arc::new(StandardValidator),
            history: config.history_layout(),
            lenient: config.lenient_policy(),
            config,
            metrics: Arc::new(CommitMetrics::new()),
        }
    }

    /// Coordinator with a validated configuration.
    pub fn from_config(
        store: Arc<dyn DocumentStoreClient>,
        config: CoordinatorConfig,
    ) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            history: config.history_layout(),
            lenient: config.lenient_policy(),
            config,
            ..Self::new(store)
        })
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn DocumentSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// Validator used by `commit`.
    pub fn with_validator(mut self, validator: Arc<dyn VersionValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Share a metrics registry with other components.
    pub fn with_metrics(mut self, metrics: Arc<CommitMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<CommitMetrics> {
        &self.metrics
    }

    /// Sequence generator over the same store and metrics.
    pub fn sequences(&self) -> SequenceGenerator {
        SequenceGenerator::new(Arc::clone(&self.store)).with_metrics(Arc::clone(&self.metrics))
    }

    // =========================================================================
    // COMMIT
    // =========================================================================

    /// Commit `batch` with the configured validator.
    ///
    /// Returns the written keys, each with its new version, in record order.
    pub fn commit(&self, batch: &Batch) -> CoordinatorResult<Vec<DocumentKey>> {
        self.commit_with(batch, self.validator.as_ref())
    }

    /// Commit `batch` with a caller-supplied validator.
    pub fn commit_with(
        &self,
        batch: &Batch,
        validator: &dyn VersionValidator,
    ) -> CoordinatorResult<Vec<DocumentKey>> {
        let index = batch.unary_index();
        log_event(
            Event::CommitBegin,
            &[
                ("index", index),
                ("records", &batch.len().to_string()),
                ("user", batch.user()),
            ],
        );
        self.metrics.increment_commits_started();

        let mut attempt = Attempt::new(index);
        let result = self.run_commit(batch, validator, &mut attempt);

        match &result {
            Ok(keys) => {
                self.metrics.increment_commits_succeeded();
                log_event(
                    Event::CommitComplete,
                    &[("index", index), ("accepted", &keys.len().to_string())],
                );
            }
            Err(error) => {
                self.metrics.increment_commits_failed();
                log_event(
                    Event::CommitFailed,
                    &[
                        ("index", index),
                        ("code", error.code()),
                        ("state", attempt.state.state_name()),
                        ("error", &error.to_string()),
                    ],
                );
            }
        }
        result
    }

    fn run_commit(
        &self,
        batch: &Batch,
        validator: &dyn VersionValidator,
        attempt: &mut Attempt<'_>,
    ) -> CoordinatorResult<Vec<DocumentKey>> {
        let index = batch.unary_index();
        if !self.store.index_exists(index)? {
            return Err(CoordinatorError::IndexMissing(index.to_string()));
        }

        attempt.advance(CommitState::begin_locking)?;
        let lock = match self.lock_index(index, batch.user()) {
            Ok(lock) => lock,
            Err(error) => {
                attempt.finish();
                return Err(error);
            }
        };
        attempt.advance(CommitState::lock_acquired)?;

        let outcome = self.locked_commit(batch, validator, attempt);

        // Failure already logged; the sentinel stays until unlock_index
        let _ = lock.release();
        self.refresh_quietly(index);
        attempt.finish();

        outcome
    }

    fn locked_commit(
        &self,
        batch: &Batch,
        validator: &dyn VersionValidator,
        attempt: &mut Attempt<'_>,
    ) -> CoordinatorResult<Vec<DocumentKey>> {
        attempt.advance(CommitState::begin_validation)?;

        let snapshot = Snapshot::from_docs(self.store.fetch_by_keys(&batch.keys())?);
        let bookkeeping = match validator.validate(batch, &snapshot, &self.history) {
            Ok(write) => write,
            Err(conflict) => {
                self.metrics.increment_version_conflicts();
                log_event(
                    Event::VersionConflict,
                    &[("index", batch.unary_index()), ("error", &conflict.to_string())],
                );
                return Err(conflict.into());
            }
        };
        let live = ops::live_ops(batch, &snapshot, self.serializer.as_ref())?;

        let mut history_written = Vec::new();
        match self.write_phases(&bookkeeping, &live, &mut history_written, attempt) {
            Ok(keys) => Ok(keys),
            Err(error) => {
                if let Err(state_error) = attempt.advance(CommitState::begin_compensation) {
                    Logger::error(
                        "COMMIT_STATE_INVALID",
                        &[("index", batch.unary_index()), ("error", &state_error.to_string())],
                    );
                }
                self.compensate(batch, &snapshot, &history_written);
                Err(error)
            }
        }
    }

    /// Phase 1 then phase 2. `history_written` receives the history entries
    /// this attempt created, which are the only ones compensation may delete.
    fn write_phases(
        &self,
        bookkeeping: &BookkeepingWrite,
        live: &[WriteOp],
        history_written: &mut Vec<DocumentKey>,
        attempt: &mut Attempt<'_>,
    ) -> CoordinatorResult<Vec<DocumentKey>> {
        let strict = ErrorPolicy::strict();

        let response = match self.send(&bookkeeping.ops) {
            Ok(response) => response,
            Err(error) => {
                // No per-item outcome, so any planned entry may have landed
                history_written.extend(bookkeeping.history_keys.iter().cloned());
                return Err(error.into());
            }
        };
        history_written.extend(accepted_keys(&response));
        if let Some(error) = classify(&response, &strict) {
            return Err(error.into());
        }
        log_event(
            Event::BookkeepingWritten,
            &[("index", attempt.index), ("entries", &bookkeeping.ops.len().to_string())],
        );
        attempt.advance(CommitState::bookkeeping_written)?;

        let response = self.write(live, &strict)?;
        log_event(
            Event::LiveWritten,
            &[("index", attempt.index), ("documents", &live.len().to_string())],
        );
        attempt.advance(CommitState::live_written)?;

        Ok(accepted_keys(&response))
    }

    /// Undo phase 1 and phase 2. Failures are logged and counted only.
    fn compensate(&self, batch: &Batch, snapshot: &Snapshot, history_written: &[DocumentKey]) {
        let index = batch.unary_index();
        self.metrics.increment_compensations();
        log_event(
            Event::CompensationBegin,
            &[
                ("index", index),
                ("history_entries", &history_written.len().to_string()),
                ("documents", &batch.len().to_string()),
            ],
        );

        let mut failures = 0usize;
        if let Err(error) = self.delete_history_entries(history_written) {
            failures += 1;
            self.compensation_failed(index, "delete_history", &error);
        }

        let restore = ops::restore_ops(&batch.keys(), snapshot);
        if let Err(error) = self.write(&restore, &self.lenient) {
            failures += 1;
            self.compensation_failed(index, "restore", &error);
        }

        log_event(
            Event::CompensationComplete,
            &[("index", index), ("failures", &failures.to_string())],
        );
    }

    fn compensation_failed(&self, index: &str, step: &str, error: &CoordinatorError) {
        self.metrics.increment_compensation_failures();
        log_event(
            Event::CompensationFailed,
            &[("index", index), ("step", step), ("error", &error.to_string())],
        );
    }

    // =========================================================================
    // LOCKING
    // =========================================================================

    /// Take the write lock on `index`.
    ///
    /// Commits on `index` fail with `LockConflict` until the guard is released
    /// or dropped.
    pub fn lock_index(&self, index: &str, user: &str) -> CoordinatorResult<IndexLock<'_>> {
        let key = self.lock_key(index);
        IndexLock::acquire(self.store.as_ref(), key, user).map_err(|error| {
            if matches!(error, CoordinatorError::LockConflict { .. }) {
                self.metrics.increment_lock_conflicts();
            }
            error
        })
    }

    /// Remove the lock sentinel of `index`, whoever holds it.
    ///
    /// For clearing a lock left behind by a crashed holder.
    pub fn unlock_index(&self, index: &str) -> CoordinatorResult<()> {
        self.store.delete(&self.lock_key(index))?;
        log_event(Event::LockReleased, &[("index", index), ("holder", "forced")]);
        Ok(())
    }

    fn lock_key(&self, index: &str) -> DocumentKey {
        DocumentKey::new(index, self.config.lock_type.as_str(), self.config.lock_id.as_str())
    }

    // =========================================================================
    // NON-TRANSACTIONAL WRITES
    // =========================================================================

    /// Write `bundle` in one bulk request, without lock or validation.
    ///
    /// Failures `policy` tolerates are skipped; the returned keys are the
    /// applied ones. Every touched index is refreshed afterwards, even on
    /// failure.
    pub fn bulk_index(
        &self,
        bundle: &Bundle,
        policy: &ErrorPolicy,
    ) -> CoordinatorResult<Vec<DocumentKey>> {
        let indices = bundle.indices();
        let records = bundle.len().to_string();
        let joined = indices.join(",");
        let scope = ObservationScope::new(
            Event::BulkIndex.as_str(),
            &[("records", &records), ("indices", &joined)],
        );

        let result = self.bulk_write_bundle(bundle, policy);
        let refreshed = self.store.refresh(&indices);

        match (result, refreshed) {
            (Ok(keys), Ok(())) => {
                scope.complete(&[("accepted", &keys.len().to_string())]);
                Ok(keys)
            }
            (Ok(_), Err(error)) => {
                log_event(Event::RefreshFailed, &[("indices", &joined), ("error", &error.to_string())]);
                scope.fail(&error.to_string());
                Err(error.into())
            }
            (Err(error), refreshed) => {
                if let Err(refresh_error) = refreshed {
                    log_event(
                        Event::RefreshFailed,
                        &[("indices", &joined), ("error", &refresh_error.to_string())],
                    );
                }
                scope.fail(&error.to_string());
                Err(error)
            }
        }
    }

    fn bulk_write_bundle(
        &self,
        bundle: &Bundle,
        policy: &ErrorPolicy,
    ) -> CoordinatorResult<Vec<DocumentKey>> {
        let stamp = Stamp {
            user: bundle.user(),
            timestamp: bundle.timestamp(),
        };
        let ops = ops::unguarded_ops(bundle.records(), &stamp, self.serializer.as_ref())?;
        let response = self.write(&ops, policy)?;
        Ok(accepted_keys(&response))
    }

    /// Force every snapshot document back to its snapshot version and body.
    ///
    /// Lenient, no refresh. Running it twice leaves the store unchanged.
    pub fn force_reindex(&self, snapshot: &Snapshot) -> CoordinatorResult<Vec<DocumentKey>> {
        let ops: Vec<WriteOp> = snapshot
            .docs()
            .map(|doc| WriteOp::forced(doc.key().clone(), doc.body().clone(), doc.version()))
            .collect();
        let response = self.write(&ops, &self.lenient)?;
        log_event(Event::Reindex, &[("documents", &ops.len().to_string())]);
        Ok(accepted_keys(&response))
    }

    /// Delete history entries. Lenient, so missing entries are fine.
    pub fn delete_history_entries(&self, keys: &[DocumentKey]) -> CoordinatorResult<()> {
        let ops: Vec<WriteOp> = keys.iter().map(|k| WriteOp::delete(k.without_version())).collect();
        self.write(&ops, &self.lenient)?;
        Ok(())
    }

    // =========================================================================
    // STORE ACCESS
    // =========================================================================

    /// One bulk request, classified under `policy`. Empty requests are skipped.
    fn write(&self, ops: &[WriteOp], policy: &ErrorPolicy) -> CoordinatorResult<BulkResponse> {
        let response = self.send(ops)?;
        match classify(&response, policy) {
            Some(error) => Err(error.into()),
            None => Ok(response),
        }
    }

    fn send(&self, ops: &[WriteOp]) -> StoreResult<BulkResponse> {
        if ops.is_empty() {
            return Ok(BulkResponse::default());
        }
        self.metrics.record_bulk_write(ops.len());
        self.store.bulk_write(ops, false)
    }

    fn refresh_quietly(&self, index: &str) {
        if let Err(error) = self.store.refresh(&[index.to_string()]) {
            log_event(Event::RefreshFailed, &[("indices", index), ("error", &error.to_string())]);
        }
    }
}

impl std::fmt::Debug for CommitCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitCoordinator")
            .field("config", &self.config)
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}

/// State of one commit attempt, with every transition logged.
struct Attempt<'a> {
    index: &'a str,
    state: CommitState,
}

impl<'a> Attempt<'a> {
    fn new(index: &'a str) -> Self {
        Self {
            index,
            state: CommitState::new(),
        }
    }

    fn advance(
        &mut self,
        transition: fn(CommitState) -> Result<CommitState, CommitStateError>,
    ) -> Result<(), CommitStateError> {
        let next = transition(self.state)?;
        Logger::trace(
            Event::CommitStateChanged.as_str(),
            &[
                ("index", self.index),
                ("from", self.state.state_name()),
                ("to", next.state_name()),
            ],
        );
        self.state = next;
        Ok(())
    }

    fn finish(&mut self) {
        if let Err(error) = self.advance(CommitState::release) {
            Logger::error(
                "COMMIT_STATE_INVALID",
                &[("index", self.index), ("error", &error.to_string())],
            );
        }
    }
}
