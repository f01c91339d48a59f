//! Bulk record import pipeline.
//!
//! One import call runs a single pass through five stages:
//!
//! 1. **Validation** (`validate`) - drop candidates without a natural key
//! 2. **Probe** (`probe`) - one bulk existence query for the batch's keys
//! 3. **Policy** (`policy`) - dedupe, then partition by `ImportMode`
//! 4. **Writes** (`writer`) - sequential fixed-size upsert chunks
//! 5. **Aggregation** (`aggregate`) - classify written records against the probe snapshot
//!
//! Precondition failures (no valid records, probe failure, fail-mode
//! collision) reject the whole call before anything is written. Chunk failures
//! are recorded in the returned [`ImportResult`] and do not stop later chunks.
//!
//! # Known limitation
//!
//! The probe snapshot is not refreshed. A key inserted by a concurrent writer
//! between probe and write is overwritten and counted as `inserted`.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use record_import::import::Importer;
//! use record_import::types::{CandidateRecord, ImportMode};
//!
//! let importer = Importer::new(db);
//! let result = importer
//!     .import(vec![CandidateRecord::new("alice")], ImportMode::Skip)
//!     .await?;
//!
//! println!("{}", result.summary());
//! ```

pub mod aggregate;
pub mod policy;
pub mod probe;
pub mod validate;
pub mod writer;

pub use aggregate::ImportResult;
pub use policy::ImportPlan;
pub use probe::ExistingKeySet;
pub use writer::DEFAULT_BATCH_SIZE;

use crate::error::ImportError;
use crate::store::RecordStore;
use crate::types::{CandidateRecord, DEFAULT_STATUS, ImportMode};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};
use writer::{BatchWriter, chunk_count};

/// Options for controlling import behavior.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Records per upsert round trip.
    pub batch_size: usize,
    /// Status stamped onto records without one.
    pub default_status: String,
    /// Upper bound on each probe and chunk write. `None` defers to the store.
    pub operation_timeout: Option<Duration>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            default_status: DEFAULT_STATUS.to_string(),
            operation_timeout: None,
        }
    }
}

impl ImportOptions {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_default_status(mut self, status: impl Into<String>) -> Self {
        self.default_status = status.into();
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }
}

/// Result of a dry-run import preview.
/// Shows what would happen without making any changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportPreview {
    pub mode: ImportMode,
    /// Candidates surviving validation.
    pub valid: usize,
    pub invalid: usize,
    pub would_insert: usize,
    pub would_update: usize,
    pub would_skip: usize,
    pub duplicates: usize,
    /// Chunk writes the import would issue.
    pub batches: usize,
    pub would_succeed: bool,
    /// Reason for failure if would_succeed is false.
    pub failure_reason: Option<String>,
    pub warnings: Vec<String>,
}

/// Runs imports against a record store.
pub struct Importer<S> {
    store: S,
    options: ImportOptions,
}

impl<S: RecordStore> Importer<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, ImportOptions::default())
    }

    pub fn with_options(store: S, options: ImportOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Import `records` under `mode`.
    ///
    /// # Returns
    /// * `Ok(ImportResult)` - Best-effort outcome, including failed chunks
    /// * `Err(ImportError)` - Precondition failure; nothing was written
    pub async fn import(
        &self,
        records: Vec<CandidateRecord>,
        mode: ImportMode,
    ) -> Result<ImportResult, ImportError> {
        let supplied = records.len();
        let validated = validate::validate(records);
        if validated.is_empty() {
            warn!(supplied, "Import rejected: no record has a natural key");
            return Err(ImportError::NoValidRecords);
        }

        let valid = validated.records.len();
        info!(mode = %mode, supplied, valid, "Starting import");

        let existing =
            probe::probe(&self.store, &validated.records, self.options.operation_timeout).await?;
        let plan = policy::resolve(validated.records, &existing, mode).inspect_err(|err| {
            warn!(mode = %mode, error = %err, "Import aborted by conflict policy");
        })?;

        let mut result = ImportResult::new(mode);
        result.invalid = validated.rejected.len();
        result.warnings = rejection_warnings(&validated.rejected);
        result.warnings.extend(duplicate_warnings(&plan.superseded));
        result.duplicates = plan.superseded.len();
        result.skipped = plan.skipped();

        let writer = BatchWriter::new(
            &self.store,
            self.options.batch_size,
            &self.options.default_status,
        )
        .with_timeout(self.options.operation_timeout);
        let result = writer
            .write_all(&plan.to_write, mode.write_strategy(), &existing, result)
            .await;

        info!(
            mode = %mode,
            inserted = result.inserted,
            updated = result.updated,
            skipped = result.skipped,
            failed = result.failed_keys.len(),
            "Import complete"
        );
        Ok(result)
    }

    /// Preview what an import would do without writing.
    ///
    /// Runs validation, the probe and policy resolution. Precondition
    /// failures are reported in the preview instead of returned.
    pub async fn preview(&self, records: Vec<CandidateRecord>, mode: ImportMode) -> ImportPreview {
        let mut preview = ImportPreview {
            mode,
            would_succeed: true,
            ..ImportPreview::default()
        };

        let validated = validate::validate(records);
        preview.valid = validated.records.len();
        preview.invalid = validated.rejected.len();
        preview.warnings = rejection_warnings(&validated.rejected);
        if validated.is_empty() {
            return preview.failed(&ImportError::NoValidRecords);
        }

        let existing = match probe::probe(
            &self.store,
            &validated.records,
            self.options.operation_timeout,
        )
        .await
        {
            Ok(existing) => existing,
            Err(err) => return preview.failed(&err),
        };

        let plan = match policy::resolve(validated.records, &existing, mode) {
            Ok(plan) => plan,
            Err(err) => return preview.failed(&err),
        };

        preview.warnings.extend(duplicate_warnings(&plan.superseded));
        preview.duplicates = plan.superseded.len();
        preview.would_skip = plan.skipped();
        preview.would_update = plan.colliding_writes(&existing);
        preview.would_insert = plan.to_write.len() - preview.would_update;
        preview.batches = chunk_count(plan.to_write.len(), self.options.batch_size);
        preview
    }
}

impl ImportPreview {
    fn failed(mut self, err: &ImportError) -> Self {
        self.would_succeed = false;
        self.failure_reason = Some(err.to_string());
        self
    }
}

fn rejection_warnings(rejected: &[usize]) -> Vec<String> {
    rejected
        .iter()
        .map(|position| {
            warn!(record = position + 1, "Skipping record without natural key");
            format!("record {} has no natural key and was ignored", position + 1)
        })
        .collect()
}

fn duplicate_warnings(superseded: &[String]) -> Vec<String> {
    superseded
        .iter()
        .map(|key| {
            warn!(key = %key, "Duplicate key in batch, keeping last occurrence");
            format!(
                "duplicate key '{}' in batch; an earlier occurrence was replaced by a later one",
                key
            )
        })
        .collect()
}
