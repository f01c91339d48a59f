//! Result accumulation across chunks.
//!
//! `ImportResult` is threaded by value through every chunk step; nothing
//! here touches the store. Classification of written records depends only on
//! the probe snapshot.

use super::probe::ExistingKeySet;
use crate::error::StoreError;
use crate::types::{ImportMode, StoredRecord, normalize_key};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// Outcome of one import call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportResult {
    pub mode: ImportMode,
    /// Records written whose key was absent from the snapshot.
    pub inserted: usize,
    /// Records written whose key was present in the snapshot.
    pub updated: usize,
    /// Colliding records left alone plus superseded in-batch duplicates.
    pub skipped: usize,
    /// Chunk failures, in chunk order.
    pub errors: Vec<String>,
    pub updated_keys: BTreeSet<String>,
    /// Keys whose chunk failed or was not confirmed by the store.
    pub failed_keys: BTreeSet<String>,
    /// In-batch duplicates collapsed before writing (included in `skipped`).
    pub duplicates: usize,
    /// Candidates rejected by validation (outside the accounting).
    pub invalid: usize,
    pub warnings: Vec<String>,
}

/// What happened to one chunk write.
#[derive(Debug)]
pub struct ChunkOutcome {
    /// 1-based chunk number.
    pub number: usize,
    /// 1-based position of the chunk's first record within the write set.
    pub first_record: usize,
    /// Normalized keys sent in the chunk.
    pub keys: Vec<String>,
    pub outcome: Result<Vec<StoredRecord>, StoreError>,
}

impl ChunkOutcome {
    fn range(&self) -> String {
        let last = self.first_record + self.keys.len().saturating_sub(1);
        format!("records {}-{}", self.first_record, last)
    }
}

impl ImportResult {
    pub fn new(mode: ImportMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Fold one chunk outcome into the result.
    pub fn apply_chunk(mut self, chunk: ChunkOutcome, existing: &ExistingKeySet) -> Self {
        let written = match &chunk.outcome {
            Ok(written) => written,
            Err(err) => {
                self.errors.push(format!(
                    "batch {} ({}) failed: {}; keys: {}",
                    chunk.number,
                    chunk.range(),
                    err,
                    chunk.keys.join(", ")
                ));
                self.failed_keys.extend(chunk.keys.iter().cloned());
                return self;
            }
        };

        let sent: HashSet<&str> = chunk.keys.iter().map(String::as_str).collect();
        let mut confirmed: HashSet<String> = HashSet::with_capacity(written.len());
        for record in written {
            let key = normalize_key(&record.natural_key);
            if !sent.contains(key.as_str()) || !confirmed.insert(key.clone()) {
                continue;
            }
            if existing.contains(&key) {
                self.updated += 1;
                self.updated_keys.insert(key);
            } else {
                self.inserted += 1;
            }
        }

        let missing: Vec<&String> = chunk
            .keys
            .iter()
            .filter(|k| !confirmed.contains(k.as_str()))
            .collect();
        if !missing.is_empty() {
            self.errors.push(format!(
                "batch {} ({}): store did not confirm {} record(s); keys: {}",
                chunk.number,
                chunk.range(),
                missing.len(),
                missing
                    .iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
            self.failed_keys.extend(missing.into_iter().cloned());
        }

        self
    }

    /// `inserted + updated + skipped + distinct failed keys`.
    pub fn total_accounted(&self) -> usize {
        self.inserted + self.updated + self.skipped + self.failed_keys.len()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Human-readable one-liner, e.g. "12 added, 3 updated, 1 skipped".
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} added, {} updated, {} skipped",
            self.inserted, self.updated, self.skipped
        );
        if !self.failed_keys.is_empty() {
            summary.push_str(&format!(", {} failed", self.failed_keys.len()));
        }
        summary
    }
}
