//! Sequential chunked writes.

use super::aggregate::{ChunkOutcome, ImportResult};
use super::probe::ExistingKeySet;
use crate::db::now_ms;
use crate::store::{RecordStore, with_timeout};
use crate::types::{CandidateRecord, PendingWrite, StoredRecord, WriteStrategy};
use std::time::Duration;

/// Records per upsert round trip unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Stamp a candidate with normalization metadata for the store.
///
/// Lower-cases the key, applies `default_status` when the candidate has none,
/// and sets both timestamps to `now` (the store keeps the original
/// `created_at` on conflict). Fields pass through untouched; skipping blank
/// values is the store's job when it merges into an existing row.
pub fn stamp(candidate: &CandidateRecord, default_status: &str, now: i64) -> PendingWrite {
    let explicit = candidate.explicit_status();
    PendingWrite {
        record: StoredRecord {
            natural_key: candidate.normalized_key(),
            status: explicit.unwrap_or(default_status).to_string(),
            fields: candidate.fields.clone(),
            created_at: now,
            updated_at: now,
        },
        status_supplied: explicit.is_some(),
    }
}

/// Writes the to-write set in fixed-size chunks, one at a time.
pub struct BatchWriter<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    batch_size: usize,
    timeout: Option<Duration>,
    default_status: &'a str,
}

impl<'a, S: RecordStore + ?Sized> BatchWriter<'a, S> {
    /// A `batch_size` of zero is treated as one.
    pub fn new(store: &'a S, batch_size: usize, default_status: &'a str) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            timeout: None,
            default_status,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Write every record and fold each chunk's outcome into `result`.
    ///
    /// Chunks run sequentially in formation order. A failed or timed-out
    /// chunk is recorded and the next chunk is still attempted; chunks already
    /// written are never rolled back.
    pub async fn write_all(
        &self,
        records: &[CandidateRecord],
        strategy: WriteStrategy,
        existing: &ExistingKeySet,
        mut result: ImportResult,
    ) -> ImportResult {
        let now = now_ms();
        let pending: Vec<PendingWrite> = records
            .iter()
            .map(|r| stamp(r, self.default_status, now))
            .collect();

        for (index, chunk) in pending.chunks(self.batch_size).enumerate() {
            let number = index + 1;
            let keys: Vec<String> = chunk.iter().map(|w| w.key().to_string()).collect();
            let outcome = with_timeout(self.timeout, self.store.upsert_batch(chunk, strategy)).await;

            match &outcome {
                Ok(written) => tracing::debug!(
                    batch = number,
                    sent = chunk.len(),
                    written = written.len(),
                    "Wrote batch"
                ),
                Err(err) => tracing::warn!(
                    batch = number,
                    sent = chunk.len(),
                    error = %err,
                    "Batch write failed, continuing with next batch"
                ),
            }

            result = result.apply_chunk(
                ChunkOutcome {
                    number,
                    first_record: index * self.batch_size + 1,
                    keys,
                    outcome,
                },
                existing,
            );
        }

        result
    }
}

/// Number of chunks `count` records form at `batch_size`.
pub fn chunk_count(count: usize, batch_size: usize) -> usize {
    count.div_ceil(batch_size.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::ImportMode;
    use serde_json::json;

    #[test]
    fn test_stamp_normalizes() {
        let candidate = CandidateRecord::new("  Alice ").with_field("team", "red");
        let write = stamp(&candidate, "new", 42);

        assert_eq!(write.key(), "alice");
        assert_eq!(write.record.status, "new");
        assert_eq!(write.record.created_at, 42);
        assert_eq!(write.record.updated_at, 42);
        assert!(!write.status_supplied);
    }

    #[test]
    fn test_stamp_keeps_explicit_status() {
        let candidate = CandidateRecord::new("a").with_status("active");
        let write = stamp(&candidate, "new", 0);
        assert_eq!(write.record.status, "active");
        assert!(write.status_supplied);
    }

    #[test]
    fn test_stamp_keeps_blank_fields() {
        let candidate = CandidateRecord::new("a")
            .with_field("email", "")
            .with_field("notes", serde_json::Value::Null)
            .with_field("team", "blue");

        let write = stamp(&candidate, "new", 0);
        assert_eq!(write.record.fields.len(), 3);
        assert_eq!(write.record.fields["email"], json!(""));
        assert_eq!(write.record.fields["notes"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_merge_insert_matches_update_insert() {
        let records = vec![
            CandidateRecord::new("bob")
                .with_field("email", "")
                .with_field("team", "blue"),
        ];

        let mut inserted = Vec::new();
        for strategy in [WriteStrategy::Overwrite, WriteStrategy::Merge] {
            let store = MemoryStore::new();
            let result = BatchWriter::new(&store, 10, "new")
                .write_all(
                    &records,
                    strategy,
                    &ExistingKeySet::default(),
                    ImportResult::new(ImportMode::Merge),
                )
                .await;
            assert_eq!(result.inserted, 1);
            inserted.push(store.snapshot().remove(0).fields);
        }

        assert_eq!(inserted[0], inserted[1]);
        assert_eq!(inserted[1]["email"], json!(""));
    }

    #[test]
    fn test_chunk_count() {
        assert_eq!(chunk_count(0, 50), 0);
        assert_eq!(chunk_count(50, 50), 1);
        assert_eq!(chunk_count(120, 50), 3);
        assert_eq!(chunk_count(3, 0), 3);
    }

    #[tokio::test]
    async fn test_write_all_chunks_sequentially() {
        let store = MemoryStore::new();
        let records: Vec<CandidateRecord> =
            (0..7).map(|i| CandidateRecord::new(format!("k{}", i))).collect();

        let result = BatchWriter::new(&store, 3, "new")
            .write_all(
                &records,
                WriteStrategy::Overwrite,
                &ExistingKeySet::default(),
                ImportResult::new(ImportMode::Skip),
            )
            .await;

        assert_eq!(store.write_sizes(), vec![3, 3, 1]);
        assert_eq!(result.inserted, 7);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn test_write_all_continues_after_failure() {
        let store = MemoryStore::new().fail_write_call(1);
        let records: Vec<CandidateRecord> =
            (0..4).map(|i| CandidateRecord::new(format!("k{}", i))).collect();

        let result = BatchWriter::new(&store, 2, "new")
            .write_all(
                &records,
                WriteStrategy::Overwrite,
                &ExistingKeySet::default(),
                ImportResult::new(ImportMode::Skip),
            )
            .await;

        assert_eq!(result.inserted, 2);
        assert_eq!(result.failed_keys.len(), 2);
        assert!(result.errors[0].starts_with("batch 1 (records 1-2) failed"));
        assert_eq!(store.count().await.unwrap(), 2);
    }
}
