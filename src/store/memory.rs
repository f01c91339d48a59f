//! In-process record store.
//!
//! Holds records in a sorted map and counts every round trip, which lets
//! tests assert how many probe and chunk operations an import issued.
//! Probe and write failures can be injected per call.

use super::RecordStore;
use crate::error::StoreError;
use crate::types::{PendingWrite, StoredRecord, WriteStrategy, merge_fields, normalize_key};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Default)]
struct MemoryState {
    records: BTreeMap<String, StoredRecord>,
    probe_calls: usize,
    write_sizes: Vec<usize>,
    fail_probe: bool,
    failing_writes: HashSet<usize>,
    probe_delay: Option<Duration>,
    write_delay: Option<Duration>,
}

/// Record store backed by a `BTreeMap`.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records (keys are normalized).
    pub fn with_records(records: impl IntoIterator<Item = StoredRecord>) -> Self {
        let store = Self::new();
        {
            let mut state = store.lock_state();
            for mut record in records {
                record.natural_key = normalize_key(&record.natural_key);
                state.records.insert(record.natural_key.clone(), record);
            }
        }
        store
    }

    /// Make every probe fail.
    pub fn fail_probe(self) -> Self {
        self.lock_state().fail_probe = true;
        self
    }

    /// Make the n-th upsert call (1-based) fail.
    pub fn fail_write_call(self, call: usize) -> Self {
        self.lock_state().failing_writes.insert(call);
        self
    }

    /// Delay every probe call, for timeout tests.
    pub fn with_probe_delay(self, delay: Duration) -> Self {
        self.lock_state().probe_delay = Some(delay);
        self
    }

    /// Delay every upsert call, for timeout tests.
    pub fn with_write_delay(self, delay: Duration) -> Self {
        self.lock_state().write_delay = Some(delay);
        self
    }

    pub fn probe_calls(&self) -> usize {
        self.lock_state().probe_calls
    }

    pub fn write_calls(&self) -> usize {
        self.lock_state().write_sizes.len()
    }

    /// Number of records sent in each upsert call, in call order.
    pub fn write_sizes(&self) -> Vec<usize> {
        self.lock_state().write_sizes.clone()
    }

    /// Total store round trips (probes plus writes).
    pub fn total_calls(&self) -> usize {
        let state = self.lock_state();
        state.probe_calls + state.write_sizes.len()
    }

    pub fn snapshot(&self) -> Vec<StoredRecord> {
        self.lock_state().records.values().cloned().collect()
    }

    // A panic while holding the lock cannot leave the map half-written, so a
    // poisoned lock is still safe to read.
    fn lock_state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn existing_keys(&self, keys: &[String]) -> Result<HashSet<String>, StoreError> {
        let delay = {
            let mut state = self.lock_state();
            state.probe_calls += 1;
            if state.fail_probe {
                return Err(StoreError::unavailable("injected probe failure"));
            }
            state.probe_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.lock_state();
        Ok(keys
            .iter()
            .map(|k| normalize_key(k))
            .filter(|k| state.records.contains_key(k))
            .collect())
    }

    async fn upsert_batch(
        &self,
        batch: &[PendingWrite],
        strategy: WriteStrategy,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let delay = {
            let mut state = self.lock_state();
            state.write_sizes.push(batch.len());
            let call = state.write_sizes.len();
            if state.failing_writes.contains(&call) {
                return Err(StoreError::unavailable(format!(
                    "injected failure on write call {}",
                    call
                )));
            }
            state.write_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock_state();
        let mut written = Vec::with_capacity(batch.len());
        for write in batch {
            let key = normalize_key(write.key());
            let incoming = &write.record;
            let stored = match state.records.get(&key) {
                Some(existing) => {
                    let mut next = existing.clone();
                    match strategy {
                        WriteStrategy::Overwrite => {
                            next.status = incoming.status.clone();
                            next.fields = incoming.fields.clone();
                        }
                        WriteStrategy::Merge => {
                            if write.status_supplied {
                                next.status = incoming.status.clone();
                            }
                            merge_fields(&mut next.fields, &incoming.fields);
                        }
                    }
                    next.updated_at = incoming.updated_at;
                    next
                }
                None => StoredRecord {
                    natural_key: key.clone(),
                    ..incoming.clone()
                },
            };
            state.records.insert(key, stored.clone());
            written.push(stored);
        }
        Ok(written)
    }

    async fn get(&self, key: &str) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self.lock_state().records.get(&normalize_key(key)).cloned())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.lock_state().records.len())
    }
}
