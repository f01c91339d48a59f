//! Existing-key probe and the snapshot it produces.

use crate::error::ImportError;
use crate::store::{RecordStore, with_timeout};
use crate::types::{CandidateRecord, normalize_key};
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

/// Natural keys present in the store at probe time, case-normalized.
///
/// Taken once per import call and never refreshed; classification of written
/// records is a pure function of this snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingKeySet {
    keys: HashSet<String>,
}

impl ExistingKeySet {
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            keys: keys.into_iter().map(|k| normalize_key(&k)).collect(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(&normalize_key(key))
    }
}

/// Ask the store which candidate keys already exist.
///
/// Issues exactly one store call scoped to the batch's distinct keys. Any
/// failure, including a timeout, aborts the import.
pub async fn probe<S: RecordStore + ?Sized>(
    store: &S,
    candidates: &[CandidateRecord],
    timeout: Option<Duration>,
) -> Result<ExistingKeySet, ImportError> {
    let keys: Vec<String> = candidates
        .iter()
        .map(CandidateRecord::normalized_key)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let found = with_timeout(timeout, store.existing_keys(&keys))
        .await
        .map_err(|source| ImportError::ProbeFailed { source })?;

    tracing::debug!(
        probed = keys.len(),
        existing = found.len(),
        "Probed existing keys"
    );
    Ok(ExistingKeySet::new(found))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::StoredRecord;

    fn stored(key: &str) -> StoredRecord {
        StoredRecord {
            natural_key: key.to_string(),
            status: "new".to_string(),
            fields: Default::default(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_existing_key_set_is_case_insensitive() {
        let set = ExistingKeySet::new(vec!["Bob".to_string()]);
        assert!(set.contains("bob"));
        assert!(set.contains(" BOB "));
        assert!(!set.contains("alice"));
    }

    #[tokio::test]
    async fn test_probe_single_round_trip() {
        let store = MemoryStore::with_records([stored("alice")]);
        let candidates = vec![
            CandidateRecord::new("Alice"),
            CandidateRecord::new("bob"),
            CandidateRecord::new("ALICE"),
        ];

        let existing = probe(&store, &candidates, None).await.unwrap();
        assert!(existing.contains("alice"));
        assert!(!existing.contains("bob"));
        assert_eq!(store.probe_calls(), 1);
    }

    #[tokio::test]
    async fn test_probe_failure_maps_to_probe_failed() {
        let store = MemoryStore::new().fail_probe();
        let err = probe(&store, &[CandidateRecord::new("a")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::ProbeFailed { .. }));
    }
}
