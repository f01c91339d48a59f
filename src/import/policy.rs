//! Conflict policy resolution.
//!
//! Partitions validated candidates into records to write and records to skip
//! according to the `ImportMode`, after collapsing duplicate keys inside the
//! batch. Duplicate keys are resolved last-occurrence-wins: the surviving
//! record takes the content of the last occurrence and the position of the
//! first, so chunk layout does not depend on where duplicates appear.

use super::probe::ExistingKeySet;
use crate::error::ImportError;
use crate::types::{CandidateRecord, ImportMode};
use std::collections::{BTreeSet, HashMap};

/// Partitioned candidates for one import call.
#[derive(Debug, Clone)]
pub struct ImportPlan {
    pub mode: ImportMode,
    /// Records to send to the store, in first-occurrence order.
    pub to_write: Vec<CandidateRecord>,
    /// Colliding records left untouched (skip mode only).
    pub to_skip: Vec<CandidateRecord>,
    /// Normalized key of every earlier occurrence replaced by a later one.
    pub superseded: Vec<String>,
}

impl ImportPlan {
    /// Records written to keys already in the snapshot.
    pub fn colliding_writes(&self, existing: &ExistingKeySet) -> usize {
        self.to_write
            .iter()
            .filter(|r| existing.contains(&r.natural_key))
            .count()
    }

    /// Records the result will report as skipped.
    pub fn skipped(&self) -> usize {
        self.to_skip.len() + self.superseded.len()
    }
}

/// Collapse duplicate natural keys, last occurrence wins.
pub fn dedupe(records: Vec<CandidateRecord>) -> (Vec<CandidateRecord>, Vec<String>) {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<CandidateRecord> = Vec::with_capacity(records.len());
    let mut superseded = Vec::new();

    for record in records {
        let key = record.normalized_key();
        match slots.get(&key) {
            Some(&slot) => {
                unique[slot] = record;
                superseded.push(key);
            }
            None => {
                slots.insert(key, unique.len());
                unique.push(record);
            }
        }
    }

    (unique, superseded)
}

/// Partition candidates according to `mode`.
///
/// Fail mode returns `FailModeCollision` listing every colliding key (sorted,
/// normalized) before anything is written.
pub fn resolve(
    records: Vec<CandidateRecord>,
    existing: &ExistingKeySet,
    mode: ImportMode,
) -> Result<ImportPlan, ImportError> {
    let (unique, superseded) = dedupe(records);

    let mut to_write = Vec::with_capacity(unique.len());
    let mut to_skip = Vec::new();

    match mode {
        ImportMode::Fail => {
            let collisions: BTreeSet<String> = unique
                .iter()
                .map(CandidateRecord::normalized_key)
                .filter(|k| existing.contains(k))
                .collect();
            if !collisions.is_empty() {
                return Err(ImportError::FailModeCollision {
                    keys: collisions.into_iter().collect(),
                });
            }
            to_write = unique;
        }
        ImportMode::Skip => {
            for record in unique {
                if existing.contains(&record.natural_key) {
                    to_skip.push(record);
                } else {
                    to_write.push(record);
                }
            }
        }
        ImportMode::Update | ImportMode::Merge => {
            to_write = unique;
        }
    }

    Ok(ImportPlan {
        mode,
        to_write,
        to_skip,
        superseded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(records: &[CandidateRecord]) -> Vec<&str> {
        records.iter().map(|r| r.natural_key.as_str()).collect()
    }

    fn existing(keys: &[&str]) -> ExistingKeySet {
        ExistingKeySet::new(keys.iter().map(|k| k.to_string()))
    }

    fn batch(keys: &[&str]) -> Vec<CandidateRecord> {
        keys.iter().map(|k| CandidateRecord::new(*k)).collect()
    }

    #[test]
    fn test_skip_mode_partitions() {
        let plan = resolve(batch(&["alice", "bob"]), &existing(&["alice"]), ImportMode::Skip)
            .unwrap();
        assert_eq!(keys(&plan.to_write), vec!["bob"]);
        assert_eq!(keys(&plan.to_skip), vec!["alice"]);
        assert_eq!(plan.skipped(), 1);
    }

    #[test]
    fn test_update_and_merge_write_everything() {
        for mode in [ImportMode::Update, ImportMode::Merge] {
            let plan = resolve(batch(&["alice", "bob"]), &existing(&["alice"]), mode).unwrap();
            assert_eq!(keys(&plan.to_write), vec!["alice", "bob"]);
            assert!(plan.to_skip.is_empty());
            assert_eq!(plan.colliding_writes(&existing(&["alice"])), 1);
        }
    }

    #[test]
    fn test_fail_mode_lists_every_collision() {
        let err = resolve(
            batch(&["Carol", "alice", "bob", "dave"]),
            &existing(&["alice", "carol"]),
            ImportMode::Fail,
        )
        .unwrap_err();

        match err {
            ImportError::FailModeCollision { keys } => {
                assert_eq!(keys, vec!["alice".to_string(), "carol".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fail_mode_without_collision_writes_all() {
        let plan = resolve(batch(&["alice", "bob"]), &existing(&[]), ImportMode::Fail).unwrap();
        assert_eq!(plan.to_write.len(), 2);
    }

    #[test]
    fn test_case_insensitive_collision_every_mode() {
        let snapshot = existing(&["Bob"]);
        for mode in ImportMode::ALL {
            let outcome = resolve(batch(&["bob"]), &snapshot, mode);
            match mode {
                ImportMode::Skip => assert_eq!(outcome.unwrap().to_skip.len(), 1),
                ImportMode::Fail => assert!(outcome.is_err()),
                ImportMode::Update | ImportMode::Merge => {
                    let plan = outcome.unwrap();
                    assert_eq!(plan.colliding_writes(&snapshot), 1);
                }
            }
        }
    }

    #[test]
    fn test_dedupe_last_occurrence_wins() {
        let records = vec![
            CandidateRecord::new("alice").with_field("v", 1),
            CandidateRecord::new("bob"),
            CandidateRecord::new("ALICE").with_field("v", 2),
        ];
        let (unique, superseded) = dedupe(records);

        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].natural_key, "ALICE");
        assert_eq!(unique[0].fields["v"], serde_json::json!(2));
        assert_eq!(unique[1].natural_key, "bob");
        assert_eq!(superseded, vec!["alice".to_string()]);
    }

    #[test]
    fn test_duplicates_counted_as_skipped() {
        let plan = resolve(
            batch(&["alice", "alice", "alice"]),
            &existing(&[]),
            ImportMode::Update,
        )
        .unwrap();
        assert_eq!(plan.to_write.len(), 1);
        assert_eq!(plan.superseded.len(), 2);
        assert_eq!(plan.skipped(), 2);
    }
}
