//! `RecordStore` for the SQLite database.
//!
//! rusqlite is synchronous, so each operation runs on the blocking pool
//! against a cloned handle.

use super::RecordStore;
use crate::db::Database;
use crate::error::StoreError;
use crate::types::{PendingWrite, StoredRecord, WriteStrategy};
use async_trait::async_trait;
use std::collections::HashSet;

#[async_trait]
impl RecordStore for Database {
    async fn existing_keys(&self, keys: &[String]) -> Result<HashSet<String>, StoreError> {
        let db = self.clone();
        let keys = keys.to_vec();
        let found = tokio::task::spawn_blocking(move || db.existing_keys(&keys)).await??;
        Ok(found)
    }

    async fn upsert_batch(
        &self,
        batch: &[PendingWrite],
        strategy: WriteStrategy,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let db = self.clone();
        let batch = batch.to_vec();
        let written =
            tokio::task::spawn_blocking(move || db.upsert_records(&batch, strategy)).await??;
        Ok(written)
    }

    async fn get(&self, key: &str) -> Result<Option<StoredRecord>, StoreError> {
        let db = self.clone();
        let key = key.to_string();
        let record = tokio::task::spawn_blocking(move || db.get_record(&key)).await??;
        Ok(record)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let db = self.clone();
        let count = tokio::task::spawn_blocking(move || db.count_records()).await??;
        Ok(count)
    }
}
