//! Record store abstraction used by the import engine.
//!
//! The engine talks to storage only through [`RecordStore`]: one bulk
//! existence probe per call and one upsert per chunk. Two implementations
//! ship with the crate:
//! - [`Database`](crate::db::Database): SQLite via rusqlite
//! - [`MemoryStore`]: in-process map with failure injection for tests

pub mod memory;
mod sqlite;

pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::types::{PendingWrite, StoredRecord, WriteStrategy};
use async_trait::async_trait;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Keyed record storage.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Return the subset of `keys` already present, case-normalized.
    async fn existing_keys(&self, keys: &[String]) -> Result<HashSet<String>, StoreError>;

    /// Insert or overwrite one chunk keyed on natural key.
    ///
    /// Returns the records as stored. A failure means no record of the chunk
    /// is guaranteed to have been written.
    async fn upsert_batch(
        &self,
        batch: &[PendingWrite],
        strategy: WriteStrategy,
    ) -> Result<Vec<StoredRecord>, StoreError>;

    /// Fetch one record by natural key.
    async fn get(&self, key: &str) -> Result<Option<StoredRecord>, StoreError>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize, StoreError>;
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    async fn existing_keys(&self, keys: &[String]) -> Result<HashSet<String>, StoreError> {
        (**self).existing_keys(keys).await
    }

    async fn upsert_batch(
        &self,
        batch: &[PendingWrite],
        strategy: WriteStrategy,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        (**self).upsert_batch(batch, strategy).await
    }

    async fn get(&self, key: &str) -> Result<Option<StoredRecord>, StoreError> {
        (**self).get(key).await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        (**self).count().await
    }
}

/// Await a store operation, bounded by `timeout` when one is set.
pub async fn with_timeout<T, F>(timeout: Option<Duration>, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(limit.as_millis() as u64)),
        },
        None => fut.await,
    }
}
