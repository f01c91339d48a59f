//! Keyed record queries: existence probe, chunk upsert and lookups.

use super::Database;
use crate::types::{Fields, PendingWrite, StoredRecord, WriteStrategy, merge_fields, normalize_key};
use anyhow::Result;
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params, params_from_iter};
use std::collections::{BTreeSet, HashSet};

/// Maximum keys bound into one `IN (...)` filter.
pub const PROBE_FILTER_LIMIT: usize = 500;

const UPSERT_SQL: &str = "
    INSERT INTO records (natural_key, status, fields, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(natural_key) DO UPDATE SET
        status = excluded.status,
        fields = excluded.fields,
        updated_at = excluded.updated_at
    RETURNING natural_key, status, fields, created_at, updated_at";

const SELECT_FOR_MERGE_SQL: &str = "SELECT status, fields FROM records WHERE natural_key = ?1";

const RECORD_COLUMNS: &str = "natural_key, status, fields, created_at, updated_at";

/// Parse a record row selected with `RECORD_COLUMNS` order.
pub(crate) fn parse_record_row(row: &Row) -> rusqlite::Result<StoredRecord> {
    let fields_json: String = row.get(2)?;
    let fields: Fields = serde_json::from_str(&fields_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    Ok(StoredRecord {
        natural_key: row.get(0)?,
        status: row.get(1)?,
        fields,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

impl Database {
    /// Return which of `keys` already exist, case-normalized.
    ///
    /// Only the given keys are looked up. Large key lists are split into
    /// filters of `PROBE_FILTER_LIMIT` under a single connection lock.
    pub fn existing_keys(&self, keys: &[String]) -> Result<HashSet<String>> {
        let wanted: Vec<String> = keys
            .iter()
            .map(|k| normalize_key(k))
            .filter(|k| !k.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        self.with_conn(|conn| {
            let mut found = HashSet::new();
            for chunk in wanted.chunks(PROBE_FILTER_LIMIT) {
                let placeholders = vec!["?"; chunk.len()].join(", ");
                let sql = format!(
                    "SELECT natural_key FROM records WHERE natural_key IN ({})",
                    placeholders
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                    row.get::<_, String>(0)
                })?;
                for key in rows {
                    found.insert(normalize_key(&key?));
                }
            }
            Ok(found)
        })
    }

    /// Upsert one chunk inside a single transaction.
    ///
    /// Either every record in the chunk is written or none is. Returns the
    /// rows as stored after the write.
    pub fn upsert_records(
        &self,
        batch: &[PendingWrite],
        strategy: WriteStrategy,
    ) -> Result<Vec<StoredRecord>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut written = Vec::with_capacity(batch.len());
            {
                let mut upsert = tx.prepare(UPSERT_SQL)?;
                let mut select = tx.prepare(SELECT_FOR_MERGE_SQL)?;
                for write in batch {
                    let record = &write.record;
                    let mut status = record.status.clone();
                    let mut fields = record.fields.clone();

                    // Merge applies top-level fields in Rust so nested objects are
                    // replaced whole, never deep-patched.
                    if strategy == WriteStrategy::Merge {
                        let stored = select
                            .query_row(params![record.natural_key], |row| {
                                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                            })
                            .optional()?;
                        if let Some((stored_status, stored_fields)) = stored {
                            let mut merged: Fields = serde_json::from_str(&stored_fields)?;
                            merge_fields(&mut merged, &record.fields);
                            fields = merged;
                            if !write.status_supplied {
                                status = stored_status;
                            }
                        }
                    }

                    let stored = upsert.query_row(
                        params![
                            record.natural_key,
                            status,
                            serde_json::to_string(&fields)?,
                            record.created_at,
                            record.updated_at,
                        ],
                        parse_record_row,
                    )?;
                    written.push(stored);
                }
            }
            tx.commit()?;
            Ok(written)
        })
    }

    /// Fetch a single record by natural key (case-insensitive).
    pub fn get_record(&self, key: &str) -> Result<Option<StoredRecord>> {
        let key = normalize_key(key);
        self.with_conn(|conn| {
            let record = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM records WHERE natural_key = ?1",
                        RECORD_COLUMNS
                    ),
                    params![key],
                    parse_record_row,
                )
                .optional()?;
            Ok(record)
        })
    }

    /// List records ordered by natural key.
    pub fn list_records(&self, limit: usize) -> Result<Vec<StoredRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM records ORDER BY natural_key LIMIT ?1",
                RECORD_COLUMNS
            ))?;
            let records = stmt
                .query_map(params![limit as i64], parse_record_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
    }

    /// Total number of stored records.
    pub fn count_records(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }
}
