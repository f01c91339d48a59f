//! Core types for the record import engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Status stamped onto records that arrive without one.
pub const DEFAULT_STATUS: &str = "new";

/// Field name holding the natural key in input objects.
pub const DEFAULT_KEY_FIELD: &str = "natural_key";

/// Open, string-keyed attribute bag carried alongside the natural key.
pub type Fields = BTreeMap<String, Value>;

/// Normalize a natural key for comparison and storage.
///
/// Every stage (probe, partition, write) goes through this so that
/// "Bob" and "bob" always collide.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// An externally supplied record prior to reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    #[serde(default)]
    pub natural_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub fields: Fields,
}

impl CandidateRecord {
    pub fn new(natural_key: impl Into<String>) -> Self {
        Self {
            natural_key: natural_key.into(),
            status: None,
            fields: Fields::new(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Build a candidate from a parsed JSON object.
    ///
    /// `key_field` is lifted out as the natural key and `status` as the status;
    /// every other entry lands in the field bag. Numeric keys are accepted and
    /// rendered as text. A missing or non-scalar key leaves the key blank so the
    /// validator can reject it.
    pub fn from_object(mut obj: Map<String, Value>, key_field: &str) -> Self {
        let natural_key = match obj.remove(key_field) {
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let status = match obj.remove("status") {
            Some(Value::String(s)) => Some(s),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
        Self {
            natural_key,
            status,
            fields: obj.into_iter().collect(),
        }
    }

    /// True when the natural key is present and not just whitespace.
    pub fn has_key(&self) -> bool {
        !self.natural_key.trim().is_empty()
    }

    pub fn normalized_key(&self) -> String {
        normalize_key(&self.natural_key)
    }

    /// Explicit status, ignoring blank values.
    pub fn explicit_status(&self) -> Option<&str> {
        self.status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Conflict policy for one import call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Keep stored records; colliding candidates are skipped.
    #[default]
    Skip,
    /// Overwrite stored records with the candidate's fields.
    Update,
    /// Field-level merge: non-blank incoming fields win, stored fields are kept otherwise.
    Merge,
    /// Abort the whole call if any candidate collides.
    Fail,
}

impl ImportMode {
    pub const ALL: [ImportMode; 4] = [
        ImportMode::Skip,
        ImportMode::Update,
        ImportMode::Merge,
        ImportMode::Fail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMode::Skip => "skip",
            ImportMode::Update => "update",
            ImportMode::Merge => "merge",
            ImportMode::Fail => "fail",
        }
    }

    /// How written rows replace stored rows under this mode.
    pub fn write_strategy(&self) -> WriteStrategy {
        match self {
            ImportMode::Merge => WriteStrategy::Merge,
            ImportMode::Skip | ImportMode::Update | ImportMode::Fail => WriteStrategy::Overwrite,
        }
    }
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(ImportMode::Skip),
            "update" => Ok(ImportMode::Update),
            "merge" => Ok(ImportMode::Merge),
            "fail" => Ok(ImportMode::Fail),
            other => Err(format!(
                "unknown import mode '{}' (expected skip, update, merge or fail)",
                other
            )),
        }
    }
}

/// Upsert behavior when the natural key already exists in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    /// Replace status and fields; keep the original `created_at`.
    Overwrite,
    /// Patch stored fields with the incoming ones.
    Merge,
}

/// Normalized projection of a record as held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub natural_key: String,
    pub status: String,
    pub fields: Fields,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A stamped record on its way to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub record: StoredRecord,
    /// Whether the candidate carried its own status (merge keeps the stored one otherwise).
    pub status_supplied: bool,
}

impl PendingWrite {
    pub fn key(&self) -> &str {
        &self.record.natural_key
    }
}

/// True for values that carry no information in a merge.
pub fn is_blank_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Patch `stored` with every non-blank entry of `incoming`.
pub fn merge_fields(stored: &mut Fields, incoming: &Fields) {
    for (name, value) in incoming {
        if !is_blank_value(value) {
            stored.insert(name.clone(), value.clone());
        }
    }
}
