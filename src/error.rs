//! Structured error types for the import engine and record stores.

use serde::Serialize;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Precondition errors: the whole call is rejected and nothing is written
    NoValidRecords,
    ProbeFailed,
    FailModeCollision,
}

/// Failure reported by a record store for a single operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0:#}")]
    Database(anyhow::Error),

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("operation timed out after {0} ms")]
    Timeout(u64),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::Database(err)
    }
}

impl StoreError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        StoreError::Unavailable(reason.into())
    }
}

/// Precondition failure that rejects an entire import call.
///
/// Chunk write failures are not errors at this level; they are recorded in
/// the returned `ImportResult`.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("no valid records: every record is missing a natural key")]
    NoValidRecords,

    #[error("existing-key probe failed: {source}")]
    ProbeFailed {
        #[source]
        source: StoreError,
    },

    #[error(
        "import aborted: {} record(s) already exist: {}",
        .keys.len(),
        .keys.join(", ")
    )]
    FailModeCollision { keys: Vec<String> },
}

impl ImportError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ImportError::NoValidRecords => ErrorCode::NoValidRecords,
            ImportError::ProbeFailed { .. } => ErrorCode::ProbeFailed,
            ImportError::FailModeCollision { .. } => ErrorCode::FailModeCollision,
        }
    }

    /// Colliding keys for a fail-mode abort, empty otherwise.
    pub fn colliding_keys(&self) -> &[String] {
        match self {
            ImportError::FailModeCollision { keys } => keys,
            _ => &[],
        }
    }
}

/// Serializable error payload for JSON output.
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorReport {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            keys: Vec::new(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl From<&ImportError> for ErrorReport {
    fn from(err: &ImportError) -> Self {
        let mut report = ErrorReport::new(err.code(), err.to_string());
        report.keys = err.colliding_keys().to_vec();
        if let ImportError::ProbeFailed { source } = err {
            report = report.with_details(source.to_string());
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(ImportError::NoValidRecords.code(), ErrorCode::NoValidRecords);
        let err = ImportError::ProbeFailed {
            source: StoreError::unavailable("down"),
        };
        assert_eq!(err.code(), ErrorCode::ProbeFailed);
    }

    #[test]
    fn test_collision_message_lists_keys() {
        let err = ImportError::FailModeCollision {
            keys: vec!["alice".into(), "bob".into()],
        };
        assert_eq!(
            err.to_string(),
            "import aborted: 2 record(s) already exist: alice, bob"
        );
        assert_eq!(err.colliding_keys(), ["alice", "bob"]);
    }

    #[test]
    fn test_report_serialization() {
        let err = ImportError::FailModeCollision {
            keys: vec!["alice".into()],
        };
        let json = serde_json::to_value(ErrorReport::from(&err)).unwrap();
        assert_eq!(json["code"], "FAIL_MODE_COLLISION");
        assert_eq!(json["keys"][0], "alice");
        assert!(json.get("details").is_none());

        let json = serde_json::to_value(ErrorReport::from(&ImportError::NoValidRecords)).unwrap();
        assert_eq!(json["code"], "NO_VALID_RECORDS");
        assert!(json.get("keys").is_none());
    }
}
