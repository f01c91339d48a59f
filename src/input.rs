//! Loading candidate records from JSON files.
//!
//! Accepts a JSON array of objects or newline-delimited JSON (`.jsonl`,
//! `.ndjson`). Either may be gzip-compressed (`.gz`).

use crate::types::CandidateRecord;
use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Check if a path is gzipped based on extension.
pub fn is_gzipped(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// Check if a path holds newline-delimited JSON, looking through `.gz`.
pub fn is_json_lines(path: &Path) -> bool {
    let inner = if is_gzipped(path) {
        path.file_stem().map(Path::new)
    } else {
        Some(path)
    };
    inner
        .and_then(Path::extension)
        .is_some_and(|ext| ext == "jsonl" || ext == "ndjson")
}

/// Read every candidate record from `path`.
pub fn read_candidates(path: &Path, key_field: &str) -> Result<Vec<CandidateRecord>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader: Box<dyn Read> = if is_gzipped(path) {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let records = if is_json_lines(path) {
        parse_json_lines(BufReader::new(reader), key_field)?
    } else {
        let value: Value = serde_json::from_reader(BufReader::new(reader))
            .with_context(|| format!("Invalid JSON in {}", path.display()))?;
        parse_json_array(value, key_field)?
    };

    tracing::debug!(path = %path.display(), records = records.len(), "Loaded candidate records");
    Ok(records)
}

/// Convert a JSON array of objects into candidates.
pub fn parse_json_array(value: Value, key_field: &str) -> Result<Vec<CandidateRecord>> {
    let Value::Array(items) = value else {
        bail!("Expected a JSON array of record objects");
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(obj) => Ok(CandidateRecord::from_object(obj, key_field)),
            other => bail!(
                "Record {} is not an object (found {})",
                index + 1,
                json_kind(&other)
            ),
        })
        .collect()
}

/// Parse newline-delimited JSON objects. Blank lines are ignored.
pub fn parse_json_lines<R: BufRead>(reader: R, key_field: &str) -> Result<Vec<CandidateRecord>> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line)
            .with_context(|| format!("Invalid JSON on line {}", index + 1))?;
        match value {
            Value::Object(obj) => records.push(CandidateRecord::from_object(obj, key_field)),
            other => bail!(
                "Line {} is not an object (found {})",
                index + 1,
                json_kind(&other)
            ),
        }
    }
    Ok(records)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use serde_json::json;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_extension_detection() {
        assert!(is_gzipped(&PathBuf::from("users.json.gz")));
        assert!(!is_gzipped(&PathBuf::from("users.json")));
        assert!(is_json_lines(&PathBuf::from("users.jsonl")));
        assert!(is_json_lines(&PathBuf::from("users.ndjson.gz")));
        assert!(!is_json_lines(&PathBuf::from("users.json.gz")));
    }

    #[test]
    fn test_parse_json_array() {
        let records = parse_json_array(
            json!([
                { "username": "alice", "team": "red" },
                { "username": "", "team": "blue" }
            ]),
            "username",
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].natural_key, "alice");
        assert!(!records[1].has_key());
    }

    #[test]
    fn test_parse_json_array_rejects_scalars() {
        let err = parse_json_array(json!([{ "username": "a" }, 5]), "username").unwrap_err();
        assert!(err.to_string().contains("Record 2"));
        assert!(parse_json_array(json!({ "username": "a" }), "username").is_err());
    }

    #[test]
    fn test_parse_json_lines_skips_blank_lines() {
        let input = "{\"id\": \"a\"}\n\n{\"id\": \"b\", \"status\": \"active\"}\n";
        let records = parse_json_lines(input.as_bytes(), "id").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].status.as_deref(), Some("active"));
    }

    #[test]
    fn test_read_gzipped_array() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("users.json.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder
            .write_all(br#"[{"natural_key": "Alice"}, {"natural_key": "bob"}]"#)
            .unwrap();
        encoder.finish().unwrap();

        let records = read_candidates(&path, "natural_key").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].natural_key, "Alice");
    }
}
