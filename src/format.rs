//! Output formatting for import results and previews.

use crate::import::{ImportPreview, ImportResult};
use clap::ValueEnum;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Format an import result as plain text.
pub fn format_result_text(result: &ImportResult) -> String {
    let mut out = String::new();

    out.push_str("Import complete:\n");
    out.push_str(&format!("  Mode: {}\n", result.mode));
    out.push_str(&format!("  Summary: {}\n", result.summary()));
    if result.duplicates > 0 {
        out.push_str(&format!(
            "  Duplicates collapsed: {} (counted as skipped)\n",
            result.duplicates
        ));
    }
    if result.invalid > 0 {
        out.push_str(&format!("  Invalid records ignored: {}\n", result.invalid));
    }
    if !result.updated_keys.is_empty() {
        let keys: Vec<&str> = result.updated_keys.iter().map(String::as_str).collect();
        out.push_str(&format!("  Updated keys: {}\n", keys.join(", ")));
    }
    if !result.errors.is_empty() {
        out.push_str("  Errors:\n");
        for error in &result.errors {
            out.push_str(&format!("    - {}\n", error));
        }
    }
    if !result.warnings.is_empty() {
        out.push_str("  Warnings:\n");
        for warning in &result.warnings {
            out.push_str(&format!("    - {}\n", warning));
        }
    }

    out
}

/// Format a dry-run preview as plain text.
pub fn format_preview_text(preview: &ImportPreview) -> String {
    let mut out = String::new();

    out.push_str("Dry run results:\n");
    out.push_str(&format!("  Mode: {}\n", preview.mode));
    out.push_str(&format!("  Valid records: {}\n", preview.valid));
    if preview.invalid > 0 {
        out.push_str(&format!("  Invalid records: {}\n", preview.invalid));
    }
    out.push_str(&format!("  Would succeed: {}\n", preview.would_succeed));
    if let Some(reason) = &preview.failure_reason {
        out.push_str(&format!("  Failure reason: {}\n", reason));
        return out;
    }
    out.push_str(&format!("  Would insert: {}\n", preview.would_insert));
    out.push_str(&format!("  Would update: {}\n", preview.would_update));
    out.push_str(&format!("  Would skip: {}\n", preview.would_skip));
    out.push_str(&format!("  Batches: {}\n", preview.batches));
    if !preview.warnings.is_empty() {
        out.push_str("  Warnings:\n");
        for warning in &preview.warnings {
            out.push_str(&format!("    - {}\n", warning));
        }
    }

    out
}
