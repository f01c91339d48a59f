//! Import subcommand for the record-import CLI
//!
//! Imports keyed records from a JSON or JSON-lines file into the record
//! store under a chosen conflict policy.

use crate::error::ImportError;
use crate::format::OutputFormat;
use crate::import::ImportResult;
use crate::types::ImportMode;
use clap::Args;
use std::path::PathBuf;

/// Exit code when one or more chunks failed to write.
pub const EXIT_PARTIAL: u8 = 1;
/// Exit code for a rejected import (nothing written).
pub const EXIT_REJECTED: u8 = 2;

/// Map an import outcome to the process exit code.
pub fn exit_code(outcome: &Result<ImportResult, ImportError>) -> u8 {
    match outcome {
        Ok(result) if result.has_errors() => EXIT_PARTIAL,
        Ok(_) => 0,
        Err(_) => EXIT_REJECTED,
    }
}

/// Arguments for the import subcommand
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Path to the records file (.json, .jsonl, optionally .gz)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Conflict policy for keys that already exist
    ///
    /// - skip: leave stored records untouched
    /// - update: overwrite stored records
    /// - merge: overwrite only fields the file provides
    /// - fail: abort without writing if any key exists
    #[arg(long, value_name = "MODE")]
    pub mode: Option<ImportMode>,

    /// Report what would happen without modifying the store
    #[arg(long)]
    pub dry_run: bool,

    /// Records per write batch (overrides config)
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Input field holding the natural key (overrides config)
    #[arg(long, value_name = "NAME")]
    pub key_field: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl ImportArgs {
    /// Resolve the mode, falling back to the configured default
    pub fn resolve_mode(&self, default: ImportMode) -> ImportMode {
        self.mode.unwrap_or(default)
    }

    /// Describe the run for logging
    pub fn describe(&self, default: ImportMode) -> String {
        let mode = self.resolve_mode(default);
        if self.dry_run {
            format!("dry-run ({})", mode)
        } else {
            mode.to_string()
        }
    }
}
