//! CLI command definitions for record-import
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod import;
pub mod records;

use clap::{Parser, Subcommand};
use import::ImportArgs;
use records::{ListArgs, ShowArgs};

/// Bulk keyed-record import with deduplication and conflict policies
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import records from a JSON or JSON-lines file
    Import(ImportArgs),

    /// Print one stored record as JSON
    Show(ShowArgs),

    /// Print stored records as JSON lines
    List(ListArgs),

    /// Print the number of stored records
    Count,
}
