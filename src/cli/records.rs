//! Read-only record subcommands: show, list and count.

use clap::Args;

/// Arguments for the show subcommand
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Natural key of the record (case-insensitive)
    #[arg(value_name = "KEY")]
    pub key: String,
}

/// Arguments for the list subcommand
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Maximum number of records to print
    #[arg(long, default_value_t = 50)]
    pub limit: usize,
}
