//! record-import CLI
//!
//! Imports keyed records into a SQLite record store with key-based
//! deduplication and a selectable conflict policy.

use anyhow::{Context, Result};
use clap::Parser;
use record_import::cli::import::{ImportArgs, exit_code};
use record_import::cli::records::{ListArgs, ShowArgs};
use record_import::cli::{Cli, Command};
use record_import::config::Config;
use record_import::db::Database;
use record_import::error::ErrorReport;
use record_import::format::{OutputFormat, format_preview_text, format_result_text};
use record_import::import::Importer;
use record_import::input::read_candidates;
use record_import::logging::{self, LogTarget};
use record_import::store::RecordStore;
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    let mut config = Config::load_with(cli.config.as_deref().map(Path::new))?;

    // Override paths from CLI arguments
    if let Some(db_path) = &cli.database {
        config.store.db_path = db_path.into();
    }

    match cli.command {
        Command::Import(args) => return run_import(config, args).await,
        Command::Show(args) => run_show(&config, args).await?,
        Command::List(args) => run_list(&config, args)?,
        Command::Count => run_count(&config).await?,
    }

    Ok(ExitCode::SUCCESS)
}

fn open_database(config: &Config) -> Result<Database> {
    config.ensure_db_dir()?;
    debug!(path = %config.store.db_path.display(), "Opening record store");
    Database::open_with_timeout(&config.store.db_path, config.store.busy_timeout_ms)
        .with_context(|| format!("Failed to open {}", config.store.db_path.display()))
}

/// Run the import command
///
/// Returns the process exit code; the store is closed before `main` exits.
async fn run_import(mut config: Config, args: ImportArgs) -> Result<ExitCode> {
    if let Some(batch_size) = args.batch_size {
        config.import.batch_size = batch_size;
    }
    if let Some(key_field) = &args.key_field {
        config.import.key_field = key_field.clone();
    }
    config.validate()?;

    let mode = args.resolve_mode(config.import.default_mode);
    info!(
        file = %args.file.display(),
        run = %args.describe(config.import.default_mode),
        "Reading records"
    );
    let records = read_candidates(&args.file, &config.import.key_field)?;

    let db = open_database(&config)?;
    let importer = Importer::with_options(db, config.import_options());

    if args.dry_run {
        let preview = importer.preview(records, mode).await;
        match args.format {
            OutputFormat::Text => print!("{}", format_preview_text(&preview)),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&preview)?),
        }
        return Ok(ExitCode::SUCCESS);
    }

    let outcome = importer.import(records, mode).await;
    match (&outcome, args.format) {
        (Ok(result), OutputFormat::Text) => print!("{}", format_result_text(result)),
        (Ok(result), OutputFormat::Json) => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        (Err(err), OutputFormat::Text) => eprintln!("Error: {}", err),
        (Err(err), OutputFormat::Json) => {
            println!("{}", serde_json::to_string_pretty(&ErrorReport::from(err))?)
        }
    }
    Ok(ExitCode::from(exit_code(&outcome)))
}

/// Run the show command
async fn run_show(config: &Config, args: ShowArgs) -> Result<()> {
    let db = open_database(config)?;
    match RecordStore::get(&db, &args.key).await? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => anyhow::bail!("Record not found: {}", args.key),
    }
    Ok(())
}

/// Run the list command
fn run_list(config: &Config, args: ListArgs) -> Result<()> {
    let db = open_database(config)?;
    for record in db.list_records(args.limit)? {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}

/// Run the count command
async fn run_count(config: &Config) -> Result<()> {
    let db = open_database(config)?;
    println!("{}", RecordStore::count(&db).await?);
    Ok(())
}
