//! Configuration loading and management.
//!
//! Lookup order for the config file:
//! 1. `--config` on the command line, then `RECORD_IMPORT_CONFIG_PATH`
//! 2. `record-import/config.yaml` in the working directory
//! 3. `~/.record-import/config.yaml`
//!
//! Environment variables are applied on top of whichever file was found:
//! - `RECORD_IMPORT_DB_PATH` - Database path
//! - `RECORD_IMPORT_BATCH_SIZE` - Records per write chunk
//! - `RECORD_IMPORT_MODE` - Default import mode

use crate::db::DEFAULT_BUSY_TIMEOUT_MS;
use crate::import::{DEFAULT_BATCH_SIZE, ImportOptions};
use crate::types::{DEFAULT_KEY_FIELD, DEFAULT_STATUS, ImportMode};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "RECORD_IMPORT_CONFIG_PATH";
pub const DB_PATH_ENV: &str = "RECORD_IMPORT_DB_PATH";
pub const BATCH_SIZE_ENV: &str = "RECORD_IMPORT_BATCH_SIZE";
pub const MODE_ENV: &str = "RECORD_IMPORT_MODE";

const PROJECT_CONFIG: &str = "record-import/config.yaml";
const USER_CONFIG_DIR: &str = ".record-import";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub import: ImportConfig,
}

/// Record store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// How long a write waits on a locked database before failing.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

/// Import engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Records per upsert chunk.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Mode used when the caller does not pick one.
    #[serde(default)]
    pub default_mode: ImportMode,

    /// Status stamped onto records without one.
    #[serde(default = "default_status")]
    pub default_status: String,

    /// Input field holding the natural key.
    #[serde(default = "default_key_field")]
    pub key_field: String,

    /// Optional bound on each probe and chunk write.
    #[serde(default)]
    pub operation_timeout_ms: Option<u64>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            default_mode: ImportMode::default(),
            default_status: default_status(),
            key_field: default_key_field(),
            operation_timeout_ms: None,
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("record-import/records.db")
}

fn default_busy_timeout() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_status() -> String {
    DEFAULT_STATUS.to_string()
}

fn default_key_field() -> String {
    DEFAULT_KEY_FIELD.to_string()
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, then apply environment overrides.
    ///
    /// An explicit path (e.g. from `--config`) wins over every other location;
    /// without one the default lookup order applies and a missing file means
    /// defaults.
    pub fn load_with(explicit: Option<&Path>) -> Result<Self> {
        let found = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_config_file()?,
        };
        let mut config = match found {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading config file");
                Self::load(path)?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn find_config_file() -> Result<Option<PathBuf>> {
        if let Ok(explicit) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(explicit);
            if !path.exists() {
                bail!("{} points to missing file {}", CONFIG_PATH_ENV, path.display());
            }
            return Ok(Some(path));
        }

        let project = PathBuf::from(PROJECT_CONFIG);
        if project.exists() {
            return Ok(Some(project));
        }

        Ok(dirs::home_dir()
            .map(|home| home.join(USER_CONFIG_DIR).join("config.yaml"))
            .filter(|path| path.exists()))
    }

    /// Apply `RECORD_IMPORT_*` environment overrides.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(db_path) = std::env::var(DB_PATH_ENV) {
            self.store.db_path = PathBuf::from(db_path);
        }

        if let Ok(batch_size) = std::env::var(BATCH_SIZE_ENV) {
            self.import.batch_size = batch_size
                .trim()
                .parse()
                .with_context(|| format!("{} must be a positive integer", BATCH_SIZE_ENV))?;
        }

        if let Ok(mode) = std::env::var(MODE_ENV) {
            self.import.default_mode = mode.parse().map_err(anyhow::Error::msg)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.import.batch_size == 0 {
            bail!("import.batch_size must be greater than zero");
        }
        if self.import.key_field.trim().is_empty() {
            bail!("import.key_field must not be empty");
        }
        Ok(())
    }

    /// Engine options derived from the `import` section.
    pub fn import_options(&self) -> ImportOptions {
        let mut options = ImportOptions::default()
            .with_batch_size(self.import.batch_size)
            .with_default_status(self.import.default_status.clone());
        if let Some(ms) = self.import.operation_timeout_ms {
            options = options.with_operation_timeout(Duration::from_millis(ms));
        }
        options
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.store.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.import.batch_size, 50);
        assert_eq!(config.import.default_mode, ImportMode::Skip);
        assert_eq!(config.import.default_status, "new");
        assert_eq!(config.import.key_field, "natural_key");
        assert_eq!(config.store.busy_timeout_ms, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "import:\n  batch_size: 25\n  default_mode: merge\n  key_field: username\n  operation_timeout_ms: 1500"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.import.batch_size, 25);
        assert_eq!(config.import.default_mode, ImportMode::Merge);
        assert_eq!(config.import.key_field, "username");
        assert_eq!(config.import.default_status, "new");
        assert_eq!(config.store.db_path, PathBuf::from("record-import/records.db"));

        let options = config.import_options();
        assert_eq!(options.batch_size, 25);
        assert_eq!(options.operation_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "import:\n  batch_size: 0").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "import:\n  default_mode: replace").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_ensure_db_dir_creates_parent() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.store.db_path = dir.path().join("nested").join("records.db");

        config.ensure_db_dir().unwrap();
        assert!(dir.path().join("nested").is_dir());
    }
}
