// CLI configuration loaded from YAML

use crate::storage::{FileStorage, SqliteStorage, Storage};
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Which storage backend holds the data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// One JSON file per key
    #[default]
    File,
    /// `taskdeck.db` SQLite database
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory the store's data lives in
    pub store_path: PathBuf,
    pub backend: Backend,
    /// Window for `upcoming` when no --days is given
    pub upcoming_days: u32,
    /// Seed default categories and tags into a brand new store
    pub seed_defaults: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            backend: Backend::default(),
            upcoming_days: 7,
            seed_defaults: true,
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// tried and a missing file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = fs::read_to_string(path).with_context(|| format!("Failed to read config {:?}", path))?;
                Self::from_yaml(&text)
            }
            None => match default_config_path() {
                Some(path) if path.exists() => {
                    debug!(path = ?path, "Loading config");
                    let text =
                        fs::read_to_string(&path).with_context(|| format!("Failed to read config {:?}", path))?;
                    Self::from_yaml(&text)
                }
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).context("Failed to parse config")
    }

    /// Open the configured storage backend
    pub fn open_storage(&self) -> Result<Box<dyn Storage>> {
        if self.store_path.as_os_str().is_empty() {
            return Err(eyre!("store_path cannot be empty"));
        }

        let storage: Box<dyn Storage> = match self.backend {
            Backend::File => Box::new(FileStorage::open(&self.store_path)?),
            Backend::Sqlite => Box::new(SqliteStorage::open(self.store_path.join("taskdeck.db"))?),
        };
        Ok(storage)
    }
}

/// `<config dir>/taskdeck/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("taskdeck").join("config.yaml"))
}

/// `<data dir>/taskdeck`, or `.taskdeck` when the platform has no data dir
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("taskdeck"))
        .unwrap_or_else(|| PathBuf::from(".taskdeck"))
}
