//! Runtime configuration.
//!
//! Every field has a default under `~/.local/share/tcg_sync/` (or the
//! platform data directory). A JSON file may override any subset of fields.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Returns the data directory: ~/.local/share/tcg_sync
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tcg_sync")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ledger JSON document
    pub ledger_path: PathBuf,
    /// SQLite database holding the catalog and the job queue
    pub catalog_db: PathBuf,
    /// JSON array of set records
    pub sets_file: PathBuf,
    /// Directory with one `<set id>.json` card array per set
    pub cards_dir: PathBuf,
    pub asset_cache_dir: PathBuf,
    pub ledger_name: String,
    pub ledger_format: String,
    pub interval_secs: u64,
    pub user_agent: String,
    /// Fetch card images over HTTP when the catalog has none yet
    pub fetch_images: bool,
}

impl Default for Config {
    fn default() -> Self {
        let dir = data_dir();
        Self {
            ledger_path: dir.join("ledger.json"),
            catalog_db: dir.join("catalog.db"),
            sets_file: dir.join("dataset").join("sets.json"),
            cards_dir: dir.join("dataset").join("cards"),
            asset_cache_dir: dir.join("card_images"),
            ledger_name: "Collection".to_string(),
            ledger_format: "standard".to_string(),
            interval_secs: 300,
            user_agent: crate::sync::assets::DEFAULT_USER_AGENT.to_string(),
            fetch_images: true,
        }
    }
}

impl Config {
    /// Load a JSON config file; fields it leaves out keep their defaults
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config file {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!("failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Defaults, or the file at `path` when given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                Self::load_from_file(path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(Error::Config("interval_secs must be at least 1".to_string()));
        }
        if self.ledger_name.trim().is_empty() {
            return Err(Error::Config("ledger_name must not be empty".to_string()));
        }
        Ok(())
    }
}
