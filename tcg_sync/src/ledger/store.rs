//! Persistence for the ledger document.
//!
//! There is no revision token: two writers racing on the same document are
//! last-write-wins.

use super::document::{decode, encode};
use super::model::Ledger;
use crate::error::LedgerError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub trait LedgerStore {
    fn load(&self) -> Result<Ledger, LedgerError>;
    fn save(&self, ledger: &Ledger) -> Result<(), LedgerError>;
}

impl<T: LedgerStore + ?Sized> LedgerStore for &T {
    fn load(&self) -> Result<Ledger, LedgerError> {
        (**self).load()
    }

    fn save(&self, ledger: &Ledger) -> Result<(), LedgerError> {
        (**self).save(ledger)
    }
}

impl<T: LedgerStore + ?Sized> LedgerStore for Arc<T> {
    fn load(&self) -> Result<Ledger, LedgerError> {
        (**self).load()
    }

    fn save(&self, ledger: &Ledger) -> Result<(), LedgerError> {
        (**self).save(ledger)
    }
}

/// Ledger stored as a pretty-printed JSON file.
///
/// Saves go through a temporary file in the same directory that is renamed
/// over the target, so a failed write leaves the previous document intact.
pub struct JsonFileLedgerStore {
    path: PathBuf,
    default_name: String,
    default_format: String,
}

impl JsonFileLedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            default_name: "Collection".to_string(),
            default_format: "standard".to_string(),
        }
    }

    /// Name and format used when the document does not exist yet
    pub fn with_defaults(mut self, name: impl Into<String>, format: impl Into<String>) -> Self {
        self.default_name = name.into();
        self.default_format = format.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl LedgerStore for JsonFileLedgerStore {
    fn load(&self) -> Result<Ledger, LedgerError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let ledger = decode(&content)?;
                log::debug!(
                    "Loaded ledger {:?} with {} entries from {}",
                    ledger.name,
                    ledger.len(),
                    self.path.display()
                );
                Ok(ledger)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No ledger at {}, starting empty", self.path.display());
                Ok(Ledger::new(&self.default_name, &self.default_format))
            }
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn save(&self, ledger: &Ledger) -> Result<(), LedgerError> {
        let content = encode(ledger)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(content.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;

        log::debug!(
            "Saved ledger with {} entries to {}",
            ledger.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// In-process ledger store
#[derive(Default)]
pub struct MemoryLedgerStore {
    ledger: Mutex<Ledger>,
}

impl MemoryLedgerStore {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger: Mutex::new(ledger),
        }
    }

    /// Copy of the current document
    pub fn snapshot(&self) -> Ledger {
        self.ledger.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn load(&self) -> Result<Ledger, LedgerError> {
        Ok(self.snapshot())
    }

    fn save(&self, ledger: &Ledger) -> Result<(), LedgerError> {
        match self.ledger.lock() {
            Ok(mut guard) => {
                *guard = ledger.clone();
                Ok(())
            }
            Err(_) => Err(LedgerError::Io {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::other("ledger lock poisoned"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::CardEntry;
    use tcg_common::VariantKey;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_empty_ledger_with_defaults() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileLedgerStore::new(dir.path().join("ledger.json"))
            .with_defaults("Trade Binder", "expanded");
        let ledger = store.load().unwrap();
        assert!(ledger.is_empty());
        assert_eq!(ledger.name, "Trade Binder");
        assert_eq!(ledger.format, "expanded");
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileLedgerStore::new(dir.path().join("nested").join("ledger.json"));
        let mut ledger = Ledger::new("Binder", "standard");
        ledger.apply(vec![CardEntry::new("sv1-50").with_variant(VariantKey::Foil, 2, None)]);

        store.save(&ledger).unwrap();
        assert_eq!(store.load().unwrap(), ledger);
    }

    #[test]
    fn invalid_document_is_a_validation_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, "[1, 2").unwrap();
        let store = JsonFileLedgerStore::new(&path);
        assert!(matches!(store.load(), Err(LedgerError::Validation(_))));
    }

    #[test]
    fn unreadable_path_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileLedgerStore::new(dir.path());
        assert!(matches!(store.load(), Err(LedgerError::Io { .. })));
    }
}
