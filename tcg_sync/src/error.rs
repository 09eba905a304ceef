//! Error types for tcg_sync

use std::path::PathBuf;

/// A bulk line that could not be parsed
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("quantity is not a positive integer: {0}")]
    InvalidQuantity(String),
    #[error("expected `<qty> <name> <set> <number>`")]
    MissingTokens,
    #[error("set code is empty after sanitizing")]
    EmptySetCode,
    #[error("collector number is empty after sanitizing")]
    EmptyNumber,
}

/// A bulk line that parsed but could not be turned into a ledger delta
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("unknown set code: {0}")]
    UnknownSetCode(String),
    #[error("card not found: {set_id} {number}")]
    CardNotFound { set_id: String, number: String },
    #[error("already at maximum for {0}")]
    AlreadyAtMaximum(String),
}

/// Failure of a single bulk line
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

/// Ledger document could not be read or written
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger document is invalid: {0}")]
    Validation(String),
    #[error("ledger I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Catalog store call failed
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("catalog store is unavailable")]
    Unavailable,
    #[error("catalog store does not support {0}")]
    Unsupported(&'static str),
    #[error("catalog record not found: {0}")]
    NotFound(String),
    #[error("product {0} is not managed by the ledger")]
    Unmanaged(String),
    #[error("failed to fetch asset {url}: {reason}")]
    AssetFetch { url: String, reason: String },
    #[error("catalog serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("job scheduler error: {0}")]
    Scheduler(#[from] rusqlite::Error),
    #[error("job queue lock poisoned")]
    QueuePoisoned,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("failed to read input {source_name}: {source}")]
    Input {
        source_name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("card dataset error: {0}")]
    Dataset(String),
}

/// Result alias for tcg_sync operations
pub type Result<T> = std::result::Result<T, Error>;
