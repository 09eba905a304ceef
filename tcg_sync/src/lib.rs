//! TCG Sync - trading-card inventory ledger and storefront catalog sync
//!
//! Keeps a per-variant card ledger (bulk text import, signed buffer edits,
//! floor-at-zero merges) and converges a storefront catalog to it. Stock
//! edits made on the catalog side flow back into the ledger.

pub mod bulk;
pub mod card_index;
pub mod catalog;
pub mod config;
pub mod error;
pub mod guard;
pub mod ledger;
pub mod scheduler;
pub mod sync;

pub use bulk::{import_bulk, resolve_lines, BulkReport, BulkResolver, LineResult};
pub use card_index::{CardIndex, MemoryCardIndex};
pub use catalog::{CatalogStore, MemoryCatalogStore, NotifyingCatalog, SqliteCatalogStore};
pub use config::Config;
pub use error::{Error, Result};
pub use guard::{write_back_stock, LedgerWriteback, SyncPass, SyncSession, WritebackOutcome};
pub use ledger::{
    aggregate, CardEntry, DeltaBuffer, JsonFileLedgerStore, Ledger, LedgerStore, MemoryLedgerStore,
};
pub use scheduler::{
    JobScheduler, MemoryJobScheduler, RunOutcome, SqliteJobScheduler, SyncOrchestrator,
    SYNC_JOB_ID,
};
pub use sync::{delete_card, synchronize, SyncReport};
