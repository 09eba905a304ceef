//! The card ledger: data model, ingestion, aggregation and persistence

pub mod aggregate;
pub mod buffer;
pub mod document;
mod model;
pub mod normalize;
pub mod store;

pub use aggregate::{aggregate, merge};
pub use buffer::{DeltaBuffer, MAX_DELTA, MIN_DELTA};
pub use model::{CardEntry, Ledger, VariantRecord};
pub use normalize::{normalize_entry, QuantityMode};
pub use store::{JsonFileLedgerStore, LedgerStore, MemoryLedgerStore};
