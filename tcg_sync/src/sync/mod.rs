//! Catalog synchronization: listing enrichment, image assets and the pass itself

pub mod assets;
mod engine;
pub mod listing;

pub use assets::{AssetFetcher, CachedAssetFetcher, HttpAssetFetcher, NoAssetFetcher};
pub use engine::{delete_card, synchronize, DeleteReport, SyncReport};
pub use listing::{build_listing, Listing};
