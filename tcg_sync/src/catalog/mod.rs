//! Storefront catalog records and the store interface the sync engine drives.

mod memory;
mod notify;
mod sqlite;

pub use memory::{CatalogCall, MemoryCatalogStore};
pub use notify::{NotifyingCatalog, StockListener};
pub use sqlite::SqliteCatalogStore;

use crate::error::CatalogError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tcg_common::{Price, VariantKey};

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubVariantId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CategoryId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockStatus {
    InStock,
    OutOfStock,
}

impl StockStatus {
    pub fn from_stock(stock: i64) -> Self {
        if stock > 0 {
            StockStatus::InStock
        } else {
            StockStatus::OutOfStock
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "instock",
            StockStatus::OutOfStock => "outofstock",
        }
    }

    pub fn parse(s: &str) -> Self {
        if s == "instock" {
            StockStatus::InStock
        } else {
            StockStatus::OutOfStock
        }
    }
}

/// One finish of a multi-variant product.
///
/// `variant_key` is the stored metadata used to match sub-records across
/// passes; records without it are treated as stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubVariant {
    pub id: SubVariantId,
    pub variant_key: Option<VariantKey>,
    pub stock: i64,
    pub status: StockStatus,
    pub price: Option<Price>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductKind {
    /// Single stock level managed on the product itself
    Simple { stock: i64 },
    /// Stock lives on the sub-variants; the parent only derives a status
    Variable { sub_variants: Vec<SubVariant> },
}

impl ProductKind {
    pub fn is_variable(&self) -> bool {
        matches!(self, ProductKind::Variable { .. })
    }

    pub fn sub_variants(&self) -> &[SubVariant] {
        match self {
            ProductKind::Simple { .. } => &[],
            ProductKind::Variable { sub_variants } => sub_variants,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub description: String,
    /// Created and owned by this system; only managed products are mutated
    pub managed: bool,
    pub status: StockStatus,
    /// Simple: the price. Variable: the lowest priced active sub-variant.
    pub price: Option<Price>,
    pub categories: Vec<CategoryId>,
    pub image: Option<AssetId>,
    pub kind: ProductKind,
    pub snapshot: Option<SyncSnapshot>,
}

impl CatalogProduct {
    /// Total stock across the product (sub-variants for variable products)
    pub fn total_stock(&self) -> i64 {
        match &self.kind {
            ProductKind::Simple { stock } => (*stock).max(0),
            ProductKind::Variable { sub_variants } => {
                sub_variants.iter().map(|s| s.stock.max(0)).sum()
            }
        }
    }

    fn same_listing(&self, draft: &ProductDraft) -> bool {
        let mut mine = self.categories.clone();
        mine.sort();
        let mut theirs = draft.categories.clone();
        theirs.sort();
        self.sku == draft.sku
            && self.name == draft.name
            && self.description == draft.description
            && self.price == draft.price
            && self.status == draft.status
            && mine == theirs
    }

    /// Whether writing `draft` as a simple product with `stock` would change anything
    pub fn matches_simple(&self, draft: &ProductDraft, stock: i64) -> bool {
        matches!(self.kind, ProductKind::Simple { stock: current } if current == stock)
            && self.same_listing(draft)
    }

    /// Whether writing `draft` as a variable parent would change anything
    pub fn matches_variable(&self, draft: &ProductDraft) -> bool {
        self.kind.is_variable() && self.same_listing(draft)
    }
}

/// Listing fields written for a product
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDraft {
    pub sku: String,
    pub name: String,
    pub description: String,
    pub categories: Vec<CategoryId>,
    pub price: Option<Price>,
    pub status: StockStatus,
}

impl ProductDraft {
    /// Draft that reproduces an existing product's listing
    pub fn from_product(product: &CatalogProduct) -> Self {
        Self {
            sku: product.sku.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            categories: product.categories.clone(),
            price: product.price,
            status: product.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubVariantDraft {
    /// Existing record to update in place; `None` creates a new record
    pub id: Option<SubVariantId>,
    pub variant_key: VariantKey,
    pub stock: i64,
    pub price: Option<Price>,
}

impl SubVariantDraft {
    pub fn status(&self) -> StockStatus {
        StockStatus::from_stock(self.stock)
    }

    pub fn matches(&self, existing: &SubVariant) -> bool {
        existing.variant_key == Some(self.variant_key)
            && existing.stock == self.stock
            && existing.price == self.price
            && existing.status == self.status()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotVariant {
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub price: Option<Price>,
}

/// Observability record written onto a product after each pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub card_id: String,
    pub display_name: String,
    pub variants: BTreeMap<VariantKey, SnapshotVariant>,
    pub total_quantity: i64,
    pub active_variants: Vec<VariantKey>,
    pub primary_variant: Option<VariantKey>,
    pub synced_at: DateTime<Utc>,
}

/// Storefront catalog operations used by the synchronization engine.
///
/// Upserts with `existing = Some(id)` update that record in place, converting
/// its kind when it differs; the product id never changes.
pub trait CatalogStore {
    /// `false` when the backing store cannot be reached at all
    fn is_available(&self) -> bool {
        true
    }

    fn find_by_sku(&self, sku: &str) -> CatalogResult<Option<CatalogProduct>>;
    fn find_by_id(&self, id: ProductId) -> CatalogResult<Option<CatalogProduct>>;
    fn list_managed(&self) -> CatalogResult<Vec<CatalogProduct>>;

    fn upsert_simple(
        &mut self,
        existing: Option<ProductId>,
        draft: &ProductDraft,
        stock: i64,
    ) -> CatalogResult<ProductId>;
    fn upsert_variable(
        &mut self,
        existing: Option<ProductId>,
        draft: &ProductDraft,
    ) -> CatalogResult<ProductId>;
    fn upsert_sub_variant(
        &mut self,
        parent: ProductId,
        draft: &SubVariantDraft,
    ) -> CatalogResult<SubVariantId>;
    /// Overwrite the stock of one existing sub-record, whatever its key
    fn set_sub_variant_stock(
        &mut self,
        parent: ProductId,
        id: SubVariantId,
        stock: i64,
    ) -> CatalogResult<()>;
    fn delete_sub_variant(&mut self, parent: ProductId, id: SubVariantId) -> CatalogResult<()>;
    /// Remove a product together with all of its sub-variants
    fn delete_product(&mut self, id: ProductId) -> CatalogResult<()>;

    fn write_snapshot(&mut self, id: ProductId, snapshot: &SyncSnapshot) -> CatalogResult<()>;

    fn find_asset_by_source(&self, source_url: &str) -> CatalogResult<Option<AssetId>>;
    fn store_asset(&mut self, source_url: &str, bytes: &[u8]) -> CatalogResult<AssetId>;
    fn attach_image(&mut self, id: ProductId, asset: AssetId) -> CatalogResult<()>;

    /// Get or create each segment of a category path; returns the ids from
    /// root to leaf.
    fn ensure_category_path(&mut self, path: &[String]) -> CatalogResult<Vec<CategoryId>>;
}

/// Overwrite stock on one product the way a storefront operator would: the
/// product itself for simple products, the sub-variant with `key` (default
/// `normal`) for variable ones. The parent status is kept in step. Products
/// the ledger does not manage are refused.
pub fn set_stock<C: CatalogStore + ?Sized>(
    catalog: &mut C,
    sku: &str,
    key: Option<VariantKey>,
    stock: i64,
) -> CatalogResult<ProductId> {
    let product = catalog
        .find_by_sku(sku)?
        .ok_or_else(|| CatalogError::NotFound(format!("product {}", sku)))?;
    if !product.managed {
        return Err(CatalogError::Unmanaged(sku.to_string()));
    }

    match &product.kind {
        ProductKind::Simple { .. } => {
            let mut draft = ProductDraft::from_product(&product);
            draft.status = StockStatus::from_stock(stock);
            catalog.upsert_simple(Some(product.id), &draft, stock)
        }
        ProductKind::Variable { sub_variants } => {
            let key = key.unwrap_or(VariantKey::Normal);
            let existing = sub_variants.iter().find(|s| s.variant_key == Some(key));
            catalog.upsert_sub_variant(
                product.id,
                &SubVariantDraft {
                    id: existing.map(|s| s.id),
                    variant_key: key,
                    stock,
                    price: existing.and_then(|s| s.price),
                },
            )?;

            let in_stock = stock > 0
                || sub_variants
                    .iter()
                    .any(|s| s.variant_key != Some(key) && s.stock > 0);
            let status = if in_stock {
                StockStatus::InStock
            } else {
                StockStatus::OutOfStock
            };
            if status != product.status {
                let mut draft = ProductDraft::from_product(&product);
                draft.status = status;
                catalog.upsert_variable(Some(product.id), &draft)?;
            }
            Ok(product.id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(sku: &str) -> ProductDraft {
        ProductDraft {
            sku: sku.to_string(),
            name: sku.to_string(),
            description: String::new(),
            categories: vec![],
            price: None,
            status: StockStatus::InStock,
        }
    }

    #[test]
    fn set_stock_on_simple_product() {
        let mut catalog = MemoryCatalogStore::new();
        catalog.upsert_simple(None, &draft("sv1-50"), 3).unwrap();
        set_stock(&mut catalog, "sv1-50", None, 0).unwrap();
        let product = catalog.product("sv1-50").unwrap();
        assert_eq!(product.kind, ProductKind::Simple { stock: 0 });
        assert_eq!(product.status, StockStatus::OutOfStock);
    }

    #[test]
    fn set_stock_on_variable_product_updates_parent_status() {
        let mut catalog = MemoryCatalogStore::new();
        let id = catalog.upsert_variable(None, &draft("sv1-50")).unwrap();
        let sub = catalog
            .upsert_sub_variant(
                id,
                &SubVariantDraft {
                    id: None,
                    variant_key: VariantKey::Foil,
                    stock: 2,
                    price: Some(Price::from_cents(300)),
                },
            )
            .unwrap();

        set_stock(&mut catalog, "sv1-50", Some(VariantKey::Foil), 0).unwrap();
        let product = catalog.product("sv1-50").unwrap();
        assert_eq!(product.kind.sub_variants()[0].id, sub);
        assert_eq!(product.kind.sub_variants()[0].stock, 0);
        assert_eq!(product.kind.sub_variants()[0].price, Some(Price::from_cents(300)));
        assert_eq!(product.status, StockStatus::OutOfStock);
    }

    #[test]
    fn stock_status_round_trips_through_text() {
        for status in [StockStatus::InStock, StockStatus::OutOfStock] {
            assert_eq!(StockStatus::parse(status.as_str()), status);
        }
        assert_eq!(StockStatus::from_stock(-1), StockStatus::OutOfStock);
    }

    #[test]
    fn set_stock_refuses_unmanaged_products() {
        let mut catalog = MemoryCatalogStore::new();
        catalog.insert_unmanaged("playmat", "Playmat", 4);
        assert!(matches!(
            set_stock(&mut catalog, "playmat", None, 2),
            Err(CatalogError::Unmanaged(_))
        ));
        let product = catalog.product("playmat").unwrap();
        assert!(!product.managed);
        assert_eq!(product.kind, ProductKind::Simple { stock: 4 });
    }

    #[test]
    fn set_stock_on_missing_product_fails() {
        let mut catalog = MemoryCatalogStore::new();
        assert!(matches!(
            set_stock(&mut catalog, "nope", None, 1),
            Err(CatalogError::NotFound(_))
        ));
    }
}
