//! In-process catalog store that records every mutating call.

use super::{
    AssetId, CatalogProduct, CatalogResult, CatalogStore, CategoryId, ProductDraft, ProductId,
    ProductKind, StockStatus, SubVariant, SubVariantDraft, SubVariantId, SyncSnapshot,
};
use crate::error::CatalogError;
use std::collections::BTreeMap;
use tcg_common::VariantKey;

/// A mutating call made against [`MemoryCatalogStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogCall {
    CreateProduct(String),
    UpdateProduct(String),
    UpsertSubVariant(String, VariantKey),
    SetSubVariantStock(String),
    DeleteSubVariant(String),
    DeleteProduct(String),
    StoreAsset(String),
    AttachImage(String),
    CreateCategory(String),
}

#[derive(Debug, Default)]
pub struct MemoryCatalogStore {
    products: BTreeMap<ProductId, CatalogProduct>,
    categories: BTreeMap<(i64, String), CategoryId>,
    assets: BTreeMap<String, (AssetId, Vec<u8>)>,
    next_id: i64,
    unavailable: bool,
    calls: Vec<CatalogCall>,
    snapshots_written: usize,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Mutating calls made so far (snapshot writes excluded)
    pub fn calls(&self) -> &[CatalogCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn snapshots_written(&self) -> usize {
        self.snapshots_written
    }

    pub fn set_available(&mut self, available: bool) {
        self.unavailable = !available;
    }

    pub fn product(&self, sku: &str) -> Option<&CatalogProduct> {
        self.products.values().find(|p| p.sku == sku)
    }

    pub fn asset_bytes(&self, id: AssetId) -> Option<&[u8]> {
        self.assets
            .values()
            .find(|(asset, _)| *asset == id)
            .map(|(_, bytes)| bytes.as_slice())
    }

    /// Seed a product this system does not own
    pub fn insert_unmanaged(&mut self, sku: &str, name: &str, stock: i64) -> ProductId {
        let id = ProductId(self.next());
        self.products.insert(
            id,
            CatalogProduct {
                id,
                sku: sku.to_string(),
                name: name.to_string(),
                description: String::new(),
                managed: false,
                status: StockStatus::from_stock(stock),
                price: None,
                categories: Vec::new(),
                image: None,
                kind: ProductKind::Simple { stock },
                snapshot: None,
            },
        );
        id
    }

    /// Overwrite stock directly, bypassing the engine (a manual storefront edit)
    pub fn set_stock_directly(&mut self, sku: &str, key: Option<VariantKey>, stock: i64) -> bool {
        let Some(product) = self.products.values_mut().find(|p| p.sku == sku) else {
            return false;
        };
        match &mut product.kind {
            ProductKind::Simple { stock: current } => {
                *current = stock;
                product.status = StockStatus::from_stock(stock);
                true
            }
            ProductKind::Variable { sub_variants } => {
                let Some(sub) = sub_variants.iter_mut().find(|s| s.variant_key == key) else {
                    return false;
                };
                sub.stock = stock;
                sub.status = StockStatus::from_stock(stock);
                true
            }
        }
    }

    /// Attach a sub-record with an arbitrary (possibly missing) key, the way a
    /// storefront edit outside this system could leave it
    pub fn insert_raw_sub_variant(
        &mut self,
        sku: &str,
        key: Option<VariantKey>,
        stock: i64,
    ) -> Option<SubVariantId> {
        let id = SubVariantId(self.next());
        let product = self.products.values_mut().find(|p| p.sku == sku)?;
        let ProductKind::Variable { sub_variants } = &mut product.kind else {
            return None;
        };
        sub_variants.push(SubVariant {
            id,
            variant_key: key,
            stock,
            status: StockStatus::from_stock(stock),
            price: None,
        });
        Some(id)
    }

    fn get_mut(&mut self, id: ProductId) -> CatalogResult<&mut CatalogProduct> {
        self.products
            .get_mut(&id)
            .ok_or_else(|| CatalogError::NotFound(format!("product {}", id.0)))
    }

    fn write_listing(
        &mut self,
        existing: Option<ProductId>,
        draft: &ProductDraft,
        simple_stock: Option<i64>,
    ) -> CatalogResult<ProductId> {
        let (id, call) = match existing {
            Some(id) => (id, CatalogCall::UpdateProduct(draft.sku.clone())),
            None => (
                ProductId(self.next()),
                CatalogCall::CreateProduct(draft.sku.clone()),
            ),
        };
        let previous = self.products.remove(&id);
        let kind = match (simple_stock, previous.as_ref().map(|p| &p.kind)) {
            (Some(stock), _) => ProductKind::Simple { stock },
            (None, Some(ProductKind::Variable { sub_variants })) => ProductKind::Variable {
                sub_variants: sub_variants.clone(),
            },
            (None, _) => ProductKind::Variable {
                sub_variants: Vec::new(),
            },
        };
        // Ownership is decided when a product is created, never on update
        let managed = previous.as_ref().map_or(true, |p| p.managed);
        let (image, snapshot) = previous
            .map(|p| (p.image, p.snapshot))
            .unwrap_or((None, None));
        self.products.insert(
            id,
            CatalogProduct {
                id,
                sku: draft.sku.clone(),
                name: draft.name.clone(),
                description: draft.description.clone(),
                managed,
                status: draft.status,
                price: draft.price,
                categories: draft.categories.clone(),
                image,
                kind,
                snapshot,
            },
        );
        self.calls.push(call);
        Ok(id)
    }

    fn check_available(&self) -> CatalogResult<()> {
        if self.unavailable {
            Err(CatalogError::Unavailable)
        } else {
            Ok(())
        }
    }
}

impl CatalogStore for MemoryCatalogStore {
    fn is_available(&self) -> bool {
        !self.unavailable
    }

    fn find_by_sku(&self, sku: &str) -> CatalogResult<Option<CatalogProduct>> {
        self.check_available()?;
        Ok(self.product(sku).cloned())
    }

    fn find_by_id(&self, id: ProductId) -> CatalogResult<Option<CatalogProduct>> {
        self.check_available()?;
        Ok(self.products.get(&id).cloned())
    }

    fn list_managed(&self) -> CatalogResult<Vec<CatalogProduct>> {
        self.check_available()?;
        Ok(self.products.values().filter(|p| p.managed).cloned().collect())
    }

    fn upsert_simple(
        &mut self,
        existing: Option<ProductId>,
        draft: &ProductDraft,
        stock: i64,
    ) -> CatalogResult<ProductId> {
        self.check_available()?;
        self.write_listing(existing, draft, Some(stock))
    }

    fn upsert_variable(
        &mut self,
        existing: Option<ProductId>,
        draft: &ProductDraft,
    ) -> CatalogResult<ProductId> {
        self.check_available()?;
        self.write_listing(existing, draft, None)
    }

    fn upsert_sub_variant(
        &mut self,
        parent: ProductId,
        draft: &SubVariantDraft,
    ) -> CatalogResult<SubVariantId> {
        self.check_available()?;
        let new_id = SubVariantId(self.next());
        let product = self.get_mut(parent)?;
        let sku = product.sku.clone();
        let ProductKind::Variable { sub_variants } = &mut product.kind else {
            return Err(CatalogError::Unsupported("sub-variants on a simple product"));
        };

        let record = SubVariant {
            id: draft.id.unwrap_or(new_id),
            variant_key: Some(draft.variant_key),
            stock: draft.stock,
            status: draft.status(),
            price: draft.price,
        };
        let id = record.id;
        match draft.id.and_then(|id| sub_variants.iter_mut().find(|s| s.id == id)) {
            Some(existing) => *existing = record,
            None => sub_variants.push(record),
        }
        self.calls
            .push(CatalogCall::UpsertSubVariant(sku, draft.variant_key));
        Ok(id)
    }

    fn set_sub_variant_stock(
        &mut self,
        parent: ProductId,
        id: SubVariantId,
        stock: i64,
    ) -> CatalogResult<()> {
        self.check_available()?;
        let product = self.get_mut(parent)?;
        let sku = product.sku.clone();
        let sub = match &mut product.kind {
            ProductKind::Variable { sub_variants } => sub_variants.iter_mut().find(|s| s.id == id),
            ProductKind::Simple { .. } => None,
        }
        .ok_or_else(|| CatalogError::NotFound(format!("sub-variant {} of {}", id.0, sku)))?;
        sub.stock = stock;
        sub.status = StockStatus::from_stock(stock);
        self.calls.push(CatalogCall::SetSubVariantStock(sku));
        Ok(())
    }

    fn delete_sub_variant(&mut self, parent: ProductId, id: SubVariantId) -> CatalogResult<()> {
        self.check_available()?;
        let product = self.get_mut(parent)?;
        let sku = product.sku.clone();
        if let ProductKind::Variable { sub_variants } = &mut product.kind {
            sub_variants.retain(|s| s.id != id);
        }
        self.calls.push(CatalogCall::DeleteSubVariant(sku));
        Ok(())
    }

    fn delete_product(&mut self, id: ProductId) -> CatalogResult<()> {
        self.check_available()?;
        let product = self
            .products
            .remove(&id)
            .ok_or_else(|| CatalogError::NotFound(format!("product {}", id.0)))?;
        self.calls.push(CatalogCall::DeleteProduct(product.sku));
        Ok(())
    }

    fn write_snapshot(&mut self, id: ProductId, snapshot: &SyncSnapshot) -> CatalogResult<()> {
        self.check_available()?;
        self.get_mut(id)?.snapshot = Some(snapshot.clone());
        self.snapshots_written += 1;
        Ok(())
    }

    fn find_asset_by_source(&self, source_url: &str) -> CatalogResult<Option<AssetId>> {
        self.check_available()?;
        Ok(self.assets.get(source_url).map(|(id, _)| *id))
    }

    fn store_asset(&mut self, source_url: &str, bytes: &[u8]) -> CatalogResult<AssetId> {
        self.check_available()?;
        let id = AssetId(self.next());
        self.assets
            .insert(source_url.to_string(), (id, bytes.to_vec()));
        self.calls.push(CatalogCall::StoreAsset(source_url.to_string()));
        Ok(id)
    }

    fn attach_image(&mut self, id: ProductId, asset: AssetId) -> CatalogResult<()> {
        self.check_available()?;
        let product = self.get_mut(id)?;
        product.image = Some(asset);
        let sku = product.sku.clone();
        self.calls.push(CatalogCall::AttachImage(sku));
        Ok(())
    }

    fn ensure_category_path(&mut self, path: &[String]) -> CatalogResult<Vec<CategoryId>> {
        self.check_available()?;
        let mut parent = 0i64;
        let mut ids = Vec::with_capacity(path.len());
        for name in path {
            let key = (parent, name.clone());
            let id = match self.categories.get(&key) {
                Some(id) => *id,
                None => {
                    let id = CategoryId(self.next());
                    self.categories.insert(key, id);
                    self.calls.push(CatalogCall::CreateCategory(name.clone()));
                    id
                }
            };
            ids.push(id);
            parent = id.0;
        }
        Ok(ids)
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
    fn records_mutations_but_not_snapshots() {
        let mut store = MemoryCatalogStore::new();
        let id = store.upsert_variable(None, &draft("sv1-50")).unwrap();
        store
            .upsert_sub_variant(
                id,
                &SubVariantDraft {
                    id: None,
                    variant_key: VariantKey::Foil,
                    stock: 2,
                    price: None,
                },
            )
            .unwrap();
        store.ensure_category_path(&["Pokemon".to_string()]).unwrap();
        store.ensure_category_path(&["Pokemon".to_string()]).unwrap();

        assert_eq!(
            store.calls(),
            &[
                CatalogCall::CreateProduct("sv1-50".to_string()),
                CatalogCall::UpsertSubVariant("sv1-50".to_string(), VariantKey::Foil),
                CatalogCall::CreateCategory("Pokemon".to_string()),
            ]
        );
        assert_eq!(store.product("sv1-50").unwrap().total_stock(), 2);
    }

    #[test]
    fn unavailable_store_rejects_calls() {
        let mut store = MemoryCatalogStore::new();
        store.set_available(false);
        assert!(!store.is_available());
        assert!(matches!(store.list_managed(), Err(CatalogError::Unavailable)));
    }

    #[test]
    fn converting_to_simple_drops_sub_variants() {
        let mut store = MemoryCatalogStore::new();
        let id = store.upsert_variable(None, &draft("sv1-50")).unwrap();
        store
            .upsert_sub_variant(
                id,
                &SubVariantDraft {
                    id: None,
                    variant_key: VariantKey::Normal,
                    stock: 1,
                    price: None,
                },
            )
            .unwrap();
        assert_eq!(store.upsert_simple(Some(id), &draft("sv1-50"), 4).unwrap(), id);
        assert_eq!(
            store.product("sv1-50").unwrap().kind,
            ProductKind::Simple { stock: 4 }
        );
    }
}
