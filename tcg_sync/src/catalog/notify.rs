//! Catalog wrapper that reports stock writes to a listener, the way a
//! storefront fires its product-saved hooks.

use super::{
    AssetId, CatalogProduct, CatalogResult, CatalogStore, CategoryId, ProductDraft, ProductId,
    SubVariantDraft, SubVariantId, SyncSnapshot,
};

/// Reacts to stock being written on a product.
///
/// Called after the write has been stored, with read access to the catalog.
pub trait StockListener {
    fn on_stock_written(&self, catalog: &dyn CatalogStore, product: ProductId);
}

impl<T: StockListener + ?Sized> StockListener for &T {
    fn on_stock_written(&self, catalog: &dyn CatalogStore, product: ProductId) {
        (**self).on_stock_written(catalog, product)
    }
}

pub struct NotifyingCatalog<C, L> {
    inner: C,
    listener: L,
}

impl<C: CatalogStore, L: StockListener> NotifyingCatalog<C, L> {
    pub fn new(inner: C, listener: L) -> Self {
        Self { inner, listener }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut C {
        &mut self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    fn notify(&self, product: ProductId) {
        self.listener.on_stock_written(&self.inner, product);
    }
}

impl<C: CatalogStore, L: StockListener> CatalogStore for NotifyingCatalog<C, L> {
    fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    fn find_by_sku(&self, sku: &str) -> CatalogResult<Option<CatalogProduct>> {
        self.inner.find_by_sku(sku)
    }

    fn find_by_id(&self, id: ProductId) -> CatalogResult<Option<CatalogProduct>> {
        self.inner.find_by_id(id)
    }

    fn list_managed(&self) -> CatalogResult<Vec<CatalogProduct>> {
        self.inner.list_managed()
    }

    fn upsert_simple(
        &mut self,
        existing: Option<ProductId>,
        draft: &ProductDraft,
        stock: i64,
    ) -> CatalogResult<ProductId> {
        let id = self.inner.upsert_simple(existing, draft, stock)?;
        self.notify(id);
        Ok(id)
    }

    fn upsert_variable(
        &mut self,
        existing: Option<ProductId>,
        draft: &ProductDraft,
    ) -> CatalogResult<ProductId> {
        let id = self.inner.upsert_variable(existing, draft)?;
        self.notify(id);
        Ok(id)
    }

    fn upsert_sub_variant(
        &mut self,
        parent: ProductId,
        draft: &SubVariantDraft,
    ) -> CatalogResult<SubVariantId> {
        let id = self.inner.upsert_sub_variant(parent, draft)?;
        self.notify(parent);
        Ok(id)
    }

    fn set_sub_variant_stock(
        &mut self,
        parent: ProductId,
        id: SubVariantId,
        stock: i64,
    ) -> CatalogResult<()> {
        self.inner.set_sub_variant_stock(parent, id, stock)?;
        self.notify(parent);
        Ok(())
    }

    fn delete_sub_variant(&mut self, parent: ProductId, id: SubVariantId) -> CatalogResult<()> {
        self.inner.delete_sub_variant(parent, id)
    }

    fn delete_product(&mut self, id: ProductId) -> CatalogResult<()> {
        self.inner.delete_product(id)
    }

    fn write_snapshot(&mut self, id: ProductId, snapshot: &SyncSnapshot) -> CatalogResult<()> {
        self.inner.write_snapshot(id, snapshot)
    }

    fn find_asset_by_source(&self, source_url: &str) -> CatalogResult<Option<AssetId>> {
        self.inner.find_asset_by_source(source_url)
    }

    fn store_asset(&mut self, source_url: &str, bytes: &[u8]) -> CatalogResult<AssetId> {
        self.inner.store_asset(source_url, bytes)
    }

    fn attach_image(&mut self, id: ProductId, asset: AssetId) -> CatalogResult<()> {
        self.inner.attach_image(id, asset)
    }

    fn ensure_category_path(&mut self, path: &[String]) -> CatalogResult<Vec<CategoryId>> {
        self.inner.ensure_category_path(path)
    }
}
