//! Tests for the synchronization pass

use super::*;
use crate::card_index::MemoryCardIndex;
use crate::catalog::{CatalogCall, MemoryCatalogStore, SubVariant};
use crate::error::CatalogError;
use crate::guard::SyncSession;
use crate::ledger::MemoryLedgerStore;
use crate::sync::AssetFetcher;
use std::cell::Cell;
use tcg_common::{CardImages, CardInfo, Price, SetInfo, VariantKey};

struct CountingFetcher {
    calls: Cell<usize>,
}

impl CountingFetcher {
    fn new() -> Self {
        Self { calls: Cell::new(0) }
    }
}

impl AssetFetcher for CountingFetcher {
    fn fetch(&self, _url: &str) -> std::result::Result<Vec<u8>, CatalogError> {
        self.calls.set(self.calls.get() + 1);
        Ok(vec![1, 2, 3])
    }
}

fn card(id: &str, name: &str, number: &str, supertype: &str) -> CardInfo {
    CardInfo {
        id: id.to_string(),
        name: name.to_string(),
        number: number.to_string(),
        supertype: Some(supertype.to_string()),
        images: Some(CardImages {
            small: None,
            large: Some(format!("https://images.example.com/{}.png", id)),
        }),
        ..Default::default()
    }
}

fn index() -> MemoryCardIndex {
    let mut nest_ball = card("sv1-181", "Nest Ball", "181", "Trainer");
    nest_ball.subtypes = vec!["Item".to_string()];
    MemoryCardIndex::new(
        vec![SetInfo {
            id: "sv1".to_string(),
            name: "Scarlet & Violet".to_string(),
            ptcgo_code: Some("SVI".to_string()),
            ..Default::default()
        }],
        vec![
            card("sv1-50", "Charizard", "50", "Pokémon"),
            card("sv1-51", "Charmander", "51", "Pokémon"),
            nest_ball,
        ],
    )
}

fn price(cents: u64) -> Option<Price> {
    Some(Price::from_cents(cents))
}

fn ledger(entries: Vec<CardEntry>) -> Ledger {
    let mut ledger = Ledger::new("Collection", "standard");
    ledger.apply(entries);
    ledger
}

fn simple_and_variable() -> Ledger {
    ledger(vec![
        CardEntry::new("sv1-51").with_variant(VariantKey::Normal, 3, price(25)),
        CardEntry::new("sv1-50")
            .with_variant(VariantKey::Normal, 2, price(450))
            .with_variant(VariantKey::Foil, 1, price(900)),
    ])
}

fn run(ledger: &Ledger, catalog: &mut MemoryCatalogStore, fetcher: &CountingFetcher) -> SyncReport {
    let session = SyncSession::new();
    let pass = session.try_begin().unwrap();
    synchronize(&pass, ledger, &index(), catalog, fetcher)
}

fn sub(product: &CatalogProduct, key: VariantKey) -> &SubVariant {
    product
        .kind
        .sub_variants()
        .iter()
        .find(|s| s.variant_key == Some(key))
        .unwrap()
}

#[test]
fn first_pass_creates_listings() {
    let mut catalog = MemoryCatalogStore::new();
    let fetcher = CountingFetcher::new();
    let report = run(&simple_and_variable(), &mut catalog, &fetcher);

    assert_eq!(report.created, 2);
    assert!(report.failures.is_empty());

    let charmander = catalog.product("sv1-51").unwrap();
    assert_eq!(charmander.name, "Charmander SVI 51");
    assert_eq!(charmander.kind, ProductKind::Simple { stock: 3 });
    assert_eq!(charmander.price, price(25));
    assert!(charmander.image.is_some());

    let charizard = catalog.product("sv1-50").unwrap();
    assert!(charizard.kind.is_variable());
    assert_eq!(charizard.status, StockStatus::InStock);
    assert_eq!(charizard.price, price(450));
    assert_eq!(sub(charizard, VariantKey::Foil).stock, 1);
    assert_eq!(charizard.total_stock(), 3);

    let snapshot = charizard.snapshot.clone().unwrap();
    assert_eq!(snapshot.total_quantity, 3);
    assert_eq!(snapshot.active_variants, vec![VariantKey::Normal, VariantKey::Foil]);
    assert_eq!(snapshot.primary_variant, Some(VariantKey::Normal));
    assert_eq!(fetcher.calls.get(), 2);
}

#[test]
fn second_pass_on_unchanged_ledger_makes_no_writes() {
    let ledger = simple_and_variable();
    let mut catalog = MemoryCatalogStore::new();
    let fetcher = CountingFetcher::new();
    run(&ledger, &mut catalog, &fetcher);
    catalog.clear_calls();
    let snapshots_before = catalog.snapshots_written();

    let report = run(&ledger, &mut catalog, &fetcher);
    assert!(catalog.calls().is_empty());
    assert_eq!(report.unchanged, 2);
    assert_eq!(report.mutated(), 0);
    assert_eq!(fetcher.calls.get(), 2);
    assert_eq!(catalog.snapshots_written(), snapshots_before + 2);
}

#[test]
fn removed_entries_are_zeroed_not_deleted() {
    let mut catalog = MemoryCatalogStore::new();
    let fetcher = CountingFetcher::new();
    run(&simple_and_variable(), &mut catalog, &fetcher);

    let report = run(&ledger(vec![]), &mut catalog, &fetcher);
    assert_eq!(report.zeroed, 2);
    assert!(!catalog
        .calls()
        .iter()
        .any(|c| matches!(c, CatalogCall::DeleteProduct(_) | CatalogCall::DeleteSubVariant(_))));

    let charmander = catalog.product("sv1-51").unwrap();
    assert_eq!(charmander.kind, ProductKind::Simple { stock: 0 });
    assert_eq!(charmander.status, StockStatus::OutOfStock);

    let charizard = catalog.product("sv1-50").unwrap();
    assert_eq!(charizard.kind.sub_variants().len(), 2);
    assert!(charizard.kind.sub_variants().iter().all(|s| s.stock == 0
        && s.status == StockStatus::OutOfStock));
    assert_eq!(charizard.status, StockStatus::OutOfStock);
    assert_eq!(charizard.snapshot.as_ref().unwrap().total_quantity, 0);
    assert!(charizard.snapshot.as_ref().unwrap().variants.is_empty());

    catalog.clear_calls();
    let again = run(&ledger(vec![]), &mut catalog, &fetcher);
    assert_eq!(again.zeroed, 0);
    assert!(catalog.calls().is_empty());
}

#[test]
fn orphan_zeroing_covers_sub_variants_without_a_key() {
    let mut catalog = MemoryCatalogStore::new();
    let fetcher = CountingFetcher::new();
    run(&simple_and_variable(), &mut catalog, &fetcher);
    let unkeyed = catalog.insert_raw_sub_variant("sv1-50", None, 5).unwrap();

    let report = run(&ledger(vec![]), &mut catalog, &fetcher);
    assert_eq!(report.zeroed, 2);
    assert!(report.failures.is_empty());

    let charizard = catalog.product("sv1-50").unwrap();
    assert_eq!(charizard.kind.sub_variants().len(), 3);
    let stray = charizard
        .kind
        .sub_variants()
        .iter()
        .find(|s| s.id == unkeyed)
        .unwrap();
    assert_eq!(stray.stock, 0);
    assert_eq!(stray.status, StockStatus::OutOfStock);
    assert_eq!(charizard.total_stock(), 0);
    assert_eq!(charizard.status, StockStatus::OutOfStock);
}

#[test]
fn kind_changes_keep_product_and_sub_variant_ids() {
    let mut catalog = MemoryCatalogStore::new();
    let fetcher = CountingFetcher::new();
    run(
        &ledger(vec![CardEntry::new("sv1-50").with_variant(VariantKey::Normal, 2, None)]),
        &mut catalog,
        &fetcher,
    );
    let id = catalog.product("sv1-50").unwrap().id;

    let report = run(
        &ledger(vec![CardEntry::new("sv1-50")
            .with_variant(VariantKey::Normal, 2, None)
            .with_variant(VariantKey::ReverseFoil, 1, None)]),
        &mut catalog,
        &fetcher,
    );
    assert_eq!(report.converted, 1);
    let product = catalog.product("sv1-50").unwrap();
    assert_eq!(product.id, id);
    let reverse_id = sub(product, VariantKey::ReverseFoil).id;
    let normal_id = sub(product, VariantKey::Normal).id;

    run(
        &ledger(vec![CardEntry::new("sv1-50")
            .with_variant(VariantKey::Normal, 5, None)
            .with_variant(VariantKey::ReverseFoil, 1, None)]),
        &mut catalog,
        &fetcher,
    );
    let product = catalog.product("sv1-50").unwrap();
    assert_eq!(sub(product, VariantKey::Normal).id, normal_id);
    assert_eq!(sub(product, VariantKey::Normal).stock, 5);
    assert_eq!(sub(product, VariantKey::ReverseFoil).id, reverse_id);

    let report = run(
        &ledger(vec![CardEntry::new("sv1-50").with_variant(VariantKey::Foil, 4, None)]),
        &mut catalog,
        &fetcher,
    );
    assert_eq!(report.converted, 1);
    let product = catalog.product("sv1-50").unwrap();
    assert_eq!(product.id, id);
    assert_eq!(product.kind, ProductKind::Simple { stock: 4 });
}

#[test]
fn inactive_variants_lose_their_sub_records() {
    let mut catalog = MemoryCatalogStore::new();
    let fetcher = CountingFetcher::new();
    run(
        &ledger(vec![CardEntry::new("sv1-50")
            .with_variant(VariantKey::Normal, 1, None)
            .with_variant(VariantKey::Foil, 1, None)
            .with_variant(VariantKey::Stamped, 1, None)]),
        &mut catalog,
        &fetcher,
    );
    run(
        &ledger(vec![CardEntry::new("sv1-50")
            .with_variant(VariantKey::Normal, 1, None)
            .with_variant(VariantKey::Foil, 0, price(100))
            .with_variant(VariantKey::Stamped, 2, None)]),
        &mut catalog,
        &fetcher,
    );
    let product = catalog.product("sv1-50").unwrap();
    let keys: Vec<_> = product
        .kind
        .sub_variants()
        .iter()
        .map(|s| s.variant_key)
        .collect();
    assert_eq!(keys, vec![Some(VariantKey::Normal), Some(VariantKey::Stamped)]);
}

#[test]
fn unmanaged_products_are_never_touched() {
    let mut catalog = MemoryCatalogStore::new();
    catalog.insert_unmanaged("sv1-51", "Hand-made listing", 9);
    let fetcher = CountingFetcher::new();

    let report = run(&simple_and_variable(), &mut catalog, &fetcher);
    assert_eq!(report.skipped_unmanaged, 1);
    assert_eq!(report.created, 1);

    let untouched = catalog.product("sv1-51").unwrap();
    assert_eq!(untouched.name, "Hand-made listing");
    assert_eq!(untouched.kind, ProductKind::Simple { stock: 9 });

    let report = run(&ledger(vec![]), &mut catalog, &fetcher);
    assert_eq!(report.zeroed, 1);
    assert_eq!(
        catalog.product("sv1-51").unwrap().kind,
        ProductKind::Simple { stock: 9 }
    );
}

#[test]
fn unknown_cards_are_listed_by_id() {
    let mut catalog = MemoryCatalogStore::new();
    let fetcher = CountingFetcher::new();
    let report = run(
        &ledger(vec![CardEntry::new("zz9-1").with_variant(VariantKey::Normal, 1, None)]),
        &mut catalog,
        &fetcher,
    );
    assert_eq!(report.created, 1);
    let product = catalog.product("zz9-1").unwrap();
    assert_eq!(product.name, "zz9-1");
    assert!(product.categories.is_empty());
    assert_eq!(fetcher.calls.get(), 0);
}

#[test]
fn existing_assets_are_reused_without_fetching() {
    let mut catalog = MemoryCatalogStore::new();
    let asset = catalog
        .store_asset("https://images.example.com/sv1-51.png", b"cached")
        .unwrap();
    let fetcher = CountingFetcher::new();

    run(
        &ledger(vec![CardEntry::new("sv1-51").with_variant(VariantKey::Normal, 1, None)]),
        &mut catalog,
        &fetcher,
    );
    assert_eq!(fetcher.calls.get(), 0);
    assert_eq!(catalog.product("sv1-51").unwrap().image, Some(asset));
}

#[test]
fn trainers_are_filed_by_subtype() {
    let mut catalog = MemoryCatalogStore::new();
    let fetcher = CountingFetcher::new();
    run(
        &ledger(vec![CardEntry::new("sv1-181").with_variant(VariantKey::Normal, 4, None)]),
        &mut catalog,
        &fetcher,
    );
    assert!(catalog.calls().contains(&CatalogCall::CreateCategory("Trainer".to_string())));
    assert!(catalog.calls().contains(&CatalogCall::CreateCategory("Item".to_string())));
    assert_eq!(catalog.product("sv1-181").unwrap().categories.len(), 1);
}

#[test]
fn unavailable_catalog_degrades_to_no_op() {
    let mut catalog = MemoryCatalogStore::new();
    catalog.set_available(false);
    let fetcher = CountingFetcher::new();
    let report = run(&simple_and_variable(), &mut catalog, &fetcher);
    assert_eq!(report, SyncReport::default());
    assert!(catalog.calls().is_empty());
}

/// Catalog that rejects writes for one SKU
struct FailOn {
    inner: MemoryCatalogStore,
    sku: &'static str,
}

impl FailOn {
    fn check(&self, sku: &str) -> CatalogResult<()> {
        if sku == self.sku {
            Err(CatalogError::Unsupported("writes for this product"))
        } else {
            Ok(())
        }
    }
}

impl CatalogStore for FailOn {
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
        self.check(&draft.sku)?;
        self.inner.upsert_simple(existing, draft, stock)
    }
    fn upsert_variable(
        &mut self,
        existing: Option<ProductId>,
        draft: &ProductDraft,
    ) -> CatalogResult<ProductId> {
        self.check(&draft.sku)?;
        self.inner.upsert_variable(existing, draft)
    }
    fn upsert_sub_variant(
        &mut self,
        parent: ProductId,
        draft: &SubVariantDraft,
    ) -> CatalogResult<SubVariantId> {
        self.inner.upsert_sub_variant(parent, draft)
    }
    fn set_sub_variant_stock(
        &mut self,
        parent: ProductId,
        id: SubVariantId,
        stock: i64,
    ) -> CatalogResult<()> {
        self.inner.set_sub_variant_stock(parent, id, stock)
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

#[test]
fn one_failing_entry_does_not_stop_the_pass() {
    let mut catalog = FailOn {
        inner: MemoryCatalogStore::new(),
        sku: "sv1-50",
    };
    let session = SyncSession::new();
    let pass = session.try_begin().unwrap();
    let report = synchronize(
        &pass,
        &simple_and_variable(),
        &index(),
        &mut catalog,
        &CountingFetcher::new(),
    );

    assert_eq!(report.processed, 2);
    assert_eq!(report.created, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "sv1-50");
    assert!(catalog.inner.product("sv1-51").is_some());
    assert!(catalog.inner.product("sv1-50").is_none());
}

#[test]
fn delete_removes_entry_and_product() {
    let store = MemoryLedgerStore::new(simple_and_variable());
    let mut catalog = MemoryCatalogStore::new();
    let fetcher = CountingFetcher::new();
    run(&store.snapshot(), &mut catalog, &fetcher);

    let report = delete_card(&store, &mut catalog, "sv1-50").unwrap();
    assert_eq!(
        report,
        DeleteReport {
            ledger_entry_removed: true,
            product_deleted: true,
        }
    );
    assert!(store.snapshot().get("sv1-50").is_none());
    assert!(catalog.product("sv1-50").is_none());
    assert!(catalog.product("sv1-51").is_some());
}
