//! Converges the storefront catalog to the ledger.
//!
//! One pass walks every ledger entry in order, upserting its product (simple
//! for zero or one active finish, variable otherwise) and skipping writes the
//! catalog already reflects. Afterwards every managed product the pass did not
//! see is zeroed. Products are never deleted here.

use super::assets::AssetFetcher;
use super::listing::{build_listing, Listing};
use crate::card_index::CardIndex;
use crate::catalog::{
    AssetId, CatalogProduct, CatalogResult, CatalogStore, CategoryId, ProductDraft, ProductId,
    ProductKind, SnapshotVariant, StockStatus, SubVariantDraft, SubVariantId, SyncSnapshot,
};
use crate::error::Result;
use crate::guard::SyncPass;
use crate::ledger::{CardEntry, Ledger, LedgerStore};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

/// Statistics from one synchronization pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Ledger entries visited
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    /// Updated products whose kind switched between simple and variable
    pub converted: usize,
    pub unchanged: usize,
    /// Managed products missing from the ledger that were set to zero stock
    pub zeroed: usize,
    pub skipped_unmanaged: usize,
    /// `(sku, error)` for every entry that failed
    pub failures: Vec<(String, String)>,
}

impl SyncReport {
    /// Number of products whose catalog records were written
    pub fn mutated(&self) -> usize {
        self.created + self.updated + self.zeroed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryOutcome {
    Created,
    Updated { converted: bool },
    Unchanged,
    SkippedUnmanaged,
}

/// Run one pass. Holding `_pass` proves the session guard is set, so stock
/// notifications fired by these writes are ignored.
///
/// Per-entry failures are logged and recorded in the report; the pass always
/// runs to the end. An unreachable catalog makes the pass a no-op.
pub fn synchronize<I, C, F>(
    _pass: &SyncPass<'_>,
    ledger: &Ledger,
    index: &I,
    catalog: &mut C,
    fetcher: &F,
) -> SyncReport
where
    I: CardIndex + ?Sized,
    C: CatalogStore + ?Sized,
    F: AssetFetcher + ?Sized,
{
    let mut report = SyncReport::default();
    if !catalog.is_available() {
        log::warn!("Catalog store unavailable, skipping sync pass");
        return report;
    }

    let now = Utc::now();
    let mut seen: HashSet<&str> = HashSet::new();
    log::info!("Sync pass started: {} ledger entries", ledger.len());

    for entry in ledger.entries() {
        report.processed += 1;
        // Seen before syncing so a failing entry is never zeroed as an orphan
        seen.insert(entry.id.as_str());
        match sync_entry(entry, index, catalog, fetcher, now) {
            Ok(EntryOutcome::Created) => report.created += 1,
            Ok(EntryOutcome::Updated { converted }) => {
                report.updated += 1;
                if converted {
                    report.converted += 1;
                }
            }
            Ok(EntryOutcome::Unchanged) => report.unchanged += 1,
            Ok(EntryOutcome::SkippedUnmanaged) => report.skipped_unmanaged += 1,
            Err(e) => {
                log::error!("Failed to sync {}: {}", entry.id, e);
                report.failures.push((entry.id.clone(), e.to_string()));
            }
        }
    }

    match catalog.list_managed() {
        Ok(products) => {
            for product in products.iter().filter(|p| !seen.contains(p.sku.as_str())) {
                match zero_orphan(catalog, product, now) {
                    Ok(true) => {
                        log::info!("Zeroed stock for {} (no longer in the ledger)", product.sku);
                        report.zeroed += 1;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        log::error!("Failed to zero {}: {}", product.sku, e);
                        report.failures.push((product.sku.clone(), e.to_string()));
                    }
                }
            }
        }
        Err(e) => {
            log::error!("Failed to list managed products: {}", e);
            report.failures.push((String::new(), e.to_string()));
        }
    }

    log::info!(
        "Sync pass done: {} processed, {} created, {} updated ({} converted), {} unchanged, {} zeroed, {} unmanaged skipped, {} failed",
        report.processed,
        report.created,
        report.updated,
        report.converted,
        report.unchanged,
        report.zeroed,
        report.skipped_unmanaged,
        report.failures.len()
    );
    report
}

fn sync_entry<I, C, F>(
    entry: &CardEntry,
    index: &I,
    catalog: &mut C,
    fetcher: &F,
    now: DateTime<Utc>,
) -> CatalogResult<EntryOutcome>
where
    I: CardIndex + ?Sized,
    C: CatalogStore + ?Sized,
    F: AssetFetcher + ?Sized,
{
    let active = entry.active_variants();
    let total: i64 = active.iter().map(|(_, v)| v.quantity).sum();
    let primary = entry.primary_variant();
    let multi = active.len() > 1;

    let listing = build_listing(&entry.id, index).unwrap_or_else(|| {
        log::warn!("No card metadata for {}, listing it by id", entry.id);
        Listing::bare(&entry.id)
    });

    let existing = catalog.find_by_sku(&entry.id)?;
    if let Some(product) = &existing {
        if !product.managed {
            log::warn!("Product {} exists but is not managed, leaving it alone", entry.id);
            return Ok(EntryOutcome::SkippedUnmanaged);
        }
    }

    let categories = ensure_categories(catalog, &listing.category_paths)?;
    let mut draft = ProductDraft {
        sku: entry.id.clone(),
        name: listing.display_name.clone(),
        description: listing.description.clone(),
        categories,
        price: None,
        status: StockStatus::from_stock(total),
    };

    let converted = existing
        .as_ref()
        .is_some_and(|p| p.kind.is_variable() != multi);
    let (id, changed) = if multi {
        draft.price = active.iter().filter_map(|(_, v)| v.price).min();
        sync_variable(catalog, existing.as_ref(), &draft, entry)?
    } else {
        draft.price = primary.and_then(|key| entry.price(key));
        sync_simple(catalog, existing.as_ref(), &draft, total)?
    };

    catalog.write_snapshot(id, &snapshot(entry, &listing.display_name, now))?;

    let image_changed = match &listing.image_url {
        Some(url) => {
            let current = existing.as_ref().and_then(|p| p.image);
            match sync_image(catalog, id, current, url, fetcher) {
                Ok(changed) => changed,
                Err(e) => {
                    log::warn!("Image for {} not attached: {}", entry.id, e);
                    false
                }
            }
        }
        None => false,
    };

    Ok(match (&existing, changed || image_changed) {
        (None, _) => EntryOutcome::Created,
        (Some(_), true) => EntryOutcome::Updated { converted },
        (Some(_), false) => EntryOutcome::Unchanged,
    })
}

/// Leaf category id of every path, without duplicates
fn ensure_categories<C: CatalogStore + ?Sized>(
    catalog: &mut C,
    paths: &[Vec<String>],
) -> CatalogResult<Vec<CategoryId>> {
    let mut leaves = Vec::new();
    for path in paths {
        if let Some(leaf) = catalog.ensure_category_path(path)?.last().copied() {
            if !leaves.contains(&leaf) {
                leaves.push(leaf);
            }
        }
    }
    Ok(leaves)
}

fn sync_simple<C: CatalogStore + ?Sized>(
    catalog: &mut C,
    existing: Option<&CatalogProduct>,
    draft: &ProductDraft,
    stock: i64,
) -> CatalogResult<(ProductId, bool)> {
    let Some(product) = existing else {
        let id = catalog.upsert_simple(None, draft, stock)?;
        log::debug!("Created simple product {} with stock {}", draft.sku, stock);
        return Ok((id, true));
    };

    let mut changed = false;
    for stale in product.kind.sub_variants() {
        catalog.delete_sub_variant(product.id, stale.id)?;
        changed = true;
    }
    if changed || !product.matches_simple(draft, stock) {
        catalog.upsert_simple(Some(product.id), draft, stock)?;
        log::debug!("Updated simple product {} with stock {}", draft.sku, stock);
        changed = true;
    }
    Ok((product.id, changed))
}

fn sync_variable<C: CatalogStore + ?Sized>(
    catalog: &mut C,
    existing: Option<&CatalogProduct>,
    draft: &ProductDraft,
    entry: &CardEntry,
) -> CatalogResult<(ProductId, bool)> {
    let (id, mut changed, current) = match existing {
        Some(product) => {
            let mut changed = false;
            if !product.matches_variable(draft) {
                catalog.upsert_variable(Some(product.id), draft)?;
                changed = true;
            }
            (product.id, changed, product.kind.sub_variants().to_vec())
        }
        None => (catalog.upsert_variable(None, draft)?, true, Vec::new()),
    };

    // Sub-records are matched by their stored variant key only
    let mut kept: HashSet<SubVariantId> = HashSet::new();
    for (key, record) in entry.active_variants() {
        let found = current
            .iter()
            .find(|s| s.variant_key == Some(key) && !kept.contains(&s.id));
        let sub = SubVariantDraft {
            id: found.map(|s| s.id),
            variant_key: key,
            stock: record.quantity,
            price: record.price,
        };
        match found {
            Some(existing) if sub.matches(existing) => {
                kept.insert(existing.id);
            }
            _ => {
                let sub_id = catalog.upsert_sub_variant(id, &sub)?;
                kept.insert(sub_id);
                changed = true;
            }
        }
    }

    for stale in current.iter().filter(|s| !kept.contains(&s.id)) {
        catalog.delete_sub_variant(id, stale.id)?;
        changed = true;
    }
    Ok((id, changed))
}

fn sync_image<C, F>(
    catalog: &mut C,
    id: ProductId,
    current: Option<AssetId>,
    url: &str,
    fetcher: &F,
) -> CatalogResult<bool>
where
    C: CatalogStore + ?Sized,
    F: AssetFetcher + ?Sized,
{
    let asset = match catalog.find_asset_by_source(url)? {
        Some(asset) => asset,
        None => {
            let bytes = fetcher.fetch(url)?;
            catalog.store_asset(url, &bytes)?
        }
    };
    if current == Some(asset) {
        return Ok(false);
    }
    catalog.attach_image(id, asset)?;
    Ok(true)
}

fn snapshot(entry: &CardEntry, display_name: &str, now: DateTime<Utc>) -> SyncSnapshot {
    let variants: BTreeMap<_, _> = entry
        .variants
        .iter()
        .map(|(key, record)| {
            (
                *key,
                SnapshotVariant {
                    quantity: record.quantity,
                    price: record.price,
                },
            )
        })
        .collect();
    let active = entry.active_variants();
    SyncSnapshot {
        card_id: entry.id.clone(),
        display_name: display_name.to_string(),
        variants,
        total_quantity: active.iter().map(|(_, v)| v.quantity).sum(),
        active_variants: active.iter().map(|(k, _)| *k).collect(),
        primary_variant: entry.primary_variant(),
        synced_at: now,
    }
}

/// Force a managed product to zero stock. Returns `false` if it already was.
fn zero_orphan<C: CatalogStore + ?Sized>(
    catalog: &mut C,
    product: &CatalogProduct,
    now: DateTime<Utc>,
) -> CatalogResult<bool> {
    let mut changed = false;
    let mut draft = ProductDraft::from_product(product);
    draft.status = StockStatus::OutOfStock;

    match &product.kind {
        ProductKind::Simple { stock } => {
            if *stock != 0 || product.status != StockStatus::OutOfStock {
                catalog.upsert_simple(Some(product.id), &draft, 0)?;
                changed = true;
            }
        }
        ProductKind::Variable { sub_variants } => {
            // Every sub-record is zeroed in place, keyed or not
            for sub in sub_variants {
                if sub.stock == 0 && sub.status == StockStatus::OutOfStock {
                    continue;
                }
                catalog.set_sub_variant_stock(product.id, sub.id, 0)?;
                changed = true;
            }
            if product.status != StockStatus::OutOfStock {
                catalog.upsert_variable(Some(product.id), &draft)?;
                changed = true;
            }
        }
    }

    if changed {
        catalog.write_snapshot(
            product.id,
            &SyncSnapshot {
                card_id: product.sku.clone(),
                display_name: product.name.clone(),
                variants: BTreeMap::new(),
                total_quantity: 0,
                active_variants: Vec::new(),
                primary_variant: None,
                synced_at: now,
            },
        )?;
    }
    Ok(changed)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub ledger_entry_removed: bool,
    pub product_deleted: bool,
}

/// Explicit delete: remove the ledger entry and the managed catalog product
/// with all of its sub-variants. Unmanaged products are left alone.
pub fn delete_card<L, C>(ledger_store: &L, catalog: &mut C, card_id: &str) -> Result<DeleteReport>
where
    L: LedgerStore + ?Sized,
    C: CatalogStore + ?Sized,
{
    let mut report = DeleteReport::default();

    let mut ledger = ledger_store.load()?;
    if ledger.remove(card_id).is_some() {
        ledger_store.save(&ledger)?;
        report.ledger_entry_removed = true;
    }

    match catalog.find_by_sku(card_id)? {
        Some(product) if product.managed => {
            catalog.delete_product(product.id)?;
            report.product_deleted = true;
        }
        Some(_) => log::warn!("Not deleting unmanaged product {}", card_id),
        None => {}
    }

    log::info!("Deleted {}: {:?}", card_id, report);
    Ok(report)
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
