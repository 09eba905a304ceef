//! Single-flight guard for synchronization passes and the reverse stock
//! handler that feeds catalog-side edits back into the ledger.
//!
//! A [`SyncSession`] is shared (by cloning) between the orchestrator and every
//! stock listener. While a [`SyncPass`] is alive, stock notifications are
//! ignored, so the engine's own catalog writes never echo back into the
//! ledger. The pass releases the flag when dropped, on every exit path.

use crate::catalog::{CatalogStore, ProductId, ProductKind, StockListener};
use crate::error::Result;
use crate::ledger::{CardEntry, LedgerStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tcg_common::VariantKey;

#[derive(Debug, Clone, Default)]
pub struct SyncSession {
    active: Arc<AtomicBool>,
}

impl SyncSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the session for one pass; `None` if a pass is already running
    pub fn try_begin(&self) -> Option<SyncPass<'_>> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SyncPass { session: self })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Proof that a synchronization pass holds the session
#[derive(Debug)]
pub struct SyncPass<'a> {
    session: &'a SyncSession,
}

impl Drop for SyncPass<'_> {
    fn drop(&mut self) {
        self.session.active.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WritebackOutcome {
    /// A pass is running; nothing was read or written
    GuardSkip,
    NotFound,
    /// Product is not owned by this system
    Unmanaged,
    /// Ledger already matches the catalog stock
    NoChange,
    Applied {
        card_id: String,
        /// Signed quantity change per variant
        changes: Vec<(VariantKey, i64)>,
    },
}

/// Write a product's current catalog stock back into the ledger as deltas.
///
/// Simple products map onto the entry's primary variant (`normal` for new
/// entries); multi-variant products map each keyed sub-variant.
pub fn write_back_stock<C, L>(
    session: &SyncSession,
    catalog: &C,
    ledger_store: &L,
    product: ProductId,
) -> Result<WritebackOutcome>
where
    C: CatalogStore + ?Sized,
    L: LedgerStore + ?Sized,
{
    if session.is_active() {
        log::debug!("Sync pass running, ignoring stock write on product {}", product.0);
        return Ok(WritebackOutcome::GuardSkip);
    }

    let Some(product) = catalog.find_by_id(product)? else {
        return Ok(WritebackOutcome::NotFound);
    };
    if !product.managed {
        return Ok(WritebackOutcome::Unmanaged);
    }

    let mut ledger = ledger_store.load()?;
    let entry = ledger.get(&product.sku);
    let current = |key: VariantKey| entry.map(|e| e.quantity(key)).unwrap_or(0);

    let targets: Vec<(VariantKey, i64)> = match &product.kind {
        ProductKind::Simple { stock } => {
            let key = entry
                .and_then(CardEntry::primary_variant)
                .unwrap_or(VariantKey::Normal);
            vec![(key, (*stock).max(0))]
        }
        ProductKind::Variable { sub_variants } => sub_variants
            .iter()
            .filter_map(|sub| sub.variant_key.map(|key| (key, sub.stock.max(0))))
            .collect(),
    };

    let changes: Vec<(VariantKey, i64)> = targets
        .into_iter()
        .map(|(key, target)| (key, target - current(key)))
        .filter(|(_, change)| *change != 0)
        .collect();
    if changes.is_empty() {
        return Ok(WritebackOutcome::NoChange);
    }

    let delta = changes
        .iter()
        .fold(CardEntry::new(product.sku.clone()), |entry, (key, change)| {
            entry.with_variant(*key, *change, None)
        });
    ledger.apply([delta]);
    ledger_store.save(&ledger)?;

    log::info!(
        "Wrote catalog stock for {} back into the ledger: {:?}",
        product.sku,
        changes
    );
    Ok(WritebackOutcome::Applied {
        card_id: product.sku,
        changes,
    })
}

/// Stock listener that runs [`write_back_stock`] for every notification
pub struct LedgerWriteback<L> {
    session: SyncSession,
    ledger_store: L,
}

impl<L: LedgerStore> LedgerWriteback<L> {
    pub fn new(session: SyncSession, ledger_store: L) -> Self {
        Self {
            session,
            ledger_store,
        }
    }
}

impl<L: LedgerStore> StockListener for LedgerWriteback<L> {
    fn on_stock_written(&self, catalog: &dyn CatalogStore, product: ProductId) {
        match write_back_stock(&self.session, catalog, &self.ledger_store, product) {
            Ok(outcome) => log::debug!("Stock write-back for product {}: {:?}", product.0, outcome),
            Err(e) => log::error!("Stock write-back for product {} failed: {}", product.0, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        MemoryCatalogStore, ProductDraft, StockStatus, SubVariantDraft,
    };
    use crate::ledger::{Ledger, MemoryLedgerStore};

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

    fn ledger_with(entry: CardEntry) -> Ledger {
        let mut ledger = Ledger::new("Collection", "standard");
        ledger.apply([entry]);
        ledger
    }

    #[test]
    fn pass_releases_flag_on_drop() {
        let session = SyncSession::new();
        {
            let pass = session.try_begin();
            assert!(pass.is_some());
            assert!(session.is_active());
            assert!(session.try_begin().is_none());
        }
        assert!(!session.is_active());
        assert!(session.try_begin().is_some());
    }

    #[test]
    fn clones_share_the_flag() {
        let session = SyncSession::new();
        let listener_copy = session.clone();
        let _pass = session.try_begin().unwrap();
        assert!(listener_copy.is_active());
    }

    #[test]
    fn pass_releases_flag_on_panic() {
        let session = SyncSession::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _pass = session.try_begin().unwrap();
            panic!("sync blew up");
        }));
        assert!(result.is_err());
        assert!(!session.is_active());
    }

    #[test]
    fn writeback_is_a_no_op_while_a_pass_runs() {
        let session = SyncSession::new();
        let mut catalog = MemoryCatalogStore::new();
        let id = catalog.upsert_simple(None, &draft("sv1-50"), 7).unwrap();
        let store = MemoryLedgerStore::new(ledger_with(
            CardEntry::new("sv1-50").with_variant(VariantKey::Normal, 2, None),
        ));
        let before = store.snapshot();

        let _pass = session.try_begin().unwrap();
        let outcome = write_back_stock(&session, &catalog, &store, id).unwrap();
        assert_eq!(outcome, WritebackOutcome::GuardSkip);
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn simple_stock_flows_into_primary_variant() {
        let session = SyncSession::new();
        let mut catalog = MemoryCatalogStore::new();
        let id = catalog.upsert_simple(None, &draft("sv1-50"), 5).unwrap();
        let store = MemoryLedgerStore::new(ledger_with(
            CardEntry::new("sv1-50").with_variant(VariantKey::Foil, 2, None),
        ));

        let outcome = write_back_stock(&session, &catalog, &store, id).unwrap();
        assert_eq!(
            outcome,
            WritebackOutcome::Applied {
                card_id: "sv1-50".to_string(),
                changes: vec![(VariantKey::Foil, 3)],
            }
        );
        assert_eq!(store.snapshot().get("sv1-50").unwrap().quantity(VariantKey::Foil), 5);

        let again = write_back_stock(&session, &catalog, &store, id).unwrap();
        assert_eq!(again, WritebackOutcome::NoChange);
    }

    #[test]
    fn variable_stock_maps_each_sub_variant() {
        let session = SyncSession::new();
        let mut catalog = MemoryCatalogStore::new();
        let id = catalog.upsert_variable(None, &draft("sv1-50")).unwrap();
        for (key, stock) in [(VariantKey::Normal, 1), (VariantKey::ReverseFoil, 4)] {
            catalog
                .upsert_sub_variant(
                    id,
                    &SubVariantDraft {
                        id: None,
                        variant_key: key,
                        stock,
                        price: None,
                    },
                )
                .unwrap();
        }
        let store = MemoryLedgerStore::new(ledger_with(
            CardEntry::new("sv1-50")
                .with_variant(VariantKey::Normal, 3, None)
                .with_variant(VariantKey::ReverseFoil, 4, None),
        ));

        write_back_stock(&session, &catalog, &store, id).unwrap();
        let entry = store.snapshot().get("sv1-50").cloned().unwrap();
        assert_eq!(entry.quantity(VariantKey::Normal), 1);
        assert_eq!(entry.quantity(VariantKey::ReverseFoil), 4);
    }

    #[test]
    fn unmanaged_products_are_ignored() {
        let session = SyncSession::new();
        let mut catalog = MemoryCatalogStore::new();
        let id = catalog.insert_unmanaged("playmat", "Playmat", 3);
        let store = MemoryLedgerStore::default();
        assert_eq!(
            write_back_stock(&session, &catalog, &store, id).unwrap(),
            WritebackOutcome::Unmanaged
        );
        assert!(store.snapshot().is_empty());
    }
}
