//! Deferred sync jobs and the orchestrator that ties ledger saves to passes.
//!
//! Enqueuing is idempotent: a job that is already pending, or a pass that is
//! already running, makes a second request a no-op. Saving the ledger both
//! enqueues a job and tries to run it right away, so the catalog converges
//! even when no daemon is draining the queue.

use crate::card_index::CardIndex;
use crate::catalog::CatalogStore;
use crate::error::{Error, Result};
use crate::guard::SyncSession;
use crate::ledger::{DeltaBuffer, LedgerStore};
use crate::sync::{self, AssetFetcher, DeleteReport, SyncReport};
use rusqlite::{params, Connection};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Job id of the catalog synchronization pass
pub const SYNC_JOB_ID: &str = "catalog_sync";

pub trait JobScheduler {
    /// Schedule `job_id` unless it is already pending; `true` if newly queued
    fn enqueue_once(&self, job_id: &str) -> Result<bool>;
    fn is_pending(&self, job_id: &str) -> Result<bool>;
    /// Mark `job_id` as done
    fn complete(&self, job_id: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryJobScheduler {
    pending: Mutex<BTreeSet<String>>,
}

impl MemoryJobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> Result<MutexGuard<'_, BTreeSet<String>>> {
        self.pending.lock().map_err(|_| {
            log::error!("In-memory job queue lock poisoned");
            Error::QueuePoisoned
        })
    }
}

impl JobScheduler for MemoryJobScheduler {
    fn enqueue_once(&self, job_id: &str) -> Result<bool> {
        Ok(self.pending()?.insert(job_id.to_string()))
    }

    fn is_pending(&self, job_id: &str) -> Result<bool> {
        Ok(self.pending()?.contains(job_id))
    }

    fn complete(&self, job_id: &str) -> Result<()> {
        self.pending()?.remove(job_id);
        Ok(())
    }
}

/// Job queue in a SQLite table, shared between CLI invocations and a daemon
pub struct SqliteJobScheduler {
    conn: Connection,
}

impl SqliteJobScheduler {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).ok();
            }
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS scheduled_jobs (
                job_id      TEXT NOT NULL PRIMARY KEY,
                enqueued_at TEXT NOT NULL
            );",
        )
    }
}

impl JobScheduler for SqliteJobScheduler {
    fn enqueue_once(&self, job_id: &str) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO scheduled_jobs (job_id, enqueued_at) VALUES (?1, ?2)",
            params![job_id, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(inserted == 1)
    }

    fn is_pending(&self, job_id: &str) -> Result<bool> {
        let pending: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM scheduled_jobs WHERE job_id = ?1)",
            params![job_id],
            |row| row.get(0),
        )?;
        Ok(pending)
    }

    fn complete(&self, job_id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM scheduled_jobs WHERE job_id = ?1",
            params![job_id],
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(SyncReport),
    /// Another pass holds the session; nothing was done
    AlreadyRunning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    /// Entries in the ledger after the merge
    pub entries: usize,
    pub total_quantity: i64,
    /// A new sync job was queued by this commit
    pub scheduled: bool,
    /// Result of the immediate run; `None` if it failed
    pub run: Option<RunOutcome>,
}

/// Owns the collaborators and the session for one ledger/catalog pair.
pub struct SyncOrchestrator<L, I, C, F, S> {
    session: SyncSession,
    ledger_store: L,
    index: I,
    catalog: C,
    fetcher: F,
    scheduler: S,
}

impl<L, I, C, F, S> SyncOrchestrator<L, I, C, F, S>
where
    L: LedgerStore,
    I: CardIndex,
    C: CatalogStore,
    F: AssetFetcher,
    S: JobScheduler,
{
    /// `session` must be the same one handed to any stock listener on `catalog`
    pub fn new(
        session: SyncSession,
        ledger_store: L,
        index: I,
        catalog: C,
        fetcher: F,
        scheduler: S,
    ) -> Self {
        Self {
            session,
            ledger_store,
            index,
            catalog,
            fetcher,
            scheduler,
        }
    }

    pub fn session(&self) -> &SyncSession {
        &self.session
    }

    pub fn ledger_store(&self) -> &L {
        &self.ledger_store
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut C {
        &mut self.catalog
    }

    /// Queue a sync pass unless one is pending or running
    pub fn request_sync(&self) -> Result<bool> {
        if self.session.is_active() {
            log::debug!("Sync pass already running, not queueing another");
            return Ok(false);
        }
        let queued = self.scheduler.enqueue_once(SYNC_JOB_ID)?;
        if queued {
            log::info!("Queued catalog sync");
        } else {
            log::debug!("Catalog sync already queued");
        }
        Ok(queued)
    }

    /// Run one pass over the stored ledger now
    pub fn run_now(&mut self) -> Result<RunOutcome> {
        let Some(pass) = self.session.try_begin() else {
            log::info!("Sync pass already running, skipping");
            return Ok(RunOutcome::AlreadyRunning);
        };
        let ledger = self.ledger_store.load()?;
        let report = sync::synchronize(&pass, &ledger, &self.index, &mut self.catalog, &self.fetcher);
        drop(pass);
        self.scheduler.complete(SYNC_JOB_ID)?;
        Ok(RunOutcome::Completed(report))
    }

    /// Run the queued pass, if there is one
    pub fn run_pending(&mut self) -> Result<Option<RunOutcome>> {
        if !self.scheduler.is_pending(SYNC_JOB_ID)? {
            return Ok(None);
        }
        self.run_now().map(Some)
    }

    /// Merge the buffer into the stored ledger, save it, queue a sync and try
    /// to run it immediately. Only a failed merge or save is an error.
    pub fn commit(&mut self, buffer: DeltaBuffer) -> Result<CommitReport> {
        let mut ledger = self.ledger_store.load()?;
        ledger.apply(buffer.into_deltas());
        self.ledger_store.save(&ledger)?;
        log::info!(
            "Saved ledger {:?}: {} entries, {} cards",
            ledger.name,
            ledger.len(),
            ledger.total_quantity()
        );

        let scheduled = match self.request_sync() {
            Ok(scheduled) => scheduled,
            Err(e) => {
                log::warn!("Could not queue catalog sync: {}", e);
                false
            }
        };
        let run = match self.run_now() {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                log::warn!("Immediate catalog sync failed, left queued: {}", e);
                None
            }
        };

        Ok(CommitReport {
            entries: ledger.len(),
            total_quantity: ledger.total_quantity(),
            scheduled,
            run,
        })
    }

    pub fn delete_card(&mut self, card_id: &str) -> Result<DeleteReport> {
        sync::delete_card(&self.ledger_store, &mut self.catalog, card_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card_index::MemoryCardIndex;
    use crate::catalog::{CatalogStore, MemoryCatalogStore};
    use crate::ledger::{Ledger, MemoryLedgerStore};
    use crate::sync::NoAssetFetcher;
    use tcg_common::VariantKey;

    type Orchestrator = SyncOrchestrator<
        MemoryLedgerStore,
        MemoryCardIndex,
        MemoryCatalogStore,
        NoAssetFetcher,
        MemoryJobScheduler,
    >;

    fn orchestrator() -> Orchestrator {
        SyncOrchestrator::new(
            SyncSession::new(),
            MemoryLedgerStore::new(Ledger::new("Collection", "standard")),
            MemoryCardIndex::default(),
            MemoryCatalogStore::new(),
            NoAssetFetcher,
            MemoryJobScheduler::new(),
        )
    }

    #[test]
    fn enqueue_is_idempotent() {
        let scheduler = MemoryJobScheduler::new();
        assert!(scheduler.enqueue_once(SYNC_JOB_ID).unwrap());
        assert!(!scheduler.enqueue_once(SYNC_JOB_ID).unwrap());
        assert!(scheduler.is_pending(SYNC_JOB_ID).unwrap());
        scheduler.complete(SYNC_JOB_ID).unwrap();
        assert!(!scheduler.is_pending(SYNC_JOB_ID).unwrap());
    }

    #[test]
    fn poisoned_queue_lock_is_an_error() {
        let scheduler = MemoryJobScheduler::new();
        scheduler.enqueue_once(SYNC_JOB_ID).unwrap();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = scheduler.pending.lock().unwrap();
            panic!("holder panicked");
        }));

        assert!(matches!(scheduler.enqueue_once(SYNC_JOB_ID), Err(Error::QueuePoisoned)));
        assert!(matches!(scheduler.is_pending(SYNC_JOB_ID), Err(Error::QueuePoisoned)));
        assert!(matches!(scheduler.complete(SYNC_JOB_ID), Err(Error::QueuePoisoned)));
    }

    #[test]
    fn sqlite_queue_is_idempotent() {
        let scheduler = SqliteJobScheduler::open_in_memory().unwrap();
        assert!(scheduler.enqueue_once(SYNC_JOB_ID).unwrap());
        assert!(!scheduler.enqueue_once(SYNC_JOB_ID).unwrap());
        assert!(scheduler.is_pending(SYNC_JOB_ID).unwrap());
        scheduler.complete(SYNC_JOB_ID).unwrap();
        assert!(!scheduler.is_pending(SYNC_JOB_ID).unwrap());
    }

    #[test]
    fn no_enqueue_while_a_pass_runs() {
        let orchestrator = orchestrator();
        let session = orchestrator.session().clone();
        let _pass = session.try_begin().unwrap();
        assert!(!orchestrator.request_sync().unwrap());
        assert!(!orchestrator.scheduler.is_pending(SYNC_JOB_ID).unwrap());
    }

    #[test]
    fn run_now_reports_already_running() {
        let mut orchestrator = orchestrator();
        let session = orchestrator.session().clone();
        let _pass = session.try_begin().unwrap();
        assert_eq!(orchestrator.run_now().unwrap(), RunOutcome::AlreadyRunning);
    }

    #[test]
    fn commit_saves_and_runs_immediately() {
        let mut orchestrator = orchestrator();
        let mut buffer = DeltaBuffer::new();
        buffer.add("sv1-50", VariantKey::Normal, 4);

        let report = orchestrator.commit(buffer).unwrap();
        assert_eq!(report.entries, 1);
        assert_eq!(report.total_quantity, 4);
        assert!(report.scheduled);
        assert!(matches!(
            report.run,
            Some(RunOutcome::Completed(SyncReport { created: 1, .. }))
        ));
        assert!(!orchestrator.scheduler.is_pending(SYNC_JOB_ID).unwrap());
        assert!(orchestrator.catalog().find_by_sku("sv1-50").unwrap().is_some());
        assert_eq!(orchestrator.run_pending().unwrap(), None);
    }

    #[test]
    fn run_pending_drains_the_queue() {
        let mut orchestrator = orchestrator();
        orchestrator.request_sync().unwrap();
        assert!(matches!(
            orchestrator.run_pending().unwrap(),
            Some(RunOutcome::Completed(_))
        ));
        assert_eq!(orchestrator.run_pending().unwrap(), None);
    }
}
