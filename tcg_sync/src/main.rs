//! TCG Sync - card ledger import and storefront catalog sync
//!
//! One-shot commands edit the ledger or the catalog; `daemon` keeps running
//! and drains queued sync jobs on a fixed interval.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tcg_common::VariantKey;
use tcg_sync::bulk::{import_bulk, read_input, BulkResolver};
use tcg_sync::catalog::{self, NotifyingCatalog, SqliteCatalogStore};
use tcg_sync::sync::{AssetFetcher, CachedAssetFetcher, HttpAssetFetcher, NoAssetFetcher};
use tcg_sync::{
    Config, DeltaBuffer, Error, JsonFileLedgerStore, LedgerStore, LedgerWriteback,
    MemoryCardIndex, Result, RunOutcome, SqliteJobScheduler, SyncOrchestrator, SyncReport,
    SyncSession,
};
use tokio::time::interval;

type Orchestrator = SyncOrchestrator<
    JsonFileLedgerStore,
    MemoryCardIndex,
    NotifyingCatalog<SqliteCatalogStore, LedgerWriteback<JsonFileLedgerStore>>,
    Box<dyn AssetFetcher + Send>,
    SqliteJobScheduler,
>;

/// Trading-card ledger with storefront catalog sync
#[derive(Parser, Debug)]
#[command(name = "tcg_sync")]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON config file (defaults apply for anything it leaves out)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the ledger JSON document
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// Path to the catalog SQLite database
    #[arg(long)]
    catalog_db: Option<PathBuf>,

    /// Card dataset: JSON array of sets
    #[arg(long)]
    sets_file: Option<PathBuf>,

    /// Card dataset: directory with one `<set id>.json` per set
    #[arg(long)]
    cards_dir: Option<PathBuf>,

    /// Do not download card images
    #[arg(long, default_value_t = false)]
    no_images: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bulk-import `<qty> <name> <set> <number>` lines ("-" reads stdin)
    Import { file: String },
    /// Run one synchronization pass now
    Sync,
    /// Keep running and drain queued sync jobs
    Daemon {
        /// Check interval in seconds
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Print the ledger
    Show,
    /// Remove a card from the ledger and delete its catalog product
    Delete { card_id: String },
    /// Edit catalog stock directly, as a storefront operator would
    SetStock {
        sku: String,
        quantity: i64,
        /// Variant of a multi-variant product (normal, foil, reverseFoil, stamped)
        #[arg(long)]
        variant: Option<String>,
    },
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(path) = &args.ledger {
        config.ledger_path = path.clone();
    }
    if let Some(path) = &args.catalog_db {
        config.catalog_db = path.clone();
    }
    if let Some(path) = &args.sets_file {
        config.sets_file = path.clone();
    }
    if let Some(path) = &args.cards_dir {
        config.cards_dir = path.clone();
    }
    if args.no_images {
        config.fetch_images = false;
    }
    if let Command::Daemon {
        interval_secs: Some(secs),
    } = &args.command
    {
        config.interval_secs = *secs;
    }
    config.validate()?;
    Ok(config)
}

fn ledger_store(config: &Config) -> JsonFileLedgerStore {
    JsonFileLedgerStore::new(&config.ledger_path)
        .with_defaults(&config.ledger_name, &config.ledger_format)
}

fn build(config: &Config, require_index: bool) -> Result<Orchestrator> {
    let index = match MemoryCardIndex::from_dataset(&config.sets_file, &config.cards_dir) {
        Ok(index) => index,
        Err(e) if !require_index => {
            log::warn!("Card dataset not loaded, listings fall back to card ids: {}", e);
            MemoryCardIndex::default()
        }
        Err(e) => return Err(e),
    };

    let session = SyncSession::new();
    let catalog = NotifyingCatalog::new(
        SqliteCatalogStore::open(&config.catalog_db)?,
        LedgerWriteback::new(session.clone(), ledger_store(config)),
    );
    let fetcher: Box<dyn AssetFetcher + Send> = if config.fetch_images {
        Box::new(CachedAssetFetcher::new(
            &config.asset_cache_dir,
            HttpAssetFetcher::new(config.user_agent.clone()),
        ))
    } else {
        Box::new(NoAssetFetcher)
    };
    let scheduler = SqliteJobScheduler::open(&config.catalog_db)?;

    Ok(SyncOrchestrator::new(
        session,
        ledger_store(config),
        index,
        catalog,
        fetcher,
        scheduler,
    ))
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    log::info!("Ledger: {}", config.ledger_path.display());

    let require_index = matches!(args.command, Command::Import { .. });
    let mut orchestrator = build(&config, require_index)?;

    match args.command {
        Command::Import { file } => import(&mut orchestrator, &file),
        Command::Sync => {
            match orchestrator.run_now()? {
                RunOutcome::Completed(report) => print_report(&report),
                RunOutcome::AlreadyRunning => println!("A sync pass is already running"),
            }
            Ok(())
        }
        Command::Daemon { .. } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|e| Error::Config(format!("failed to start runtime: {}", e)))?;
            let shared = Arc::new(Mutex::new(orchestrator));
            runtime.block_on(run_daemon(Arc::clone(&shared), config.interval_secs));
            Ok(())
        }
        Command::Show => show(orchestrator.ledger_store()),
        Command::Delete { card_id } => {
            let report = orchestrator.delete_card(&card_id)?;
            println!(
                "{}: ledger entry {}, catalog product {}",
                card_id,
                if report.ledger_entry_removed { "removed" } else { "not found" },
                if report.product_deleted { "deleted" } else { "not deleted" }
            );
            Ok(())
        }
        Command::SetStock {
            sku,
            quantity,
            variant,
        } => {
            let key = match variant.as_deref() {
                Some(raw) => Some(
                    VariantKey::parse(raw)
                        .ok_or_else(|| Error::Config(format!("unknown variant: {}", raw)))?,
                ),
                None => None,
            };
            catalog::set_stock(orchestrator.catalog_mut(), &sku, key, quantity)?;
            println!("Set catalog stock of {} to {}", sku, quantity);
            Ok(())
        }
    }
}

fn import(orchestrator: &mut Orchestrator, file: &str) -> Result<()> {
    let text = read_input(file)?;

    let mut buffer = DeltaBuffer::new();
    let report = {
        let resolver = BulkResolver::new(orchestrator.index());
        import_bulk(&resolver, &text, &mut buffer)
    };
    for (line_no, error) in &report.failures {
        println!("line {}: {}", line_no, error);
    }
    println!("{}", report.summary());

    if buffer.is_empty() {
        return Ok(());
    }
    let commit = orchestrator.commit(buffer)?;
    println!(
        "Ledger now holds {} entries ({} cards)",
        commit.entries, commit.total_quantity
    );
    match commit.run {
        Some(RunOutcome::Completed(report)) => print_report(&report),
        Some(RunOutcome::AlreadyRunning) | None => println!("Catalog sync queued"),
    }
    Ok(())
}

fn show(store: &JsonFileLedgerStore) -> Result<()> {
    let ledger = store.load()?;
    println!("{} ({})", ledger.name, ledger.format);
    for entry in ledger.entries() {
        let variants: Vec<String> = entry
            .variants
            .iter()
            .map(|(key, record)| match record.price {
                Some(price) => format!("{} {} @ {}", key.label(), record.quantity, price),
                None => format!("{} {}", key.label(), record.quantity),
            })
            .collect();
        println!("  {:<16} {}", entry.id, variants.join(", "));
    }
    println!(
        "{} entries, {} cards",
        ledger.len(),
        ledger.total_quantity()
    );
    Ok(())
}

fn print_report(report: &SyncReport) {
    println!(
        "Synced {} entries: {} created, {} updated ({} converted), {} unchanged, {} zeroed, {} unmanaged skipped",
        report.processed,
        report.created,
        report.updated,
        report.converted,
        report.unchanged,
        report.zeroed,
        report.skipped_unmanaged
    );
    for (sku, error) in &report.failures {
        println!("  failed {}: {}", sku, error);
    }
}

/// Drain queued sync jobs every `interval_secs` until Ctrl-C
async fn run_daemon(shared: Arc<Mutex<Orchestrator>>, interval_secs: u64) {
    log::info!(
        "Running in daemon mode, checking every {} second(s)",
        interval_secs
    );
    let mut ticker = interval(Duration::from_secs(interval_secs));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let orchestrator = Arc::clone(&shared);
                if let Err(e) = tokio::task::spawn_blocking(move || run_pending(&orchestrator)).await {
                    log::error!("Sync task failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Received Ctrl-C, shutting down");
                break;
            }
        }
    }
}

fn run_pending(shared: &Mutex<Orchestrator>) {
    let mut orchestrator = match shared.lock() {
        Ok(guard) => guard,
        Err(e) => {
            log::error!("Orchestrator lock poisoned: {}", e);
            return;
        }
    };
    match orchestrator.run_pending() {
        Ok(Some(RunOutcome::Completed(report))) => {
            log::info!("Queued sync finished: {} products written", report.mutated())
        }
        Ok(Some(RunOutcome::AlreadyRunning)) => log::info!("Sync pass already running"),
        Ok(None) => log::debug!("No sync queued"),
        Err(e) => log::error!("Queued sync failed: {}", e),
    }
}
