//! Sync command implementation.

use crate::http::ReqwestClient;
use catsync_core::{CatalogStore, FileStore};
use catsync_engine::{
    CatalogSource, ShopifyConfig, ShopifySource, SyncConfig, SyncEngine,
};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Options for the sync command.
pub struct SyncOptions {
    /// Shopify connection settings.
    pub shopify: ShopifyConfig,
    /// Page size and retry policy.
    pub sync: SyncConfig,
    /// Time between the start of one cycle and the next.
    pub interval: Duration,
    /// Run a single cycle and exit.
    pub once: bool,
}

/// Runs the sync command.
pub fn run(store_path: &Path, options: SyncOptions) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(FileStore::open(store_path)?);
    info!(
        store = %store_path.display(),
        shop = %options.shopify.shop_name,
        api_version = %options.shopify.api_version,
        "opened catalog store"
    );

    let client = ReqwestClient::new(options.shopify.timeout)?;
    let source = ShopifySource::new(options.shopify, client);
    let engine = SyncEngine::new(options.sync, source, store);

    let cycles = options.once.then_some(1);
    let failed = schedule(&engine, options.interval, cycles);
    if options.once && failed > 0 {
        return Err("sync run failed".into());
    }
    Ok(())
}

/// Runs `engine` now and then every `interval`, start to start, for
/// `cycles` cycles or forever when `None`.
///
/// Cycles run on the calling thread, so they never overlap: a cycle that
/// outlasts `interval` is followed immediately by the next. A failed cycle
/// is logged and the next one starts a fresh rescan. Returns the number of
/// failed cycles.
pub fn schedule<S: CatalogSource, D: CatalogStore>(
    engine: &SyncEngine<S, D>,
    interval: Duration,
    cycles: Option<u64>,
) -> u64 {
    let mut completed = 0u64;
    let mut failed = 0u64;

    loop {
        let started = Instant::now();
        match engine.run() {
            Ok(result) => info!(
                processed = result.records_processed,
                saved = result.records_saved(),
                "sync cycle finished"
            ),
            Err(e) => {
                failed += 1;
                error!(error = %e, "sync cycle failed");
            }
        }
        completed += 1;

        if cycles.is_some_and(|n| completed >= n) {
            return failed;
        }
        let delay = next_delay(interval, started.elapsed());
        info!(next_in_secs = delay.as_secs(), "waiting for next sync cycle");
        std::thread::sleep(delay);
    }
}

/// Time left until the next cycle is due, given how long this one took.
fn next_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}
