//! Sync engine state machine.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::indexer::{observe, KnownKeys};
use crate::source::{CatalogSource, Page};
use crate::transform::transform;
use crate::writer::{upsert, SequenceCounter, UpsertOutcome};
use catsync_core::{now_millis, CatalogStore};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Engine is idle, no run has started yet.
    Idle,
    /// Engine is reconstructing the sequence counter and key union.
    Initializing,
    /// Engine is requesting a page from the remote.
    Paginating,
    /// Engine is writing the records of a page.
    Processing,
    /// Engine is waiting before retrying a page.
    RetryWait,
    /// The last run finished every page.
    Completed,
    /// The last run aborted.
    Failed,
}

impl SyncState {
    /// Returns true if a run is in progress.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncState::Initializing
                | SyncState::Paginating
                | SyncState::Processing
                | SyncState::RetryWait
        )
    }

    /// Returns true if the engine can start a new run.
    pub fn can_start_run(&self) -> bool {
        matches!(
            self,
            SyncState::Idle | SyncState::Completed | SyncState::Failed
        )
    }
}

/// Statistics accumulated across runs.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Runs that reached `Completed`.
    pub runs_completed: u64,
    /// Runs that reached `Failed`.
    pub runs_failed: u64,
    /// Records processed by completed pages.
    pub records_processed: u64,
    /// Total number of page retries.
    pub retries: u64,
    /// When the last run finished, successfully or not.
    pub last_run_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Result of one full run.
#[derive(Debug, Clone, Default)]
pub struct SyncRunResult {
    /// Pages fetched and processed successfully.
    pub pages_fetched: u64,
    /// Records processed by successful pages.
    pub records_processed: u64,
    /// Records newly inserted during the run, including inserts made by
    /// attempts that later failed.
    pub records_inserted: u64,
    /// Overwrites of existing records by successful page attempts.
    pub records_updated: u64,
    /// Page retries performed.
    pub retries: u64,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

impl SyncRunResult {
    /// Record writes, inserts plus updates. A record inserted by a failed
    /// attempt and rewritten by its retry counts twice.
    pub fn records_saved(&self) -> u64 {
        self.records_inserted + self.records_updated
    }
}

/// Outcome of one successfully processed page.
struct PageOutcome {
    records: u64,
    updated: u64,
    has_more: bool,
    next_cursor: Option<String>,
}

/// Values carried across every page of one run. Both survive page retries.
struct RunCursors {
    sequence: SequenceCounter,
    keys: KnownKeys,
}

/// The sync engine mirrors a remote catalog into a store.
///
/// One run walks every page of the remote, newest first, and for each
/// record transforms it, upserts it and updates the derived indexes. A
/// failing page is retried as a whole, fetch included. There is no
/// checkpoint: every run is a full rescan.
pub struct SyncEngine<S: CatalogSource, D: CatalogStore> {
    config: SyncConfig,
    source: S,
    store: Arc<D>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
}

impl<S: CatalogSource, D: CatalogStore> SyncEngine<S, D> {
    /// Creates a new sync engine.
    pub fn new(config: SyncConfig, source: S, store: Arc<D>) -> Self {
        Self {
            config,
            source,
            store,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Gets the remote source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Gets the store.
    pub fn store(&self) -> &Arc<D> {
        &self.store
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    /// Claims the engine for a run, rejecting overlap.
    fn begin(&self) -> SyncResult<()> {
        let mut state = self.state.write();
        if !state.can_start_run() {
            return Err(SyncError::InvalidStateTransition {
                from: format!("{:?}", *state),
                to: "run".into(),
            });
        }
        *state = SyncState::Initializing;
        Ok(())
    }

    /// Performs one full run over every remote page.
    pub fn run(&self) -> SyncResult<SyncRunResult> {
        self.begin()?;
        let start = Instant::now();
        let mut result = SyncRunResult::default();

        match self.run_pages(&mut result) {
            Ok(()) => {
                self.compact_store();
                result.duration = start.elapsed();
                self.set_state(SyncState::Completed);
                info!(
                    pages = result.pages_fetched,
                    processed = result.records_processed,
                    saved = result.records_saved(),
                    inserted = result.records_inserted,
                    retries = result.retries,
                    duration_ms = result.duration.as_millis() as u64,
                    "sync run completed"
                );

                let mut stats = self.stats.write();
                stats.runs_completed += 1;
                stats.records_processed += result.records_processed;
                stats.last_run_time = Some(Instant::now());
                stats.last_error = None;
                Ok(result)
            }
            Err(e) => {
                self.set_state(SyncState::Failed);
                warn!(
                    error = %e,
                    pages = result.pages_fetched,
                    processed = result.records_processed,
                    "sync run failed"
                );

                let mut stats = self.stats.write();
                stats.runs_failed += 1;
                stats.records_processed += result.records_processed;
                stats.last_run_time = Some(Instant::now());
                stats.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Drops history superseded by the run. A failure leaves the store
    /// valid, so it is logged and the run still completes.
    fn compact_store(&self) {
        match self.store.compact() {
            Ok(Some(compaction)) => debug!(
                input_entries = compaction.input_entries,
                output_entries = compaction.output_entries,
                "store compacted after run"
            ),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "store compaction failed"),
        }
    }

    fn run_pages(&self, result: &mut SyncRunResult) -> SyncResult<()> {
        let mut cursors = RunCursors {
            sequence: SequenceCounter::from_store(self.store.as_ref())?,
            keys: KnownKeys::from_store(self.store.as_ref())?,
        };
        let initial = cursors.sequence.current();
        info!(
            initial_sequence = initial,
            known_keys = cursors.keys.keys().len(),
            "sync run started"
        );

        let mut cursor: Option<String> = None;
        let outcome = loop {
            let page = match self.page_with_retry(cursor.as_deref(), &mut cursors, result) {
                Ok(page) => page,
                Err(e) => break Err(e),
            };
            result.pages_fetched += 1;
            result.records_processed += page.records;
            result.records_updated += page.updated;

            if !page.has_more {
                break Ok(());
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => {
                    break Err(SyncError::Protocol(
                        "remote signaled more pages without a cursor".into(),
                    ))
                }
            }
        };

        // Inserts from failed attempts are counted too; they are durable.
        result.records_inserted = cursors.sequence.current() - initial;
        outcome
    }

    /// Fetches and processes one page, retrying the whole page on
    /// retryable failures.
    fn page_with_retry(
        &self,
        cursor: Option<&str>,
        cursors: &mut RunCursors,
        result: &mut SyncRunResult,
    ) -> SyncResult<PageOutcome> {
        let retry = &self.config.retry;
        let attempts = retry.attempts();
        let mut attempt = 1;

        loop {
            match self.process_page(cursor, cursors) {
                Ok(outcome) => return Ok(outcome),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt >= attempts => {
                    return Err(SyncError::RetriesExhausted {
                        attempts,
                        last: Box::new(e),
                    })
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = attempts,
                        delay_ms = retry.delay.as_millis() as u64,
                        cursor = cursor.unwrap_or(""),
                        error = %e,
                        "page failed; retrying"
                    );
                    self.set_state(SyncState::RetryWait);
                    std::thread::sleep(retry.delay);
                    attempt += 1;
                    result.retries += 1;
                    self.stats.write().retries += 1;
                }
            }
        }
    }

    fn process_page(
        &self,
        cursor: Option<&str>,
        cursors: &mut RunCursors,
    ) -> SyncResult<PageOutcome> {
        self.set_state(SyncState::Paginating);
        let Page {
            records,
            has_more,
            next_cursor,
        } = self.source.fetch_page(cursor, self.config.page_size)?;
        info!(
            cursor = cursor.unwrap_or(""),
            records = records.len(),
            has_more,
            "fetched page"
        );

        self.set_state(SyncState::Processing);
        let store = self.store.as_ref();
        let now = now_millis();
        let mut updated = 0;
        for raw in &records {
            let transformed = transform(raw)?;
            match upsert(store, transformed.record, &mut cursors.sequence, now)? {
                UpsertOutcome::Inserted(_) => {}
                UpsertOutcome::Updated(sequence) => {
                    updated += 1;
                    debug!(external_id = %raw.id, sequence, "updated record");
                }
            }
            observe(store, &transformed.metadata, &mut cursors.keys)?;
        }

        Ok(PageOutcome {
            records: records.len() as u64,
            updated,
            has_more,
            next_cursor,
        })
    }
}
