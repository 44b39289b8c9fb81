//! Upsert of transformed records keyed by external identifier.

use catsync_core::{CatalogRecord, CatalogStore, StoreResult};
use tracing::debug;

/// Running sequence value for one sync run.
///
/// Reconstructed from the store's maximum at run start and threaded through
/// every upsert. It only advances after an insert has been written, so a
/// failed insert never burns a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceCounter {
    current: u64,
}

impl SequenceCounter {
    /// Starts counting after `current`.
    pub fn new(current: u64) -> Self {
        Self { current }
    }

    /// Reconstructs the counter from the highest stored sequence.
    pub fn from_store<D: CatalogStore + ?Sized>(store: &D) -> StoreResult<Self> {
        Ok(Self::new(store.max_sequence()?))
    }

    /// Highest sequence assigned so far.
    pub fn current(&self) -> u64 {
        self.current
    }

    fn next(&self) -> u64 {
        self.current + 1
    }
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new record was inserted with this sequence.
    Inserted(u64),
    /// An existing record was overwritten; it keeps this sequence.
    Updated(u64),
}

impl UpsertOutcome {
    /// Sequence number of the stored record.
    pub fn sequence(&self) -> u64 {
        match self {
            UpsertOutcome::Inserted(seq) | UpsertOutcome::Updated(seq) => *seq,
        }
    }
}

/// Inserts or overwrites `record`, merging on its external identifier.
///
/// New records take `counter.current() + 1`. Existing records keep their
/// sequence and creation time; every other field is overwritten.
pub fn upsert<D: CatalogStore + ?Sized>(
    store: &D,
    mut record: CatalogRecord,
    counter: &mut SequenceCounter,
    now: i64,
) -> StoreResult<UpsertOutcome> {
    record.updated_at = now;

    match store.find_record(&record.external_id)? {
        Some(existing) => {
            record.sequence = existing.sequence;
            record.created_at = existing.created_at;
            let sequence = record.sequence;
            store.update_record(record)?;
            Ok(UpsertOutcome::Updated(sequence))
        }
        None => {
            let sequence = counter.next();
            record.sequence = sequence;
            record.created_at = now;
            debug!(external_id = %record.external_id, sequence, "inserting record");
            store.insert_record(record)?;
            counter.current = sequence;
            Ok(UpsertOutcome::Inserted(sequence))
        }
    }
}
