//! Store contract and implementations.
//!
//! A store is treated as a set of independent point operations, not as a
//! transactional engine. Callers sequence operations themselves and rely on
//! their idempotence when a batch is replayed.

mod file;
mod memory;

pub use file::{CompactionResult, FileStore};
pub use memory::MemoryStore;

use crate::error::StoreResult;
use crate::types::{CatalogRecord, MakeEntry, MetadataKeySet, OptionEntry, YearEntry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Point operations over the primary record set and the derived indexes.
///
/// # Invariants
///
/// - `external_id` and `sequence` are unique across records
/// - `year`, `make` and `option` are unique across their entities
/// - At most one [`MetadataKeySet`] exists
/// - `add_*` operations append only when the value is absent and report
///   whether they did
///
/// Implementations must be `Send + Sync` so a read path can share the
/// store with the single sync writer.
pub trait CatalogStore: Send + Sync {
    /// Finds a record by its external identifier.
    fn find_record(&self, external_id: &str) -> StoreResult<Option<CatalogRecord>>;

    /// Returns the highest stored sequence number, or 0 for an empty store.
    fn max_sequence(&self) -> StoreResult<u64>;

    /// Inserts a new record.
    ///
    /// # Errors
    ///
    /// Fails with `Duplicate` if the external identifier or the sequence
    /// number is already taken.
    fn insert_record(&self, record: CatalogRecord) -> StoreResult<()>;

    /// Overwrites an existing record in place.
    ///
    /// The stored sequence number and creation time are kept regardless of
    /// the values carried by `record`.
    ///
    /// # Errors
    ///
    /// Fails with `NotFound` if no record has that external identifier.
    fn update_record(&self, record: CatalogRecord) -> StoreResult<()>;

    /// Returns records matching a (year, make, model) triple in sequence order.
    fn records_by_vehicle(
        &self,
        year: i32,
        make: &str,
        model: &str,
    ) -> StoreResult<Vec<CatalogRecord>>;

    /// Returns the number of stored records.
    fn record_count(&self) -> StoreResult<usize>;

    /// Reads the metadata key-set entity.
    fn metadata_keys(&self) -> StoreResult<Option<MetadataKeySet>>;

    /// Deletes the metadata key-set entity if it exists.
    fn delete_metadata_keys(&self) -> StoreResult<()>;

    /// Creates the metadata key-set entity.
    fn create_metadata_keys(&self, keys: MetadataKeySet) -> StoreResult<()>;

    /// Finds the entry for a year.
    fn find_year(&self, year: i32) -> StoreResult<Option<YearEntry>>;

    /// Creates a year entry.
    fn create_year(&self, entry: YearEntry) -> StoreResult<()>;

    /// Appends a make to a year entry unless already present.
    fn add_make_to_year(&self, year: i32, make: &str) -> StoreResult<bool>;

    /// Returns all year entries in ascending year order.
    fn years(&self) -> StoreResult<Vec<YearEntry>>;

    /// Finds the entry for a make.
    fn find_make(&self, make: &str) -> StoreResult<Option<MakeEntry>>;

    /// Creates a make entry.
    fn create_make(&self, entry: MakeEntry) -> StoreResult<()>;

    /// Appends a model to a make entry unless already present.
    fn add_model_to_make(&self, make: &str, model: &str) -> StoreResult<bool>;

    /// Returns all make entries ordered by make.
    fn makes(&self) -> StoreResult<Vec<MakeEntry>>;

    /// Finds an option entry.
    fn find_option(&self, option: &str) -> StoreResult<Option<OptionEntry>>;

    /// Creates an option entry.
    fn create_option(&self, entry: OptionEntry) -> StoreResult<()>;

    /// Returns all option entries ordered by value.
    fn options(&self) -> StoreResult<Vec<OptionEntry>>;

    /// Drops superseded history from durable storage without changing
    /// logical state. Returns `None` when there was nothing to drop.
    fn compact(&self) -> StoreResult<Option<CompactionResult>> {
        Ok(None)
    }
}

/// Stores shared between the sync engine and a read path.
impl<S: CatalogStore + ?Sized> CatalogStore for Arc<S> {
    fn find_record(&self, external_id: &str) -> StoreResult<Option<CatalogRecord>> {
        (**self).find_record(external_id)
    }

    fn max_sequence(&self) -> StoreResult<u64> {
        (**self).max_sequence()
    }

    fn insert_record(&self, record: CatalogRecord) -> StoreResult<()> {
        (**self).insert_record(record)
    }

    fn update_record(&self, record: CatalogRecord) -> StoreResult<()> {
        (**self).update_record(record)
    }

    fn records_by_vehicle(
        &self,
        year: i32,
        make: &str,
        model: &str,
    ) -> StoreResult<Vec<CatalogRecord>> {
        (**self).records_by_vehicle(year, make, model)
    }

    fn record_count(&self) -> StoreResult<usize> {
        (**self).record_count()
    }

    fn metadata_keys(&self) -> StoreResult<Option<MetadataKeySet>> {
        (**self).metadata_keys()
    }

    fn delete_metadata_keys(&self) -> StoreResult<()> {
        (**self).delete_metadata_keys()
    }

    fn create_metadata_keys(&self, keys: MetadataKeySet) -> StoreResult<()> {
        (**self).create_metadata_keys(keys)
    }

    fn find_year(&self, year: i32) -> StoreResult<Option<YearEntry>> {
        (**self).find_year(year)
    }

    fn create_year(&self, entry: YearEntry) -> StoreResult<()> {
        (**self).create_year(entry)
    }

    fn add_make_to_year(&self, year: i32, make: &str) -> StoreResult<bool> {
        (**self).add_make_to_year(year, make)
    }

    fn years(&self) -> StoreResult<Vec<YearEntry>> {
        (**self).years()
    }

    fn find_make(&self, make: &str) -> StoreResult<Option<MakeEntry>> {
        (**self).find_make(make)
    }

    fn create_make(&self, entry: MakeEntry) -> StoreResult<()> {
        (**self).create_make(entry)
    }

    fn add_model_to_make(&self, make: &str, model: &str) -> StoreResult<bool> {
        (**self).add_model_to_make(make, model)
    }

    fn makes(&self) -> StoreResult<Vec<MakeEntry>> {
        (**self).makes()
    }

    fn find_option(&self, option: &str) -> StoreResult<Option<OptionEntry>> {
        (**self).find_option(option)
    }

    fn create_option(&self, entry: OptionEntry) -> StoreResult<()> {
        (**self).create_option(entry)
    }

    fn options(&self) -> StoreResult<Vec<OptionEntry>> {
        (**self).options()
    }

    fn compact(&self) -> StoreResult<Option<CompactionResult>> {
        (**self).compact()
    }
}

/// A single state change. This is the unit the file store journals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum Mutation {
    InsertRecord(CatalogRecord),
    UpdateRecord(CatalogRecord),
    DeleteMetadataKeys,
    CreateMetadataKeys(MetadataKeySet),
    CreateYear(YearEntry),
    AddMakeToYear { year: i32, make: String },
    CreateMake(MakeEntry),
    AddModelToMake { make: String, model: String },
    CreateOption(OptionEntry),
}
