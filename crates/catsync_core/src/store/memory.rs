//! In-memory catalog store.

use super::{CatalogStore, Mutation};
use crate::error::{StoreError, StoreResult};
use crate::types::{CatalogRecord, MakeEntry, MetadataKeySet, OptionEntry, YearEntry};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// A catalog store held entirely in memory.
///
/// Suitable for:
/// - Unit and integration tests
/// - Read-only snapshots of a journal (see [`super::FileStore::snapshot`])
/// - The replay target of [`super::FileStore`]
///
/// # Example
///
/// ```rust
/// use catsync_core::{CatalogStore, MemoryStore, OptionEntry};
///
/// let store = MemoryStore::new();
/// store.create_option(OptionEntry { option: "Base".into() }).unwrap();
/// assert!(store.find_option("Base").unwrap().is_some());
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    records: HashMap<String, CatalogRecord>,
    by_sequence: BTreeMap<u64, String>,
    metadata_keys: Option<MetadataKeySet>,
    years: BTreeMap<i32, YearEntry>,
    makes: BTreeMap<String, MakeEntry>,
    options: BTreeMap<String, OptionEntry>,
}

impl MemoryState {
    /// Validates a mutation. Returns false when it would be a no-op.
    fn check(&self, mutation: &Mutation) -> StoreResult<bool> {
        match mutation {
            Mutation::InsertRecord(record) => {
                if self.records.contains_key(&record.external_id) {
                    return Err(StoreError::duplicate("record", &record.external_id));
                }
                if self.by_sequence.contains_key(&record.sequence) {
                    return Err(StoreError::duplicate("record sequence", record.sequence));
                }
                Ok(true)
            }
            Mutation::UpdateRecord(record) => {
                if !self.records.contains_key(&record.external_id) {
                    return Err(StoreError::not_found("record", &record.external_id));
                }
                Ok(true)
            }
            Mutation::DeleteMetadataKeys => Ok(self.metadata_keys.is_some()),
            Mutation::CreateMetadataKeys(_) => {
                if self.metadata_keys.is_some() {
                    return Err(StoreError::duplicate("metadata key set", "singleton"));
                }
                Ok(true)
            }
            Mutation::CreateYear(entry) => {
                if self.years.contains_key(&entry.year) {
                    return Err(StoreError::duplicate("year", entry.year));
                }
                Ok(true)
            }
            Mutation::AddMakeToYear { year, make } => match self.years.get(year) {
                Some(entry) => Ok(!entry.makes.contains(make)),
                None => Err(StoreError::not_found("year", year)),
            },
            Mutation::CreateMake(entry) => {
                if self.makes.contains_key(&entry.make) {
                    return Err(StoreError::duplicate("make", &entry.make));
                }
                Ok(true)
            }
            Mutation::AddModelToMake { make, model } => match self.makes.get(make) {
                Some(entry) => Ok(!entry.models.contains(model)),
                None => Err(StoreError::not_found("make", make)),
            },
            Mutation::CreateOption(entry) => {
                if self.options.contains_key(&entry.option) {
                    return Err(StoreError::duplicate("option", &entry.option));
                }
                Ok(true)
            }
        }
    }

    fn apply(&mut self, mutation: Mutation) -> StoreResult<bool> {
        if !self.check(&mutation)? {
            return Ok(false);
        }

        match mutation {
            Mutation::InsertRecord(record) => {
                self.by_sequence
                    .insert(record.sequence, record.external_id.clone());
                self.records.insert(record.external_id.clone(), record);
            }
            Mutation::UpdateRecord(mut record) => {
                if let Some(existing) = self.records.get_mut(&record.external_id) {
                    record.sequence = existing.sequence;
                    record.created_at = existing.created_at;
                    *existing = record;
                }
            }
            Mutation::DeleteMetadataKeys => {
                self.metadata_keys = None;
            }
            Mutation::CreateMetadataKeys(keys) => {
                self.metadata_keys = Some(keys);
            }
            Mutation::CreateYear(entry) => {
                self.years.insert(entry.year, entry);
            }
            Mutation::AddMakeToYear { year, make } => {
                if let Some(entry) = self.years.get_mut(&year) {
                    entry.makes.push(make);
                }
            }
            Mutation::CreateMake(entry) => {
                self.makes.insert(entry.make.clone(), entry);
            }
            Mutation::AddModelToMake { make, model } => {
                if let Some(entry) = self.makes.get_mut(&make) {
                    entry.models.push(model);
                }
            }
            Mutation::CreateOption(entry) => {
                self.options.insert(entry.option.clone(), entry);
            }
        }

        Ok(true)
    }
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn check(&self, mutation: &Mutation) -> StoreResult<bool> {
        self.state.read().check(mutation)
    }

    pub(crate) fn apply(&self, mutation: Mutation) -> StoreResult<bool> {
        self.state.write().apply(mutation)
    }

    /// The shortest mutation sequence that rebuilds the current state.
    pub(crate) fn mutations(&self) -> Vec<Mutation> {
        let state = self.state.read();
        let mut mutations = Vec::with_capacity(
            state.records.len() + state.years.len() + state.makes.len() + state.options.len() + 1,
        );

        mutations.extend(
            state
                .by_sequence
                .values()
                .filter_map(|id| state.records.get(id))
                .cloned()
                .map(Mutation::InsertRecord),
        );
        mutations.extend(state.metadata_keys.clone().map(Mutation::CreateMetadataKeys));
        mutations.extend(state.years.values().cloned().map(Mutation::CreateYear));
        mutations.extend(state.makes.values().cloned().map(Mutation::CreateMake));
        mutations.extend(state.options.values().cloned().map(Mutation::CreateOption));
        mutations
    }

    /// Returns all records in sequence order.
    pub fn records(&self) -> Vec<CatalogRecord> {
        let state = self.state.read();
        state
            .by_sequence
            .values()
            .filter_map(|id| state.records.get(id).cloned())
            .collect()
    }
}

impl CatalogStore for MemoryStore {
    fn find_record(&self, external_id: &str) -> StoreResult<Option<CatalogRecord>> {
        Ok(self.state.read().records.get(external_id).cloned())
    }

    fn max_sequence(&self) -> StoreResult<u64> {
        Ok(self
            .state
            .read()
            .by_sequence
            .keys()
            .next_back()
            .copied()
            .unwrap_or(0))
    }

    fn insert_record(&self, record: CatalogRecord) -> StoreResult<()> {
        self.apply(Mutation::InsertRecord(record)).map(|_| ())
    }

    fn update_record(&self, record: CatalogRecord) -> StoreResult<()> {
        self.apply(Mutation::UpdateRecord(record)).map(|_| ())
    }

    fn records_by_vehicle(
        &self,
        year: i32,
        make: &str,
        model: &str,
    ) -> StoreResult<Vec<CatalogRecord>> {
        let state = self.state.read();
        Ok(state
            .by_sequence
            .values()
            .filter_map(|id| state.records.get(id))
            .filter(|r| r.year == year && r.make == make && r.model == model)
            .cloned()
            .collect())
    }

    fn record_count(&self) -> StoreResult<usize> {
        Ok(self.state.read().records.len())
    }

    fn metadata_keys(&self) -> StoreResult<Option<MetadataKeySet>> {
        Ok(self.state.read().metadata_keys.clone())
    }

    fn delete_metadata_keys(&self) -> StoreResult<()> {
        self.apply(Mutation::DeleteMetadataKeys).map(|_| ())
    }

    fn create_metadata_keys(&self, keys: MetadataKeySet) -> StoreResult<()> {
        self.apply(Mutation::CreateMetadataKeys(keys)).map(|_| ())
    }

    fn find_year(&self, year: i32) -> StoreResult<Option<YearEntry>> {
        Ok(self.state.read().years.get(&year).cloned())
    }

    fn create_year(&self, entry: YearEntry) -> StoreResult<()> {
        self.apply(Mutation::CreateYear(entry)).map(|_| ())
    }

    fn add_make_to_year(&self, year: i32, make: &str) -> StoreResult<bool> {
        self.apply(Mutation::AddMakeToYear {
            year,
            make: make.to_string(),
        })
    }

    fn years(&self) -> StoreResult<Vec<YearEntry>> {
        Ok(self.state.read().years.values().cloned().collect())
    }

    fn find_make(&self, make: &str) -> StoreResult<Option<MakeEntry>> {
        Ok(self.state.read().makes.get(make).cloned())
    }

    fn create_make(&self, entry: MakeEntry) -> StoreResult<()> {
        self.apply(Mutation::CreateMake(entry)).map(|_| ())
    }

    fn add_model_to_make(&self, make: &str, model: &str) -> StoreResult<bool> {
        self.apply(Mutation::AddModelToMake {
            make: make.to_string(),
            model: model.to_string(),
        })
    }

    fn makes(&self) -> StoreResult<Vec<MakeEntry>> {
        Ok(self.state.read().makes.values().cloned().collect())
    }

    fn find_option(&self, option: &str) -> StoreResult<Option<OptionEntry>> {
        Ok(self.state.read().options.get(option).cloned())
    }

    fn create_option(&self, entry: OptionEntry) -> StoreResult<()> {
        self.apply(Mutation::CreateOption(entry)).map(|_| ())
    }

    fn options(&self) -> StoreResult<Vec<OptionEntry>> {
        Ok(self.state.read().options.values().cloned().collect())
    }
}
