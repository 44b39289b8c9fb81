//! Incremental maintenance of the derived indexes.
//!
//! Each observed record re-derives four indexes against the store:
//!
//! 1. the metadata key-set, rewritten wholesale (delete then create)
//! 2. year → makes
//! 3. make → models
//! 4. the option set
//!
//! Every step is monotonic: values are added, never removed. Re-observing
//! a record is therefore a no-op apart from the key-set rewrite. The
//! key-set rewrite is not safe under concurrent writers; a store must have
//! a single sync writer.
//!
//! Between the delete and the create of a rewrite the key-set does not
//! exist in the store. If the create fails, the stored keys are gone and a
//! page retry only re-observes that page. [`KnownKeys`] carries every key
//! seen during the run, seeded from the store, so the next rewrite restores
//! them.

use catsync_core::{
    keys, CatalogStore, MakeEntry, Metadata, MetadataKeySet, OptionEntry, StoreResult, YearEntry,
};
use tracing::debug;

/// Union of the stored key-set and every key observed during a run.
///
/// Reconstructed from the store at run start and threaded through every
/// [`observe`] call, the same way the sequence counter is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownKeys {
    keys: Vec<String>,
}

impl KnownKeys {
    /// Starts from an empty union.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the union from the stored key-set.
    pub fn from_store<D: CatalogStore + ?Sized>(store: &D) -> StoreResult<Self> {
        let mut known = Self::new();
        if let Some(set) = store.metadata_keys()? {
            known.extend(set.keys.iter().map(String::as_str));
        }
        Ok(known)
    }

    /// Keys in first-seen order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Adds keys not yet present. Returns whether any were added.
    fn extend<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) -> bool {
        let before = self.keys.len();
        for key in keys {
            if !self.keys.iter().any(|k| k == key) {
                self.keys.push(key.to_string());
            }
        }
        self.keys.len() > before
    }
}

/// Which indexes gained an entry or a member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexChanges {
    /// New keys were added to the key-set.
    pub keys_added: bool,
    /// A year entry was created or gained a make.
    pub year_changed: bool,
    /// A make entry was created or gained a model.
    pub make_changed: bool,
    /// A new option entry was created.
    pub option_added: bool,
}

/// Updates the four derived indexes from one record's metadata.
///
/// `known` accumulates keys across calls; the key-set is rewritten as the
/// stored keys, `known` and the record's keys combined. Errors are returned
/// as soon as a step fails, leaving earlier steps applied.
pub fn observe<D: CatalogStore + ?Sized>(
    store: &D,
    metadata: &Metadata,
    known: &mut KnownKeys,
) -> StoreResult<IndexChanges> {
    let make = metadata.present(keys::MAKE);

    Ok(IndexChanges {
        keys_added: update_key_set(store, metadata, known)?,
        year_changed: update_year(store, metadata.year(), make)?,
        make_changed: update_make(store, make, metadata.present(keys::MODEL))?,
        option_added: update_option(store, metadata.present(keys::OPTION))?,
    })
}

fn update_key_set<D: CatalogStore + ?Sized>(
    store: &D,
    metadata: &Metadata,
    known: &mut KnownKeys,
) -> StoreResult<bool> {
    let stored = store.metadata_keys()?.unwrap_or_default().keys;
    let mut merged = KnownKeys { keys: stored };
    merged.extend(known.keys.iter().map(String::as_str));
    let added = merged.extend(metadata.keys());

    // Record the union before the delete so a failed create cannot lose it.
    known.extend(merged.keys.iter().map(String::as_str));

    store.delete_metadata_keys()?;
    store.create_metadata_keys(MetadataKeySet { keys: merged.keys })?;
    Ok(added)
}

fn update_year<D: CatalogStore + ?Sized>(
    store: &D,
    year: Option<i32>,
    make: Option<&str>,
) -> StoreResult<bool> {
    let Some(year) = year else {
        return Ok(false);
    };

    match store.find_year(year)? {
        None => {
            store.create_year(YearEntry {
                year,
                makes: make.map(str::to_string).into_iter().collect(),
            })?;
            Ok(true)
        }
        Some(entry) => match make {
            Some(make) if !entry.makes.iter().any(|m| m == make) => {
                store.add_make_to_year(year, make)
            }
            _ => Ok(false),
        },
    }
}

fn update_make<D: CatalogStore + ?Sized>(
    store: &D,
    make: Option<&str>,
    model: Option<&str>,
) -> StoreResult<bool> {
    let Some(model) = model else {
        return Ok(false);
    };
    let Some(make) = make else {
        debug!(model, "model without make; skipping make index");
        return Ok(false);
    };

    match store.find_make(make)? {
        None => {
            store.create_make(MakeEntry {
                make: make.to_string(),
                models: vec![model.to_string()],
            })?;
            Ok(true)
        }
        Some(entry) if !entry.models.iter().any(|m| m == model) => {
            store.add_model_to_make(make, model)
        }
        Some(_) => Ok(false),
    }
}

fn update_option<D: CatalogStore + ?Sized>(store: &D, option: Option<&str>) -> StoreResult<bool> {
    let Some(option) = option else {
        return Ok(false);
    };

    if store.find_option(option)?.is_some() {
        return Ok(false);
    }
    store.create_option(OptionEntry {
        option: option.to_string(),
    })?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use catsync_core::MemoryStore;

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        Metadata::from_entries(pairs.iter().copied())
    }

    #[test]
    fn full_metadata_populates_every_index() {
        let store = MemoryStore::new();
        let mut known = KnownKeys::new();
        let changes = observe(
            &store,
            &meta(&[
                ("year", "2020"),
                ("make", "Acme"),
                ("model", "X"),
                ("option", "Base"),
            ]),
            &mut known,
        )
        .unwrap();

        assert_eq!(
            changes,
            IndexChanges {
                keys_added: true,
                year_changed: true,
                make_changed: true,
                option_added: true,
            }
        );
        assert_eq!(
            store.metadata_keys().unwrap().unwrap().keys,
            vec!["year", "make", "model", "option"]
        );
        assert_eq!(store.find_year(2020).unwrap().unwrap().makes, vec!["Acme"]);
        assert_eq!(store.find_make("Acme").unwrap().unwrap().models, vec!["X"]);
        assert!(store.find_option("Base").unwrap().is_some());
    }

    #[test]
    fn reobserving_is_a_noop() {
        let store = MemoryStore::new();
        let mut known = KnownKeys::new();
        let m = meta(&[("year", "2020"), ("make", "Acme"), ("model", "X"), ("option", "Base")]);
        observe(&store, &m, &mut known).unwrap();

        let changes = observe(&store, &m, &mut known).unwrap();
        assert_eq!(changes, IndexChanges::default());
        assert_eq!(store.find_year(2020).unwrap().unwrap().makes.len(), 1);
        assert_eq!(store.find_make("Acme").unwrap().unwrap().models.len(), 1);
        assert_eq!(store.options().unwrap().len(), 1);
        assert_eq!(store.metadata_keys().unwrap().unwrap().keys.len(), 4);
    }

    #[test]
    fn sets_grow_in_observed_order() {
        let store = MemoryStore::new();
        let mut known = KnownKeys::new();
        observe(
            &store,
            &meta(&[("year", "2020"), ("make", "Acme"), ("model", "X")]),
            &mut known,
        )
        .unwrap();
        observe(
            &store,
            &meta(&[("year", "2020"), ("make", "Globex"), ("model", "Q")]),
            &mut known,
        )
        .unwrap();
        observe(
            &store,
            &meta(&[("year", "2020"), ("make", "Acme"), ("model", "Y")]),
            &mut known,
        )
        .unwrap();

        assert_eq!(
            store.find_year(2020).unwrap().unwrap().makes,
            vec!["Acme", "Globex"]
        );
        assert_eq!(
            store.find_make("Acme").unwrap().unwrap().models,
            vec!["X", "Y"]
        );
    }

    #[test]
    fn empty_metadata_still_rewrites_key_set() {
        let store = MemoryStore::new();
        let mut known = KnownKeys::new();
        let changes = observe(&store, &Metadata::new(), &mut known).unwrap();
        assert!(!changes.keys_added);
        assert_eq!(store.metadata_keys().unwrap(), Some(MetadataKeySet::default()));
        assert!(store.years().unwrap().is_empty());
    }

    #[test]
    fn year_without_make_creates_empty_entry() {
        let store = MemoryStore::new();
        let mut known = KnownKeys::new();
        observe(&store, &meta(&[("year", "2021")]), &mut known).unwrap();
        assert!(store.find_year(2021).unwrap().unwrap().makes.is_empty());

        observe(&store, &meta(&[("year", "2021"), ("make", "Acme")]), &mut known).unwrap();
        assert_eq!(store.find_year(2021).unwrap().unwrap().makes, vec!["Acme"]);
    }

    #[test]
    fn unparseable_year_and_orphan_model_are_skipped() {
        let store = MemoryStore::new();
        let mut known = KnownKeys::new();
        let changes = observe(
            &store,
            &meta(&[("year", "soon"), ("model", "X")]),
            &mut known,
        )
        .unwrap();
        assert!(!changes.year_changed);
        assert!(!changes.make_changed);
        assert!(store.years().unwrap().is_empty());
        assert!(store.makes().unwrap().is_empty());
        assert_eq!(store.metadata_keys().unwrap().unwrap().keys, vec!["year", "model"]);
    }

    #[test]
    fn empty_option_is_absent() {
        let store = MemoryStore::new();
        let mut known = KnownKeys::new();
        observe(&store, &meta(&[("option", "")]), &mut known).unwrap();
        assert!(store.options().unwrap().is_empty());
    }

    #[test]
    fn known_keys_restore_a_lost_key_set() {
        let store = MemoryStore::new();
        let mut known = KnownKeys::new();
        observe(&store, &meta(&[("color", "red")]), &mut known).unwrap();
        observe(&store, &meta(&[("size", "L")]), &mut known).unwrap();

        // A rewrite interrupted after its delete leaves no key-set behind.
        store.delete_metadata_keys().unwrap();

        observe(&store, &meta(&[("year", "2020")]), &mut known).unwrap();
        assert_eq!(
            store.metadata_keys().unwrap().unwrap().keys,
            vec!["color", "size", "year"]
        );
        assert_eq!(known.keys(), ["color", "size", "year"]);
    }

    #[test]
    fn known_keys_seed_from_store() {
        let store = MemoryStore::new();
        store
            .create_metadata_keys(MetadataKeySet {
                keys: vec!["make".into(), "model".into()],
            })
            .unwrap();

        let mut known = KnownKeys::from_store(&store).unwrap();
        assert_eq!(known.keys(), ["make", "model"]);

        store.delete_metadata_keys().unwrap();
        observe(&store, &Metadata::new(), &mut known).unwrap();
        assert_eq!(
            store.metadata_keys().unwrap().unwrap().keys,
            vec!["make", "model"]
        );
    }
}
