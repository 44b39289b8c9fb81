//! Read-only lookups over synchronized catalog state.
//!
//! These back the public lookup endpoints. None of them treats "no match"
//! as an error: an unknown year, make or key simply yields an empty result.

use crate::error::StoreResult;
use crate::store::CatalogStore;
use crate::types::CatalogRecord;

/// Read-side queries over a [`CatalogStore`].
pub struct CatalogQueries<S: CatalogStore> {
    store: S,
}

impl<S: CatalogStore> CatalogQueries<S> {
    /// Wraps a store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the wrapped store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Lists every distinct metadata key observed.
    pub fn metadata_keys(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .store
            .metadata_keys()?
            .map(|set| set.keys)
            .unwrap_or_default())
    }

    /// Lists all known years in ascending order.
    pub fn years(&self) -> StoreResult<Vec<i32>> {
        Ok(self.store.years()?.into_iter().map(|e| e.year).collect())
    }

    /// Lists the makes seen for a year.
    pub fn makes_for_year(&self, year: i32) -> StoreResult<Vec<String>> {
        Ok(self
            .store
            .find_year(year)?
            .map(|e| e.makes)
            .unwrap_or_default())
    }

    /// Lists the models seen for a make.
    pub fn models_for_make(&self, make: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .store
            .find_make(make)?
            .map(|e| e.models)
            .unwrap_or_default())
    }

    /// Finds the record for a vehicle whose title mentions the option.
    ///
    /// The option's first character is upper-cased before matching, so
    /// `"sport"` matches a title containing `"Sport"`.
    pub fn find_spec(
        &self,
        year: i32,
        make: &str,
        model: &str,
        option: &str,
    ) -> StoreResult<Option<CatalogRecord>> {
        let needle = capitalize_first(option);
        Ok(self
            .store
            .records_by_vehicle(year, make, model)?
            .into_iter()
            .find(|r| r.title.contains(&needle)))
    }

    /// Lists every distinct option value.
    pub fn options(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .store
            .options()?
            .into_iter()
            .map(|e| e.option)
            .collect())
    }
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{MakeEntry, MetadataKeySet, OptionEntry, YearEntry};

    fn record(external_id: &str, sequence: u64, title: &str, model: &str) -> CatalogRecord {
        CatalogRecord {
            external_id: external_id.into(),
            sequence,
            title: title.into(),
            handle: String::new(),
            vendor: String::new(),
            status: "ACTIVE".into(),
            image: None,
            price: 0.0,
            compare_at_price: 0.0,
            year: 2020,
            make: "Acme".into(),
            model: model.into(),
            option: String::new(),
            spec: String::new(),
            description: String::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    fn populated() -> CatalogQueries<MemoryStore> {
        let store = MemoryStore::new();
        store
            .create_metadata_keys(MetadataKeySet {
                keys: vec!["year".into(), "make".into()],
            })
            .unwrap();
        store
            .create_year(YearEntry {
                year: 2020,
                makes: vec!["Acme".into()],
            })
            .unwrap();
        store
            .create_year(YearEntry {
                year: 2018,
                makes: vec![],
            })
            .unwrap();
        store
            .create_make(MakeEntry {
                make: "Acme".into(),
                models: vec!["X".into(), "Y".into()],
            })
            .unwrap();
        store
            .create_option(OptionEntry {
                option: "Base".into(),
            })
            .unwrap();
        store
            .insert_record(record("A", 1, "Acme X Base", "X"))
            .unwrap();
        store
            .insert_record(record("B", 2, "Acme X Sport", "X"))
            .unwrap();
        CatalogQueries::new(store)
    }

    #[test]
    fn empty_store_yields_empty_results() {
        let queries = CatalogQueries::new(MemoryStore::new());
        assert!(queries.metadata_keys().unwrap().is_empty());
        assert!(queries.years().unwrap().is_empty());
        assert!(queries.makes_for_year(2020).unwrap().is_empty());
        assert!(queries.models_for_make("Acme").unwrap().is_empty());
        assert!(queries.find_spec(2020, "Acme", "X", "base").unwrap().is_none());
        assert!(queries.options().unwrap().is_empty());
    }

    #[test]
    fn lookups() {
        let queries = populated();
        assert_eq!(queries.metadata_keys().unwrap(), vec!["year", "make"]);
        assert_eq!(queries.years().unwrap(), vec![2018, 2020]);
        assert_eq!(queries.makes_for_year(2020).unwrap(), vec!["Acme"]);
        assert_eq!(queries.models_for_make("Acme").unwrap(), vec!["X", "Y"]);
        assert_eq!(queries.options().unwrap(), vec!["Base"]);
    }

    #[test]
    fn find_spec_capitalizes_option() {
        let queries = populated();

        let found = queries.find_spec(2020, "Acme", "X", "sport").unwrap().unwrap();
        assert_eq!(found.external_id, "B");

        let found = queries.find_spec(2020, "Acme", "X", "Base").unwrap().unwrap();
        assert_eq!(found.external_id, "A");

        assert!(queries.find_spec(2020, "Acme", "Y", "base").unwrap().is_none());
        assert!(queries.find_spec(2020, "Acme", "X", "luxury").unwrap().is_none());
    }

    #[test]
    fn capitalize_first_handles_edges() {
        assert_eq!(capitalize_first(""), "");
        assert_eq!(capitalize_first("base"), "Base");
        assert_eq!(capitalize_first("éclair"), "Éclair");
    }
}
