//! Query command implementation.

use catsync_core::{CatalogQueries, CatalogStore, FileStore};
use serde::Serialize;
use std::path::Path;

/// A read-only lookup against the synced catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Every metadata key observed.
    Keys,
    /// Every year.
    Years,
    /// Makes seen for a year.
    Makes {
        /// Model year.
        year: i32,
    },
    /// Models seen for a make.
    Models {
        /// Make name.
        make: String,
    },
    /// The record for a vehicle and option.
    Spec {
        /// Model year.
        year: i32,
        /// Make name.
        make: String,
        /// Model name.
        model: String,
        /// Option, matched against the record title.
        option: String,
    },
    /// Every option value.
    Options,
}

/// Response envelope served to API consumers.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    /// Always true; lookups never fail on "not found".
    pub success: bool,
    /// Lookup result.
    pub result: T,
}

impl<T: Serialize> Envelope<T> {
    /// Wraps a successful result.
    pub fn ok(result: T) -> Self {
        Self {
            success: true,
            result,
        }
    }
}

/// Runs the query command, printing the JSON envelope to stdout.
pub fn run(store_path: &Path, lookup: &Lookup) -> Result<(), Box<dyn std::error::Error>> {
    // Snapshot reads do not take the writer lock, so a running sync
    // never blocks a query.
    let queries = CatalogQueries::new(FileStore::snapshot(store_path)?);
    println!("{}", render(&queries, lookup)?);
    Ok(())
}

/// Evaluates a lookup and renders its envelope as JSON.
pub fn render<S: CatalogStore>(
    queries: &CatalogQueries<S>,
    lookup: &Lookup,
) -> Result<String, Box<dyn std::error::Error>> {
    let json = match lookup {
        Lookup::Keys => serde_json::to_string(&Envelope::ok(queries.metadata_keys()?))?,
        Lookup::Years => serde_json::to_string(&Envelope::ok(queries.years()?))?,
        Lookup::Makes { year } => {
            serde_json::to_string(&Envelope::ok(queries.makes_for_year(*year)?))?
        }
        Lookup::Models { make } => {
            serde_json::to_string(&Envelope::ok(queries.models_for_make(make)?))?
        }
        Lookup::Spec {
            year,
            make,
            model,
            option,
        } => serde_json::to_string(&Envelope::ok(
            queries.find_spec(*year, make, model, option)?,
        ))?,
        Lookup::Options => serde_json::to_string(&Envelope::ok(queries.options()?))?,
    };
    Ok(json)
}
