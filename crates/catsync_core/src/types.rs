//! Catalog entities and the flattened metadata mapping.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Well-known metadata keys promoted to record fields.
pub mod keys {
    /// Model year, parsed as an integer.
    pub const YEAR: &str = "year";
    /// Vehicle make.
    pub const MAKE: &str = "make";
    /// Vehicle model.
    pub const MODEL: &str = "model";
    /// Trim/option name.
    pub const OPTION: &str = "option";
    /// Free-text specification.
    pub const SPEC: &str = "spec";
    /// Free-text description.
    pub const DESCRIPTION: &str = "description";
}

/// Returns the current wall-clock time in Unix milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// A product as stored locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Stable identifier assigned by the remote catalog. Merge key.
    pub external_id: String,
    /// Locally assigned insertion sequence, starting at 1.
    pub sequence: u64,
    /// Display title.
    pub title: String,
    /// URL-safe slug.
    pub handle: String,
    /// Vendor name.
    pub vendor: String,
    /// Lifecycle status (ACTIVE, DRAFT, ARCHIVED).
    pub status: String,
    /// Primary image reference.
    pub image: Option<String>,
    /// Price of the first variant.
    pub price: f64,
    /// Compare-at price of the first variant, 0 when unset.
    pub compare_at_price: f64,
    /// Model year, 0 when absent.
    pub year: i32,
    /// Vehicle make.
    pub make: String,
    /// Vehicle model.
    pub model: String,
    /// Trim/option name.
    pub option: String,
    /// Free-text specification.
    pub spec: String,
    /// Free-text description.
    pub description: String,
    /// Insert time, Unix milliseconds.
    pub created_at: i64,
    /// Last write time, Unix milliseconds.
    pub updated_at: i64,
}

/// The single entity holding every metadata key ever observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataKeySet {
    /// Distinct keys in first-observed order.
    pub keys: Vec<String>,
}

/// Makes associated with one model year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearEntry {
    /// The year. Unique across entries.
    pub year: i32,
    /// Distinct makes in first-observed order.
    pub makes: Vec<String>,
}

/// Models associated with one make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakeEntry {
    /// The make. Unique across entries.
    pub make: String,
    /// Distinct models in first-observed order.
    pub models: Vec<String>,
}

/// One distinct option value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionEntry {
    /// The option value. Unique across entries.
    pub option: String,
}

/// Flattened key→value view of a record's metadata entries.
///
/// Built from the remote's ordered entry list. A repeated key keeps the
/// position of its first occurrence and the value of its last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flattens an ordered list of entries.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut metadata = Self::new();
        for (key, value) in entries {
            metadata.insert(key, value);
        }
        metadata
    }

    /// Inserts a value, replacing any earlier value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Returns the raw value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the value for a key if it is set to a non-empty string.
    pub fn present(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    /// Returns the parsed `year` value, if present and numeric.
    pub fn year(&self) -> Option<i32> {
        self.present(keys::YEAR)
            .and_then(|v| v.trim().parse::<i32>().ok())
    }

    /// Iterates over keys in first-observed order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins_keeps_first_position() {
        let metadata = Metadata::from_entries([
            ("make", "Acme"),
            ("year", "2019"),
            ("make", "Globex"),
        ]);

        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata.get("make"), Some("Globex"));
        assert_eq!(metadata.keys().collect::<Vec<_>>(), vec!["make", "year"]);
    }

    #[test]
    fn empty_values_are_not_present() {
        let metadata = Metadata::from_entries([("option", ""), ("model", "X")]);
        assert_eq!(metadata.get("option"), Some(""));
        assert_eq!(metadata.present("option"), None);
        assert_eq!(metadata.present("model"), Some("X"));
        assert_eq!(metadata.present("spec"), None);
    }

    #[test]
    fn year_parsing() {
        assert_eq!(Metadata::from_entries([("year", "2020")]).year(), Some(2020));
        assert_eq!(Metadata::from_entries([("year", " 1999 ")]).year(), Some(1999));
        assert_eq!(Metadata::from_entries([("year", "twenty")]).year(), None);
        assert_eq!(Metadata::new().year(), None);
    }

    #[test]
    fn record_serializes_to_json() {
        let record = CatalogRecord {
            external_id: "gid://shopify/Product/1".into(),
            sequence: 1,
            title: "Base Kit".into(),
            handle: "base-kit".into(),
            vendor: "Acme".into(),
            status: "ACTIVE".into(),
            image: None,
            price: 10.5,
            compare_at_price: 0.0,
            year: 2020,
            make: "Acme".into(),
            model: "X".into(),
            option: "Base".into(),
            spec: String::new(),
            description: String::new(),
            created_at: 1,
            updated_at: 1,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["external_id"], "gid://shopify/Product/1");
        assert_eq!(json["year"], 2020);
        assert!(json["image"].is_null());
    }
}
