//! Mapping of remote records into the stored shape.

use crate::error::{SyncError, SyncResult};
use crate::source::RawRecord;
use catsync_core::{keys, CatalogRecord, Metadata};

/// A transformed record plus the metadata the index maintainer consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed {
    /// Record ready for upsert. `sequence` and timestamps are unset.
    pub record: CatalogRecord,
    /// Flattened metadata of the raw record.
    pub metadata: Metadata,
}

/// Maps a raw remote record into a [`CatalogRecord`].
///
/// Missing well-known metadata yields empty or zero fields. A record
/// without variants, or with an unparseable price, is a contract violation.
pub fn transform(raw: &RawRecord) -> SyncResult<Transformed> {
    let metadata = Metadata::from_entries(
        raw.metafields
            .iter()
            .map(|m| (m.key.as_str(), m.value.as_str())),
    );

    let variant = raw
        .variants
        .first()
        .ok_or_else(|| SyncError::contract(&raw.id, "record has no variants"))?;

    let price = parse_price(&raw.id, "price", &variant.price)?;
    let compare_at_price = match variant.compare_at_price.as_deref() {
        Some(value) if !value.trim().is_empty() => {
            parse_price(&raw.id, "compare-at price", value)?
        }
        _ => 0.0,
    };

    let text = |key: &str| metadata.get(key).unwrap_or_default().to_string();

    let record = CatalogRecord {
        external_id: raw.id.clone(),
        sequence: 0,
        title: raw.title.clone(),
        handle: raw.handle.clone(),
        vendor: raw.vendor.clone(),
        status: raw.status.clone(),
        image: raw.featured_image.clone(),
        price,
        compare_at_price,
        year: metadata.year().unwrap_or(0),
        make: text(keys::MAKE),
        model: text(keys::MODEL),
        option: text(keys::OPTION),
        spec: text(keys::SPEC),
        description: text(keys::DESCRIPTION),
        created_at: 0,
        updated_at: 0,
    };

    Ok(Transformed { record, metadata })
}

fn parse_price(external_id: &str, field: &str, value: &str) -> SyncResult<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
        .ok_or_else(|| SyncError::contract(external_id, format!("invalid {field}: {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{RawMetafield, RawVariant};

    fn raw(metafields: Vec<RawMetafield>, variants: Vec<RawVariant>) -> RawRecord {
        RawRecord {
            id: "gid://shopify/Product/7".into(),
            title: "Acme X Base".into(),
            handle: "acme-x-base".into(),
            vendor: "Acme".into(),
            status: "ACTIVE".into(),
            featured_image: Some("https://cdn.example.com/x.png".into()),
            variants,
            metafields,
        }
    }

    fn variant(price: &str, compare_at: Option<&str>) -> RawVariant {
        RawVariant {
            price: price.into(),
            compare_at_price: compare_at.map(str::to_string),
        }
    }

    #[test]
    fn maps_all_fields() {
        let t = transform(&raw(
            vec![
                RawMetafield::new("year", "2020"),
                RawMetafield::new("make", "Acme"),
                RawMetafield::new("model", "X"),
                RawMetafield::new("option", "Base"),
                RawMetafield::new("spec", "2.0L I4"),
                RawMetafield::new("description", "Entry trim"),
                RawMetafield::new("color", "red"),
            ],
            vec![variant("19.99", Some("24.99")), variant("99.00", None)],
        ))
        .unwrap();

        let r = &t.record;
        assert_eq!(r.external_id, "gid://shopify/Product/7");
        assert_eq!(r.title, "Acme X Base");
        assert_eq!(r.handle, "acme-x-base");
        assert_eq!(r.image.as_deref(), Some("https://cdn.example.com/x.png"));
        assert_eq!(r.price, 19.99);
        assert_eq!(r.compare_at_price, 24.99);
        assert_eq!(r.year, 2020);
        assert_eq!(r.make, "Acme");
        assert_eq!(r.model, "X");
        assert_eq!(r.option, "Base");
        assert_eq!(r.spec, "2.0L I4");
        assert_eq!(r.description, "Entry trim");
        assert_eq!(t.metadata.len(), 7);
        assert_eq!(t.metadata.get("color"), Some("red"));
    }

    #[test]
    fn missing_metadata_yields_defaults() {
        let t = transform(&raw(vec![], vec![variant("5", None)])).unwrap();
        assert_eq!(t.record.year, 0);
        assert!(t.record.make.is_empty());
        assert!(t.record.spec.is_empty());
        assert_eq!(t.record.compare_at_price, 0.0);
        assert!(t.metadata.is_empty());
    }

    #[test]
    fn duplicate_keys_last_write_wins() {
        let t = transform(&raw(
            vec![
                RawMetafield::new("make", "Acme"),
                RawMetafield::new("make", "Globex"),
            ],
            vec![variant("5", None)],
        ))
        .unwrap();
        assert_eq!(t.record.make, "Globex");
        assert_eq!(t.metadata.len(), 1);
    }

    #[test]
    fn unparseable_year_is_zero() {
        let t = transform(&raw(
            vec![RawMetafield::new("year", "MMXX")],
            vec![variant("5", None)],
        ))
        .unwrap();
        assert_eq!(t.record.year, 0);
    }

    #[test]
    fn no_variants_is_contract_violation() {
        let err = transform(&raw(vec![], vec![])).unwrap_err();
        assert!(matches!(err, SyncError::ContractViolation { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn bad_price_is_contract_violation() {
        let err = transform(&raw(vec![], vec![variant("free", None)])).unwrap_err();
        assert!(matches!(err, SyncError::ContractViolation { .. }));

        let err = transform(&raw(vec![], vec![variant("1", Some("n/a"))])).unwrap_err();
        assert!(err.to_string().contains("compare-at price"));
    }
}
