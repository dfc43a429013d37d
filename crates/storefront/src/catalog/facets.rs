//! Facet counts for the filter sidebar.
//!
//! Facets describe what is available in the category-filtered base set, not
//! in the fully filtered listing, so picking a manufacturer does not hide the
//! other manufacturers.

use std::collections::BTreeMap;

use serde::Serialize;

/// The attributes facets are counted over.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FacetRecord {
    pub manufacturer: Option<String>,
    pub caliber: Option<String>,
    pub in_stock: bool,
    pub on_discount: bool,
}

/// One facet value and how many products carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetValue {
    pub value: String,
    pub count: i64,
}

/// Every facet shown next to a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Facets {
    pub manufacturers: Vec<FacetValue>,
    pub calibers: Vec<FacetValue>,
    pub in_stock_count: i64,
    pub discount_count: i64,
}

/// Count facets over `records`.
///
/// Missing and empty values are excluded; values are ordered ascending.
#[must_use]
pub fn compute(records: &[FacetRecord]) -> Facets {
    let mut manufacturers: BTreeMap<&str, i64> = BTreeMap::new();
    let mut calibers: BTreeMap<&str, i64> = BTreeMap::new();
    let mut facets = Facets::default();

    for record in records {
        if let Some(m) = record.manufacturer.as_deref().filter(|m| !m.is_empty()) {
            *manufacturers.entry(m).or_default() += 1;
        }
        if let Some(c) = record.caliber.as_deref().filter(|c| !c.is_empty()) {
            *calibers.entry(c).or_default() += 1;
        }
        if record.in_stock {
            facets.in_stock_count += 1;
        }
        if record.on_discount {
            facets.discount_count += 1;
        }
    }

    facets.manufacturers = into_values(manufacturers);
    facets.calibers = into_values(calibers);
    facets
}

fn into_values(counts: BTreeMap<&str, i64>) -> Vec<FacetValue> {
    counts
        .into_iter()
        .map(|(value, count)| FacetValue {
            value: value.to_owned(),
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(manufacturer: Option<&str>, caliber: Option<&str>, in_stock: bool) -> FacetRecord {
        FacetRecord {
            manufacturer: manufacturer.map(str::to_owned),
            caliber: caliber.map(str::to_owned),
            in_stock,
            on_discount: false,
        }
    }

    #[test]
    fn test_counts_group_and_order() {
        let records = vec![
            record(Some("Sako"), Some(".308"), true),
            record(Some("Beretta"), Some("9mm"), false),
            record(Some("Sako"), Some("6.5mm"), true),
            record(None, Some("9mm"), true),
            record(Some(""), Some(""), false),
        ];
        let facets = compute(&records);

        assert_eq!(
            facets.manufacturers,
            vec![
                FacetValue { value: "Beretta".into(), count: 1 },
                FacetValue { value: "Sako".into(), count: 2 },
            ]
        );
        assert_eq!(
            facets
                .calibers
                .iter()
                .map(|f| (f.value.as_str(), f.count))
                .collect::<Vec<_>>(),
            vec![(".308", 1), ("6.5mm", 1), ("9mm", 2)]
        );
        assert_eq!(facets.in_stock_count, 3);
        assert_eq!(facets.discount_count, 0);
    }

    #[test]
    fn test_empty_base_set() {
        assert_eq!(compute(&[]), Facets::default());
    }
}
