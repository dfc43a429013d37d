//! Catalog query-string parsing.
//!
//! Parsed by hand rather than through `Query<T>` so repeated keys such as
//! `manufacturer=a&manufacturer=b` keep every value and bad numbers are
//! dropped instead of rejecting the request.

use std::str::FromStr;

use rust_decimal::Decimal;

use super::filter::ProductFilter;
use super::sort::SortOrder;

/// A parsed `GET /catalog` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogQuery {
    pub filter: ProductFilter,
    pub sort: SortOrder,
    /// Raw page parameter; clamped once the result count is known.
    pub page: Option<String>,
}

impl CatalogQuery {
    /// Parse a raw query string (without the leading `?`).
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        let mut query = Self::default();
        let mut sort = None;

        for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
            // Search text is matched as typed, surrounding spaces included.
            if key == "search" {
                if !value.is_empty() {
                    query.filter.search = Some(value.into_owned());
                }
                continue;
            }

            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let filter = &mut query.filter;

            match key.as_ref() {
                "category" => push_unique(&mut filter.categories, value),
                "manufacturer" => push_unique(&mut filter.manufacturers, value),
                "caliber" => push_unique(&mut filter.calibers, value),
                "product_type" => {
                    if let Ok(kind) = value.parse()
                        && !filter.product_types.contains(&kind)
                    {
                        filter.product_types.push(kind);
                    }
                }
                "price_min" => filter.price_min = parse_price(value),
                "price_max" => filter.price_max = parse_price(value),
                "in_stock" => filter.in_stock = value == "true",
                "status_discount" => filter.on_discount = value == "true",
                "sort" => sort = Some(value.to_owned()),
                "page" => query.page = Some(value.to_owned()),
                _ => {}
            }
        }

        query.sort = SortOrder::parse(sort.as_deref());
        query
    }
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v == value) {
        values.push(value.to_owned());
    }
}

/// Parse a price bound. Plain and scientific notation are accepted;
/// anything else is ignored.
fn parse_price(value: &str) -> Option<Decimal> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

#[cfg(test)]
mod tests {
    use bulava_core::ProductType;

    use super::*;

    #[test]
    fn test_repeated_keys_keep_every_value() {
        let query = CatalogQuery::parse(Some(
            "manufacturer=Sako&manufacturer=Beretta&caliber=.308&caliber=9mm&manufacturer=Sako",
        ));
        assert_eq!(query.filter.manufacturers, vec!["Sako", "Beretta"]);
        assert_eq!(query.filter.calibers, vec![".308", "9mm"]);
    }

    #[test]
    fn test_non_numeric_prices_are_dropped() {
        let query = CatalogQuery::parse(Some("price_min=abc&price_max=2500.50"));
        assert_eq!(query.filter.price_min, None);
        assert_eq!(query.filter.price_max, Some(Decimal::new(250_050, 2)));
    }

    #[test]
    fn test_flags_require_literal_true() {
        let query = CatalogQuery::parse(Some("in_stock=true&status_discount=1"));
        assert!(query.filter.in_stock);
        assert!(!query.filter.on_discount);
    }

    #[test]
    fn test_unknown_sort_and_product_type() {
        let query = CatalogQuery::parse(Some("sort=popularity&product_type=optics&product_type=drone"));
        assert_eq!(query.sort, SortOrder::CreatedAtDesc);
        assert_eq!(query.filter.product_types, vec![ProductType::Optics]);
    }

    #[test]
    fn test_search_is_decoded_as_typed() {
        let query = CatalogQuery::parse(Some("search=+Fort%2017+&page=2&sort=-price"));
        assert_eq!(query.filter.search.as_deref(), Some(" Fort 17 "));
        assert_eq!(query.page.as_deref(), Some("2"));
        assert_eq!(query.sort, SortOrder::PriceDesc);
    }

    #[test]
    fn test_empty_query() {
        assert_eq!(CatalogQuery::parse(None), CatalogQuery::default());
        assert_eq!(CatalogQuery::parse(Some("search=&category=")), CatalogQuery::default());
    }

    #[test]
    fn test_blank_search_is_kept() {
        let query = CatalogQuery::parse(Some("search=+"));
        assert_eq!(query.filter.search.as_deref(), Some(" "));
    }
}
