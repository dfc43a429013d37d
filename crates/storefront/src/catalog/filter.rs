//! Product filters and their SQL translation.

use rust_decimal::Decimal;
use sqlx::{Postgres, QueryBuilder};

use bulava_core::{CategoryId, ProductType};

/// Filters applied to a catalog listing.
///
/// Filter types combine with AND; values within a multi-valued filter
/// combine with OR.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    /// Category slugs. Resolved to ids before the query runs.
    pub categories: Vec<String>,
    pub manufacturers: Vec<String>,
    pub calibers: Vec<String>,
    pub product_types: Vec<ProductType>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub in_stock: bool,
    pub on_discount: bool,
    /// Case-insensitive substring over name, description and manufacturer.
    pub search: Option<String>,
}

impl ProductFilter {
    /// Append a `WHERE` clause for this filter to `qb`.
    ///
    /// `category_ids` are the ids the filter's category slugs resolved to;
    /// an empty slice means no category restriction. Every user-provided
    /// value is bound as a parameter.
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>, category_ids: &[CategoryId]) {
        qb.push(" WHERE TRUE");
        push_category_clause(qb, category_ids);

        if !self.manufacturers.is_empty() {
            qb.push(" AND p.manufacturer = ANY(")
                .push_bind(self.manufacturers.clone())
                .push(")");
        }

        if !self.calibers.is_empty() {
            qb.push(" AND p.caliber = ANY(")
                .push_bind(self.calibers.clone())
                .push(")");
        }

        if !self.product_types.is_empty() {
            qb.push(" AND p.product_type = ANY(")
                .push_bind(self.product_types.clone())
                .push(")");
        }

        if let Some(min) = self.price_min {
            qb.push(" AND p.price >= ").push_bind(min);
        }

        if let Some(max) = self.price_max {
            qb.push(" AND p.price <= ").push_bind(max);
        }

        if self.in_stock {
            qb.push(" AND p.in_stock");
        }

        if self.on_discount {
            qb.push(" AND p.on_discount");
        }

        if let Some(search) = &self.search {
            let pattern = format!("%{}%", escape_like(search));
            qb.push(" AND (p.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.description ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.manufacturer ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

/// Append the base-set restriction used for both listings and facets.
pub fn push_category_clause(qb: &mut QueryBuilder<'_, Postgres>, category_ids: &[CategoryId]) {
    if !category_ids.is_empty() {
        qb.push(" AND p.category_id = ANY(")
            .push_bind(category_ids.to_vec())
            .push(")");
    }
}

/// Escape `LIKE` wildcards so user input matches literally.
#[must_use]
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql_for(filter: &ProductFilter, categories: &[CategoryId]) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT p.id FROM product p");
        filter.push_where(&mut qb, categories);
        qb.sql().to_string()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert_eq!(
            sql_for(&ProductFilter::default(), &[]),
            "SELECT p.id FROM product p WHERE TRUE"
        );
    }

    #[test]
    fn test_user_text_is_bound_not_inlined() {
        let filter = ProductFilter {
            manufacturers: vec!["Glock'; DROP TABLE product; --".to_string()],
            search: Some("50% off".to_string()),
            ..ProductFilter::default()
        };
        let sql = sql_for(&filter, &[]);

        assert!(!sql.contains("Glock"));
        assert!(!sql.contains("off"));
        assert!(sql.contains("p.manufacturer = ANY($1)"));
        assert!(sql.contains("p.name ILIKE $2"));
        assert!(sql.contains("p.description ILIKE $3"));
        assert!(sql.contains("p.manufacturer ILIKE $4"));
    }

    #[test]
    fn test_all_filter_types_combine_with_and() {
        let filter = ProductFilter {
            categories: vec!["rifles".to_string()],
            manufacturers: vec!["Sako".to_string()],
            calibers: vec![".308".to_string(), "6.5mm".to_string()],
            product_types: vec![ProductType::Weapon],
            price_min: Some(Decimal::from(1000)),
            price_max: Some(Decimal::from(5000)),
            in_stock: true,
            on_discount: true,
            search: None,
        };
        let sql = sql_for(&filter, &[CategoryId::new(4)]);

        assert_eq!(
            sql,
            "SELECT p.id FROM product p WHERE TRUE \
             AND p.category_id = ANY($1) \
             AND p.manufacturer = ANY($2) \
             AND p.caliber = ANY($3) \
             AND p.product_type = ANY($4) \
             AND p.price >= $5 \
             AND p.price <= $6 \
             AND p.in_stock \
             AND p.on_discount"
        );
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%_cotton\\"), "100\\%\\_cotton\\\\");
        assert_eq!(escape_like("Fort-17"), "Fort-17");
    }
}
