//! Catalog listing engine: filters, sorting, pagination and facets.
//!
//! [`CatalogQuery`] turns the query string into a [`ProductFilter`] and a
//! [`SortOrder`]. The catalog repository translates the filter into SQL and
//! clamps the page once the result count is known. [`facets::compute`] is a
//! pure function over the category-filtered base set.

pub mod facets;
pub mod filter;
pub mod pagination;
pub mod query;
pub mod sort;

use serde::Serialize;

use crate::models::{Category, CategoryWithCount, Product};

pub use facets::{FacetRecord, FacetValue, Facets};
pub use filter::ProductFilter;
pub use pagination::{PAGE_SIZE, Page};
pub use query::CatalogQuery;
pub use sort::SortOrder;

/// One page of a filtered listing with everything the sidebar needs.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogPage {
    pub products: Vec<Product>,
    pub page: Page,
    pub sort: SortOrder,
    pub search: Option<String>,
    pub selected_categories: Vec<Category>,
    /// Categories with at least one product, by name.
    pub categories: Vec<CategoryWithCount>,
    pub facets: Facets,
}
