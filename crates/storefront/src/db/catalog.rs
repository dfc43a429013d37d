//! Catalog repository: products, categories, images and filtered listings.
//!
//! Listing queries are assembled with `sqlx::QueryBuilder`; every
//! user-supplied value is bound as a parameter.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use bulava_core::{CategoryId, ProductId, ProductImageId, ProductType};

use super::RepositoryError;
use crate::catalog::{self, CatalogPage, CatalogQuery, FacetRecord, PAGE_SIZE, Page};
use crate::models::{Category, CategoryWithCount, Product, ProductDetail, ProductImage};

const PRODUCT_COLUMNS: &str = "p.id, p.slug, p.name, p.description, p.product_type, \
     p.category_id, p.price, p.discount_price, p.on_discount, p.in_stock, \
     p.manufacturer, p.caliber, p.color, p.size, p.material, p.main_image, \
     p.created_at, p.updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    slug: String,
    name: String,
    description: String,
    product_type: ProductType,
    category_id: i32,
    price: Decimal,
    discount_price: Option<Decimal>,
    on_discount: bool,
    in_stock: bool,
    manufacturer: Option<String>,
    caliber: Option<String>,
    color: Option<String>,
    size: Option<String>,
    material: Option<String>,
    main_image: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            slug: row.slug,
            name: row.name,
            description: row.description,
            product_type: row.product_type,
            category_id: CategoryId::new(row.category_id),
            price: row.price,
            discount_price: row.discount_price,
            on_discount: row.on_discount,
            in_stock: row.in_stock,
            manufacturer: row.manufacturer,
            caliber: row.caliber,
            color: row.color,
            size: row.size,
            material: row.material,
            main_image: row.main_image,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    slug: String,
    name: String,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: CategoryId::new(row.id),
            slug: row.slug,
            name: row.name,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryCountRow {
    id: i32,
    slug: String,
    name: String,
    product_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductImageRow {
    id: i32,
    product_id: i32,
    image: String,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog reads.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a product by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM product p WHERE p.id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Product::from))
    }

    /// Get the products with the given ids, ordered by id. Missing ids are
    /// simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self), fields(count = ids.len()))]
    pub async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM product p WHERE p.id = ANY($1) ORDER BY p.id");
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(ids.to_vec())
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Get a product by slug together with its category and images.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    /// Returns `RepositoryError::DataCorruption` if the product's category is missing.
    #[instrument(skip(self))]
    pub async fn get_product_detail(
        &self,
        slug: &str,
    ) -> Result<Option<ProductDetail>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM product p WHERE p.slug = $1");
        let Some(product) = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(slug)
            .fetch_optional(self.pool)
            .await?
            .map(Product::from)
        else {
            return Ok(None);
        };

        let category = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, slug, name FROM category WHERE id = $1",
        )
        .bind(product.category_id)
        .fetch_optional(self.pool)
        .await?
        .map(Category::from)
        .ok_or_else(|| {
            RepositoryError::DataCorruption(format!(
                "product {} references missing category {}",
                product.id, product.category_id
            ))
        })?;

        let images = sqlx::query_as::<_, ProductImageRow>(
            "SELECT id, product_id, image FROM product_image WHERE product_id = $1 ORDER BY id",
        )
        .bind(product.id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(|row| ProductImage {
            id: ProductImageId::new(row.id),
            product_id: ProductId::new(row.product_id),
            image: row.image,
        })
        .collect();

        Ok(Some(ProductDetail {
            product,
            category,
            images,
        }))
    }

    /// Resolve category slugs, in the order given.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if any slug is unknown.
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn categories_by_slugs(
        &self,
        slugs: &[String],
    ) -> Result<Vec<Category>, RepositoryError> {
        if slugs.is_empty() {
            return Ok(Vec::new());
        }

        let found: Vec<Category> = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, slug, name FROM category WHERE slug = ANY($1)",
        )
        .bind(slugs.to_vec())
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(Category::from)
        .collect();

        slugs
            .iter()
            .map(|slug| {
                found
                    .iter()
                    .find(|c| &c.slug == slug)
                    .cloned()
                    .ok_or(RepositoryError::NotFound)
            })
            .collect()
    }

    /// Categories with at least one product, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn categories_with_counts(&self) -> Result<Vec<CategoryWithCount>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryCountRow>(
            r"
            SELECT c.id, c.slug, c.name, COUNT(p.id) AS product_count
            FROM category c
            JOIN product p ON p.category_id = c.id
            GROUP BY c.id, c.slug, c.name
            HAVING COUNT(p.id) > 0
            ORDER BY c.name, c.id
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CategoryWithCount {
                category: Category {
                    id: CategoryId::new(row.id),
                    slug: row.slug,
                    name: row.name,
                },
                product_count: row.product_count,
            })
            .collect())
    }

    /// Facet attributes of every product in the category-filtered base set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn facet_records(
        &self,
        category_ids: &[CategoryId],
    ) -> Result<Vec<FacetRecord>, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT p.manufacturer, p.caliber, p.in_stock, p.on_discount FROM product p WHERE TRUE",
        );
        catalog::filter::push_category_clause(&mut qb, category_ids);

        Ok(qb
            .build_query_as::<FacetRecord>()
            .fetch_all(self.pool)
            .await?)
    }

    /// Run a catalog listing: filter, count, clamp the page, fetch it, and
    /// gather the sidebar data.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown category slug.
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self, query), fields(sort = query.sort.as_str()))]
    pub async fn list(&self, query: &CatalogQuery) -> Result<CatalogPage, RepositoryError> {
        let selected_categories = self.categories_by_slugs(&query.filter.categories).await?;
        let category_ids: Vec<CategoryId> = selected_categories.iter().map(|c| c.id).collect();

        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM product p");
        query.filter.push_where(&mut count_qb, &category_ids);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await?;

        let page = Page::clamp(query.page.as_deref(), total, PAGE_SIZE);

        let mut list_qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} FROM product p"));
        query.filter.push_where(&mut list_qb, &category_ids);
        list_qb
            .push(" ORDER BY ")
            .push(query.sort.order_by())
            .push(" LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let products = list_qb
            .build_query_as::<ProductRow>()
            .fetch_all(self.pool)
            .await?
            .into_iter()
            .map(Product::from)
            .collect();

        let facets = catalog::facets::compute(&self.facet_records(&category_ids).await?);
        let categories = self.categories_with_counts().await?;

        Ok(CatalogPage {
            products,
            page,
            sort: query.sort,
            search: query.filter.search.clone(),
            selected_categories,
            categories,
            facets,
        })
    }
}
