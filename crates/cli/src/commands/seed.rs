//! Seed the catalog and customer accounts from YAML fixtures.
//!
//! Categories and products are upserted by slug, so re-running the same file
//! updates rows in place. A product's gallery images are replaced on every run.
//!
//! ```yaml
//! categories:
//!   - slug: rifles
//!     name: Rifles
//! products:
//!   - slug: ar-15-carbine
//!     name: AR-15 Carbine
//!     product_type: weapon
//!     category: rifles
//!     price: "42000.00"
//!     discount_price: "39900.00"
//!     on_discount: true
//!     manufacturer: Colt
//!     caliber: "5.56x45"
//!     images:
//!       - products/ar15-side.jpg
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use bulava_core::{Email, Phone, ProductType};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info, warn};

use bulava_storefront::db::{self, RepositoryError, UserRepository};
use bulava_storefront::models::NewUser;

/// Top-level fixture file.
#[derive(Debug, Deserialize)]
pub struct CatalogFixture {
    #[serde(default)]
    pub categories: Vec<CategoryFixture>,
    #[serde(default)]
    pub products: Vec<ProductFixture>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryFixture {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ProductFixture {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_product_type")]
    pub product_type: ProductType,
    /// Category slug.
    pub category: String,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    #[serde(default)]
    pub on_discount: bool,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
    pub manufacturer: Option<String>,
    pub caliber: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub material: Option<String>,
    pub main_image: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

const fn default_product_type() -> ProductType {
    ProductType::Other
}

const fn default_in_stock() -> bool {
    true
}

/// Customer accounts fixture.
///
/// ```yaml
/// users:
///   - email: buyer@example.com
///     phone: "+380501234567"
///     city: Kyiv
/// ```
#[derive(Debug, Deserialize)]
pub struct UsersFixture {
    #[serde(default)]
    pub users: Vec<UserFixture>,
}

#[derive(Debug, Deserialize)]
pub struct UserFixture {
    pub email: String,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
}

/// Validate every account, collecting one message per bad field.
///
/// # Errors
///
/// Returns the messages if any account is invalid.
pub fn validate_users(fixture: UsersFixture) -> Result<Vec<NewUser>, Vec<String>> {
    let mut errors = Vec::new();
    let mut emails = HashSet::new();
    let mut users = Vec::with_capacity(fixture.users.len());

    for user in fixture.users {
        let email = match Email::parse(&user.email) {
            Ok(email) => email,
            Err(e) => {
                errors.push(format!("user '{}': {e}", user.email));
                continue;
            }
        };
        if !emails.insert(email.as_str().to_owned()) {
            errors.push(format!("duplicate user email '{email}'"));
        }
        let phone = match user.phone.as_deref().map(Phone::parse).transpose() {
            Ok(phone) => phone,
            Err(e) => {
                errors.push(format!("user '{email}': {e}"));
                continue;
            }
        };

        users.push(NewUser {
            email,
            phone,
            avatar: user.avatar,
            date_of_birth: user.date_of_birth,
            address: user.address,
            city: user.city,
            postal_code: user.postal_code,
        });
    }

    if errors.is_empty() { Ok(users) } else { Err(errors) }
}

/// Check a fixture before touching the database.
///
/// Returns one message per problem; an empty list means the fixture is valid.
#[must_use]
pub fn validate_catalog(fixture: &CatalogFixture) -> Vec<String> {
    let mut errors = Vec::new();

    let mut category_slugs = HashSet::new();
    for category in &fixture.categories {
        if category.slug.trim().is_empty() {
            errors.push(format!("category '{}' has an empty slug", category.name));
        }
        if !category_slugs.insert(category.slug.as_str()) {
            errors.push(format!("duplicate category slug '{}'", category.slug));
        }
    }

    let mut product_slugs = HashSet::new();
    for product in &fixture.products {
        if product.slug.trim().is_empty() {
            errors.push(format!("product '{}' has an empty slug", product.name));
        }
        if !product_slugs.insert(product.slug.as_str()) {
            errors.push(format!("duplicate product slug '{}'", product.slug));
        }
        if !category_slugs.contains(product.category.as_str()) {
            errors.push(format!(
                "product '{}' references unknown category '{}'",
                product.slug, product.category
            ));
        }
        if product.price.is_sign_negative() {
            errors.push(format!("product '{}' has a negative price", product.slug));
        }
        if product.discount_price.is_some_and(|p| p.is_sign_negative()) {
            errors.push(format!("product '{}' has a negative discount price", product.slug));
        }
        if product.on_discount && product.discount_price.is_none() {
            errors.push(format!(
                "product '{}' is on discount but has no discount_price",
                product.slug
            ));
        }
    }

    errors
}

/// Seed categories and products from `file_path`.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the file cannot be read
/// or parsed, validation fails, or a database statement fails.
pub async fn catalog(file_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url().ok_or("STOREFRONT_DATABASE_URL not set")?;

    info!(path = %file_path.display(), "Loading catalog fixture");
    let content = tokio::fs::read_to_string(file_path).await?;
    let fixture: CatalogFixture = serde_yaml::from_str(&content)?;
    info!(
        categories = fixture.categories.len(),
        products = fixture.products.len(),
        "Parsed fixture"
    );

    let errors = validate_catalog(&fixture);
    if !errors.is_empty() {
        error!("Fixture validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = db::create_pool(&database_url).await?;
    let mut tx = pool.begin().await?;

    let mut category_ids: HashMap<&str, i32> = HashMap::new();
    for category in &fixture.categories {
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO category (slug, name)
            VALUES ($1, $2)
            ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            ",
        )
        .bind(&category.slug)
        .bind(&category.name)
        .fetch_one(&mut *tx)
        .await?;
        category_ids.insert(category.slug.as_str(), id);
    }

    for product in &fixture.products {
        let category_id = category_ids
            .get(product.category.as_str())
            .copied()
            .ok_or_else(|| format!("unknown category '{}'", product.category))?;

        let product_id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO product (
                slug, name, description, product_type, category_id, price,
                discount_price, on_discount, in_stock, manufacturer, caliber,
                color, size, material, main_image
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (slug) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                product_type = EXCLUDED.product_type,
                category_id = EXCLUDED.category_id,
                price = EXCLUDED.price,
                discount_price = EXCLUDED.discount_price,
                on_discount = EXCLUDED.on_discount,
                in_stock = EXCLUDED.in_stock,
                manufacturer = EXCLUDED.manufacturer,
                caliber = EXCLUDED.caliber,
                color = EXCLUDED.color,
                size = EXCLUDED.size,
                material = EXCLUDED.material,
                main_image = EXCLUDED.main_image,
                updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(&product.slug)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.product_type)
        .bind(category_id)
        .bind(product.price)
        .bind(product.discount_price)
        .bind(product.on_discount)
        .bind(product.in_stock)
        .bind(&product.manufacturer)
        .bind(&product.caliber)
        .bind(&product.color)
        .bind(&product.size)
        .bind(&product.material)
        .bind(&product.main_image)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM product_image WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        for image in &product.images {
            sqlx::query("INSERT INTO product_image (product_id, image) VALUES ($1, $2)")
                .bind(product_id)
                .bind(image)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await?;

    info!("Seeding complete!");
    info!("  Categories upserted: {}", fixture.categories.len());
    info!("  Products upserted: {}", fixture.products.len());
    Ok(())
}

/// Create customer accounts from `file_path`. Emails that already exist are
/// skipped.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the file cannot be read
/// or parsed, validation fails, or a database statement fails.
pub async fn users(file_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url().ok_or("STOREFRONT_DATABASE_URL not set")?;

    info!(path = %file_path.display(), "Loading users fixture");
    let content = tokio::fs::read_to_string(file_path).await?;
    let fixture: UsersFixture = serde_yaml::from_str(&content)?;

    let users = validate_users(fixture).map_err(|errors| {
        error!("Fixture validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        format!("{} validation errors found", errors.len())
    })?;

    let pool = db::create_pool(&database_url).await?;
    let repo = UserRepository::new(&pool);

    let mut created = 0;
    for user in &users {
        match repo.create(user).await {
            Ok(_) => created += 1,
            Err(RepositoryError::Conflict(_)) => {
                warn!(email = %user.email, "User already exists; skipping");
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!("Seeding complete!");
    info!("  Users created: {created}");
    info!("  Users skipped: {}", users.len() - created);
    Ok(())
}
