//! Catalog records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use bulava_core::{CategoryId, ProductId, ProductImageId, ProductType};

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub slug: String,
    pub name: String,
}

/// A category together with the number of products in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryWithCount {
    #[serde(flatten)]
    pub category: Category,
    pub product_count: i64,
}

/// A product as sold in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub product_type: ProductType,
    pub category_id: CategoryId,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    pub on_discount: bool,
    pub in_stock: bool,
    pub manufacturer: Option<String>,
    pub caliber: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub material: Option<String>,
    pub main_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// The price a buyer pays right now.
    ///
    /// The discount price only applies while the discount flag is set and
    /// the discount price is non-zero.
    #[must_use]
    pub fn effective_price(&self) -> Decimal {
        match self.discount_price {
            Some(discount) if self.on_discount && !discount.is_zero() => discount,
            _ => self.price,
        }
    }
}

/// An additional product photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductImage {
    pub id: ProductImageId,
    pub product_id: ProductId,
    pub image: String,
}

/// Everything the product detail endpoint returns.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    pub product: Product,
    pub category: Category,
    pub images: Vec<ProductImage>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A plain in-stock product with the given id and price.
    pub fn product(id: i32, price: Decimal) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            slug: format!("product-{id}"),
            name: format!("Product {id}"),
            description: String::new(),
            product_type: ProductType::Accessory,
            category_id: CategoryId::new(1),
            price,
            discount_price: None,
            on_discount: false,
            in_stock: true,
            manufacturer: None,
            caliber: None,
            color: None,
            size: None,
            material: None,
            main_image: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::product;
    use super::*;

    #[test]
    fn test_effective_price_requires_flag() {
        let mut p = product(1, Decimal::from(100));
        p.discount_price = Some(Decimal::from(80));
        assert_eq!(p.effective_price(), Decimal::from(100));

        p.on_discount = true;
        assert_eq!(p.effective_price(), Decimal::from(80));
    }

    #[test]
    fn test_flag_without_discount_price_uses_price() {
        let mut p = product(1, Decimal::from(100));
        p.on_discount = true;
        assert_eq!(p.effective_price(), Decimal::from(100));
    }
}
