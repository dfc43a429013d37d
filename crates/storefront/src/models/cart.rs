//! Session shopping cart.
//!
//! The cart is a plain value: handlers load it from the session, mutate it,
//! and write it back. Lines are keyed by the product id as a string and carry
//! the price the product had when it first entered the cart.
//!
//! Stored JSON shape:
//!
//! ```json
//! { "12": { "quantity": 2, "price": "1450.00" } }
//! ```

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bulava_core::ProductId;

use super::product::Product;

/// One product's quantity and price snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
}

impl CartLine {
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// A session cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: BTreeMap<String, CartLine>,
}

/// A cart line joined with its current catalog record.
#[derive(Debug, Clone, Serialize)]
pub struct CartItem {
    pub product: Product,
    pub quantity: u32,
    /// Snapshot price, not the current catalog price.
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl Cart {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `quantity` of `product`, or set the quantity when
    /// `override_quantity` is true.
    ///
    /// A product entering the cart for the first time snapshots its current
    /// effective price. Later calls never touch the snapshot.
    pub fn add(&mut self, product: &Product, quantity: u32, override_quantity: bool) {
        let line = self
            .lines
            .entry(product.id.to_string())
            .or_insert_with(|| CartLine {
                quantity: 0,
                price: product.effective_price(),
            });

        if override_quantity {
            line.quantity = quantity;
        } else {
            line.quantity = line.quantity.saturating_add(quantity);
        }
    }

    /// Remove a product's line. Returns whether a line was removed.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        self.lines.remove(&product_id.to_string()).is_some()
    }

    /// Set a line's quantity; zero or negative removes the line. Unknown ids
    /// are ignored.
    pub fn update_quantity(&mut self, product_id: ProductId, quantity: i64) {
        let key = product_id.to_string();
        if quantity <= 0 {
            self.lines.remove(&key);
        } else if let Some(line) = self.lines.get_mut(&key) {
            line.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        }
    }

    /// Total number of units across stored lines.
    ///
    /// Counts lines whose product has since been deleted, so it can exceed
    /// the quantity seen through [`Cart::items`].
    #[must_use]
    pub fn len(&self) -> u64 {
        self.lines.values().map(|line| u64::from(line.quantity)).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether at least one line is stored.
    #[must_use]
    pub fn has_products(&self) -> bool {
        !self.lines.is_empty()
    }

    /// Quantity stored for a product, if it is in the cart.
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> Option<u32> {
        self.lines
            .get(&product_id.to_string())
            .map(|line| line.quantity)
    }

    /// Product ids referenced by stored lines. Keys that are not valid ids
    /// are skipped.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.lines.keys().filter_map(|key| key.parse().ok()).collect()
    }

    /// Sum of snapshot price times quantity over every stored line.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.lines.values().map(CartLine::total).sum()
    }

    /// Lines whose product still exists, in the order `products` is given.
    #[must_use]
    pub fn items(&self, products: &[Product]) -> Vec<CartItem> {
        products
            .iter()
            .filter_map(|product| {
                let line = self.lines.get(&product.id.to_string())?;
                Some(CartItem {
                    product: product.clone(),
                    quantity: line.quantity,
                    unit_price: line.price,
                    line_total: line.total(),
                })
            })
            .collect()
    }

    /// Sum of each existing product's current catalog price times quantity.
    #[must_use]
    pub fn subtotal(&self, products: &[Product]) -> Decimal {
        products
            .iter()
            .filter_map(|product| {
                let line = self.lines.get(&product.id.to_string())?;
                Some(product.price * Decimal::from(line.quantity))
            })
            .sum()
    }

    /// `subtotal - total_price`. Negative when catalog prices dropped below
    /// the snapshot.
    #[must_use]
    pub fn discount(&self, products: &[Product]) -> Decimal {
        self.subtotal(products) - self.total_price()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::product::fixtures::product;

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn test_add_snapshots_effective_price() {
        let mut p = product(1, dec(100));
        p.discount_price = Some(dec(80));
        p.on_discount = true;

        let mut cart = Cart::new();
        cart.add(&p, 2, false);

        // Later catalog changes never reach the snapshot.
        p.on_discount = false;
        p.price = dec(150);
        cart.add(&p, 1, false);

        assert_eq!(cart.quantity_of(p.id), Some(3));
        assert_eq!(cart.total_price(), dec(240));
    }

    #[test]
    fn test_add_override_sets_quantity() {
        let p = product(1, dec(10));
        let mut cart = Cart::new();
        cart.add(&p, 5, false);
        cart.add(&p, 2, true);
        assert_eq!(cart.quantity_of(p.id), Some(2));
    }

    #[test]
    fn test_add_then_remove_restores_cart() {
        let a = product(1, dec(10));
        let b = product(2, dec(20));
        let mut cart = Cart::new();
        cart.add(&a, 1, false);
        let before = cart.clone();

        cart.add(&b, 3, false);
        assert!(cart.remove(b.id));
        assert_eq!(cart, before);
        assert!(!cart.remove(b.id));
    }

    #[test]
    fn test_update_quantity_non_positive_removes() {
        let p = product(1, dec(10));
        for qty in [0, -1, i64::MIN] {
            let mut cart = Cart::new();
            cart.add(&p, 4, false);
            cart.update_quantity(p.id, qty);
            assert!(!cart.has_products(), "quantity {qty} should remove");
        }
    }

    #[test]
    fn test_update_quantity_positive_keeps_line() {
        let p = product(1, dec(10));
        let mut cart = Cart::new();
        cart.add(&p, 4, false);
        cart.update_quantity(p.id, 7);
        assert_eq!(cart.quantity_of(p.id), Some(7));
    }

    #[test]
    fn test_update_quantity_absent_is_noop() {
        let mut cart = Cart::new();
        cart.update_quantity(ProductId::new(9), 3);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_snapshot_total_and_live_subtotal() {
        let mut a = product(1, dec(100));
        let mut b = product(2, dec(50));
        let mut cart = Cart::new();
        cart.add(&a, 2, false);
        cart.add(&b, 1, false);

        a.price = dec(120);
        b.price = dec(40);
        let catalog = vec![a, b];

        assert_eq!(cart.total_price(), dec(250));
        assert_eq!(cart.subtotal(&catalog), dec(280));
        assert_eq!(cart.discount(&catalog), dec(30));
    }

    #[test]
    fn test_discount_can_go_negative() {
        let mut p = product(1, dec(100));
        let mut cart = Cart::new();
        cart.add(&p, 1, false);
        p.price = dec(90);
        assert_eq!(cart.discount(&[p]), dec(-10));
    }

    #[test]
    fn test_len_counts_deleted_products_items_skip_them() {
        let a = product(1, dec(10));
        let b = product(2, dec(20));
        let mut cart = Cart::new();
        cart.add(&a, 2, false);
        cart.add(&b, 3, false);

        // Product b was deleted from the catalog.
        let items = cart.items(std::slice::from_ref(&a));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].line_total, dec(20));
        assert_eq!(cart.len(), 5);
    }

    #[test]
    fn test_session_json_shape() {
        let p = product(12, Decimal::new(145_000, 2));
        let mut cart = Cart::new();
        cart.add(&p, 2, false);

        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "12": { "quantity": 2, "price": "1450.00" } })
        );

        let back: Cart = serde_json::from_value(json).unwrap();
        assert_eq!(back, cart);
    }

    #[test]
    fn test_product_ids_skip_bad_keys() {
        let cart: Cart =
            serde_json::from_str(r#"{"3": {"quantity": 1, "price": "5"}, "x": {"quantity": 1, "price": "5"}}"#)
                .unwrap();
        assert_eq!(cart.product_ids(), vec![ProductId::new(3)]);
        assert_eq!(cart.len(), 2);
    }
}
