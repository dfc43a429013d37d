//! Orders and their line items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use bulava_core::{Email, OrderId, OrderItemId, OrderReference, OrderStatus, Phone, ProductId};

/// A persisted order.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    /// Public reference sent to the payment provider.
    pub order_id: OrderReference,
    pub payment_provider: String,
    pub provider_session_id: Option<String>,
    pub provider_payment_id: Option<String>,
    pub provider_order_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A frozen copy of one cart line at order creation.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    /// `None` once the product has been deleted from the catalog.
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Input for creating an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderReference,
    pub payment_provider: &'static str,
    pub email: Option<Email>,
    pub phone: Option<Phone>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub items: Vec<NewOrderItem>,
}

/// Input for one order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl NewOrderItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// An order with its items, as returned by the payment result endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// How a provider event identifies the order it is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderLookup {
    /// Our public reference, echoed back by the provider. Kept as received;
    /// a malformed reference simply matches no order.
    Reference(String),
    /// The provider's payment id recorded on an earlier event.
    ProviderPaymentId(String),
}

impl std::fmt::Display for OrderLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reference(reference) => write!(f, "order {reference}"),
            Self::ProviderPaymentId(id) => write!(f, "payment {id}"),
        }
    }
}
