//! Checkout orchestration.
//!
//! Turns the session cart into a `pending` order, asks the active payment
//! provider how to collect payment, and remembers the order in the session
//! so the customer's return can be matched to it.

use rust_decimal::Decimal;
use thiserror::Error;
use tower_sessions::Session;
use tracing::{info, instrument};

use bulava_core::{ContactError, Email, OrderReference, Phone};

use crate::db::{CatalogRepository, OrderRepository, RepositoryError};
use crate::models::{Cart, NewOrder, NewOrderItem, Order, Product};
use crate::payments::{CheckoutRequest, PaymentError, PaymentProvider, PaymentRequest};
use crate::services::cart;
use crate::state::AppState;

/// Largest amount an order column holds (`NUMERIC(10,2)`).
/// Equal to `Decimal::new(9_999_999_999, 2)` (99,999,999.99); `new` is not `const`.
pub const MAX_ORDER_AMOUNT: Decimal = Decimal::from_parts(0x540B_E3FF, 0x2, 0, false, 2);

/// Errors that can occur while starting a checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing purchasable in the cart.
    #[error("cart is empty")]
    EmptyCart,

    /// A cart line's quantity does not fit an order item.
    #[error("quantity {0} is too large")]
    QuantityTooLarge(u32),

    /// The order amounts do not fit the order columns.
    #[error("order total {0} is too large")]
    TotalTooLarge(Decimal),

    /// Email or phone failed validation.
    #[error("invalid contact details: {0}")]
    Contact(#[from] ContactError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

/// Optional customer contact details collected at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutContact {
    pub email: Option<Email>,
    pub phone: Option<Phone>,
}

impl CheckoutContact {
    /// Validate raw query values. Blank values count as absent.
    ///
    /// # Errors
    ///
    /// Returns `ContactError` if a present value is invalid.
    pub fn parse(email: Option<&str>, phone: Option<&str>) -> Result<Self, ContactError> {
        fn present(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|v| !v.is_empty())
        }

        Ok(Self {
            email: present(email).map(Email::parse).transpose()?,
            phone: present(phone).map(Phone::parse).transpose()?,
        })
    }
}

/// A started checkout.
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub order: Order,
    pub payment: PaymentRequest,
}

/// Build the order to insert for a cart.
///
/// Only lines whose product still exists become order items, at their
/// snapshot price. `total` is the sum of those lines; `subtotal` is the
/// current catalog subtotal, lifted to `total` when catalog prices have
/// dropped below the snapshot so that `discount` never goes negative.
///
/// # Errors
///
/// Returns `CheckoutError::EmptyCart` if no line resolves to a product, and
/// `CheckoutError::TotalTooLarge` if the amounts exceed `MAX_ORDER_AMOUNT`.
pub fn prepare_order(
    cart: &Cart,
    products: &[Product],
    reference: OrderReference,
    payment_provider: &'static str,
    contact: CheckoutContact,
) -> Result<NewOrder, CheckoutError> {
    let items = cart
        .items(products)
        .into_iter()
        .map(|item| {
            Ok(NewOrderItem {
                product_id: item.product.id,
                product_name: item.product.name,
                quantity: i32::try_from(item.quantity)
                    .map_err(|_| CheckoutError::QuantityTooLarge(item.quantity))?,
                unit_price: item.unit_price,
            })
        })
        .collect::<Result<Vec<_>, CheckoutError>>()?;

    if items.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let total: Decimal = items.iter().map(NewOrderItem::line_total).sum();
    let subtotal = cart.subtotal(products).max(total);
    if subtotal > MAX_ORDER_AMOUNT {
        return Err(CheckoutError::TotalTooLarge(subtotal));
    }

    Ok(NewOrder {
        order_id: reference,
        payment_provider,
        email: contact.email,
        phone: contact.phone,
        subtotal,
        discount: subtotal - total,
        total,
        items,
    })
}

/// Start a checkout for the session's cart.
///
/// An empty cart is rejected before any database access. On success the
/// order reference is stored in the session as the pending order.
///
/// # Errors
///
/// Returns `CheckoutError::EmptyCart` if nothing in the cart can be bought,
/// or the underlying repository, provider or session error.
#[instrument(skip(state, session, contact))]
pub async fn initiate(
    state: &AppState,
    session: &Session,
    contact: CheckoutContact,
) -> Result<CheckoutOutcome, CheckoutError> {
    let cart = cart::load_cart(session).await?;
    if !cart.has_products() {
        return Err(CheckoutError::EmptyCart);
    }

    let products = CatalogRepository::new(state.pool())
        .get_products(&cart.product_ids())
        .await?;

    let payments = state.payments();
    let customer_email = contact.email.as_ref().map(|e| e.as_str().to_owned());
    let new_order = prepare_order(
        &cart,
        &products,
        OrderReference::generate(),
        payments.name(),
        contact,
    )?;

    let orders = OrderRepository::new(state.pool());
    let order = orders.create(&new_order).await?;
    info!(order_id = %order.order_id, total = %order.total, provider = payments.name(), "Order created");

    let config = state.config();
    let request = CheckoutRequest {
        reference: order.order_id.clone(),
        total: order.total,
        items: new_order.items,
        customer_email,
        result_url: config.absolute_url("/payments/result"),
        cancel_url: config.absolute_url("/payments/cancel"),
        callback_url: config.absolute_url("/payments/callback"),
    };
    let payment = payments.build_payment_request(&request).await?;

    if let PaymentRequest::Redirect { session_id, .. } = &payment {
        orders.set_provider_session(order.id, session_id).await?;
    }

    cart::set_pending_order(session, &order.order_id).await?;

    Ok(CheckoutOutcome { order, payment })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::product::fixtures::product;

    fn reference() -> OrderReference {
        OrderReference::parse("ORDER-0A1B2C3D4E5F").unwrap()
    }

    #[test]
    fn test_contact_parse() {
        let contact = CheckoutContact::parse(Some(" buyer@example.com "), Some("")).unwrap();
        assert_eq!(contact.email.unwrap().as_str(), "buyer@example.com");
        assert!(contact.phone.is_none());

        assert!(CheckoutContact::parse(Some("not-an-email"), None).is_err());
        assert_eq!(CheckoutContact::parse(None, None).unwrap(), CheckoutContact::default());
    }

    #[test]
    fn test_prepare_order_uses_snapshot_prices() {
        let mut cart = Cart::new();
        let a = product(1, Decimal::new(100, 0));
        let b = product(2, Decimal::new(50, 0));
        cart.add(&a, 2, false);
        cart.add(&b, 1, false);

        let order = prepare_order(&cart, &[a, b], reference(), "liqpay", CheckoutContact::default())
            .unwrap();

        assert_eq!(order.items.len(), 2);
        assert_eq!(order.total, Decimal::new(250, 0));
        assert_eq!(order.subtotal, Decimal::new(250, 0));
        assert_eq!(order.discount, Decimal::ZERO);
        assert_eq!(order.payment_provider, "liqpay");
    }

    #[test]
    fn test_prepare_order_records_discount() {
        let mut cart = Cart::new();
        let mut discounted = product(1, Decimal::new(100, 0));
        discounted.on_discount = true;
        discounted.discount_price = Some(Decimal::new(80, 0));
        cart.add(&discounted, 2, false);

        let order =
            prepare_order(&cart, &[discounted], reference(), "stripe", CheckoutContact::default())
                .unwrap();

        assert_eq!(order.subtotal, Decimal::new(200, 0));
        assert_eq!(order.total, Decimal::new(160, 0));
        assert_eq!(order.discount, Decimal::new(40, 0));
        assert_eq!(order.items[0].unit_price, Decimal::new(80, 0));
    }

    #[test]
    fn test_prepare_order_lifts_subtotal_after_price_drop() {
        let mut cart = Cart::new();
        cart.add(&product(1, Decimal::new(100, 0)), 1, false);
        let cheaper = product(1, Decimal::new(90, 0));

        let order = prepare_order(&cart, &[cheaper], reference(), "liqpay", CheckoutContact::default())
            .unwrap();

        assert_eq!(order.total, Decimal::new(100, 0));
        assert_eq!(order.subtotal, Decimal::new(100, 0));
        assert_eq!(order.discount, Decimal::ZERO);
    }

    #[test]
    fn test_prepare_order_skips_deleted_products() {
        let mut cart = Cart::new();
        let kept = product(1, Decimal::new(10, 0));
        cart.add(&kept, 1, false);
        cart.add(&product(2, Decimal::new(20, 0)), 1, false);

        let order =
            prepare_order(&cart, &[kept], reference(), "liqpay", CheckoutContact::default()).unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.total, Decimal::new(10, 0));
    }

    #[test]
    fn test_prepare_order_empty_when_nothing_resolves() {
        let mut cart = Cart::new();
        cart.add(&product(1, Decimal::ONE), 1, false);

        let result = prepare_order(&cart, &[], reference(), "liqpay", CheckoutContact::default());
        assert!(matches!(result, Err(CheckoutError::EmptyCart)));

        let result =
            prepare_order(&Cart::new(), &[], reference(), "liqpay", CheckoutContact::default());
        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    }

    #[test]
    fn test_max_order_amount() {
        assert_eq!(MAX_ORDER_AMOUNT, "99999999.99".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_prepare_order_rejects_total_beyond_column() {
        let mut cart = Cart::new();
        let expensive = product(1, Decimal::new(100, 0));
        cart.add(&expensive, 2_000_000, false);

        let result =
            prepare_order(&cart, &[expensive], reference(), "liqpay", CheckoutContact::default());
        assert!(matches!(
            result,
            Err(CheckoutError::TotalTooLarge(total)) if total == Decimal::new(200_000_000, 0)
        ));
    }

    #[test]
    fn test_prepare_order_accepts_total_at_column_limit() {
        let mut cart = Cart::new();
        let item = product(1, MAX_ORDER_AMOUNT);
        cart.add(&item, 1, false);

        let order =
            prepare_order(&cart, &[item], reference(), "liqpay", CheckoutContact::default()).unwrap();
        assert_eq!(order.total, MAX_ORDER_AMOUNT);
    }
}
