//! Cart and checkout state kept in the session.
//!
//! The cart is stored as JSON under [`keys::CART`]; the order awaiting
//! payment under [`keys::PENDING_ORDER_ID`].

use tower_sessions::Session;
use tower_sessions::session::Error as SessionError;
use tracing::warn;

use bulava_core::OrderReference;

use crate::models::Cart;
use crate::models::session::keys;

/// Load the cart from the session.
///
/// A cart that no longer deserializes is logged and treated as empty.
///
/// # Errors
///
/// Returns an error if the session store cannot be read.
pub async fn load_cart(session: &Session) -> Result<Cart, SessionError> {
    match session.get::<Cart>(keys::CART).await {
        Ok(cart) => Ok(cart.unwrap_or_default()),
        Err(SessionError::SerdeJson(e)) => {
            warn!(error = %e, "Discarding unreadable cart in session");
            Ok(Cart::default())
        }
        Err(e) => Err(e),
    }
}

/// Write the cart back into the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn save_cart(session: &Session, cart: &Cart) -> Result<(), SessionError> {
    session.insert(keys::CART, cart).await
}

/// Remove the cart from the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_cart(session: &Session) -> Result<(), SessionError> {
    session.remove_value(keys::CART).await?;
    Ok(())
}

/// Remember the order awaiting payment.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_pending_order(
    session: &Session,
    reference: &OrderReference,
) -> Result<(), SessionError> {
    session.insert(keys::PENDING_ORDER_ID, reference).await
}

/// The order awaiting payment, if any. Unparseable values are ignored.
///
/// # Errors
///
/// Returns an error if the session store cannot be read.
pub async fn pending_order(session: &Session) -> Result<Option<OrderReference>, SessionError> {
    let raw = match session.get::<String>(keys::PENDING_ORDER_ID).await {
        Ok(raw) => raw,
        Err(SessionError::SerdeJson(_)) => None,
        Err(e) => return Err(e),
    };
    Ok(raw.and_then(|r| OrderReference::parse(&r).ok()))
}

/// Forget the order awaiting payment.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn forget_pending_order(session: &Session) -> Result<(), SessionError> {
    session.remove_value(keys::PENDING_ORDER_ID).await?;
    Ok(())
}
