//! Session-related types.
//!
//! The visitor's cart and checkout draft live in the session as JSON.

use tower_sessions::Session;

use atelier_core::cart::Cart;
use atelier_core::checkout::CheckoutDraft;

/// Session keys for visitor state.
pub mod keys {
    /// Key for the visitor's cart.
    pub const CART: &str = "cart";

    /// Key for the checkout draft in progress.
    pub const CHECKOUT_DRAFT: &str = "checkout_draft";

    /// Key for the payment intent of the last order placed in this session.
    pub const PLACED_INTENT: &str = "placed_payment_intent";
}

/// The visitor's cart, empty when none is stored.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn load_cart(session: &Session) -> Result<Cart, tower_sessions::session::Error> {
    Ok(session.get::<Cart>(keys::CART).await?.unwrap_or_default())
}

/// Store the visitor's cart.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn save_cart(session: &Session, cart: &Cart) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::CART, cart).await
}

/// The checkout draft, if one was started.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn load_draft(
    session: &Session,
) -> Result<Option<CheckoutDraft>, tower_sessions::session::Error> {
    session.get::<CheckoutDraft>(keys::CHECKOUT_DRAFT).await
}

/// Store the checkout draft.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn save_draft(
    session: &Session,
    draft: &CheckoutDraft,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::CHECKOUT_DRAFT, draft).await
}

/// Drop the checkout draft.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn clear_draft(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<serde_json::Value>(keys::CHECKOUT_DRAFT)
        .await
        .map(|_| ())
}

/// Payment intent of the last order placed in this session.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn load_placed_intent(
    session: &Session,
) -> Result<Option<String>, tower_sessions::session::Error> {
    session.get::<String>(keys::PLACED_INTENT).await
}

/// Remember the payment intent of an order just placed.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn save_placed_intent(
    session: &Session,
    payment_intent_id: &str,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::PLACED_INTENT, payment_intent_id).await
}
