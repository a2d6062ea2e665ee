//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                         - Liveness
//! GET    /health/ready                   - Readiness (database)
//!
//! # Catalog
//! GET    /api/products                   - Browse (filters, sort, paging)
//! GET    /api/products/featured          - Featured pieces
//! GET    /api/products/{slug}            - Product detail
//!
//! # Search
//! GET    /api/search                     - Products and pages
//! GET    /api/search/suggest             - Search-as-you-type
//!
//! # Content
//! GET    /api/pages                      - Page list
//! GET    /api/pages/{slug}               - Rendered page
//! POST   /api/custom-design              - Design request form (form limiter)
//!
//! # Cart (api limiter)
//! GET    /api/cart
//! DELETE /api/cart
//! POST   /api/cart/items
//! PATCH  /api/cart/items/{product_id}
//! DELETE /api/cart/items/{product_id}?size=
//!
//! # Checkout (api limiter; payment and order use the form limiter)
//! GET    /api/checkout                   - Draft and totals
//! PATCH  /api/checkout                   - Merge field changes
//! DELETE /api/checkout                   - Abandon
//! POST   /api/checkout/next
//! POST   /api/checkout/back
//! POST   /api/checkout/step/{step}
//! GET    /api/checkout/shipping-methods
//! POST   /api/checkout/payment-intent
//! POST   /api/checkout/process-order
//! ```

pub mod cart;
pub mod checkout;
pub mod custom_design;
pub mod health;
pub mod pages;
pub mod products;
pub mod search;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::middleware::{api_rate_limiter, form_rate_limiter};
use crate::state::AppState;

/// Whether rate limiters are attached.
///
/// Limiters key on the client IP from proxy headers, so in-process test
/// requests run without them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimits {
    Enabled,
    Disabled,
}

fn limited(router: Router<AppState>, limits: RateLimits, form: bool) -> Router<AppState> {
    match (limits, form) {
        (RateLimits::Disabled, _) => router,
        (RateLimits::Enabled, true) => router.layer(form_rate_limiter()),
        (RateLimits::Enabled, false) => router.layer(api_rate_limiter()),
    }
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/featured", get(products::featured))
        .route("/{slug}", get(products::show))
}

/// Create the search routes router.
pub fn search_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(search::search))
        .route("/suggest", get(search::suggest))
}

/// Create the content page routes router.
pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::index))
        .route("/{slug}", get(pages::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add))
        .route(
            "/items/{product_id}",
            patch(cart::update).delete(cart::remove),
        )
}

/// Create the checkout wizard routes router (everything except payment and
/// order submission).
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(checkout::show)
                .patch(checkout::update)
                .delete(checkout::abandon),
        )
        .route("/next", post(checkout::next))
        .route("/back", post(checkout::back))
        .route("/step/{step}", post(checkout::go_to))
        .route("/shipping-methods", get(checkout::shipping_methods))
}

/// Create the checkout routes that reach the payment gateway or write orders.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/payment-intent", post(checkout::create_payment_intent))
        .route("/process-order", post(checkout::process_order))
}

/// Create the design request form router.
pub fn custom_design_routes() -> Router<AppState> {
    Router::new().route("/", post(custom_design::submit))
}

/// Create all routes for the storefront.
pub fn routes(limits: RateLimits) -> Router<AppState> {
    let checkout = limited(checkout_routes(), limits, false)
        .merge(limited(payment_routes(), limits, true));

    let api = Router::new()
        .nest("/products", product_routes())
        .nest("/search", search_routes())
        .nest("/pages", page_routes())
        .nest("/cart", limited(cart_routes(), limits, false))
        .nest("/checkout", checkout)
        .nest("/custom-design", limited(custom_design_routes(), limits, true));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api)
}
