//! HTTP route handlers for the admin API.
//!
//! Everything under `/api` requires `Authorization: Bearer <ADMIN_API_TOKEN>`.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health
//! GET    /health/ready
//!
//! # Products
//! GET    /api/products                    - All statuses, ?status=&q=
//! POST   /api/products
//! GET    /api/products/{id}
//! PUT    /api/products/{id}
//! DELETE /api/products/{id}
//! PUT    /api/products/{id}/featured      - {featured, order?}
//!
//! # Featured placement
//! GET    /api/featured
//! PUT    /api/featured/order              - {product_ids: [...]}
//!
//! # Images
//! POST   /api/admin/images                - multipart `file`, returns {url}
//!
//! # Orders and enquiries
//! GET    /api/orders?limit=&offset=
//! GET    /api/orders/{id}
//! GET    /api/design-requests?limit=&offset=
//! PUT    /api/design-requests/{id}/status - {status}
//! ```

pub mod design_requests;
pub mod featured;
pub mod health;
pub mod images;
pub mod orders;
pub mod products;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};

use crate::state::AppState;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route(
            "/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::delete),
        )
        .route("/{id}/featured", put(products::set_featured))
}

/// Create the featured placement router.
pub fn featured_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(featured::index))
        .route("/order", put(featured::reorder))
}

/// Create the image upload router with a body limit sized for `max_upload_bytes`.
pub fn image_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new().route(
        "/",
        post(images::upload).layer(DefaultBodyLimit::max(
            max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
        )),
    )
}

/// Create the order history router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
}

/// Create the design request inbox router.
pub fn design_request_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(design_requests::index))
        .route("/{id}/status", put(design_requests::update_status))
}

/// Create all routes for admin.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    let api = Router::new()
        .nest("/products", product_routes())
        .nest("/featured", featured_routes())
        .nest("/admin/images", image_routes(max_upload_bytes))
        .nest("/orders", order_routes())
        .nest("/design-requests", design_request_routes());

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api)
}
