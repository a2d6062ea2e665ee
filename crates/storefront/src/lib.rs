//! Atelier Storefront library.
//!
//! This crate provides the public storefront API as a library, so the binary
//! and the integration tests build the exact same router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod content;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod search;
pub mod services;
pub mod state;

use axum::Router;
use tower_http::trace::TraceLayer;
use tower_sessions::SessionStore;

pub use routes::RateLimits;
pub use state::AppState;

/// Build the full storefront application: routes, sessions over `store`,
/// and the middleware stack.
pub fn app<S>(state: AppState, store: S, limits: RateLimits) -> Router
where
    S: SessionStore + Clone,
{
    let session_layer = middleware::create_session_layer(store, state.config());

    routes::routes(limits)
        .layer(session_layer)
        .with_state(state)
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
