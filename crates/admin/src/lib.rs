//! Atelier Admin library.
//!
//! This crate provides the catalog admin API as a library, so the binary and
//! the integration tests build the exact same router.
//!
//! # Security
//!
//! The admin API can edit the whole catalog and read every order. Bind it to
//! a private interface and keep `ADMIN_API_TOKEN` out of the browser bundle
//! of the public shop.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

pub use state::AppState;

/// Build the full admin application: routes, upload serving and the
/// middleware stack.
pub fn app(state: AppState) -> Router {
    let config = state.config();
    let mut router = routes::routes(config.max_upload_bytes);

    // Serve uploads ourselves unless images live on another host
    if config.image_base_url.starts_with('/') {
        router = router.nest_service(
            &config.image_base_url,
            ServeDir::new(&config.upload_dir),
        );
    }

    middleware::with_security_headers(router)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
