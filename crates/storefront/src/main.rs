//! Atelier Storefront - public jewelry shop API.
//!
//! This binary serves the public-facing storefront on port 3000.
//!
//! # Architecture
//!
//! - Axum JSON API consumed by the client-rendered shop
//! - `PostgreSQL` for the catalog, orders and design requests
//! - `tower-sessions` (`PostgreSQL` store) for carts and checkout drafts
//! - Stripe-compatible payment gateway for payment intents
//! - Tantivy in-memory index for search, rebuilt in the background
//!
//! # Security
//!
//! This binary only has access to:
//! - The public payment gateway endpoints it needs (create/read intents)
//! - The shared `PostgreSQL` database (`atelier` schema)
//!
//! It does NOT expose:
//! - Product editing, featured placement or image upload (admin binary)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;
use std::time::Duration;

use sentry::integrations::tracing as sentry_tracing;
use tower_sessions::session_store::ExpiredDeletion;
use tower_sessions_sqlx_store::PostgresStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atelier_db::Repositories;
use atelier_storefront::config::StorefrontConfig;
use atelier_storefront::content::ContentStore;
use atelier_storefront::search::spawn_index_refresh;
use atelier_storefront::services::HttpPaymentGateway;
use atelier_storefront::{AppState, RateLimits};

/// How often expired sessions are purged.
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "atelier_storefront=info,atelier_db=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let pool = atelier_db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p atelier-cli -- migrate

    let payments =
        HttpPaymentGateway::new(&config.payment).expect("Failed to create payment gateway client");

    let content = ContentStore::load(&config.content_dir).expect("Failed to load content pages");
    tracing::info!(pages = content.len(), "Content pages loaded");

    let state = AppState::new(
        config.clone(),
        Some(pool.clone()),
        Repositories::postgres(pool.clone()),
        Arc::new(payments),
        content,
    );

    // Build the search index in the background; search answers `ready=false`
    // until the first build lands.
    spawn_index_refresh(
        state.search().clone(),
        state.catalog().clone(),
        state.content().clone(),
        config.search_refresh_interval,
    );

    let session_store = PostgresStore::new(pool);
    spawn_session_cleanup(session_store.clone());

    let app = atelier_storefront::app(state, session_store, RateLimits::Enabled);

    let addr = config.socket_addr();
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Periodically delete expired sessions.
fn spawn_session_cleanup(store: PostgresStore) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = store.delete_expired().await {
                tracing::warn!(error = %e, "Failed to delete expired sessions");
            }
        }
    });
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
