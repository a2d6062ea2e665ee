//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use atelier_core::pricing::PricingPolicy;
use atelier_db::Repositories;

use crate::config::StorefrontConfig;
use crate::content::ContentStore;
use crate::search::SearchIndex;
use crate::services::{CatalogService, PaymentGateway};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like repositories, the payment gateway and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: Option<PgPool>,
    repos: Repositories,
    catalog: CatalogService,
    payments: Arc<dyn PaymentGateway>,
    search: SearchIndex,
    content: ContentStore,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` pool, `None` when running on in-memory repositories
    /// * `repos` - Product, order and design request repositories
    /// * `payments` - Payment gateway client
    /// * `content` - Loaded content pages
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        pool: Option<PgPool>,
        repos: Repositories,
        payments: Arc<dyn PaymentGateway>,
        content: ContentStore,
    ) -> Self {
        let catalog = CatalogService::new(repos.products.clone(), config.catalog_cache_ttl);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                repos,
                catalog,
                payments,
                search: SearchIndex::new(),
                content,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool, if any.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    /// Get a reference to the repositories.
    #[must_use]
    pub fn repos(&self) -> &Repositories {
        &self.inner.repos
    }

    /// Get a reference to the cached catalog.
    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    /// Get a reference to the payment gateway.
    #[must_use]
    pub fn payments(&self) -> &dyn PaymentGateway {
        self.inner.payments.as_ref()
    }

    /// Get a reference to the search index.
    #[must_use]
    pub fn search(&self) -> &SearchIndex {
        &self.inner.search
    }

    /// Get a reference to the content pages.
    #[must_use]
    pub fn content(&self) -> &ContentStore {
        &self.inner.content
    }

    /// Get a reference to the pricing policy.
    #[must_use]
    pub fn pricing(&self) -> &PricingPolicy {
        &self.inner.config.pricing
    }
}
