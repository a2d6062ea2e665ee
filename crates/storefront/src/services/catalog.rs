//! Read-side catalog access for the storefront.
//!
//! Browsing, featured placement and product pages all read the active
//! catalog from one `moka` entry that expires after the configured TTL.
//! Cart and checkout paths read through to the repository so stock checks
//! see current numbers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, instrument};

use atelier_core::ProductId;
use atelier_core::catalog::{self, CatalogPage, CatalogQuery};
use atelier_core::product::Product;
use atelier_db::{ProductRepository, ProductScope, RepositoryError};

const ACTIVE_CATALOG_KEY: &str = "catalog:active";

/// Cached view of the storefront-visible catalog.
#[derive(Clone)]
pub struct CatalogService {
    products: Arc<dyn ProductRepository>,
    cache: Cache<&'static str, Arc<Vec<Product>>>,
}

impl CatalogService {
    /// Create a catalog service caching for `ttl`.
    #[must_use]
    pub fn new(products: Arc<dyn ProductRepository>, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(4).time_to_live(ttl).build();
        Self { products, cache }
    }

    /// Every active product, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository query fails on a cache miss.
    #[instrument(skip(self))]
    pub async fn active_products(&self) -> Result<Arc<Vec<Product>>, RepositoryError> {
        if let Some(products) = self.cache.get(ACTIVE_CATALOG_KEY).await {
            return Ok(products);
        }

        let products = Arc::new(self.products.list(ProductScope::Active).await?);
        debug!(count = products.len(), "Catalog cache refreshed");
        self.cache
            .insert(ACTIVE_CATALOG_KEY, Arc::clone(&products))
            .await;
        Ok(products)
    }

    /// Filter, sort and page the active catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded.
    pub async fn browse(&self, query: &CatalogQuery) -> Result<CatalogPage, RepositoryError> {
        let products = self.active_products().await?;
        Ok(query.apply(&products))
    }

    /// Featured active products in placement order.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded.
    pub async fn featured(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = self.active_products().await?;
        Ok(catalog::featured(&products))
    }

    /// An active product by slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded.
    pub async fn by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let products = self.active_products().await?;
        Ok(products.iter().find(|p| p.slug == slug).cloned())
    }

    /// A sellable product read straight from storage, bypassing the cache.
    ///
    /// Returns `None` for unknown ids and for products that are not active.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository query fails.
    #[instrument(skip(self))]
    pub async fn live_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.products.get(id).await?.filter(Product::is_visible))
    }

    /// Drop the cached catalog.
    pub async fn invalidate(&self) {
        self.cache.invalidate(ACTIVE_CATALOG_KEY).await;
    }
}
