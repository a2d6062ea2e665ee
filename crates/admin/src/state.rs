//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use atelier_db::Repositories;

use crate::config::AdminConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: Option<PgPool>,
    repos: Repositories,
}

impl AppState {
    /// Create the state. `pool` is only used by the readiness probe and is
    /// absent when running against in-memory repositories.
    #[must_use]
    pub fn new(config: AdminConfig, pool: Option<PgPool>, repos: Repositories) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                repos,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    #[must_use]
    pub fn repos(&self) -> &Repositories {
        &self.inner.repos
    }
}
