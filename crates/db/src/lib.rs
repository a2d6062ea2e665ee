//! Atelier persistence.
//!
//! # Database: `atelier`
//!
//! ## Tables (schema `atelier`)
//!
//! - `product` - Catalog, including drafts and archived pieces
//! - `customer_order` - Orders placed through checkout (lines and address as JSONB)
//! - `design_request` - Custom design enquiries
//!
//! Visitor sessions live in the `tower_sessions` schema, created by the
//! session store's own migration.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/db/migrations/` and run via:
//! ```bash
//! cargo run -p atelier-cli -- migrate
//! ```
//!
//! # Backends
//!
//! Every repository is a trait object so the binaries can run against
//! `PostgreSQL` in production and [`memory::InMemoryStore`] in tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod design_requests;
pub mod memory;
pub mod orders;
pub mod products;

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use design_requests::{DesignRequestRepository, PgDesignRequestRepository};
pub use memory::InMemoryStore;
pub use orders::{OrderRepository, PgOrderRepository};
pub use products::{PgProductRepository, ProductRepository, ProductScope};

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate slug).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-constraint violation to [`RepositoryError::Conflict`].
pub(crate) fn conflict_on_unique(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

/// Parse a text column into one of the core enums.
pub(crate) fn parse_column<T>(column: &str, value: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid {column} in database: {e}")))
}

/// The three repositories, bundled for application state.
#[derive(Clone)]
pub struct Repositories {
    pub products: Arc<dyn ProductRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub design_requests: Arc<dyn DesignRequestRepository>,
}

impl Repositories {
    /// `PostgreSQL`-backed repositories sharing `pool`.
    #[must_use]
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            products: Arc::new(PgProductRepository::new(pool.clone())),
            orders: Arc::new(PgOrderRepository::new(pool.clone())),
            design_requests: Arc::new(PgDesignRequestRepository::new(pool)),
        }
    }

    /// Repositories over an existing in-memory store, so a test can keep a
    /// handle to it.
    #[must_use]
    pub fn from_store(store: Arc<InMemoryStore>) -> Self {
        Self {
            products: store.clone(),
            orders: store.clone(),
            design_requests: store,
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
