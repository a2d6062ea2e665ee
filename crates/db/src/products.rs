//! Product repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use atelier_core::product::{Product, ValidatedProduct};
use atelier_core::{Money, ProductId};

use crate::{RepositoryError, conflict_on_unique, parse_column};

/// Which products a listing includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductScope {
    /// Every product regardless of status (admin).
    All,
    /// Only storefront-visible products.
    Active,
}

/// Storage for catalog products.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Products in `scope`, newest first.
    async fn list(&self, scope: ProductScope) -> Result<Vec<Product>, RepositoryError>;

    /// A product by id.
    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// A product by slug.
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError>;

    /// Insert a product. Duplicate slugs are a `Conflict`.
    async fn create(&self, product: &ValidatedProduct) -> Result<Product, RepositoryError>;

    /// Replace every editable field of a product.
    async fn update(
        &self,
        id: ProductId,
        product: &ValidatedProduct,
    ) -> Result<Product, RepositoryError>;

    /// Delete a product.
    async fn delete(&self, id: ProductId) -> Result<(), RepositoryError>;

    /// Flag or unflag a product for homepage placement.
    ///
    /// Unflagging clears the placement order.
    async fn set_featured(
        &self,
        id: ProductId,
        featured: bool,
        order: Option<i32>,
    ) -> Result<Product, RepositoryError>;

    /// Assign placements `0..n` in the order given.
    ///
    /// Every id must exist (`NotFound`) and already be featured (`Conflict`).
    async fn reorder_featured(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;

    /// Featured products of any status, in placement order then name.
    async fn list_featured(&self) -> Result<Vec<Product>, RepositoryError>;
}

// =============================================================================
// Internal Row Types
// =============================================================================

const PRODUCT_COLUMNS: &str = "id, slug, name, description, category, material, gem_type, \
     gem_color, size, price, stock, status, featured, featured_order, images, created_at, \
     updated_at";

/// Internal row type for `PostgreSQL` product queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i64,
    slug: String,
    name: String,
    description: String,
    category: String,
    material: String,
    gem_type: Option<String>,
    gem_color: Option<String>,
    size: Option<String>,
    price: Decimal,
    stock: i32,
    status: String,
    featured: bool,
    featured_order: Option<i32>,
    images: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ProductId::new(row.id),
            slug: row.slug,
            name: row.name,
            description: row.description,
            category: parse_column("category", &row.category)?,
            material: parse_column("material", &row.material)?,
            gem_type: row.gem_type,
            gem_color: row.gem_color,
            size: row.size,
            price: Money::new(row.price),
            stock: row.stock,
            status: parse_column("status", &row.status)?,
            featured: row.featured,
            featured_order: row.featured_order,
            images: row.images,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_products(rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
    rows.into_iter().map(TryInto::try_into).collect()
}

// =============================================================================
// PostgreSQL
// =============================================================================

/// `PostgreSQL` product repository.
#[derive(Debug, Clone)]
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    #[instrument(skip(self))]
    async fn list(&self, scope: ProductScope) -> Result<Vec<Product>, RepositoryError> {
        let sql = match scope {
            ProductScope::All => {
                format!("SELECT {PRODUCT_COLUMNS} FROM atelier.product ORDER BY created_at DESC, id")
            }
            ProductScope::Active => format!(
                "SELECT {PRODUCT_COLUMNS} FROM atelier.product \
                 WHERE status = 'active' ORDER BY created_at DESC, id"
            ),
        };
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        into_products(rows)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM atelier.product WHERE id = $1");
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    #[instrument(skip(self))]
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM atelier.product WHERE slug = $1");
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    #[instrument(skip(self, product), fields(slug = %product.slug))]
    async fn create(&self, product: &ValidatedProduct) -> Result<Product, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO atelier.product
                (slug, name, description, category, material, gem_type, gem_color, size,
                 price, stock, status, featured, featured_order, images)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(&product.slug)
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.category.as_str())
            .bind(product.material.as_str())
            .bind(&product.gem_type)
            .bind(&product.gem_color)
            .bind(&product.size)
            .bind(product.price.amount())
            .bind(product.stock)
            .bind(product.status.as_str())
            .bind(product.featured)
            .bind(product.featured_order)
            .bind(&product.images)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "slug already exists"))?;
        row.try_into()
    }

    #[instrument(skip(self, product), fields(slug = %product.slug))]
    async fn update(
        &self,
        id: ProductId,
        product: &ValidatedProduct,
    ) -> Result<Product, RepositoryError> {
        let sql = format!(
            r"
            UPDATE atelier.product SET
                slug = $2, name = $3, description = $4, category = $5, material = $6,
                gem_type = $7, gem_color = $8, size = $9, price = $10, stock = $11,
                status = $12, featured = $13, featured_order = $14, images = $15,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .bind(&product.slug)
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.category.as_str())
            .bind(product.material.as_str())
            .bind(&product.gem_type)
            .bind(&product.gem_color)
            .bind(&product.size)
            .bind(product.price.amount())
            .bind(product.stock)
            .bind(product.status.as_str())
            .bind(product.featured)
            .bind(product.featured_order)
            .bind(&product.images)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "slug already exists"))?
            .ok_or(RepositoryError::NotFound)?;
        row.try_into()
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM atelier.product WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_featured(
        &self,
        id: ProductId,
        featured: bool,
        order: Option<i32>,
    ) -> Result<Product, RepositoryError> {
        let sql = format!(
            r"
            UPDATE atelier.product
            SET featured = $2,
                featured_order = CASE WHEN $2 THEN $3 ELSE NULL END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .bind(featured)
            .bind(order)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        row.try_into()
    }

    #[instrument(skip(self), fields(count = ids.len()))]
    async fn reorder_featured(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for (position, id) in ids.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| RepositoryError::Conflict("too many featured products".to_owned()))?;
            let featured: Option<bool> =
                sqlx::query_scalar("SELECT featured FROM atelier.product WHERE id = $1 FOR UPDATE")
                    .bind(*id)
                    .fetch_optional(&mut *tx)
                    .await?;
            match featured {
                None => return Err(RepositoryError::NotFound),
                Some(false) => {
                    return Err(RepositoryError::Conflict(format!(
                        "product {id} is not featured"
                    )));
                }
                Some(true) => {}
            }
            sqlx::query(
                "UPDATE atelier.product SET featured_order = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(*id)
            .bind(position)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.list_featured().await
    }

    #[instrument(skip(self))]
    async fn list_featured(&self) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM atelier.product WHERE featured \
             ORDER BY featured_order ASC NULLS LAST, lower(name), id"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        into_products(rows)
    }
}
