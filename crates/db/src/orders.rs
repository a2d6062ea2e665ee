//! Order repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::instrument;

use atelier_core::cart::CartLine;
use atelier_core::checkout::ShippingDetails;
use atelier_core::order::{NewOrder, Order};
use atelier_core::{Email, Money, OrderId};

use crate::{RepositoryError, conflict_on_unique, parse_column};

/// Storage for placed orders.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert an order and take its lines out of stock.
    ///
    /// A second order for the same payment intent is a `Conflict`.
    async fn create(&self, order: &NewOrder) -> Result<Order, RepositoryError>;

    /// An order by id.
    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// The order paid for by `payment_intent_id`, if any.
    async fn get_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Orders, newest first.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Order>, RepositoryError>;
}

// =============================================================================
// Internal Row Types
// =============================================================================

const ORDER_COLUMNS: &str = "id, order_number, email, shipping, shipping_method, lines, \
     subtotal, shipping_cost, tax, total, payment_intent_id, status, created_at";

/// Internal row type for `PostgreSQL` order queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    order_number: String,
    email: String,
    shipping: Json<ShippingDetails>,
    shipping_method: String,
    lines: Json<Vec<CartLine>>,
    subtotal: Decimal,
    shipping_cost: Decimal,
    tax: Decimal,
    total: Decimal,
    payment_intent_id: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: OrderId::new(row.id),
            order_number: row.order_number,
            email,
            shipping: row.shipping.0,
            shipping_method: parse_column("shipping_method", &row.shipping_method)?,
            lines: row.lines.0,
            subtotal: Money::new(row.subtotal),
            shipping_cost: Money::new(row.shipping_cost),
            tax: Money::new(row.tax),
            total: Money::new(row.total),
            payment_intent_id: row.payment_intent_id,
            status: parse_column("status", &row.status)?,
            created_at: row.created_at,
        })
    }
}

// =============================================================================
// PostgreSQL
// =============================================================================

/// `PostgreSQL` order repository.
#[derive(Debug, Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    #[instrument(skip(self, order), fields(order_number = %order.order_number))]
    async fn create(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r"
            INSERT INTO atelier.customer_order
                (order_number, email, shipping, shipping_method, lines, subtotal,
                 shipping_cost, tax, total, payment_intent_id, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {ORDER_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(&order.order_number)
            .bind(order.email.as_str())
            .bind(Json(&order.shipping))
            .bind(order.shipping_method.as_str())
            .bind(Json(&order.lines))
            .bind(order.totals.subtotal.amount())
            .bind(order.totals.shipping.amount())
            .bind(order.totals.tax.amount())
            .bind(order.totals.total.amount())
            .bind(&order.payment_intent_id)
            .bind(order.status.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| conflict_on_unique(e, "an order already exists for this payment"))?;

        for line in &order.lines {
            let quantity = i32::try_from(line.quantity).unwrap_or(i32::MAX);
            sqlx::query(
                r"
                UPDATE atelier.product
                SET stock = GREATEST(stock - $2, 0), updated_at = NOW()
                WHERE id = $1
                ",
            )
            .bind(line.product_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        row.try_into()
    }

    #[instrument(skip(self))]
    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM atelier.customer_order WHERE id = $1");
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    #[instrument(skip(self))]
    async fn get_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM atelier.customer_order WHERE payment_intent_id = $1"
        );
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(payment_intent_id)
            .fetch_optional(&self.pool)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    #[instrument(skip(self))]
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM atelier.customer_order \
             ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
