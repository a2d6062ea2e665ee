//! Order history (read-only).

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::instrument;

use atelier_core::order::Order;
use atelier_core::types::OrderId;

use crate::error::{ApiPath, ApiQuery, AppError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Default page size for admin listings.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Largest page size for admin listings.
pub const MAX_PAGE_SIZE: i64 = 200;

/// `?limit=&offset=` paging.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    /// Page size clamped to `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn limit(self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    #[must_use]
    pub fn offset(self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Orders, newest first.
///
/// # Errors
///
/// Returns 400 for non-numeric paging values.
#[instrument(skip(state))]
pub async fn index(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> Result<Json<Vec<Order>>> {
    let orders = state
        .repos()
        .orders
        .list(page.limit(), page.offset())
        .await?;
    Ok(Json(orders))
}

/// One order with its lines and shipping address.
///
/// # Errors
///
/// Returns 404 if the order does not exist.
#[instrument(skip(state))]
pub async fn show(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Order>> {
    state
        .repos()
        .orders
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_is_clamped() {
        let page = Pagination::default();
        assert_eq!(page.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(page.offset(), 0);

        let page = Pagination {
            limit: Some(10_000),
            offset: Some(-5),
        };
        assert_eq!(page.limit(), MAX_PAGE_SIZE);
        assert_eq!(page.offset(), 0);

        let page = Pagination {
            limit: Some(0),
            offset: Some(20),
        };
        assert_eq!(page.limit(), 1);
        assert_eq!(page.offset(), 20);
    }
}
