//! Homepage featured-product placement.

use std::collections::HashSet;

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::instrument;

use atelier_core::ProductId;
use atelier_core::product::Product;

use crate::error::{ApiJson, AppError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// New placement order, first id shown first.
#[derive(Debug, Deserialize)]
pub struct FeaturedOrder {
    pub product_ids: Vec<ProductId>,
}

/// Featured products in placement order.
///
/// # Errors
///
/// Returns an error if the database query fails.
#[instrument(skip(state))]
pub async fn index(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.repos().products.list_featured().await?))
}

/// Reorder the featured products.
///
/// # Errors
///
/// Returns 400 for repeated ids, 404 for unknown products and 409 if a
/// product is not featured.
#[instrument(skip(state))]
pub async fn reorder(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiJson(order): ApiJson<FeaturedOrder>,
) -> Result<Json<Vec<Product>>> {
    let mut seen = HashSet::with_capacity(order.product_ids.len());
    if let Some(dup) = order.product_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(AppError::BadRequest(format!("product {dup} listed twice")));
    }

    let products = state
        .repos()
        .products
        .reorder_featured(&order.product_ids)
        .await?;

    tracing::info!(count = products.len(), "Featured products reordered");
    Ok(Json(products))
}
