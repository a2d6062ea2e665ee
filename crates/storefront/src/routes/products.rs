//! Catalog route handlers.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use atelier_core::catalog::{CatalogPage, CatalogQuery};
use atelier_core::product::Product;

use crate::error::{ApiPath, ApiQuery, AppError, Result};
use crate::state::AppState;

/// How many related pieces a product page shows.
const RELATED_LIMIT: usize = 4;

/// Product detail with a few related pieces from the same category.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    pub product: Product,
    pub related: Vec<Product>,
}

/// Browse the catalog.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CatalogQuery>,
) -> Result<Json<CatalogPage>> {
    let page = state.catalog().browse(&query).await?;
    Ok(Json(page))
}

/// Featured pieces in placement order.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded.
#[instrument(skip(state))]
pub async fn featured(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.catalog().featured().await?))
}

/// A single product by slug.
///
/// # Errors
///
/// Returns 404 if no active product has this slug.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<ProductDetail>> {
    let products = state.catalog().active_products().await?;
    let product = products
        .iter()
        .find(|p| p.slug == slug)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("product {slug}")))?;

    let related = products
        .iter()
        .filter(|p| p.id != product.id && p.category == product.category)
        .take(RELATED_LIMIT)
        .cloned()
        .collect();

    Ok(Json(ProductDetail { product, related }))
}
