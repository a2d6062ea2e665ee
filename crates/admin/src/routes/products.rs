//! Product editor route handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Deserializer};
use tracing::instrument;

use atelier_core::{FieldError, ProductId};
use atelier_core::product::{Product, ProductInput};
use atelier_core::types::ProductStatus;
use atelier_db::ProductScope;

use crate::error::{ApiJson, ApiPath, ApiQuery, AppError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// List filters. Blank values are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub status: Option<ProductStatus>,
    #[serde(default)]
    pub q: Option<String>,
}

impl ProductFilter {
    fn matches(&self, product: &Product) -> bool {
        if self.status.is_some_and(|status| status != product.status) {
            return false;
        }
        let Some(needle) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) else {
            return true;
        };
        let needle = needle.to_lowercase();
        [
            Some(product.name.as_str()),
            Some(product.slug.as_str()),
            product.gem_type.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}

fn blank_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<ProductStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Featured flag payload.
#[derive(Debug, Deserialize)]
pub struct FeaturedUpdate {
    pub featured: bool,
    #[serde(default)]
    pub order: Option<i32>,
}

/// List products of any status, newest first.
///
/// # Errors
///
/// Returns 400 for an unknown status filter.
#[instrument(skip(state))]
pub async fn index(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ProductFilter>,
) -> Result<Json<Vec<Product>>> {
    let products = state.repos().products.list(ProductScope::All).await?;
    Ok(Json(
        products.into_iter().filter(|p| filter.matches(p)).collect(),
    ))
}

/// Create a product.
///
/// # Errors
///
/// Returns 422 with field errors, or 409 if the slug is taken.
#[instrument(skip(state, input))]
pub async fn create(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = input.validate().map_err(AppError::Validation)?;
    let created = state.repos().products.create(&product).await?;

    tracing::info!(product_id = %created.id, slug = %created.slug, "Product created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Fetch one product.
///
/// # Errors
///
/// Returns 404 if the product does not exist.
#[instrument(skip(state))]
pub async fn show(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<Product>> {
    state
        .repos()
        .products
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// Replace a product's editable fields.
///
/// # Errors
///
/// Returns 422 with field errors, 404 if missing, 409 on slug clash.
#[instrument(skip(state, input))]
pub async fn update(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<Json<Product>> {
    let product = input.validate().map_err(AppError::Validation)?;
    let updated = state.repos().products.update(id, &product).await?;

    tracing::info!(product_id = %id, status = %updated.status, "Product updated");
    Ok(Json(updated))
}

/// Delete a product.
///
/// # Errors
///
/// Returns 404 if the product does not exist.
#[instrument(skip(state))]
pub async fn delete(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<StatusCode> {
    state.repos().products.delete(id).await?;

    tracing::info!(product_id = %id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Flag or unflag a product for homepage placement.
///
/// # Errors
///
/// Returns 422 for a negative placement and 404 if the product is missing.
#[instrument(skip(state))]
pub async fn set_featured(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(update): ApiJson<FeaturedUpdate>,
) -> Result<Json<Product>> {
    if update.order.is_some_and(|order| order < 0) {
        return Err(AppError::Validation(vec![FieldError::new(
            "order",
            "must not be negative",
        )]));
    }

    let product = state
        .repos()
        .products
        .set_featured(id, update.featured, update.order)
        .await?;

    tracing::info!(product_id = %id, featured = update.featured, "Featured flag changed");
    Ok(Json(product))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::extract::Query;
    use axum::http::Uri;
    use chrono::Utc;

    use atelier_core::Money;
    use atelier_core::product::{Category, Material};

    use super::*;

    fn product(name: &str, status: ProductStatus, gem: Option<&str>) -> Product {
        Product {
            id: ProductId::new(1),
            slug: atelier_core::product::slugify(name),
            name: name.to_string(),
            description: String::new(),
            category: Category::Rings,
            material: Material::Gold,
            gem_type: gem.map(str::to_string),
            gem_color: None,
            size: None,
            price: Money::from_cents(12_000),
            stock: 1,
            status,
            featured: false,
            featured_order: None,
            images: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn filter(query: &str) -> ProductFilter {
        let uri: Uri = format!("/api/products?{query}").parse().unwrap();
        Query::<ProductFilter>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn blank_filters_match_everything() {
        let f = filter("status=&q=");
        assert!(f.matches(&product("Moon Ring", ProductStatus::Draft, None)));
    }

    #[test]
    fn status_and_text_filters_combine() {
        let f = filter("status=active&q=opal");
        assert!(f.matches(&product("Tide Ring", ProductStatus::Active, Some("Opal"))));
        assert!(!f.matches(&product("Tide Ring", ProductStatus::Draft, Some("Opal"))));
        assert!(!f.matches(&product("Tide Ring", ProductStatus::Active, Some("Garnet"))));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let uri: Uri = "/api/products?status=sold".parse().unwrap();
        assert!(Query::<ProductFilter>::try_from_uri(&uri).is_err());
    }
}
