//! Search route handlers.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use atelier_core::Money;
use atelier_core::catalog::empty_string_as_none;
use atelier_core::product::Material;

use crate::error::{ApiQuery, Result};
use crate::search::{SearchFilters, SearchHit, SearchResults, SearchSort};
use crate::state::AppState;

/// Default number of product hits on the results view.
const DEFAULT_LIMIT: usize = 48;

/// Largest page of hits a client may ask for.
const MAX_LIMIT: usize = 100;

/// Hits returned by the suggestion dropdown.
const SUGGEST_LIMIT: usize = 6;

/// Search suggestions query parameters.
#[derive(Debug, Deserialize)]
pub struct SuggestQuery {
    #[serde(default)]
    pub q: String,
}

/// Full search query parameters. Prices are in dollars.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub q: String,
    pub sort: String,
    #[serde(deserialize_with = "empty_string_as_none")]
    pub material: Option<Material>,
    #[serde(deserialize_with = "empty_string_as_none")]
    pub in_stock: Option<bool>,
    #[serde(deserialize_with = "empty_string_as_none")]
    pub min_price: Option<Decimal>,
    #[serde(deserialize_with = "empty_string_as_none")]
    pub max_price: Option<Decimal>,
    #[serde(deserialize_with = "empty_string_as_none")]
    pub limit: Option<usize>,
}

impl SearchQuery {
    fn filters(&self) -> SearchFilters {
        SearchFilters {
            material: self.material,
            in_stock_only: self.in_stock.unwrap_or(false),
            min_price_cents: self.min_price.and_then(dollars_to_cents),
            max_price_cents: self.max_price.and_then(dollars_to_cents),
        }
    }
}

fn dollars_to_cents(amount: Decimal) -> Option<u64> {
    Money::new(amount)
        .to_cents()
        .and_then(|c| u64::try_from(c).ok())
}

/// Suggestion dropdown payload.
#[derive(Debug, Serialize)]
pub struct Suggestions {
    pub ready: bool,
    pub hits: Vec<SearchHit>,
}

/// Search products and content pages.
///
/// # Errors
///
/// Returns an error if the index query fails.
#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<Json<SearchResults>> {
    let sort = SearchSort::parse(&query.sort);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let results = state
        .search()
        .search(&query.q, &query.filters(), sort, limit)?;

    Ok(Json(results))
}

/// Search-as-you-type suggestions.
///
/// # Errors
///
/// Returns an error if the index query fails.
#[instrument(skip(state))]
pub async fn suggest(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SuggestQuery>,
) -> Result<Json<Suggestions>> {
    let hits = state.search().suggest(&query.q, SUGGEST_LIMIT)?;
    Ok(Json(Suggestions {
        ready: state.search().is_ready(),
        hits,
    }))
}
