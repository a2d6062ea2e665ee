//! Content page route handlers.
//!
//! Serves the markdown pages (artisan story, crafting process, FAQ,
//! shipping) loaded at startup.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use crate::content::Page;
use crate::error::{ApiPath, AppError, Result};
use crate::state::AppState;

/// Navigation entry for a page.
#[derive(Debug, Serialize)]
pub struct PageSummary {
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
}

impl From<&Page> for PageSummary {
    fn from(page: &Page) -> Self {
        Self {
            slug: page.slug.clone(),
            title: page.meta.title.clone(),
            description: page.meta.description.clone(),
        }
    }
}

/// Every page, in navigation order.
pub async fn index(State(state): State<AppState>) -> Json<Vec<PageSummary>> {
    Json(
        state
            .content()
            .pages()
            .into_iter()
            .map(PageSummary::from)
            .collect(),
    )
}

/// A rendered page by slug.
///
/// # Errors
///
/// Returns 404 if the page doesn't exist.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<Page>> {
    state
        .content()
        .get_page(&slug)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("page {slug}")))
}
