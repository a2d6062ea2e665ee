//! Custom design enquiry inbox.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::instrument;

use atelier_core::design_request::DesignRequest;
use atelier_core::{DesignRequestId, DesignRequestStatus};

use crate::error::{ApiJson, ApiPath, ApiQuery, Result};
use crate::middleware::RequireAdmin;
use crate::routes::orders::Pagination;
use crate::state::AppState;

/// Status change payload.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: DesignRequestStatus,
}

/// Enquiries, newest first.
///
/// # Errors
///
/// Returns 400 for non-numeric paging values.
#[instrument(skip(state))]
pub async fn index(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> Result<Json<Vec<DesignRequest>>> {
    let requests = state
        .repos()
        .design_requests
        .list(page.limit(), page.offset())
        .await?;
    Ok(Json(requests))
}

/// Move an enquiry to a new workflow status.
///
/// # Errors
///
/// Returns 404 if the enquiry does not exist.
#[instrument(skip(state))]
pub async fn update_status(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DesignRequestId>,
    ApiJson(update): ApiJson<StatusUpdate>,
) -> Result<Json<DesignRequest>> {
    let request = state
        .repos()
        .design_requests
        .update_status(id, update.status)
        .await?;

    tracing::info!(design_request_id = %id, status = %request.status, "Design request updated");
    Ok(Json(request))
}
