//! Custom design request form.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use atelier_core::design_request::DesignRequestInput;
use atelier_core::{DesignRequestId, DesignRequestStatus};

use crate::error::{ApiJson, AppError, Result, add_breadcrumb};
use crate::state::AppState;

/// Acknowledgement returned to the visitor.
#[derive(Debug, Serialize)]
pub struct DesignRequestReceipt {
    pub id: DesignRequestId,
    pub status: DesignRequestStatus,
    pub created_at: DateTime<Utc>,
}

/// Accept a custom design enquiry.
///
/// # Errors
///
/// Returns 422 with field errors if the form is invalid.
#[instrument(skip(state, input), fields(jewelry_type = %input.jewelry_type))]
pub async fn submit(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<DesignRequestInput>,
) -> Result<(StatusCode, Json<DesignRequestReceipt>)> {
    let request = input.validate().map_err(AppError::Validation)?;
    let stored = state.repos().design_requests.create(&request).await?;

    add_breadcrumb(
        "design_request",
        "Custom design request submitted",
        Some(&[("id", &stored.id.to_string())]),
    );
    tracing::info!(id = %stored.id, "Design request received");

    Ok((
        StatusCode::CREATED,
        Json(DesignRequestReceipt {
            id: stored.id,
            status: stored.status,
            created_at: stored.created_at,
        }),
    ))
}
