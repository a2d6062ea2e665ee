//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server-side failures are
//! captured to Sentry before responding; clients get a JSON body of the form
//! `{ "error": "...", "fields": [...] }` with internal details withheld.

use axum::extract::FromRequest;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use atelier_core::FieldError;
use atelier_core::cart::CartError;
use atelier_core::checkout::CheckoutError;
use atelier_db::RepositoryError;

use crate::search::SearchError;
use crate::services::PaymentError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Checkout wizard rejected the operation.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Cart rejected the operation.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Payment gateway call failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// The payment intent is not in a payable state.
    #[error("Payment not completed: {0}")]
    PaymentIncomplete(String),

    /// Search index failure.
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Session store failure.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Input failed validation.
    #[error("please correct the highlighted fields")]
    Validation(Vec<FieldError>),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Checkout(err) => match err {
                CheckoutError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CheckoutError::EmptyCart
                | CheckoutError::InvalidTransition { .. }
                | CheckoutError::AlreadyComplete
                | CheckoutError::CartChanged => StatusCode::CONFLICT,
            },
            Self::Cart(err) => match err {
                CartError::ZeroQuantity => StatusCode::UNPROCESSABLE_ENTITY,
                CartError::LineNotFound => StatusCode::NOT_FOUND,
                CartError::OutOfStock(_) => StatusCode::CONFLICT,
            },
            Self::Payment(err) => match err {
                PaymentError::Declined(_) | PaymentError::NotFound(_) => {
                    StatusCode::PAYMENT_REQUIRED
                }
                PaymentError::Http(_) | PaymentError::Api { .. } | PaymentError::Parse(_) => {
                    StatusCode::BAD_GATEWAY
                }
            },
            Self::PaymentIncomplete(_) => StatusCode::PAYMENT_REQUIRED,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Search(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing message. Server-side details are never exposed.
    fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Database(_) | Self::Search(_) | Self::Session(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Payment(PaymentError::Declined(msg)) => msg.clone(),
            Self::Payment(PaymentError::NotFound(_)) => {
                "Payment could not be found; please try again".to_string()
            }
            Self::Payment(_) => "Payment service unavailable".to_string(),
            _ => self.to_string(),
        }
    }

    fn field_errors(self) -> Option<Vec<FieldError>> {
        match self {
            Self::Validation(fields) | Self::Checkout(CheckoutError::Invalid(fields)) => {
                Some(fields)
            }
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = ErrorBody {
            error: self.public_message(),
            fields: self.field_errors(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// `Json` extractor whose rejections use the JSON error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `Query` extractor whose rejections use the JSON error body.
#[derive(Debug, axum::extract::FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// `Path` extractor whose rejections use the JSON error body.
#[derive(Debug, axum::extract::FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for visitor actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use atelier_core::checkout::CheckoutStep;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body(err: AppError) -> serde_json::Value {
        let bytes = axum::body::to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product moon-ring".to_string());
        assert_eq!(err.to_string(), "Not found: product moon-ring");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::Invalid(vec![]))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::InvalidTransition {
                from: CheckoutStep::Shipping,
                to: CheckoutStep::Review,
            })),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::CartChanged)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::EmptyCart)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Cart(CartError::LineNotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Payment(PaymentError::Declined("no".into()))),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            get_status(AppError::Payment(PaymentError::Api {
                status: 500,
                message: "boom".into()
            })),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Conflict("dup".into()))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn validation_errors_carry_fields() {
        let json = body(AppError::Validation(vec![FieldError::new(
            "email",
            "is required",
        )]))
        .await;
        assert_eq!(json["error"], "please correct the highlighted fields");
        assert_eq!(json["fields"][0]["field"], "email");
    }

    #[tokio::test]
    async fn internal_details_are_hidden() {
        let json = body(AppError::Database(RepositoryError::DataCorruption(
            "bad enum in row 7".into(),
        )))
        .await;
        assert_eq!(json["error"], "Internal server error");
        assert!(json.get("fields").is_none());

        let json = body(AppError::Payment(PaymentError::Api {
            status: 401,
            message: "Invalid API Key provided: sk_live_***".into(),
        }))
        .await;
        assert_eq!(json["error"], "Payment service unavailable");
    }
}
