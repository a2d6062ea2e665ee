//! Payment gateway client.
//!
//! The storefront only creates and reads payment intents; the browser
//! confirms them with the provider's own SDK using the returned client
//! secret. [`HttpPaymentGateway`] speaks the Stripe-compatible
//! `payment_intents` form API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PaymentConfig;

/// Errors that can occur when talking to the payment gateway.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The card or payment method was declined.
    #[error("payment declined: {0}")]
    Declined(String),

    /// Intent does not exist.
    #[error("payment intent not found: {0}")]
    NotFound(String),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Gateway-side lifecycle of an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Succeeded,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl PaymentIntentStatus {
    /// Whether funds are collected or authorized, so the order may be placed.
    #[must_use]
    pub const fn is_paid(self) -> bool {
        matches!(self, Self::Succeeded | Self::RequiresCapture)
    }

    /// Whether the intent can still be confirmed by the client.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(
            self,
            Self::RequiresPaymentMethod | Self::RequiresConfirmation | Self::RequiresAction
        )
    }
}

/// A payment intent as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Amount in the smallest currency unit.
    pub amount: i64,
    pub currency: String,
    pub status: PaymentIntentStatus,
}

/// Parameters for a new intent.
#[derive(Debug, Clone)]
pub struct CreateIntentRequest {
    /// Amount in the smallest currency unit.
    pub amount_cents: i64,
    /// Repeating a request with the same key returns the same intent.
    pub idempotency_key: String,
    pub receipt_email: Option<String>,
    /// Free-form key/value pairs stored on the intent.
    pub metadata: Vec<(String, String)>,
}

/// Creates and reads payment intents.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create an intent for `request.amount_cents`.
    async fn create_intent(&self, request: CreateIntentRequest)
    -> Result<PaymentIntent, PaymentError>;

    /// Fetch an intent by id.
    async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, PaymentError>;
}

/// Key that makes intent creation idempotent per draft and amount.
#[must_use]
pub fn idempotency_key(draft_id: uuid::Uuid, amount_cents: i64) -> String {
    format!("checkout-{draft_id}-{amount_cents}")
}

// =============================================================================
// HTTP Gateway
// =============================================================================

/// Gateway client for the Stripe-compatible HTTP API.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: SecretString,
    currency: String,
}

impl std::fmt::Debug for HttpPaymentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPaymentGateway")
            .field("api_base", &self.api_base)
            .field("secret_key", &"[REDACTED]")
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl HttpPaymentGateway {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            secret_key: config.secret_key.clone(),
            currency: config.currency.clone(),
        })
    }

    async fn parse_response(response: reqwest::Response) -> Result<PaymentIntent, PaymentError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| PaymentError::Parse(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        Err(api_error(status.as_u16(), &body))
    }
}

/// Map an error response body onto [`PaymentError`].
fn api_error(status: u16, body: &str) -> PaymentError {
    let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) else {
        return PaymentError::Api {
            status,
            message: body.to_owned(),
        };
    };
    let detail = parsed.error;
    let message = detail
        .message
        .unwrap_or_else(|| "payment gateway error".to_owned());

    if detail.kind.as_deref() == Some("card_error") {
        return PaymentError::Declined(message);
    }
    if status == 404 || detail.code.as_deref() == Some("resource_missing") {
        return PaymentError::NotFound(message);
    }
    PaymentError::Api { status, message }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[tracing::instrument(skip(self, request), fields(amount = request.amount_cents))]
    async fn create_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, PaymentError> {
        let url = format!("{}/v1/payment_intents", self.api_base);

        let mut form: Vec<(String, String)> = vec![
            ("amount".to_owned(), request.amount_cents.to_string()),
            ("currency".to_owned(), self.currency.clone()),
            (
                "automatic_payment_methods[enabled]".to_owned(),
                "true".to_owned(),
            ),
        ];
        if let Some(email) = request.receipt_email {
            form.push(("receipt_email".to_owned(), email));
        }
        for (key, value) in request.metadata {
            form.push((format!("metadata[{key}]"), value));
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&form)
            .send()
            .await?;

        let intent = Self::parse_response(response).await?;
        tracing::info!(payment_intent_id = %intent.id, "Payment intent created");
        Ok(intent)
    }

    #[tracing::instrument(skip(self))]
    async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, PaymentError> {
        let url = format!(
            "{}/v1/payment_intents/{}",
            self.api_base,
            urlencoding::encode(id)
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await?;

        Self::parse_response(response).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_intent_payload() {
        let intent: PaymentIntent = serde_json::from_str(
            r#"{
                "id": "pi_3Abc",
                "object": "payment_intent",
                "amount": 12960,
                "currency": "usd",
                "client_secret": "pi_3Abc_secret_xyz",
                "status": "requires_payment_method"
            }"#,
        )
        .unwrap();
        assert_eq!(intent.amount, 12960);
        assert_eq!(intent.status, PaymentIntentStatus::RequiresPaymentMethod);
        assert!(intent.status.is_open());
        assert!(!intent.status.is_paid());
    }

    #[test]
    fn unknown_status_is_tolerated() {
        let status: PaymentIntentStatus = serde_json::from_str("\"something_new\"").unwrap();
        assert_eq!(status, PaymentIntentStatus::Unknown);
    }

    #[test]
    fn paid_statuses() {
        assert!(PaymentIntentStatus::Succeeded.is_paid());
        assert!(PaymentIntentStatus::RequiresCapture.is_paid());
        assert!(!PaymentIntentStatus::Processing.is_paid());
        assert!(!PaymentIntentStatus::Canceled.is_paid());
    }

    #[test]
    fn card_errors_are_declines() {
        let err = api_error(
            402,
            r#"{"error":{"type":"card_error","message":"Your card was declined."}}"#,
        );
        assert!(matches!(err, PaymentError::Declined(m) if m == "Your card was declined."));
    }

    #[test]
    fn missing_resource_is_not_found() {
        let err = api_error(
            404,
            r#"{"error":{"type":"invalid_request_error","code":"resource_missing","message":"No such payment_intent"}}"#,
        );
        assert!(matches!(err, PaymentError::NotFound(_)));
    }

    #[test]
    fn unparseable_body_is_api_error() {
        let err = api_error(500, "upstream exploded");
        assert!(matches!(err, PaymentError::Api { status: 500, .. }));
    }

    #[test]
    fn idempotency_key_changes_with_amount() {
        let id = uuid::Uuid::nil();
        assert_ne!(idempotency_key(id, 100), idempotency_key(id, 101));
        assert!(idempotency_key(id, 100).starts_with("checkout-00000000"));
    }

    #[test]
    fn debug_redacts_secret() {
        let gateway = HttpPaymentGateway::new(&PaymentConfig {
            api_base: "https://api.stripe.com".to_owned(),
            secret_key: SecretString::from("sk_test_do_not_print"),
            publishable_key: "pk_test".to_owned(),
            currency: "usd".to_owned(),
        })
        .unwrap();
        let output = format!("{gateway:?}");
        assert!(!output.contains("sk_test_do_not_print"));
        assert!(output.contains("[REDACTED]"));
    }
}
