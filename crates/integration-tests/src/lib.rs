//! Integration test harness for Atelier.
//!
//! Both binaries are exercised through their real routers with
//! `tower::ServiceExt::oneshot`, backed by in-memory repositories, an
//! in-memory session store and a fake payment gateway. No database or
//! network is needed:
//!
//! ```bash
//! cargo test -p atelier-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `storefront_*` - Catalog, cart and checkout through the public API
//! - `admin_*` - Catalog editing through the bearer-token API

#![allow(clippy::missing_panics_doc, clippy::expect_used, clippy::unwrap_used)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode, header};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use atelier_core::Money;
use atelier_core::order::NewOrder;
use atelier_core::pricing::PricingPolicy;
use atelier_core::product::{Category, Material, Product, ProductInput};
use atelier_core::types::ProductStatus;
use atelier_db::{InMemoryStore, OrderRepository, ProductRepository, Repositories};
use atelier_storefront::config::{PaymentConfig, StorefrontConfig};
use atelier_storefront::content::ContentStore;
use atelier_storefront::services::{
    CreateIntentRequest, PaymentError, PaymentGateway, PaymentIntent, PaymentIntentStatus,
};

/// Token the test admin app accepts.
pub const ADMIN_TOKEN: &str = "q7Vd0-Lw_3ZkP9xRb2TnYc8HsJ4mGf6A";

/// Publishable key handed to checkout clients in tests.
pub const PUBLISHABLE_KEY: &str = "pk_test_atelier";

// =============================================================================
// HTTP client
// =============================================================================

/// A decoded response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// JSON body, or `Value::Null` when the body is empty or not JSON.
    pub body: Value,
}

/// Drives a router in-process, carrying the session cookie between calls
/// the way a browser would.
pub struct TestClient {
    app: Router,
    cookie: Option<String>,
    bearer: Option<String>,
}

impl TestClient {
    #[must_use]
    pub const fn new(app: Router) -> Self {
        Self {
            app,
            cookie: None,
            bearer: None,
        }
    }

    /// Send `Authorization: Bearer <token>` on every request.
    #[must_use]
    pub fn with_bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_owned());
        self
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.json(Method::GET, uri, None).await
    }

    pub async fn post(&mut self, uri: &str, body: Value) -> TestResponse {
        self.json(Method::POST, uri, Some(body)).await
    }

    pub async fn post_empty(&mut self, uri: &str) -> TestResponse {
        self.json(Method::POST, uri, None).await
    }

    pub async fn put(&mut self, uri: &str, body: Value) -> TestResponse {
        self.json(Method::PUT, uri, Some(body)).await
    }

    pub async fn patch(&mut self, uri: &str, body: Value) -> TestResponse {
        self.json(Method::PATCH, uri, Some(body)).await
    }

    pub async fn delete(&mut self, uri: &str) -> TestResponse {
        self.json(Method::DELETE, uri, None).await
    }

    /// Send a request with an optional JSON body.
    pub async fn json(&mut self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("valid request");
        self.send(request).await
    }

    /// Send a prepared request, adding the session cookie and bearer token.
    pub async fn send(&mut self, mut request: Request<Body>) -> TestResponse {
        let headers = request.headers_mut();
        if let Some(cookie) = &self.cookie {
            headers.insert(
                header::COOKIE,
                HeaderValue::from_str(cookie).expect("valid cookie"),
            );
        }
        if let Some(token) = &self.bearer {
            headers.insert(
                header::AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}")).expect("valid token"),
            );
        }

        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        if let Some(set_cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            && let Some(pair) = set_cookie.split(';').next()
        {
            self.cookie = Some(pair.trim().to_owned());
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// A `multipart/form-data` body with one file field.
#[must_use]
pub fn multipart_upload(field: &str, file_name: &str, bytes: &[u8]) -> (String, Vec<u8>) {
    const BOUNDARY: &str = "atelier-test-boundary";

    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

// =============================================================================
// Fake payment gateway
// =============================================================================

/// Payment gateway that keeps intents in memory.
///
/// Intents start as `requires_payment_method`; [`FakeGateway::confirm`]
/// plays the part of the customer completing payment in the browser.
#[derive(Debug, Default)]
pub struct FakeGateway {
    intents: Mutex<HashMap<String, PaymentIntent>>,
    by_idempotency_key: Mutex<HashMap<String, String>>,
    created: AtomicUsize,
    concurrent_order: Mutex<Option<(Arc<InMemoryStore>, NewOrder)>>,
}

impl FakeGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an intent as paid.
    pub fn confirm(&self, id: &str) {
        self.set_status(id, PaymentIntentStatus::Succeeded);
    }

    pub fn set_status(&self, id: &str, status: PaymentIntentStatus) {
        let mut intents = self.intents.lock().expect("gateway lock");
        if let Some(intent) = intents.get_mut(id) {
            intent.status = status;
        }
    }

    /// Change what an intent charges, as a tampered client might.
    pub fn set_amount(&self, id: &str, cents: i64) {
        let mut intents = self.intents.lock().expect("gateway lock");
        if let Some(intent) = intents.get_mut(id) {
            intent.amount = cents;
        }
    }

    /// Have another submission store `order` the next time an intent is
    /// retrieved, between the storefront's lookup and its insert.
    pub fn place_order_on_next_retrieve(&self, store: Arc<InMemoryStore>, order: NewOrder) {
        *self.concurrent_order.lock().expect("gateway lock") = Some((store, order));
    }

    /// Number of intents created (idempotent replays not counted).
    #[must_use]
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Amount of an intent in cents.
    #[must_use]
    pub fn amount(&self, id: &str) -> Option<i64> {
        self.intents
            .lock()
            .expect("gateway lock")
            .get(id)
            .map(|intent| intent.amount)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, PaymentError> {
        let mut keys = self.by_idempotency_key.lock().expect("gateway lock");
        let mut intents = self.intents.lock().expect("gateway lock");

        if let Some(intent) = keys
            .get(&request.idempotency_key)
            .and_then(|id| intents.get(id))
        {
            return Ok(intent.clone());
        }

        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("pi_test_{n}");
        let intent = PaymentIntent {
            id: id.clone(),
            client_secret: Some(format!("{id}_secret_{n}")),
            amount: request.amount_cents,
            currency: "usd".to_owned(),
            status: PaymentIntentStatus::RequiresPaymentMethod,
        };
        keys.insert(request.idempotency_key, id.clone());
        intents.insert(id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, PaymentError> {
        let concurrent = self.concurrent_order.lock().expect("gateway lock").take();
        if let Some((store, order)) = concurrent {
            OrderRepository::create(&*store, &order)
                .await
                .expect("concurrent order inserts");
        }

        self.intents
            .lock()
            .expect("gateway lock")
            .get(id)
            .cloned()
            .ok_or_else(|| PaymentError::NotFound(id.to_owned()))
    }
}

// =============================================================================
// Storefront
// =============================================================================

/// Storefront configuration for tests. Nothing in it is contacted.
#[must_use]
pub fn storefront_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://unused@localhost/atelier_test"),
        host: "127.0.0.1".parse().expect("valid address"),
        port: 3000,
        base_url: "http://localhost:3000".to_owned(),
        session_secret: SecretString::from("Zt4v9Qx2Lm7Rk1Wp8Hs3Nd6Fb0Jc5Gy2"),
        payment: PaymentConfig {
            api_base: "http://127.0.0.1:9".to_owned(),
            secret_key: SecretString::from("sk_test_unused"),
            publishable_key: PUBLISHABLE_KEY.to_owned(),
            currency: "usd".to_owned(),
        },
        pricing: PricingPolicy::default(),
        content_dir: Path::new("unused").to_path_buf(),
        catalog_cache_ttl: Duration::from_secs(60),
        search_refresh_interval: Duration::from_secs(300),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Content pages used by the storefront tests.
#[must_use]
pub fn content() -> ContentStore {
    ContentStore::from_sources([
        (
            "shipping",
            "---\ntitle: Shipping & Returns\ndescription: Delivery times and returns.\norder: 1\n---\n\nEvery order ships insured in a gift box.\n",
        ),
        (
            "ring-sizing",
            "---\ntitle: Ring Sizing Guide\norder: 2\n---\n\nMeasure an opal ring you already own.\n",
        ),
    ])
    .expect("test pages parse")
}

/// A running storefront and handles to its collaborators.
pub struct Storefront {
    pub client: TestClient,
    pub state: atelier_storefront::AppState,
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<FakeGateway>,
}

impl Storefront {
    /// A storefront over `store`.
    #[must_use]
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        let gateway = Arc::new(FakeGateway::new());
        let state = atelier_storefront::AppState::new(
            storefront_config(),
            None,
            Repositories::from_store(store.clone()),
            gateway.clone(),
            content(),
        );
        let app = atelier_storefront::app(
            state.clone(),
            MemoryStore::default(),
            atelier_storefront::RateLimits::Disabled,
        );

        Self {
            client: TestClient::new(app),
            state,
            store,
            gateway,
        }
    }

    /// A second visitor sharing the same shop (fresh session).
    #[must_use]
    pub fn visitor(&self) -> TestClient {
        TestClient::new(atelier_storefront::app(
            self.state.clone(),
            MemoryStore::default(),
            atelier_storefront::RateLimits::Disabled,
        ))
    }
}

// =============================================================================
// Admin
// =============================================================================

/// Admin configuration for tests, writing uploads under `upload_dir`.
#[must_use]
pub fn admin_config(upload_dir: &Path) -> atelier_admin::config::AdminConfig {
    atelier_admin::config::AdminConfig {
        database_url: SecretString::from("postgres://unused@localhost/atelier_test"),
        host: "127.0.0.1".parse().expect("valid address"),
        port: 3001,
        api_token: SecretString::from(ADMIN_TOKEN),
        upload_dir: upload_dir.to_path_buf(),
        image_base_url: "/images/products".to_owned(),
        max_upload_bytes: 1024,
        json_logs: false,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// An admin app over `store`, plus the client without credentials.
#[must_use]
pub fn admin_app(store: Arc<InMemoryStore>, upload_dir: &Path) -> Router {
    let state = atelier_admin::AppState::new(
        admin_config(upload_dir),
        None,
        Repositories::from_store(store),
    );
    atelier_admin::app(state)
}

// =============================================================================
// Fixtures
// =============================================================================

/// An active product payload.
#[must_use]
pub fn product_input(name: &str, price_cents: i64, stock: i32) -> ProductInput {
    ProductInput {
        slug: None,
        name: name.to_owned(),
        description: format!("{name}, made by hand in the studio."),
        category: Category::Rings,
        material: Material::Silver,
        gem_type: None,
        gem_color: None,
        size: None,
        price: Money::new(Decimal::new(price_cents, 2)),
        stock,
        status: ProductStatus::Active,
        featured: false,
        featured_order: None,
        images: vec![],
    }
}

/// Insert a product straight into the store.
pub async fn insert_product(store: &InMemoryStore, input: ProductInput) -> Product {
    let product = input.validate().expect("fixture product is valid");
    ProductRepository::create(store, &product)
        .await
        .expect("fixture product inserts")
}

/// A complete domestic shipping step.
#[must_use]
pub fn shipping_patch() -> Value {
    serde_json::json!({
        "email": "june@example.com",
        "first_name": "June",
        "last_name": "Okafor",
        "address1": "12 Foundry Lane",
        "city": "Portland",
        "state": "OR",
        "postal_code": "97209",
        "country": "US",
        "shipping_method": "standard"
    })
}
