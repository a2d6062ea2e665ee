//! Catalog administration through the admin API.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};

use atelier_core::Email;
use atelier_core::design_request::DesignRequestInput;
use atelier_core::product::Category;
use atelier_db::{DesignRequestRepository, InMemoryStore};
use atelier_integration_tests::{
    ADMIN_TOKEN, TestClient, TestResponse, admin_app, insert_product, multipart_upload,
    product_input,
};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01\x08\x06\0\0\0";

struct Admin {
    client: TestClient,
    store: Arc<InMemoryStore>,
    uploads: tempfile::TempDir,
}

fn admin() -> Admin {
    let store = Arc::new(InMemoryStore::new());
    let uploads = tempfile::tempdir().unwrap();
    let client = TestClient::new(admin_app(store.clone(), uploads.path())).with_bearer(ADMIN_TOKEN);
    Admin {
        client,
        store,
        uploads,
    }
}

fn ring(name: &str) -> Value {
    json!({
        "name": name,
        "description": "Hammered band with a single opal.",
        "category": "rings",
        "material": "silver",
        "gem_type": "Opal",
        "price": "145.00",
        "stock": 3,
        "status": "active"
    })
}

async fn upload(client: &mut TestClient, file_name: &str, bytes: &[u8]) -> TestResponse {
    let (content_type, body) = multipart_upload("file", file_name, bytes);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/admin/images")
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap();
    client.send(request).await
}

#[tokio::test]
async fn requests_without_the_token_are_rejected() {
    let store = Arc::new(InMemoryStore::new());
    let uploads = tempfile::tempdir().unwrap();

    let mut anonymous = TestClient::new(admin_app(store.clone(), uploads.path()));
    let res = anonymous.get("/api/products").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers[header::WWW_AUTHENTICATE], "Bearer");

    let mut wrong =
        TestClient::new(admin_app(store, uploads.path())).with_bearer("not-the-admin-token-at-all-no");
    let res = wrong.get("/api/products").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    // Liveness needs no credentials
    let res = anonymous.get("/health").await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let mut admin = admin();
    let res = admin.client.get("/api/products").await;
    assert_eq!(res.headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(res.headers[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(res.headers[header::CACHE_CONTROL], "no-store");
}

#[tokio::test]
async fn product_lifecycle() {
    let mut admin = admin();
    let client = &mut admin.client;

    let res = client.post("/api/products", ring("Tide Ring")).await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["slug"], "tide-ring");
    assert_eq!(res.body["price"], "145.00");
    let id = res.body["id"].as_i64().unwrap();

    let res = client.post("/api/products", ring("Tide Ring")).await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let mut invalid = ring("");
    invalid["price"] = json!("0");
    let res = client.post("/api/products", invalid).await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields: Vec<&str> = res.body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"name"));
    assert!(fields.contains(&"price"));

    let res = client.get(&format!("/api/products/{id}")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["name"], "Tide Ring");

    let mut edit = ring("Tide Ring");
    edit["price"] = json!("155.00");
    edit["stock"] = json!(1);
    let res = client.put(&format!("/api/products/{id}"), edit).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["price"], "155.00");
    assert_eq!(res.body["stock"], 1);

    let res = client.delete(&format!("/api/products/{id}")).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = client.get(&format!("/api/products/{id}")).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn product_list_filters() {
    let mut admin = admin();
    insert_product(&admin.store, product_input("Tide Ring", 14500, 3)).await;
    let mut draft = product_input("Ember Studs", 9850, 2);
    draft.category = Category::Earrings;
    draft.status = atelier_core::ProductStatus::Draft;
    draft.gem_type = Some("Garnet".to_owned());
    insert_product(&admin.store, draft).await;

    let res = admin.client.get("/api/products").await;
    assert_eq!(res.body.as_array().unwrap().len(), 2);

    let res = admin.client.get("/api/products?status=draft").await;
    let listed = res.body.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["slug"], "ember-studs");

    let res = admin.client.get("/api/products?q=garnet&status=").await;
    assert_eq!(res.body.as_array().unwrap().len(), 1);

    let res = admin.client.get("/api/products?status=retired").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn featured_placement() {
    let mut admin = admin();
    let a = insert_product(&admin.store, product_input("Tide Ring", 14500, 3)).await;
    let b = insert_product(&admin.store, product_input("Moonlit Band", 21000, 1)).await;
    let (a, b) = (a.id.as_i64(), b.id.as_i64());
    let client = &mut admin.client;

    let res = client
        .put(
            &format!("/api/products/{a}/featured"),
            json!({ "featured": true, "order": 0 }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["featured"], true);

    client
        .put(
            &format!("/api/products/{b}/featured"),
            json!({ "featured": true, "order": 1 }),
        )
        .await;

    let res = client
        .put(
            &format!("/api/products/{b}/featured"),
            json!({ "featured": true, "order": -1 }),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);

    let res = client
        .put("/api/featured/order", json!({ "product_ids": [b, a] }))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body[0]["id"], b);
    assert_eq!(res.body[1]["id"], a);

    let res = client.get("/api/featured").await;
    assert_eq!(res.body[0]["id"], b);

    let res = client
        .put("/api/featured/order", json!({ "product_ids": [a, a] }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = client
        .put(
            &format!("/api/products/{a}/featured"),
            json!({ "featured": false }),
        )
        .await;
    assert_eq!(res.body["featured_order"], Value::Null);

    let res = client
        .put("/api/featured/order", json!({ "product_ids": [a] }))
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn image_upload_is_stored_and_served() {
    let mut admin = admin();

    let res = upload(&mut admin.client, "ring.jpg", PNG).await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["content_type"], "image/png");
    let file_name = res.body["file_name"].as_str().unwrap().to_owned();
    assert!(file_name.ends_with(".png"));
    assert_eq!(
        res.body["url"],
        format!("/images/products/{file_name}").as_str()
    );
    assert!(admin.uploads.path().join(&file_name).exists());

    let res = admin
        .client
        .json(Method::GET, &format!("/images/products/{file_name}"), None)
        .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn image_upload_rejects_other_files() {
    let mut admin = admin();

    let svg = b"<svg xmlns=\"http://www.w3.org/2000/svg\"></svg>";
    let res = upload(&mut admin.client, "logo.png", svg).await;
    assert_eq!(res.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let mut big = PNG.to_vec();
    big.resize(4096, 0);
    let res = upload(&mut admin.client, "huge.png", &big).await;
    assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);

    let res = upload(&mut admin.client, "empty.png", b"").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn orders_list_is_paginated() {
    let mut admin = admin();

    let res = admin.client.get("/api/orders").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.as_array().unwrap().is_empty());

    let res = admin.client.get("/api/orders/42").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn design_request_status_changes() {
    let mut admin = admin();
    let request = DesignRequestInput {
        name: "Ada Moreno".to_owned(),
        email: "ada@example.com".to_owned(),
        phone: None,
        jewelry_type: Category::Necklaces,
        preferred_material: None,
        gem_preferences: None,
        budget_range: None,
        description: "A pendant that holds my grandmother's sapphire.".to_owned(),
        timeline: None,
    }
    .validate()
    .unwrap();
    assert_eq!(request.email, Email::parse("ada@example.com").unwrap());
    let stored = DesignRequestRepository::create(&*admin.store, &request)
        .await
        .unwrap();
    let id = stored.id.as_i64();

    let res = admin.client.get("/api/design-requests").await;
    assert_eq!(res.body[0]["status"], "new");

    let res = admin
        .client
        .put(
            &format!("/api/design-requests/{id}/status"),
            json!({ "status": "in_review" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "in_review");

    let res = admin
        .client
        .put(
            "/api/design-requests/999/status",
            json!({ "status": "in_review" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}
