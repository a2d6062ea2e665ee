//! Catalog, search, content pages and the design request form.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use atelier_core::ProductStatus;
use atelier_core::product::Material;
use atelier_db::{DesignRequestRepository, InMemoryStore};
use atelier_integration_tests::{Storefront, insert_product, product_input};

async fn shop() -> Storefront {
    let store = Arc::new(InMemoryStore::new());

    insert_product(&store, product_input("Tide Ring", 14500, 3)).await;
    let mut studs = product_input("Ember Studs", 9850, 0);
    studs.material = Material::RoseGold;
    insert_product(&store, studs).await;
    let mut band = product_input("Moonlit Band", 21000, 1);
    band.featured = true;
    band.featured_order = Some(0);
    insert_product(&store, band).await;
    let mut draft = product_input("Unfinished Cuff", 5000, 2);
    draft.status = ProductStatus::Draft;
    insert_product(&store, draft).await;

    Storefront::new(store)
}

#[tokio::test]
async fn health_is_ok_without_a_database() {
    let mut shop = shop().await;
    let res = shop.client.get("/health").await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn browse_lists_only_active_products() {
    let mut shop = shop().await;

    let res = shop.client.get("/api/products").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["total"], 3);
    let slugs: Vec<&str> = res.body["products"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["slug"].as_str().unwrap())
        .collect();
    assert!(!slugs.contains(&"unfinished-cuff"));

    let res = shop
        .client
        .get("/api/products?material=rose_gold")
        .await;
    assert_eq!(res.body["total"], 1);
    assert_eq!(res.body["products"][0]["slug"], "ember-studs");

    let res = shop.client.get("/api/products?in_stock=true").await;
    assert_eq!(res.body["total"], 2);

    let res = shop.client.get("/api/products?material=titanium").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn blank_filters_are_ignored() {
    let mut shop = shop().await;

    let res = shop
        .client
        .get("/api/products?material=&gem_color=&category=&min_price=&max_price=&in_stock=&page=&sort=")
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["total"], 3);

    let res = shop
        .client
        .get("/api/products?material=&min_price=100&max_price=")
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["total"], 2);
}

#[tokio::test]
async fn product_detail_includes_related_pieces() {
    let mut shop = shop().await;

    let res = shop.client.get("/api/products/tide-ring").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["product"]["name"], "Tide Ring");
    assert_eq!(res.body["product"]["price"], "145.00");
    let related = res.body["related"].as_array().unwrap();
    assert!(!related.is_empty());
    assert!(related.iter().all(|p| p["slug"] != "tide-ring"));

    let res = shop.client.get("/api/products/unfinished-cuff").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn featured_pieces() {
    let mut shop = shop().await;
    let res = shop.client.get("/api/products/featured").await;
    assert_eq!(res.status, StatusCode::OK);
    let featured = res.body.as_array().unwrap();
    assert_eq!(featured.len(), 1);
    assert_eq!(featured[0]["slug"], "moonlit-band");
}

#[tokio::test]
async fn search_reports_readiness_until_indexed() {
    let mut shop = shop().await;

    let res = shop.client.get("/api/search?q=tide").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["ready"], false);
    assert!(res.body["products"].as_array().unwrap().is_empty());

    let res = shop.client.get("/api/search/suggest?q=tide").await;
    assert_eq!(res.body["ready"], false);

    let products = shop.state.catalog().active_products().await.unwrap();
    shop.state
        .search()
        .rebuild(&products, shop.state.content())
        .unwrap();

    let res = shop.client.get("/api/search?q=tide").await;
    assert_eq!(res.body["ready"], true);
    assert_eq!(res.body["products"][0]["slug"], "tide-ring");

    let res = shop.client.get("/api/search?q=opal").await;
    let pages = res.body["pages"].as_array().unwrap();
    assert!(pages.iter().any(|p| p["slug"] == "ring-sizing"));

    let res = shop.client.get("/api/search/suggest?q=tide").await;
    assert_eq!(res.body["ready"], true);
}

#[tokio::test]
async fn content_pages() {
    let mut shop = shop().await;

    let res = shop.client.get("/api/pages").await;
    let pages = res.body.as_array().unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0]["slug"], "shipping");
    assert_eq!(pages[0]["title"], "Shipping & Returns");

    let res = shop.client.get("/api/pages/ring-sizing").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(
        res.body["content_html"]
            .as_str()
            .unwrap()
            .contains("<p>")
    );

    let res = shop.client.get("/api/pages/nope").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn design_requests_are_validated_and_stored() {
    let mut shop = shop().await;

    let res = shop
        .client
        .post(
            "/api/custom-design",
            json!({ "name": "", "email": "nope", "jewelry_type": "rings", "description": "short" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields: Vec<&str> = res.body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"name"));
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"description"));

    let res = shop
        .client
        .post(
            "/api/custom-design",
            json!({
                "name": "Ada Moreno",
                "email": "ada@example.com",
                "jewelry_type": "necklaces",
                "preferred_material": "gold",
                "budget_range": "$500-$1000",
                "description": "A pendant that holds my grandmother's sapphire."
            }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["status"], "new");

    let stored = DesignRequestRepository::list(&*shop.store, 10, 0)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].name, "Ada Moreno");
}
