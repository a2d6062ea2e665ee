//! Cart and checkout through the storefront API.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use atelier_core::{OrderStatus, ProductId};
use atelier_core::checkout::CheckoutDraft;
use atelier_core::order::NewOrder;
use atelier_core::pricing::PricingPolicy;
use atelier_db::{InMemoryStore, OrderRepository, ProductRepository};
use atelier_integration_tests::{
    PUBLISHABLE_KEY, Storefront, insert_product, product_input, shipping_patch,
};

async fn shop_with_ring(stock: i32) -> (Storefront, i64) {
    let store = Arc::new(InMemoryStore::new());
    let ring = insert_product(&store, product_input("Tide Ring", 5000, stock)).await;
    (Storefront::new(store), ring.id.as_i64())
}

async fn stock_of(shop: &Storefront, ring: i64) -> i32 {
    ProductRepository::get(&*shop.store, ProductId::new(ring))
        .await
        .unwrap()
        .unwrap()
        .stock
}

/// Walk a fresh shop to the review step with two rings in the cart.
async fn at_review(shop: &mut Storefront, ring: i64) -> String {
    let client = &mut shop.client;
    let res = client
        .post("/api/cart/items", json!({ "product_id": ring, "quantity": 2 }))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);

    let res = client.patch("/api/checkout", shipping_patch()).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(client.post_empty("/api/checkout/next").await.status, StatusCode::OK);

    let res = client.post_empty("/api/checkout/payment-intent").await;
    assert_eq!(res.status, StatusCode::OK);
    let intent = res.body["payment_intent_id"].as_str().unwrap().to_owned();

    let res = client.post_empty("/api/checkout/next").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["step"], "review");
    intent
}

#[tokio::test]
async fn cart_merges_lines_and_caps_quantity_at_stock() {
    let (mut shop, ring) = shop_with_ring(3).await;
    let client = &mut shop.client;

    let res = client
        .post("/api/cart/items", json!({ "product_id": ring }))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["item_count"], 1);

    let res = client
        .post("/api/cart/items", json!({ "product_id": ring, "quantity": 5 }))
        .await;
    assert_eq!(res.body["lines"].as_array().unwrap().len(), 1);
    assert_eq!(res.body["item_count"], 3);
    assert_eq!(res.body["subtotal"], "150.00");

    let res = client
        .patch(&format!("/api/cart/items/{ring}"), json!({ "quantity": 1 }))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["lines"][0]["line_total"], "50.00");

    let res = client.delete(&format!("/api/cart/items/{ring}")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["item_count"], 0);

    let res = client.delete(&format!("/api/cart/items/{ring}")).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cart_rejects_unknown_and_sold_out_products() {
    let store = Arc::new(InMemoryStore::new());
    let sold_out = insert_product(&store, product_input("Ember Studs", 9850, 0)).await;
    let mut shop = Storefront::new(store);

    let res = shop
        .client
        .post("/api/cart/items", json!({ "product_id": 9999 }))
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = shop
        .client
        .post(
            "/api/cart/items",
            json!({ "product_id": sold_out.id.as_i64() }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn checkout_needs_a_cart() {
    let (mut shop, _) = shop_with_ring(5).await;
    let res = shop.client.get("/api/checkout").await;
    assert_eq!(res.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn full_checkout_places_one_paid_order() {
    let (mut shop, ring) = shop_with_ring(5).await;
    let client = &mut shop.client;

    client
        .post("/api/cart/items", json!({ "product_id": ring, "quantity": 2 }))
        .await;

    // Blank shipping step cannot be left
    let res = client.post_empty("/api/checkout/next").await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(
        res.body["fields"]
            .as_array()
            .unwrap()
            .iter()
            .any(|f| f["field"] == "email")
    );

    let res = client.patch("/api/checkout", shipping_patch()).await;
    assert_eq!(res.body["totals"]["subtotal"], "100.00");
    assert_eq!(res.body["totals"]["shipping"], "5.99");
    assert_eq!(res.body["totals"]["tax"], "8.00");
    assert_eq!(res.body["totals"]["total"], "113.99");
    assert!(res.body["step_errors"].as_array().unwrap().is_empty());

    // Payment intents only exist on the payment step
    let res = client.post_empty("/api/checkout/payment-intent").await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = client.post_empty("/api/checkout/next").await;
    assert_eq!(res.body["step"], "payment");

    let first = client.post_empty("/api/checkout/payment-intent").await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["amount"], "113.99");
    assert_eq!(first.body["publishable_key"], PUBLISHABLE_KEY);
    let intent = first.body["payment_intent_id"].as_str().unwrap().to_owned();

    // Asking again reuses the open intent
    let again = client.post_empty("/api/checkout/payment-intent").await;
    assert_eq!(again.body["payment_intent_id"], intent.as_str());
    assert_eq!(shop.gateway.created(), 1);
    assert_eq!(shop.gateway.amount(&intent), Some(11399));

    let res = shop.client.post_empty("/api/checkout/next").await;
    assert_eq!(res.body["step"], "review");

    // Not paid yet
    let res = shop.client.post_empty("/api/checkout/process-order").await;
    assert_eq!(res.status, StatusCode::PAYMENT_REQUIRED);

    shop.gateway.confirm(&intent);
    let res = shop.client.post_empty("/api/checkout/process-order").await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["email"], "june@example.com");
    assert_eq!(res.body["total"], "113.99");
    assert_eq!(res.body["status"], "paid");
    assert!(!res.body["order_number"].as_str().unwrap().is_empty());

    let orders = OrderRepository::list(&*shop.store, 50, 0).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].payment_intent_id, intent);

    let product = ProductRepository::get(&*shop.store, orders[0].lines[0].product_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.stock, 3);

    let res = shop.client.get("/api/cart").await;
    assert_eq!(res.body["item_count"], 0);
}

#[tokio::test]
async fn free_shipping_above_threshold() {
    let (mut shop, ring) = shop_with_ring(5).await;
    let client = &mut shop.client;

    client
        .post("/api/cart/items", json!({ "product_id": ring, "quantity": 3 }))
        .await;
    let res = client.patch("/api/checkout", shipping_patch()).await;
    assert_eq!(res.body["totals"]["shipping"], "0.00");

    let res = client
        .patch("/api/checkout", json!({ "shipping_method": "express" }))
        .await;
    assert_eq!(res.body["totals"]["shipping"], "14.99");
}

#[tokio::test]
async fn resubmitting_a_placed_order_is_idempotent() {
    let (mut shop, ring) = shop_with_ring(5).await;
    let intent = at_review(&mut shop, ring).await;
    shop.gateway.confirm(&intent);

    // Simulate a first submission whose response never reached the browser
    let res = shop.client.get("/api/checkout").await;
    let draft: CheckoutDraft = serde_json::from_value(res.body).unwrap();
    let order = NewOrder::from_draft(&draft, &PricingPolicy::default(), OrderStatus::Paid).unwrap();
    OrderRepository::create(&*shop.store, &order).await.unwrap();

    let res = shop.client.post_empty("/api/checkout/process-order").await;
    assert_eq!(res.status, StatusCode::OK);

    let orders = OrderRepository::list(&*shop.store, 50, 0).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(res.body["order_number"], orders[0].order_number.as_str());
}

#[tokio::test]
async fn processing_again_after_success_returns_the_same_order() {
    let (mut shop, ring) = shop_with_ring(5).await;
    let intent = at_review(&mut shop, ring).await;
    shop.gateway.confirm(&intent);

    let first = shop.client.post_empty("/api/checkout/process-order").await;
    assert_eq!(first.status, StatusCode::CREATED);

    // Double click, or a retry after a dropped response
    let second = shop.client.post_empty("/api/checkout/process-order").await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body["order_number"], first.body["order_number"]);
    assert_eq!(second.body["status"], "paid");

    let orders = OrderRepository::list(&*shop.store, 50, 0).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(stock_of(&shop, ring).await, 3);

    // A visitor who never ordered has nothing to resubmit
    let mut other = shop.visitor();
    let res = other.post_empty("/api/checkout/process-order").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn payment_for_a_different_amount_is_refused() {
    let (mut shop, ring) = shop_with_ring(5).await;
    let intent = at_review(&mut shop, ring).await;
    shop.gateway.confirm(&intent);
    shop.gateway.set_amount(&intent, 100);

    let res = shop.client.post_empty("/api/checkout/process-order").await;
    assert_eq!(res.status, StatusCode::PAYMENT_REQUIRED);

    let orders = OrderRepository::list(&*shop.store, 50, 0).await.unwrap();
    assert!(orders.is_empty());
    assert_eq!(stock_of(&shop, ring).await, 5);

    let res = shop.client.get("/api/checkout").await;
    assert_eq!(res.body["step"], "review");
}

#[tokio::test]
async fn order_placed_by_a_concurrent_submission_is_returned() {
    let (mut shop, ring) = shop_with_ring(5).await;
    let intent = at_review(&mut shop, ring).await;
    shop.gateway.confirm(&intent);

    let res = shop.client.get("/api/checkout").await;
    let draft: CheckoutDraft = serde_json::from_value(res.body).unwrap();
    let order = NewOrder::from_draft(&draft, &PricingPolicy::default(), OrderStatus::Paid).unwrap();
    let order_number = order.order_number.clone();
    shop.gateway
        .place_order_on_next_retrieve(shop.store.clone(), order);

    let res = shop.client.post_empty("/api/checkout/process-order").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["order_number"], order_number.as_str());

    let orders = OrderRepository::list(&*shop.store, 50, 0).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(stock_of(&shop, ring).await, 3);

    let res = shop.client.get("/api/cart").await;
    assert_eq!(res.body["item_count"], 0);
}

#[tokio::test]
async fn changing_the_cart_on_review_blocks_the_order() {
    let (mut shop, ring) = shop_with_ring(5).await;
    let intent = at_review(&mut shop, ring).await;
    shop.gateway.confirm(&intent);

    shop.client
        .post("/api/cart/items", json!({ "product_id": ring }))
        .await;

    let res = shop.client.post_empty("/api/checkout/process-order").await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    // Any wizard call re-syncs and sends the visitor back to payment
    let res = shop.client.get("/api/checkout").await;
    assert_eq!(res.body["step"], "payment");
    assert!(res.body["payment_intent_id"].is_null());
    assert_eq!(res.body["totals"]["subtotal"], "150.00");
}

#[tokio::test]
async fn back_and_jump_between_steps() {
    let (mut shop, ring) = shop_with_ring(5).await;
    at_review(&mut shop, ring).await;
    let client = &mut shop.client;

    let res = client.post_empty("/api/checkout/back").await;
    assert_eq!(res.body["step"], "payment");

    let res = client.post_empty("/api/checkout/step/shipping").await;
    assert_eq!(res.body["step"], "shipping");

    let res = client.post_empty("/api/checkout/step/review").await;
    assert_eq!(res.body["step"], "review");

    let res = client.post_empty("/api/checkout/step/complete").await;
    assert_eq!(res.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn sessions_are_isolated() {
    let (mut shop, ring) = shop_with_ring(5).await;
    shop.client
        .post("/api/cart/items", json!({ "product_id": ring }))
        .await;

    let mut other = shop.visitor();
    let res = other.get("/api/cart").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["item_count"], 0);
}
