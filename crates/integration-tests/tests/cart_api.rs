//! Cart API tests for guest sessions.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use rust_decimal_macros::dec;
use serde_json::json;

use storefront_integration_tests::{KETTLE, MUG, TEA, TestApp, decimal, percent_off};

#[tokio::test]
async fn test_new_session_has_empty_cart() {
    let app = TestApp::new().await;
    let mut client = app.client();

    let response = client.get("/cart").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["items"].as_array().unwrap().len(), 0);
    assert_eq!(response.body["totalItems"], 0);
    assert_eq!(decimal(&response.body["totalAmount"]), dec!(0));
}

#[tokio::test]
async fn test_adding_same_product_increments_one_line() {
    let app = TestApp::new().await;
    let mut client = app.client();

    let first = client.add(MUG, 2).await;
    let second = client.add(MUG, 3).await;

    assert_eq!(first["item"]["id"], second["item"]["id"]);
    assert_eq!(second["item"]["quantity"], 5);
    assert_eq!(second["totalItems"], 5);

    let cart = client.get("/cart").await.body;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(decimal(&cart["totalAmount"]), dec!(50.00));
}

#[tokio::test]
async fn test_split_adds_match_single_add() {
    let app = TestApp::new().await;
    let mut split = app.client();
    let mut single = app.client();

    split.add(TEA, 4).await;
    let split_line = split.add(TEA, 6).await["item"].clone();
    let single_line = single.add(TEA, 10).await["item"].clone();

    for field in ["productId", "quantity", "unitPrice", "lineTotal"] {
        assert_eq!(split_line[field], single_line[field], "{field}");
    }
}

#[tokio::test]
async fn test_quantity_defaults_to_one() {
    let app = TestApp::new().await;
    let mut client = app.client();

    let response = client.post("/cart/items", json!({ "productId": TEA })).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["item"]["quantity"], 1);
}

#[tokio::test]
async fn test_invalid_quantities_are_rejected() {
    let app = TestApp::new().await;
    let mut client = app.client();

    for quantity in [0, -1, 1000] {
        let response = client
            .post("/cart/items", json!({ "productId": MUG, "quantity": quantity }))
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "quantity {quantity}");
        assert_eq!(response.body["success"], false);
    }
    assert_eq!(client.count().await, 0);
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let app = TestApp::new().await;
    let mut client = app.client();

    let response = client
        .post("/cart/items", json!({ "productId": 999, "quantity": 1 }))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = TestApp::new().await;
    let mut client = app.client();

    let response = client
        .post("/cart/items", json!({ "productId": "mug" }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
}

#[tokio::test]
async fn test_update_sets_quantity() {
    let app = TestApp::new().await;
    let mut client = app.client();

    let added = client.add(MUG, 2).await;
    let line_id = added["item"]["id"].as_i64().unwrap();

    let response = client
        .put(&format!("/cart/items/{line_id}"), json!({ "quantity": 7 }))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["quantity"], 7);
    assert_eq!(decimal(&response.body["lineTotal"]), dec!(70.00));
    assert_eq!(client.count().await, 7);

    let response = client
        .put(&format!("/cart/items/{line_id}"), json!({ "quantity": 0 }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(client.count().await, 7);
}

#[tokio::test]
async fn test_update_unknown_line_is_not_found() {
    let app = TestApp::new().await;
    let mut client = app.client();

    let response = client.put("/cart/items/42", json!({ "quantity": 1 })).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let app = TestApp::new().await;
    let mut client = app.client();

    client.add(MUG, 1).await;
    let tea = client.add(TEA, 2).await;
    let line_id = tea["item"]["id"].as_i64().unwrap();

    let first = client.delete(&format!("/cart/items/{line_id}")).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["totalItems"], 1);

    let second = client.delete(&format!("/cart/items/{line_id}")).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body["totalItems"], 1);
}

#[tokio::test]
async fn test_clear_empties_cart() {
    let app = TestApp::new().await;
    let mut client = app.client();

    client.add(MUG, 1).await;
    client.add(TEA, 3).await;

    let response = client.delete("/cart").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["totalItems"], 0);
    assert_eq!(client.count().await, 0);
}

#[tokio::test]
async fn test_line_keeps_price_from_when_it_was_added() {
    let app = TestApp::new().await;
    let mut client = app.client();

    client.add(MUG, 1).await;
    app.catalog
        .set_price(storefront_core::ProductId::new(MUG), dec!(12.00))
        .await;
    client.add(MUG, 1).await;
    client.add(KETTLE, 1).await;

    let cart = client.get("/cart").await.body;
    let mug = &cart["items"][0];
    assert_eq!(decimal(&mug["unitPrice"]), dec!(10.00));
    assert_eq!(decimal(&mug["lineTotal"]), dec!(20.00));
    assert_eq!(decimal(&cart["totalAmount"]), dec!(45.00));
}

#[tokio::test]
async fn test_promotion_is_applied_on_read() {
    let app = TestApp::new().await;
    let mut client = app.client();

    let added = client.add(MUG, 2).await;
    assert!(added["item"].get("discountedPrice").is_none());

    app.catalog.insert_promotion(percent_off(1, MUG, dec!(20))).await;

    let cart = client.get("/cart").await.body;
    let line = &cart["items"][0];
    assert_eq!(decimal(&line["unitPrice"]), dec!(10.00));
    assert_eq!(decimal(&line["discountedPrice"]), dec!(8.00));
    assert_eq!(line["promotionId"], 1);
    assert_eq!(decimal(&line["lineTotal"]), dec!(16.00));
    assert_eq!(decimal(&cart["totalAmount"]), dec!(16.00));
}

#[tokio::test]
async fn test_guest_sessions_are_isolated() {
    let app = TestApp::new().await;
    let mut alice = app.client();
    let mut bob = app.client();

    alice.add(MUG, 2).await;
    bob.add(TEA, 1).await;

    assert_eq!(alice.count().await, 2);
    assert_eq!(bob.count().await, 1);

    let bob_cart = bob.get("/cart").await.body;
    assert_eq!(bob_cart["items"][0]["productId"], TEA);
}

#[tokio::test]
async fn test_deleted_product_drops_out_of_view() {
    let app = TestApp::new().await;
    let mut client = app.client();

    client.add(MUG, 1).await;
    client.add(TEA, 1).await;
    app.catalog
        .remove_product(storefront_core::ProductId::new(TEA))
        .await;

    let cart = client.get("/cart").await.body;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(decimal(&cart["totalAmount"]), dec!(10.00));
}

#[tokio::test]
async fn test_update_of_deleted_product_drops_line() {
    let app = TestApp::new().await;
    let mut client = app.client();

    let added = client.add(TEA, 2).await;
    let line_id = added["item"]["id"].as_i64().unwrap();
    app.catalog
        .remove_product(storefront_core::ProductId::new(TEA))
        .await;

    let response = client
        .put(&format!("/cart/items/{line_id}"), json!({ "quantity": 7 }))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(client.count().await, 0);
}
