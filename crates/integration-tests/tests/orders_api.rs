//! Order history, payment and cancellation.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use rust_decimal_macros::dec;
use serde_json::{Value, json};

use storefront::config::StorefrontConfig;
use storefront_core::ProductId;
use storefront_integration_tests::{MUG, TestApp, TestClient};

/// Sign in as `user_id`, buy `quantity` mugs and return the order id.
async fn place_order(client: &mut TestClient, user_id: i32, quantity: i64, method: &str) -> i64 {
    client.login(user_id).await;
    client.add(MUG, quantity).await;
    let response = client.checkout_with(method).await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    assert_eq!(response.body["userId"], user_id);
    response.body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_guests_cannot_see_orders() {
    let app = TestApp::new().await;
    let mut client = app.client();

    let response = client.get("/orders").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["success"], false);

    let response = client.post("/orders/1/cancel", json!({})).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_history_lists_newest_first() {
    let app = TestApp::new().await;
    let mut client = app.client();

    let first = place_order(&mut client, 7, 1, "CARD").await;
    let second = place_order(&mut client, 7, 2, "CARD").await;

    let response = client.get("/orders").await;
    assert_eq!(response.status, StatusCode::OK);
    let ids: Vec<i64> = response
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|order| order["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![second, first]);
}

#[tokio::test]
async fn test_orders_of_other_users_are_not_found() {
    let app = TestApp::new().await;
    let mut owner = app.client();
    let mut other = app.client();

    let id = place_order(&mut owner, 7, 1, "CARD").await;
    other.login(8).await;

    let response = other.get(&format!("/orders/{id}")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let response = other.post(&format!("/orders/{id}/cancel"), json!({})).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(other.get("/orders").await.body.as_array().unwrap().is_empty());

    let response = owner.get(&format!("/orders/{id}")).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_history_is_paged() {
    let app = TestApp::new().await;
    let mut client = app.client();

    let mut placed = Vec::new();
    for _ in 0..3 {
        placed.push(place_order(&mut client, 7, 1, "CARD").await);
    }
    placed.reverse();

    let ids = |response: &Value| -> Vec<i64> {
        response
            .as_array()
            .unwrap()
            .iter()
            .map(|order| order["id"].as_i64().unwrap())
            .collect()
    };
    let first = client.get("/orders?page=0&size=2").await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(ids(&first.body), placed[..2].to_vec());
    let second = client.get("/orders?page=1&size=2").await;
    assert_eq!(ids(&second.body), placed[2..].to_vec());
    let past_end = client.get("/orders?page=5&size=2").await;
    assert!(ids(&past_end.body).is_empty());

    let response = client.get("/orders?page=first").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
}

#[tokio::test]
async fn test_non_numeric_order_id_is_bad_request() {
    let app = TestApp::new().await;
    let mut client = app.client();
    client.login(7).await;

    let response = client.get("/orders/latest").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_card_payment_confirms_order() {
    let app = TestApp::new().await;
    let mut client = app.client();
    let id = place_order(&mut client, 7, 1, "CARD").await;

    let response = client.post(&format!("/orders/{id}/pay"), json!({})).await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    assert_eq!(response.body["status"], "CONFIRMED");
    assert_eq!(response.body["paymentStatus"], "PAID");
    assert!(
        response.body["transactionId"]
            .as_str()
            .unwrap()
            .starts_with("TXN-")
    );

    let response = client.post(&format!("/orders/{id}/pay"), json!({})).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_declined_payment_cancels_and_restocks() {
    let config = StorefrontConfig {
        card_decline_above: Some(dec!(40.00)),
        ..StorefrontConfig::default()
    };
    let app = TestApp::with_config(config).await;
    let mut client = app.client();

    // 3 x 10.00 + 15.00 shipping
    let id = place_order(&mut client, 7, 3, "PAYPAL").await;
    assert_eq!(app.catalog.stock(ProductId::new(MUG)).await, Some(17));

    let response = client.post(&format!("/orders/{id}/pay"), json!({})).await;
    assert_eq!(response.status, StatusCode::PAYMENT_REQUIRED);

    let order = client.get(&format!("/orders/{id}")).await.body;
    assert_eq!(order["status"], "CANCELLED");
    assert_eq!(order["paymentStatus"], "FAILED");
    assert_eq!(app.catalog.stock(ProductId::new(MUG)).await, Some(20));
}

#[tokio::test]
async fn test_offline_methods_cannot_be_paid_online() {
    let app = TestApp::new().await;
    let mut client = app.client();
    let id = place_order(&mut client, 7, 1, "CASH_ON_DELIVERY").await;

    let response = client.post(&format!("/orders/{id}/pay"), json!({})).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let order = client.get(&format!("/orders/{id}")).await.body;
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["paymentStatus"], "PENDING");
}

#[tokio::test]
async fn test_cancel_restocks_once() {
    let app = TestApp::new().await;
    let mut client = app.client();
    let id = place_order(&mut client, 7, 4, "CARD").await;
    assert_eq!(app.catalog.stock(ProductId::new(MUG)).await, Some(16));

    let response = client.post(&format!("/orders/{id}/cancel"), json!({})).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "CANCELLED");
    assert_eq!(app.catalog.stock(ProductId::new(MUG)).await, Some(20));

    let response = client.post(&format!("/orders/{id}/cancel"), json!({})).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.message(),
        "invalid order transition from CANCELLED to CANCELLED"
    );
    assert_eq!(app.catalog.stock(ProductId::new(MUG)).await, Some(20));
}

#[tokio::test]
async fn test_cancelling_paid_order_refunds() {
    let app = TestApp::new().await;
    let mut client = app.client();
    let id = place_order(&mut client, 7, 1, "CARD").await;
    client.post(&format!("/orders/{id}/pay"), json!({})).await;

    let response = client.post(&format!("/orders/{id}/cancel"), json!({})).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "CANCELLED");
    assert_eq!(response.body["paymentStatus"], "REFUNDED");
}

#[tokio::test]
async fn test_confirm_receipt_requires_shipment() {
    let app = TestApp::new().await;
    let mut client = app.client();
    let id = place_order(&mut client, 7, 1, "CARD").await;

    let response = client
        .post(&format!("/orders/{id}/confirm-receipt"), json!({}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.message(),
        "invalid order transition from PENDING to DELIVERED"
    );
}

#[tokio::test]
async fn test_shipped_order_can_be_confirmed() {
    let app = TestApp::new().await;
    let mut client = app.client();
    let id = place_order(&mut client, 7, 1, "CARD").await;
    client.post(&format!("/orders/{id}/pay"), json!({})).await;

    let order_id = storefront_core::OrderId::new(i32::try_from(id).unwrap());
    for status in [
        storefront_core::OrderStatus::Processing,
        storefront_core::OrderStatus::Shipped,
    ] {
        app.state.orders().set_status(order_id, status).await.unwrap();
    }

    let response = client
        .post(&format!("/orders/{id}/confirm-receipt"), json!({}))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "DELIVERED");

    let response = client.post(&format!("/orders/{id}/cancel"), json!({})).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_detail_carries_lines() {
    let app = TestApp::new().await;
    let mut client = app.client();
    let id = place_order(&mut client, 7, 2, "CARD").await;

    let order: Value = client.get(&format!("/orders/{id}")).await.body;
    assert_eq!(order["items"][0]["productId"], MUG);
    assert_eq!(order["items"][0]["quantity"], 2);
    assert_eq!(order["items"][0]["productName"], format!("Product {MUG}"));
}
