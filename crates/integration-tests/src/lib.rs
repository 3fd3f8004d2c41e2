//! Test harness for the storefront HTTP API.
//!
//! Every test gets its own in-memory backend and router; requests go through
//! `tower::ServiceExt::oneshot`, so no server or database is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p storefront-integration-tests
//! ```
//!
//! The authentication subsystem is outside this service. The harness stands
//! in for it with `POST /test/login/{userId}` and `POST /test/logout`, which
//! call [`complete_login`] and [`complete_logout`] exactly as it would.

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Json, Router,
    body::{Body, to_bytes},
    extract::{Path, State},
    http::{Method, Request, StatusCode, header},
    routing::post,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tower::ServiceExt;
use tower_sessions::{MemoryStore, Session};

use storefront::config::StorefrontConfig;
use storefront::db::MemoryCatalog;
use storefront::error::AppError;
use storefront::middleware::{complete_login, complete_logout, create_session_layer};
use storefront::models::{CurrentUser, Order};
use storefront::routes;
use storefront::services::notifications::{NotificationError, NotificationSink};
use storefront::services::payment::SimulatedGateway;
use storefront::state::{AppState, Stores};
use storefront_core::{
    CategoryId, DiscountType, Product, ProductId, Promotion, PromotionId, PromotionStatus, UserId,
};

/// A 10.00 product with plenty of stock.
pub const MUG: i32 = 1;
/// A 25.00 product with a single unit left.
pub const KETTLE: i32 = 2;
/// A 4.00 product in another category.
pub const TEA: i32 = 3;

/// Records notifications instead of delivering them.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub orders: Mutex<Vec<String>>,
    pub low_stock: Mutex<Vec<ProductId>>,
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn order_created(&self, order: &Order) -> Result<(), NotificationError> {
        self.orders.lock().unwrap().push(order.order_number.clone());
        Ok(())
    }

    async fn low_stock(&self, product: &Product) -> Result<(), NotificationError> {
        self.low_stock.lock().unwrap().push(product.id);
        Ok(())
    }
}

/// Build a product.
#[must_use]
pub fn product(id: i32, price: Decimal, stock: i32, category: i32) -> Product {
    Product {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        price,
        stock_quantity: stock,
        min_stock_threshold: 2,
        category_id: Some(CategoryId::new(category)),
        active: true,
        promotions: Vec::new(),
    }
}

/// An unbounded, always-active percentage promotion on one product.
#[must_use]
pub fn percent_off(id: i32, product: i32, percentage: Decimal) -> Promotion {
    Promotion {
        id: PromotionId::new(id),
        name: format!("{percentage}% off"),
        discount_type: DiscountType::Percentage,
        discount_percentage: Some(percentage),
        discount_amount: None,
        status: PromotionStatus::Active,
        start_date: None,
        end_date: None,
        max_uses: None,
        current_uses: 0,
        applicable_products: BTreeSet::from([ProductId::new(product)]),
        applicable_categories: BTreeSet::new(),
    }
}

/// A storefront with its own in-memory backend.
pub struct TestApp {
    pub state: AppState,
    pub catalog: Arc<MemoryCatalog>,
    pub notifier: Arc<RecordingNotifier>,
    router: Router,
}

impl TestApp {
    /// Default configuration and the standard catalog.
    pub async fn new() -> Self {
        Self::with_config(StorefrontConfig::default()).await
    }

    /// Custom configuration and the standard catalog.
    pub async fn with_config(config: StorefrontConfig) -> Self {
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.insert_product(product(MUG, dec!(10.00), 20, 1)).await;
        catalog.insert_product(product(KETTLE, dec!(25.00), 1, 1)).await;
        catalog.insert_product(product(TEA, dec!(4.00), 50, 2)).await;

        let notifier = Arc::new(RecordingNotifier::default());
        let gateway = Arc::new(SimulatedGateway::new(config.card_decline_above));
        let session_layer = create_session_layer(MemoryStore::default(), &config);
        let state = AppState::with_collaborators(
            config,
            Stores::in_memory(catalog.clone()),
            gateway,
            notifier.clone(),
        );

        let router = routes::routes()
            .route("/test/login/{user_id}", post(login))
            .route("/test/logout", post(logout))
            .layer(session_layer)
            .with_state(state.clone());

        Self {
            state,
            catalog,
            notifier,
            router,
        }
    }

    /// A client with its own session.
    #[must_use]
    pub fn client(&self) -> TestClient {
        TestClient {
            router: self.router.clone(),
            cookie: None,
        }
    }

    /// A client with its own session, signed in as `user_id`.
    pub async fn signed_in(&self, user_id: i32) -> TestClient {
        let mut client = self.client();
        let response = client.login(user_id).await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
        client
    }
}

async fn login(
    State(state): State<AppState>,
    session: Session,
    Path(user_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let user = CurrentUser {
        id: UserId::new(user_id),
    };
    let report = complete_login(&state, &session, user).await?;
    Ok(Json(json!({
        "merged": report.merged.len(),
        "skipped": report.skipped.len(),
    })))
}

async fn logout(session: Session) -> Result<Json<Value>, AppError> {
    complete_logout(&session).await?;
    Ok(Json(json!({ "success": true })))
}

/// A response with its JSON body.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestResponse {
    /// The `message` of an error body.
    #[must_use]
    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }
}

/// Sends requests through the router, keeping the session cookie like a
/// browser would.
#[derive(Clone)]
pub struct TestClient {
    router: Router,
    cookie: Option<String>,
}

impl TestClient {
    /// Send a request with an optional JSON body.
    pub async fn send(&mut self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            // An emptied session comes back as a removal cookie.
            self.cookie = (!pair.ends_with('=')).then(|| pair.to_string());
        }

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        TestResponse { status, body }
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&mut self, uri: &str, body: Value) -> TestResponse {
        self.send(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&mut self, uri: &str, body: Value) -> TestResponse {
        self.send(Method::PUT, uri, Some(body)).await
    }

    pub async fn delete(&mut self, uri: &str) -> TestResponse {
        self.send(Method::DELETE, uri, None).await
    }

    /// Sign in as `user_id`, merging the guest cart.
    pub async fn login(&mut self, user_id: i32) -> TestResponse {
        self.send(Method::POST, &format!("/test/login/{user_id}"), None)
            .await
    }

    /// Sign out.
    pub async fn logout(&mut self) -> TestResponse {
        self.send(Method::POST, "/test/logout", None).await
    }

    /// `POST /cart/items`, asserting success.
    pub async fn add(&mut self, product_id: i32, quantity: i64) -> Value {
        let response = self
            .post(
                "/cart/items",
                json!({ "productId": product_id, "quantity": quantity }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
        response.body
    }

    /// `POST /orders` with a card payment.
    pub async fn checkout(&mut self) -> TestResponse {
        self.checkout_with("CARD").await
    }

    /// `POST /orders` with the given payment method.
    pub async fn checkout_with(&mut self, payment_method: &str) -> TestResponse {
        self.post(
            "/orders",
            json!({
                "shippingAddress": "1 Main St, Springfield",
                "paymentMethod": payment_method,
            }),
        )
        .await
    }

    /// `GET /cart/count`.
    pub async fn count(&mut self) -> u64 {
        self.get("/cart/count").await.body["count"].as_u64().unwrap()
    }
}

/// Parse a decimal serialised as a string.
#[must_use]
pub fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}
