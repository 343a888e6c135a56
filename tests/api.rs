//! HTTP surface tests against the in-memory store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Duration;
use order_core::{
    middleware::auth::{ROLE_ADMIN, ROLE_USER, issue_token},
    models::NewProduct,
    repository::InMemoryStore,
    routes::create_router,
    state::AppState,
};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &str = "api-test-secret";
const ALICE: i64 = 10;
const BOB: i64 = 11;
const ADMIN: i64 = 1;

fn setup() -> (axum::Router, AppState) {
    let state = AppState::new(Arc::new(InMemoryStore::new()), SECRET);
    (create_router(state.clone()), state)
}

fn token(user_id: i64, role: &str) -> String {
    issue_token(SECRET, user_id, role, Duration::hours(1)).unwrap()
}

fn request(method: &str, uri: &str, user: Option<(i64, &str)>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((user_id, role)) = user {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(user_id, role)));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn seed_product(state: &AppState, name: &str, price: Decimal, stock: i32) -> i64 {
    state
        .catalog
        .create(NewProduct {
            name: name.into(),
            description: None,
            price,
            stock,
            category: None,
            image_url: None,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn health_is_public() {
    let (app, _) = setup();
    let (status, body) = send(&app, request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn missing_or_bad_token_is_unauthorized() {
    let (app, _) = setup();
    let (status, body) = send(&app, request("GET", "/api/cart", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["data"]["error"], "unauthorized");

    let bad = Request::builder()
        .uri("/api/cart")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, bad).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn product_writes_require_admin() {
    let (app, _) = setup();
    let payload = json!({ "name": "Mug", "price": "8.00", "stock": 3 });

    let (status, _) = send(
        &app,
        request("POST", "/api/products", Some((ALICE, ROLE_USER)), Some(payload.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        request("POST", "/api/products", Some((ADMIN, ROLE_ADMIN)), Some(payload)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["price"], "8.00");

    let (status, body) = send(&app, request("GET", "/api/products?q=mug", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 1);
}

#[tokio::test]
async fn empty_cart_checkout_is_unprocessable() {
    let (app, _) = setup();
    let (status, _) = send(&app, request("GET", "/api/cart", Some((ALICE, ROLE_USER)), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/orders",
            Some((ALICE, ROLE_USER)),
            Some(json!({ "shipping_address": "1 Main St" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["data"]["error"], "empty_cart");
    assert_eq!(body["message"], "cart is empty");
}

#[tokio::test]
async fn malformed_checkout_body_is_bad_request_not_business_error() {
    let (app, state) = setup();
    let product_id = seed_product(&state, "Pen", Decimal::ONE, 10).await;
    state.carts.add_item(ALICE, product_id, 1).await.unwrap();

    let (status, body) = send(
        &app,
        request("POST", "/api/orders", Some((ALICE, ROLE_USER)), Some(json!({}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["error"], "invalid_input");
    assert!(body["message"].as_str().unwrap().contains("shipping_address"));
    assert_eq!(state.orders.list_for_user(ALICE, Default::default()).await.unwrap().1, 0);

    let no_body = Request::builder()
        .method("POST")
        .uri("/api/orders")
        .header(header::AUTHORIZATION, format!("Bearer {}", token(ALICE, ROLE_USER)))
        .body(Body::from("not json"))
        .unwrap();
    let (status, body) = send(&app, no_body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["error"], "invalid_input");
}

#[tokio::test]
async fn malformed_path_and_query_use_the_error_envelope() {
    let (app, _) = setup();

    let (status, body) = send(&app, request("GET", "/api/products/abc", None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["error"], "invalid_input");

    let (status, body) = send(&app, request("GET", "/api/products?page=first", None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["error"], "invalid_input");

    let (status, body) = send(
        &app,
        request(
            "PUT",
            "/api/cart/items/1",
            Some((ALICE, ROLE_USER)),
            Some(json!({ "quantity": "lots" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["error"], "invalid_input");
}

#[tokio::test]
async fn checkout_then_owner_only_access() {
    let (app, state) = setup();
    let product_id = seed_product(&state, "Lamp", Decimal::new(1999, 2), 5).await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/cart/items",
            Some((ALICE, ROLE_USER)),
            Some(json!({ "product_id": product_id, "quantity": 2 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["subtotal"], "39.98");

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/orders",
            Some((ALICE, ROLE_USER)),
            Some(json!({ "shipping_address": "1 Main St" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["replayed"], false);
    assert_eq!(body["data"]["order"]["status"], "pending");
    let order_id = body["data"]["order"]["id"].as_i64().unwrap();

    let uri = format!("/api/orders/{order_id}");
    let (status, _) = send(&app, request("GET", &uri, Some((ALICE, ROLE_USER)), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, request("GET", &uri, Some((BOB, ROLE_USER)), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["data"]["error"], "forbidden");

    let (status, body) = send(&app, request("GET", "/api/orders", Some((BOB, ROLE_USER)), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 0);
}

#[tokio::test]
async fn idempotency_header_replays_with_200() {
    let (app, state) = setup();
    let product_id = seed_product(&state, "Pen", Decimal::ONE, 10).await;
    state.carts.add_item(ALICE, product_id, 1).await.unwrap();

    let key = uuid::Uuid::new_v4().to_string();
    let checkout = || {
        let mut req = request(
            "POST",
            "/api/orders",
            Some((ALICE, ROLE_USER)),
            Some(json!({ "shipping_address": "1 Main St" })),
        );
        req.headers_mut()
            .insert("idempotency-key", key.parse().unwrap());
        req
    };

    let (status, first) = send(&app, checkout()).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, second) = send(&app, checkout()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["replayed"], true);
    assert_eq!(first["data"]["order"]["id"], second["data"]["order"]["id"]);
}

#[tokio::test]
async fn admin_status_updates_validate_input() {
    let (app, state) = setup();
    let product_id = seed_product(&state, "Cup", Decimal::ONE, 10).await;
    state.carts.add_item(ALICE, product_id, 1).await.unwrap();
    let order = state
        .checkout
        .checkout(
            ALICE,
            order_core::dto::orders::CheckoutRequest {
                shipping_address: "1 Main St".into(),
                idempotency_key: None,
            },
        )
        .await
        .unwrap()
        .order;
    let uri = format!("/api/admin/orders/{}/status", order.id);

    let (status, body) = send(
        &app,
        request("PATCH", &uri, Some((ADMIN, ROLE_ADMIN)), Some(json!({ "status": "paid" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["error"], "invalid_input");

    let (status, body) = send(
        &app,
        request("PATCH", &uri, Some((ADMIN, ROLE_ADMIN)), Some(json!({ "status": "delivered" }))),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["data"]["error"], "invalid_transition");

    let (status, _) = send(
        &app,
        request("PATCH", &uri, Some((ALICE, ROLE_USER)), Some(json!({ "status": "confirmed" }))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        request("PATCH", &uri, Some((ADMIN, ROLE_ADMIN)), Some(json!({ "status": "confirmed" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "confirmed");
}

#[tokio::test]
async fn inventory_adjustments_and_low_stock() {
    let (app, state) = setup();
    let product_id = seed_product(&state, "Stapler", Decimal::ONE, 2).await;
    let uri = format!("/api/admin/inventory/{product_id}");

    let (status, body) = send(
        &app,
        request("PATCH", &uri, Some((ADMIN, ROLE_ADMIN)), Some(json!({ "delta": -5 }))),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["data"]["error"], "insufficient_stock");

    let (status, body) = send(
        &app,
        request(
            "GET",
            "/api/admin/inventory/low-stock?threshold=3",
            Some((ADMIN, ROLE_ADMIN)),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"][0]["id"], product_id);

    let (status, body) = send(
        &app,
        request("PATCH", &uri, Some((ADMIN, ROLE_ADMIN)), Some(json!({ "delta": 10 }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stock"], 12);
}

#[tokio::test]
async fn unknown_routes_fall_through_to_404() {
    let (app, _) = setup();
    let (status, body) = send(&app, request("GET", "/api/nope", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["path"], "/api/nope");
}
