//! API Integration Tests
//!
//! Drive the full router over the in-memory store.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::util::ServiceExt;

use car_market::{build_router, AppState, InMemoryStore};

mod common;

async fn app() -> (Router, common::Seed) {
    let store = InMemoryStore::new();
    let seed = common::seed(&store).await;
    let app = build_router(AppState::new(store, 100));
    (app, seed)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-Authenticated-User", user);
    }
    let body = match body {
        Some(body) => {
            builder = builder.header("content-type", "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app().await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_correlation_id_is_echoed() {
    let (app, _) = app().await;
    let correlation_id = "6c8a1f8e-2d4b-4c1e-9f3a-0b7d5e9a1c22";

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/cars")
                .header("X-Authenticated-User", "buyer_user")
                .header("X-Correlation-Id", correlation_id)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-correlation-id").unwrap(),
        correlation_id
    );
}

#[tokio::test]
async fn test_purchase_and_sell_e2e() {
    let (app, seed) = app().await;
    let car_id = seed.cheap_car.id;

    // 1. Purchase
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/me/cars/{}/purchase", car_id),
        Some("buyer_user"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "purchase failed: {}", body);
    assert_eq!(body["balanceInCents"], 5_000);
    assert_eq!(body["salesCount"], 1);

    // 2. Owned cars
    let (status, body) = send(&app, "GET", "/api/v1/me/cars", Some("buyer_user"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalElements"], 1);
    assert_eq!(body["content"][0]["id"], car_id);
    assert_eq!(body["content"][0]["engine"]["horsePower"], 140);

    // 3. Purchase again
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/me/cars/{}/purchase", car_id),
        Some("buyer_user"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["errorCode"], "car-already-purchased");

    // 4. Sell
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/me/cars/{}/sell", car_id),
        Some("buyer_user"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payoutInCents"], 4_000);
    assert_eq!(body["balanceInCents"], 9_000);

    // 5. Sell again
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/me/cars/{}/sell", car_id),
        Some("buyer_user"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errorCode"], "not-found");
    assert_eq!(
        body["errorMessage"],
        format!("User has no car with id {}", car_id)
    );
}

#[tokio::test]
async fn test_purchase_insufficient_funds() {
    let (app, seed) = app().await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/me/cars/{}/purchase", seed.pricey_car.id),
        Some("buyer_user"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["errorCode"], "insufficient-funds");
    assert_eq!(
        body["errorMessage"],
        "Insufficient funds to purchase the car, price: 50000; balance: 10000"
    );
}

#[tokio::test]
async fn test_missing_and_unknown_actor() {
    let (app, _) = app().await;

    let (status, body) = send(&app, "GET", "/api/v1/cars", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["errorCode"], "unauthorized");
    assert_eq!(body["errorMessage"], "User not authenticated");

    let (status, body) = send(&app, "GET", "/api/v1/cars", Some("nobody_here"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errorCode"], "not-found");
}

#[tokio::test]
async fn test_role_checks() {
    let (app, seed) = app().await;

    let (status, body) = send(&app, "GET", "/api/v1/admin/users", Some("buyer_user"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["errorCode"], "forbidden");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/me/cars/{}/purchase", seed.cheap_car.id),
        Some("admin_user"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // catalog is open to both roles
    let (status, _) = send(&app, "GET", "/api/v1/cars", Some("admin_user"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_catalog_listing() {
    let (app, seed) = app().await;

    let (status, body) = send(
        &app,
        "GET",
        "/api/v1/cars?page=0&pageSize=1",
        Some("buyer_user"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pageSize"], 1);
    assert_eq!(body["totalElements"], 2);
    assert_eq!(body["totalPages"], 2);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/cars/{}", seed.pricey_car.id),
        Some("buyer_user"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model"], "Porsche 911");
    assert_eq!(body["priceInCents"], 50_000);

    let (status, body) = send(&app, "GET", "/api/v1/cars/777", Some("buyer_user"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errorMessage"], "Car with id 777 not found");

    let (status, body) = send(
        &app,
        "GET",
        "/api/v1/engines?capacity=1.8",
        Some("buyer_user"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalElements"], 1);

    let (status, body) = send(&app, "GET", "/api/v1/cars?page=-1", Some("buyer_user"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "invalid-request");
}

#[tokio::test]
async fn test_admin_balance_adjustment() {
    let (app, seed) = app().await;
    let uri = format!("/api/v1/admin/users/{}/balance", seed.buyer.user_id);

    let (status, body) = send(
        &app,
        "PATCH",
        &uri,
        Some("admin_user"),
        Some(json!({ "amountInCents": -20_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["errorCode"], "insufficient-funds");
    assert_eq!(
        body["errorMessage"],
        "Insufficient funds to decrease the balance, requested amount: 20000; balance: 10000"
    );

    let (status, body) = send(
        &app,
        "PATCH",
        &uri,
        Some("admin_user"),
        Some(json!({ "amountInCents": 5_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balanceInCents"], 15_000);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/admin/users/{}", seed.buyer.user_id),
        Some("admin_user"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balanceInCents"], 15_000);
    assert_eq!(body["cars"], json!([]));

    let (status, body) = send(
        &app,
        "PATCH",
        "/api/v1/admin/users/999/balance",
        Some("admin_user"),
        Some(json!({ "amountInCents": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errorMessage"], "User with id '999' not found");
}

#[tokio::test]
async fn test_admin_create_user() {
    let (app, _) = app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/admin/users",
        Some("admin_user"),
        Some(json!({
            "username": "new_customer",
            "password": "hunter2hunter2",
            "balanceInCents": 7_500,
            "roleIds": [2]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
    assert_eq!(body["username"], "new_customer");
    assert_eq!(body["roles"], json!(["ROLE_USER"]));

    // the new user can act immediately
    let (status, body) = send(&app, "GET", "/api/v1/me/cars", Some("new_customer"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalElements"], 0);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/admin/users",
        Some("admin_user"),
        Some(json!({
            "username": "bad",
            "password": "hunter2hunter2",
            "balanceInCents": 7_500,
            "roleIds": [2]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "invalid-request");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/admin/users",
        Some("admin_user"),
        Some(json!({ "username": "missing_fields" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "invalid-request");

    let (_, users) = send(&app, "GET", "/api/v1/admin/users", Some("admin_user"), None).await;
    assert_eq!(users["totalElements"], 3);
}

#[tokio::test]
async fn test_admin_user_cars() {
    let (app, seed) = app().await;

    send(
        &app,
        "POST",
        &format!("/api/v1/me/cars/{}/purchase", seed.cheap_car.id),
        Some("buyer_user"),
        None,
    )
    .await;

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/admin/users/{}/cars", seed.buyer.user_id),
        Some("admin_user"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalElements"], 1);
    assert_eq!(body["content"][0]["salesCount"], 1);

    let (status, body) = send(&app, "GET", "/api/v1/admin/users", Some("admin_user"), None).await;
    assert_eq!(status, StatusCode::OK);
    let buyer = body["content"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["username"] == "buyer_user")
        .cloned()
        .unwrap();
    assert_eq!(buyer["ownedCarsCount"], 1);
    assert_eq!(buyer["balanceInCents"], 5_000);
}
