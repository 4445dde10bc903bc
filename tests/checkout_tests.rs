// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Razorpay checkout tests.
//!
//! Both endpoints run against in-process fake gateways that count how
//! often they are called and record what they received.

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    extract::Path,
    routing::{get, post},
    Json, Router,
};
use playzzle::config::Config;
use playzzle::services::razorpay::payment_signature;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

mod common;

#[derive(Default)]
struct GatewayLog {
    calls: AtomicUsize,
    last_body: Mutex<Option<Value>>,
    last_auth: Mutex<Option<String>>,
}

/// Fake `/v1/orders` answering with `status` and `body`.
async fn spawn_gateway(status: StatusCode, body: Value) -> (String, Arc<GatewayLog>) {
    let log = Arc::new(GatewayLog::default());
    let log_in_handler = log.clone();

    let router = Router::new().route(
        "/v1/orders",
        post(move |headers: HeaderMap, Json(order): Json<Value>| {
            let log = log_in_handler.clone();
            let response = body.clone();
            async move {
                log.calls.fetch_add(1, Ordering::SeqCst);
                *log.last_body.lock().unwrap() = Some(order);
                *log.last_auth.lock().unwrap() = headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                (status, Json(response))
            }
        }),
    );

    (common::spawn_server(router).await, log)
}

fn app_with_gateway(config: Config, razorpay_base: &str) -> axum::Router {
    let endpoints = common::TestEndpoints {
        razorpay_base: razorpay_base.to_string(),
        ..Default::default()
    };
    common::create_test_app_with(config, endpoints).0
}

fn post_json(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    request.body(Body::from(body.to_string())).unwrap()
}

fn sample_order() -> Value {
    json!({
        "id": "order_TEST123",
        "entity": "order",
        "amount": 4900,
        "currency": "INR",
        "status": "created"
    })
}

// ─── Order Creation ──────────────────────────────────────────

#[tokio::test]
async fn test_create_order_without_session_is_unauthorized() {
    let (base, log) = spawn_gateway(StatusCode::OK, sample_order()).await;
    let app = app_with_gateway(Config::test_default(), &base);

    let response = app
        .oneshot(post_json(
            "/api/razorpay",
            None,
            r#"{"amount":199,"planId":"pro_monthly"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(log.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_create_order_missing_fields_never_calls_gateway() {
    let (base, log) = spawn_gateway(StatusCode::OK, sample_order()).await;
    let app = app_with_gateway(Config::test_default(), &base);
    let cookie = common::session_cookie_header("user-abcdefghij", "player@example.com");

    for body in [
        r#"{"planId":"pro_monthly"}"#,
        r#"{"amount":199}"#,
        r#"{"amount":199,"planId":""}"#,
        r#"{"amount":1,"planId":"pro_monthly"}"#,
        r#"{"amount":199,"planId":"lifetime_gold"}"#,
        r#"{"amount":0,"planId":"pro_monthly"}"#,
        r#"{"amount":"lots","planId":"pro_monthly"}"#,
        r#"{}"#,
    ] {
        let response = app
            .clone()
            .oneshot(post_json("/api/razorpay", Some(&cookie), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
    }

    assert_eq!(log.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_create_order_without_credentials_fails_closed() {
    let (base, log) = spawn_gateway(StatusCode::OK, sample_order()).await;
    let mut config = Config::test_default();
    config.razorpay_key_secret = None;
    let app = app_with_gateway(config, &base);
    let cookie = common::session_cookie_header("user-1", "player@example.com");

    let response = app
        .oneshot(post_json(
            "/api/razorpay",
            Some(&cookie),
            r#"{"amount":199,"planId":"pro_monthly"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "Payment gateway is not configured");
    assert_eq!(log.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_create_order_passes_gateway_order_through() {
    let (base, log) = spawn_gateway(StatusCode::OK, sample_order()).await;
    let app = app_with_gateway(Config::test_default(), &base);
    let cookie = common::session_cookie_header("user-abcdefghij", "player@example.com");

    let response = app
        .oneshot(post_json(
            "/api/razorpay",
            Some(&cookie),
            r#"{"amount":49,"planId":"single_puzzle","puzzleId":"animals/_pro_a-cute-kitty.jpg"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::body_json(response).await, sample_order());
    assert_eq!(log.calls.load(Ordering::SeqCst), 1);

    let sent = log.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(sent["amount"], 4900);
    assert_eq!(sent["currency"], "INR");
    let receipt = sent["receipt"].as_str().unwrap();
    assert!(receipt.starts_with("rcpt_userabcd_"));
    assert!(receipt.len() <= 40);
    assert_eq!(sent["notes"]["userId"], "user-abcdefghij");
    assert_eq!(sent["notes"]["planId"], "single_puzzle");
    assert_eq!(sent["notes"]["email"], "player@example.com");
    assert_eq!(sent["notes"]["puzzleId"], "animals/_pro_a-cute-kitty.jpg");

    let auth = log.last_auth.lock().unwrap().clone().unwrap();
    assert!(auth.starts_with("Basic "));
}

#[tokio::test]
async fn test_create_order_gateway_error_is_surfaced() {
    let (base, log) = spawn_gateway(
        StatusCode::BAD_REQUEST,
        json!({
            "error": {
                "code": "BAD_REQUEST_ERROR",
                "description": "Order amount less than minimum amount allowed"
            }
        }),
    )
    .await;
    let app = app_with_gateway(Config::test_default(), &base);
    let cookie = common::session_cookie_header("user-1", "player@example.com");

    let response = app
        .oneshot(post_json(
            "/api/razorpay",
            Some(&cookie),
            r#"{"amount":199,"planId":"pro_monthly"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "Failed to create order");
    assert_eq!(
        body["details"],
        "Order amount less than minimum amount allowed"
    );
    assert_eq!(log.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_create_order_gateway_unreachable() {
    let app = app_with_gateway(Config::test_default(), common::UNREACHABLE);
    let cookie = common::session_cookie_header("user-1", "player@example.com");

    let response = app
        .oneshot(post_json(
            "/api/razorpay",
            Some(&cookie),
            r#"{"amount":199,"planId":"pro_monthly"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "Failed to create order");
    assert!(body.get("details").is_none());
}

// ─── Payment Verification ────────────────────────────────────

/// Fake `GET /v1/orders/{id}` answering with `status` and `body`.
async fn spawn_order_lookup(status: StatusCode, body: Value) -> (String, Arc<GatewayLog>) {
    let log = Arc::new(GatewayLog::default());
    let log_in_handler = log.clone();

    let router = Router::new().route(
        "/v1/orders/{id}",
        get(move |Path(id): Path<String>| {
            let log = log_in_handler.clone();
            let response = body.clone();
            async move {
                log.calls.fetch_add(1, Ordering::SeqCst);
                *log.last_body.lock().unwrap() = Some(json!({ "id": id }));
                (status, Json(response))
            }
        }),
    );

    (common::spawn_server(router).await, log)
}

fn gateway_order(notes: Value, amount: u64) -> Value {
    json!({
        "id": "order_TEST123",
        "entity": "order",
        "amount": amount,
        "currency": "INR",
        "status": "paid",
        "notes": notes,
    })
}

fn verify_body_for(plan_id: &str, signature: &str) -> String {
    json!({
        "razorpay_order_id": "order_TEST123",
        "razorpay_payment_id": "pay_TEST456",
        "razorpay_signature": signature,
        "planId": plan_id,
    })
    .to_string()
}

fn verify_body(signature: &str) -> String {
    verify_body_for("pro_monthly", signature)
}

fn good_signature() -> String {
    let secret = Config::test_default().razorpay_key_secret.unwrap();
    payment_signature("order_TEST123", "pay_TEST456", &secret).unwrap()
}

async fn verify_against(order: Value, uid: &str, body: &str) -> (StatusCode, Value, usize) {
    let (base, log) = spawn_order_lookup(StatusCode::OK, order).await;
    let app = app_with_gateway(Config::test_default(), &base);
    let cookie = common::session_cookie_header(uid, "player@example.com");

    let response = app
        .oneshot(post_json("/api/razorpay/verify", Some(&cookie), body))
        .await
        .unwrap();
    let status = response.status();
    let json = common::body_json(response).await;
    (status, json, log.calls.load(Ordering::SeqCst))
}

#[tokio::test]
async fn test_verify_rejects_bad_signature() {
    let (base, log) = spawn_order_lookup(StatusCode::OK, sample_order()).await;
    let app = app_with_gateway(Config::test_default(), &base);
    let cookie = common::session_cookie_header("user-1", "player@example.com");

    let forged = payment_signature("order_TEST123", "pay_TEST456", "wrong-secret").unwrap();
    let response = app
        .oneshot(post_json(
            "/api/razorpay/verify",
            Some(&cookie),
            &verify_body(&forged),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "Invalid payment signature");
    assert_eq!(log.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_verify_matching_order_reaches_persistence() {
    // Offline database: getting past the order checks means a DB error
    let order = gateway_order(json!({"userId": "user-1", "planId": "pro_monthly"}), 19900);
    let (status, body, lookups) =
        verify_against(order, "user-1", &verify_body(&good_signature())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Database error");
    assert_eq!(lookups, 1);
}

#[tokio::test]
async fn test_verify_rejects_order_of_another_user() {
    let order = gateway_order(json!({"userId": "user-2", "planId": "pro_monthly"}), 19900);
    let (status, body, lookups) =
        verify_against(order, "user-1", &verify_body(&good_signature())).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Order was not created for this user");
    assert_eq!(lookups, 1);
}

#[tokio::test]
async fn test_verify_rejects_plan_other_than_ordered() {
    // A paid single-puzzle order replayed as a yearly membership
    let order = gateway_order(json!({"userId": "user-1", "planId": "single_puzzle"}), 4900);
    let (status, body, _) = verify_against(
        order,
        "user-1",
        &verify_body_for("pro_yearly", &good_signature()),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "planId does not match the order");
}

#[tokio::test]
async fn test_verify_rejects_underpriced_order() {
    let order = gateway_order(json!({"userId": "user-1", "planId": "pro_monthly"}), 100);
    let (status, body, _) =
        verify_against(order, "user-1", &verify_body(&good_signature())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Order amount does not match the plan price");
}

#[tokio::test]
async fn test_verify_gateway_unreachable() {
    let app = app_with_gateway(Config::test_default(), common::UNREACHABLE);
    let cookie = common::session_cookie_header("user-1", "player@example.com");

    let response = app
        .oneshot(post_json(
            "/api/razorpay/verify",
            Some(&cookie),
            &verify_body(&good_signature()),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "Failed to verify payment");
}

#[tokio::test]
async fn test_verify_incomplete_body_is_bad_request() {
    let (app, _) = common::create_test_app();
    let cookie = common::session_cookie_header("user-1", "player@example.com");

    let response = app
        .oneshot(post_json(
            "/api/razorpay/verify",
            Some(&cookie),
            r#"{"razorpay_order_id":"order_1","planId":"pro_monthly"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verify_requires_session() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(post_json(
            "/api/razorpay/verify",
            None,
            &verify_body("deadbeef"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
