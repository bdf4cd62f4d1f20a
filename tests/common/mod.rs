//! Shared helpers for the integration tests.
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use http_body_util::BodyExt;
use rentals::commands;
use rentals::config::AppConfig;
use rentals::db::Database;
use rentals::models::NewBooking;
use rentals::services::state::AppState;
use serde_json::Value;
use std::sync::Once;
use tower::ServiceExt;

static INIT: Once = Once::new();

pub const PASSWORD: &str = "correct horse";

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,rentals=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn test_config() -> AppConfig {
    AppConfig {
        session_secret: Some("integration-secret".to_string()),
        password_plain: Some(PASSWORD.to_string()),
        ..AppConfig::default()
    }
}

pub fn test_db() -> Database {
    init_tracing();
    let db = Database::open_in_memory().expect("open in-memory database");
    db.ensure_apartments().expect("seed apartments");
    db
}

pub fn test_state() -> AppState {
    AppState::new(test_db(), test_config())
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn new_booking(
    apartment_id: &str,
    start: NaiveDate,
    end: NaiveDate,
    revenue: f64,
) -> NewBooking {
    NewBooking {
        apartment_id: apartment_id.to_string(),
        start_date: start,
        end_date: end,
        net_revenue_dkk: revenue,
    }
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 0.01,
        "expected {expected}, got {actual}"
    );
}

/// Sends a request through the router and returns status plus JSON body.
pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("build request");

    let response = router.clone().oneshot(request).await.expect("router response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}

/// Logs in and returns the `name=value` pair to send back as a cookie.
pub async fn login(router: &Router) -> String {
    let request = Request::builder()
        .method("POST")
        .uri("/api/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({ "password": PASSWORD }).to_string(),
        ))
        .expect("build login request");
    let response = router.clone().oneshot(request).await.expect("login response");
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("session cookie");
    set_cookie
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string()
}

pub fn app() -> Router {
    commands::router(test_state())
}
