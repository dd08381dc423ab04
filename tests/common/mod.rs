//! Test utilities and fixtures for Magma integration tests

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use serde_json::Value;
use tower::ServiceExt;

pub use magma::db::{init_db, queries, AppState, DbPool};
pub use magma::email::EmailService;
pub use magma::handlers;
pub use magma::models::*;
pub use magma::payments::{new_session, SessionCache};

pub const TEST_ADMIN_KEY: &str = "test-admin-key";
pub const TEST_WEBHOOK_SECRET: &str = "mm_whsec_test_secret";

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create an AppState for testing with an in-memory database.
///
/// Pool size 1 so every handler sees the same in-memory database.
/// base_url points at an unroutable port so fire-and-forget dispatch
/// triggers fail fast and silently.
pub fn create_test_app_state() -> AppState {
    let manager = SqliteConnectionManager::memory();
    let pool: DbPool = Pool::builder().max_size(1).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    AppState {
        db: pool,
        base_url: "http://127.0.0.1:1".to_string(),
        license_key_prefix: "MGMA".to_string(),
        admin_api_key: Some(TEST_ADMIN_KEY.to_string()),
        moneymotion: None,
        moneymotion_webhook_secret: None,
        sessions: Arc::new(SessionCache::new()),
        email_service: Arc::new(EmailService::new(None, "test@magma.gg".to_string())),
        http_client: reqwest::Client::new(),
    }
}

/// Same as `create_test_app_state` but with webhook signature
/// verification enabled.
pub fn create_test_app_state_with_webhook_secret() -> AppState {
    let mut state = create_test_app_state();
    state.moneymotion_webhook_secret = Some(TEST_WEBHOOK_SECRET.to_string());
    state
}

/// Create a Router with every endpoint group mounted
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(handlers::purchase::router())
        .merge(handlers::payments::router())
        .merge(handlers::webhooks::router())
        .merge(handlers::emails::router())
        .merge(handlers::admin::router())
        .with_state(state)
}

// ============ Fixtures ============

pub fn create_test_product(conn: &Connection, slug: &str, name: &str) -> Product {
    queries::create_product(
        conn,
        &CreateProduct {
            slug: slug.to_string(),
            name: name.to_string(),
        },
    )
    .expect("Failed to create test product")
}

pub fn create_test_order(
    conn: &Connection,
    product: &Product,
    customer_email: &str,
    duration: &str,
    amount_cents: i64,
) -> Order {
    queries::create_order(
        conn,
        &CreateOrder {
            customer_email: customer_email.to_string(),
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            duration: duration.to_string(),
            amount_cents,
            discount_cents: 0,
            coupon_code: None,
            payment_method: None,
        },
    )
    .expect("Failed to create test order")
}

pub fn create_test_coupon(
    conn: &Connection,
    code: &str,
    discount_percent: i64,
    max_uses: i64,
    valid_until: Option<i64>,
) -> Coupon {
    queries::create_coupon(
        conn,
        &CreateCoupon {
            code: code.to_string(),
            discount_percent,
            max_uses,
            valid_until,
        },
    )
    .expect("Failed to create test coupon")
}

/// Get the current timestamp
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Get a future timestamp (days from now)
pub fn future_timestamp(days: i64) -> i64 {
    now() + (days * 86400)
}

/// Get a past timestamp (days ago)
pub fn past_timestamp(days: i64) -> i64 {
    now() - (days * 86400)
}

// ============ Request helpers ============

/// POST a JSON body and return the response.
pub async fn post_json(app: Router, uri: &str, body: &Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(body).unwrap()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// POST a JSON body with the test admin key attached.
pub async fn post_json_admin(app: Router, uri: &str, body: &Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-admin-key", TEST_ADMIN_KEY)
            .body(Body::from(serde_json::to_string(body).unwrap()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Plain GET.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// GET with the test admin key attached.
pub async fn get_admin(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("GET")
            .uri(uri)
            .header("x-admin-key", TEST_ADMIN_KEY)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Read a response body as JSON.
pub async fn response_json(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Response should be valid JSON")
    };
    (status, json)
}
