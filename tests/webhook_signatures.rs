//! MoneyMotion webhook signature verification tests.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use common::*;
use magma::payments::verify_webhook_signature;

/// Get current Unix timestamp as a string (for webhook signature tests)
fn current_timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}

/// Get an old timestamp (for testing timestamp rejection)
fn old_timestamp() -> String {
    // 10 minutes ago - beyond the 5-minute tolerance
    (chrono::Utc::now().timestamp() - 600).to_string()
}

fn compute_signature(payload: &[u8], secret: &str, timestamp: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(signed_payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[test]
fn test_valid_signature() {
    let payload = b"{\"event\":\"payment.completed\"}";
    let timestamp = current_timestamp();
    let signature = compute_signature(payload, TEST_WEBHOOK_SECRET, &timestamp);
    let header = format!("t={},v1={}", timestamp, signature);

    let result = verify_webhook_signature(TEST_WEBHOOK_SECRET, payload, &header)
        .expect("Verification should not error");

    assert!(result, "Valid signature should be accepted");
}

#[test]
fn test_invalid_signature() {
    let payload = b"{\"event\":\"payment.completed\"}";
    let timestamp = current_timestamp();
    let signature = compute_signature(payload, "wrong_secret", &timestamp);
    let header = format!("t={},v1={}", timestamp, signature);

    let result = verify_webhook_signature(TEST_WEBHOOK_SECRET, payload, &header)
        .expect("Verification should not error");

    assert!(!result, "Invalid signature should be rejected");
}

#[test]
fn test_modified_payload() {
    let original = b"{\"event\":\"payment.completed\"}";
    let modified = b"{\"event\":\"payment.completed\",\"hacked\":true}";
    let timestamp = current_timestamp();
    let signature = compute_signature(original, TEST_WEBHOOK_SECRET, &timestamp);
    let header = format!("t={},v1={}", timestamp, signature);

    let result = verify_webhook_signature(TEST_WEBHOOK_SECRET, modified, &header)
        .expect("Verification should not error");

    assert!(!result, "Modified payload should be rejected");
}

#[test]
fn test_old_timestamp_rejected() {
    let payload = b"{\"event\":\"payment.completed\"}";
    let timestamp = old_timestamp();
    let signature = compute_signature(payload, TEST_WEBHOOK_SECRET, &timestamp);
    let header = format!("t={},v1={}", timestamp, signature);

    let result = verify_webhook_signature(TEST_WEBHOOK_SECRET, payload, &header)
        .expect("Verification should not error");

    assert!(!result, "Old timestamp should be rejected (replay prevention)");
}

#[test]
fn test_missing_timestamp_errors() {
    let payload = b"{}";
    let result = verify_webhook_signature(TEST_WEBHOOK_SECRET, payload, "v1=somesignature");
    assert!(result.is_err(), "Missing timestamp should error");
}

#[test]
fn test_missing_signature_errors() {
    let payload = b"{}";
    let result = verify_webhook_signature(TEST_WEBHOOK_SECRET, payload, "t=1234567890");
    assert!(result.is_err(), "Missing signature should error");
}

#[test]
fn test_malformed_header_errors() {
    let payload = b"{}";
    let result = verify_webhook_signature(TEST_WEBHOOK_SECRET, payload, "garbage");
    assert!(result.is_err(), "Malformed header should error");
}

// ============ Endpoint behavior with a configured secret ============

#[tokio::test]
async fn test_endpoint_rejects_missing_signature_header() {
    let state = create_test_app_state_with_webhook_secret();

    let response = post_json(
        app(state),
        "/api/payments/moneymotion/webhook",
        &json!({ "event": "payment.completed", "external_id": "mm_sess_1" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_endpoint_rejects_bad_signature() {
    let state = create_test_app_state_with_webhook_secret();
    let body = serde_json::to_vec(
        &json!({ "event": "payment.completed", "external_id": "mm_sess_1" }),
    )
    .unwrap();
    let timestamp = current_timestamp();
    let signature = compute_signature(&body, "wrong_secret", &timestamp);

    let response = app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/payments/moneymotion/webhook")
                .header("content-type", "application/json")
                .header(
                    "x-moneymotion-signature",
                    format!("t={},v1={}", timestamp, signature),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_endpoint_accepts_valid_signature() {
    let state = create_test_app_state_with_webhook_secret();
    let order = {
        let conn = state.db.get().unwrap();
        let product = create_test_product(&conn, "apex", "Magma Apex");
        create_test_order(&conn, &product, "buyer@example.com", "30 Days", 2999)
    };

    let body = serde_json::to_vec(&json!({
        "event": "payment.completed",
        "metadata": { "order_id": order.order_number }
    }))
    .unwrap();
    let timestamp = current_timestamp();
    let signature = compute_signature(&body, TEST_WEBHOOK_SECRET, &timestamp);

    let response = app(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/payments/moneymotion/webhook")
                .header("content-type", "application/json")
                .header(
                    "x-moneymotion-signature",
                    format!("t={},v1={}", timestamp, signature),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let conn = state.db.get().unwrap();
    assert_eq!(
        queries::get_order_by_number(&conn, &order.order_number)
            .unwrap()
            .unwrap()
            .status,
        OrderStatus::Completed
    );
}
