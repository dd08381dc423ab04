//! Purchase orchestration tests.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::*;

fn purchase_body(product: &Product, coupon: Option<&str>) -> serde_json::Value {
    json!({
        "productId": product.id,
        "productName": product.name,
        "productSlug": product.slug,
        "duration": "30 Days",
        "priceCents": 2999,
        "customerEmail": "buyer@example.com",
        "couponCode": coupon
    })
}

#[tokio::test]
async fn test_purchase_without_provider_returns_mock_checkout_url() {
    let state = create_test_app_state();
    let product = {
        let conn = state.db.get().unwrap();
        create_test_product(&conn, "apex", "Magma Apex")
    };

    let response = post_json(
        app(state.clone()),
        "/api/purchase",
        &purchase_body(&product, None),
    )
    .await;

    let (status, body) = response_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let checkout_url = body["checkoutUrl"].as_str().unwrap();
    assert!(
        checkout_url.starts_with("/payment/checkout?session="),
        "mock mode must return a local checkout URL, got {}",
        checkout_url
    );
    assert!(body["licenseKey"].is_null());

    // A pending order exists with the session attached
    let order_number = body["orderNumber"].as_str().unwrap();
    let conn = state.db.get().unwrap();
    let order = queries::get_order_by_number(&conn, order_number)
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_cents, 2999);
    assert!(order.payment_session_id.is_some());

    // And the session is cached for check-status
    let session_id = order.payment_session_id.unwrap();
    let session = state.sessions.get(&session_id).unwrap();
    assert_eq!(session.order_id, order.order_number);
    assert_eq!(session.status, SessionStatus::Pending);
}

#[tokio::test]
async fn test_purchase_applies_coupon_discount() {
    let state = create_test_app_state();
    let product = {
        let conn = state.db.get().unwrap();
        create_test_coupon(&conn, "SAVE20", 20, 10, None);
        create_test_product(&conn, "apex", "Magma Apex")
    };

    let response = post_json(
        app(state.clone()),
        "/api/purchase",
        &purchase_body(&product, Some("SAVE20")),
    )
    .await;

    let (status, body) = response_json(response).await;
    assert_eq!(status, StatusCode::OK);

    let conn = state.db.get().unwrap();
    let order = queries::get_order_by_number(&conn, body["orderNumber"].as_str().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(order.amount_cents, 2999);
    assert_eq!(order.discount_cents, 599); // 20% of 2999, integer division
    assert_eq!(order.total_cents, 2400);
    assert_eq!(order.coupon_code.as_deref(), Some("SAVE20"));

    // Redemption consumed a use
    let coupon = queries::get_coupon_by_code(&conn, "SAVE20").unwrap().unwrap();
    assert_eq!(coupon.current_uses, 1);
}

#[tokio::test]
async fn test_purchase_coupon_is_case_insensitive() {
    let state = create_test_app_state();
    let product = {
        let conn = state.db.get().unwrap();
        create_test_coupon(&conn, "SAVE20", 20, 10, None);
        create_test_product(&conn, "apex", "Magma Apex")
    };

    let response = post_json(
        app(state.clone()),
        "/api/purchase",
        &purchase_body(&product, Some("save20")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);

    let conn = state.db.get().unwrap();
    let coupon = queries::get_coupon_by_code(&conn, "SAVE20").unwrap().unwrap();
    assert_eq!(coupon.current_uses, 1);
}

#[tokio::test]
async fn test_purchase_with_full_discount_returns_license_key_inline() {
    let state = create_test_app_state();
    let product = {
        let conn = state.db.get().unwrap();
        create_test_coupon(&conn, "COMP100", 100, 5, None);
        create_test_product(&conn, "apex", "Magma Apex")
    };

    let response = post_json(
        app(state.clone()),
        "/api/purchase",
        &purchase_body(&product, Some("COMP100")),
    )
    .await;

    let (status, body) = response_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["checkoutUrl"].is_null());

    let license_key = body["licenseKey"].as_str().unwrap();
    assert!(license_key.starts_with("MGMA-APEX-30D-"));

    let conn = state.db.get().unwrap();
    let order = queries::get_order_by_number(&conn, body["orderNumber"].as_str().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.total_cents, 0);

    // Confirmation email queued exactly once
    let emails = queries::emails_for_order(&conn, &order.id).unwrap();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].status, EmailStatus::Pending);
}

#[tokio::test]
async fn test_purchase_with_invalid_coupon_returns_400() {
    let state = create_test_app_state();
    let product = {
        let conn = state.db.get().unwrap();
        create_test_product(&conn, "apex", "Magma Apex")
    };

    let response = post_json(
        app(state.clone()),
        "/api/purchase",
        &purchase_body(&product, Some("NOPE")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // No order is left behind
    let conn = state.db.get().unwrap();
    assert!(queries::list_orders(&conn, None).unwrap().is_empty());
}

#[tokio::test]
async fn test_purchase_with_exhausted_coupon_returns_400() {
    let state = create_test_app_state();
    let product = {
        let conn = state.db.get().unwrap();
        let coupon = create_test_coupon(&conn, "ONEUSE", 10, 1, None);
        assert!(queries::try_redeem_coupon(&conn, &coupon.code).unwrap());
        create_test_product(&conn, "apex", "Magma Apex")
    };

    let response = post_json(
        app(state),
        "/api/purchase",
        &purchase_body(&product, Some("ONEUSE")),
    )
    .await;

    let (status, body) = response_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let details = body["details"].as_str().unwrap_or("");
    assert!(
        details.contains("usage limit"),
        "should reject on usage limit, got: {}",
        details
    );
}

#[tokio::test]
async fn test_purchase_resolves_placeholder_id_via_slug() {
    let state = create_test_app_state();
    let product = {
        let conn = state.db.get().unwrap();
        create_test_product(&conn, "apex", "Magma Apex")
    };

    // Storefront placeholder ID; only the slug identifies the product
    let body = json!({
        "productId": "00000000-0000-0000-0000-000000000001",
        "productName": "Magma Apex",
        "productSlug": "apex",
        "duration": "7 Days",
        "priceCents": 999,
        "customerEmail": "buyer@example.com"
    });

    let response = post_json(app(state.clone()), "/api/purchase", &body).await;
    let (status, response_body) = response_json(response).await;
    assert_eq!(status, StatusCode::OK);

    let conn = state.db.get().unwrap();
    let order =
        queries::get_order_by_number(&conn, response_body["orderNumber"].as_str().unwrap())
            .unwrap()
            .unwrap();
    assert_eq!(order.product_id, product.id, "slug resolution must find the real product");
}

#[tokio::test]
async fn test_purchase_unknown_product_returns_404() {
    let state = create_test_app_state();

    let body = json!({
        "productId": "placeholder",
        "productName": "Ghost Product",
        "productSlug": "ghost",
        "duration": "30 Days",
        "priceCents": 999,
        "customerEmail": "buyer@example.com"
    });

    let response = post_json(app(state), "/api/purchase", &body).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_purchase_empty_email_returns_400() {
    let state = create_test_app_state();
    let product = {
        let conn = state.db.get().unwrap();
        create_test_product(&conn, "apex", "Magma Apex")
    };

    let body = json!({
        "productId": product.id,
        "productName": product.name,
        "productSlug": product.slug,
        "duration": "30 Days",
        "priceCents": 999,
        "customerEmail": "  "
    });

    let response = post_json(app(state), "/api/purchase", &body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_purchase_repeat_buy_reuses_license() {
    let state = create_test_app_state();
    let product = {
        let conn = state.db.get().unwrap();
        create_test_coupon(&conn, "COMP100", 100, 5, None);
        create_test_product(&conn, "apex", "Magma Apex")
    };

    let mut keys = Vec::new();
    for _ in 0..2 {
        let response = post_json(
            app(state.clone()),
            "/api/purchase",
            &purchase_body(&product, Some("COMP100")),
        )
        .await;
        let (status, body) = response_json(response).await;
        assert_eq!(status, StatusCode::OK);
        keys.push(body["licenseKey"].as_str().unwrap().to_string());
    }

    assert_eq!(keys[0], keys[1], "repeat purchase must reuse the existing key");

    let conn = state.db.get().unwrap();
    assert_eq!(queries::list_licenses(&conn).unwrap().len(), 1);
}
