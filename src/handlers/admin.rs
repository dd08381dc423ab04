//! Admin back-office API.
//!
//! All routes require the `x-admin-key` header to match the configured
//! admin key; the comparison is constant-time and the surface is fully
//! disabled when no key is configured.

use axum::{
    routing::{get, post},
    Router,
};
use axum::extract::State;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::{Json, Path, Query};
use crate::keygen;
use crate::models::{
    Coupon, CreateCoupon, CreateLicense, CreateProduct, License, LicenseStatus, Order,
    OrderStats, OrderStatus, Product,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/orders", get(list_orders))
        .route("/api/admin/orders/stats", get(order_stats))
        .route("/api/admin/orders/{order_number}/refund", post(refund_order))
        .route("/api/admin/licenses", get(list_licenses).post(create_license))
        .route("/api/admin/licenses/{license_key}/revoke", post(revoke_license))
        .route("/api/admin/coupons", get(list_coupons).post(create_coupon))
        .route("/api/admin/products", get(list_products).post(create_product))
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<()> {
    let Some(ref expected) = state.admin_api_key else {
        // No key configured: the whole admin surface is off.
        return Err(AppError::Unauthorized);
    };

    let provided = headers
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    if provided.len() != expected.len() {
        return Err(AppError::Unauthorized);
    }
    if !bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

// ============ Orders ============

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    #[serde(default)]
    pub status: Option<String>,
}

pub async fn list_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>> {
    require_admin(&state, &headers)?;

    let status = match query.status.as_deref() {
        Some(s) => Some(
            OrderStatus::from_str(s)
                .or_bad_request(&format!("unknown order status: {}", s))?,
        ),
        None => None,
    };

    let conn = state.db.get()?;
    Ok(Json(queries::list_orders(&conn, status)?))
}

pub async fn order_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<OrderStats>> {
    require_admin(&state, &headers)?;
    let conn = state.db.get()?;
    Ok(Json(queries::order_stats(&conn)?))
}

#[derive(Debug, Serialize)]
pub struct RefundResponse {
    pub success: bool,
    pub order: Order,
    pub license_revoked: bool,
}

/// Refund a completed order. The only path into `refunded`, and the only
/// order mutation that is not webhook-driven.
pub async fn refund_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_number): Path<String>,
) -> Result<Json<RefundResponse>> {
    require_admin(&state, &headers)?;

    let conn = state.db.get()?;
    let order =
        queries::get_order_by_number(&conn, &order_number)?.or_not_found(msg::ORDER_NOT_FOUND)?;

    if order.status != OrderStatus::Completed {
        return Err(AppError::BadRequest(format!(
            "only completed orders can be refunded (order is {})",
            order.status
        )));
    }

    if !queries::transition_order(&conn, &order.id, OrderStatus::Completed, OrderStatus::Refunded)?
    {
        return Err(AppError::BadRequest(
            "order is no longer in completed status".into(),
        ));
    }

    // Pull the customer's access along with the refund.
    let license_revoked = match queries::get_license_for_customer(
        &conn,
        &order.customer_email,
        &order.product_id,
    )? {
        Some(license) => queries::revoke_license(&conn, &license.license_key)?,
        None => false,
    };

    let order =
        queries::get_order_by_number(&conn, &order_number)?.or_not_found(msg::ORDER_NOT_FOUND)?;

    tracing::info!(
        "admin refund: order={}, license_revoked={}",
        order.order_number,
        license_revoked
    );

    Ok(Json(RefundResponse {
        success: true,
        order,
        license_revoked,
    }))
}

// ============ Licenses ============

pub async fn list_licenses(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<License>>> {
    require_admin(&state, &headers)?;
    let conn = state.db.get()?;
    Ok(Json(queries::list_licenses(&conn)?))
}

#[derive(Debug, Deserialize)]
pub struct CreateLicenseRequest {
    pub customer_email: String,
    /// Product ID or slug
    pub product: String,
    pub duration: String,
}

/// Issue a license key by hand (support replacements, giveaways). Starts
/// `unused` with no expiry; the clock starts when the customer activates.
pub async fn create_license(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateLicenseRequest>,
) -> Result<Json<License>> {
    require_admin(&state, &headers)?;

    if request.customer_email.trim().is_empty() {
        return Err(AppError::BadRequest(msg::EMAIL_EMPTY.into()));
    }

    let conn = state.db.get()?;
    let product = match queries::get_product_by_id(&conn, &request.product)? {
        Some(p) => p,
        None => queries::get_product_by_slug(&conn, &request.product)?
            .or_not_found(msg::PRODUCT_NOT_FOUND)?,
    };

    let license_key =
        keygen::generate_license_key(&state.license_key_prefix, &product.slug, &request.duration);

    let (license, created) = queries::find_or_create_license(
        &conn,
        &license_key,
        &CreateLicense {
            customer_email: request.customer_email.clone(),
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            duration: request.duration.clone(),
            status: LicenseStatus::Unused,
            expires_at: None,
        },
    )?;

    if !created {
        return Err(AppError::BadRequest(
            "a license already exists for this customer and product".into(),
        ));
    }

    Ok(Json(license))
}

#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    pub success: bool,
    pub license: License,
}

pub async fn revoke_license(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(license_key): Path<String>,
) -> Result<Json<RevokeResponse>> {
    require_admin(&state, &headers)?;

    let conn = state.db.get()?;
    if !queries::revoke_license(&conn, &license_key)? {
        // Either unknown or already revoked; disambiguate for the UI.
        return match queries::get_license_by_key(&conn, &license_key)? {
            Some(_) => Err(AppError::BadRequest("license is already revoked".into())),
            None => Err(AppError::NotFound(msg::LICENSE_NOT_FOUND.into())),
        };
    }

    let license = queries::get_license_by_key(&conn, &license_key)?
        .or_not_found(msg::LICENSE_NOT_FOUND)?;

    Ok(Json(RevokeResponse {
        success: true,
        license,
    }))
}

// ============ Coupons ============

pub async fn list_coupons(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Coupon>>> {
    require_admin(&state, &headers)?;
    let conn = state.db.get()?;
    Ok(Json(queries::list_coupons(&conn)?))
}

pub async fn create_coupon(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateCoupon>,
) -> Result<Json<Coupon>> {
    require_admin(&state, &headers)?;
    let conn = state.db.get()?;
    Ok(Json(queries::create_coupon(&conn, &request)?))
}

// ============ Products ============

pub async fn list_products(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Product>>> {
    require_admin(&state, &headers)?;
    let conn = state.db.get()?;
    Ok(Json(queries::list_products(&conn)?))
}

pub async fn create_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateProduct>,
) -> Result<Json<Product>> {
    require_admin(&state, &headers)?;
    let conn = state.db.get()?;
    Ok(Json(queries::create_product(&conn, &request)?))
}
