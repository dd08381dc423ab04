//! Purchase orchestration: the storefront's checkout action.
//!
//! Validates the product reference, applies an optional coupon, writes a
//! pending order, and hands off to the payment provider (or completes
//! inline for zero-total orders).

use axum::{routing::post, Router};
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::Json;
use crate::handlers::payments::create_session_for_order;
use crate::handlers::webhooks::common::{complete_order, CompletionOutcome};
use crate::id::is_valid_prefixed_id;
use crate::models::{CreateOrder, Product};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/purchase", post(process_purchase))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    /// May be a real product ID or a storefront placeholder; placeholders
    /// are re-resolved via the slug
    pub product_id: String,
    pub product_name: String,
    pub product_slug: String,
    pub duration: String,
    pub price_cents: i64,
    pub customer_email: String,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
    pub success: bool,
    pub order_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_key: Option<String>,
}

/// Resolve the product the storefront is pointing at. The storefront
/// sometimes sends placeholder IDs (catalog rows that were seeded
/// client-side), so anything that isn't a known product ID falls back to
/// slug resolution.
fn resolve_product(
    conn: &rusqlite::Connection,
    product_id: &str,
    product_slug: &str,
) -> Result<Product> {
    if is_valid_prefixed_id(product_id) {
        if let Some(product) = queries::get_product_by_id(conn, product_id)? {
            return Ok(product);
        }
    }
    queries::get_product_by_slug(conn, product_slug)?.or_not_found(msg::PRODUCT_NOT_FOUND)
}

pub async fn process_purchase(
    State(state): State<AppState>,
    Json(request): Json<PurchaseRequest>,
) -> Result<Json<PurchaseResponse>> {
    if request.customer_email.trim().is_empty() {
        return Err(AppError::BadRequest(msg::EMAIL_EMPTY.into()));
    }
    if request.price_cents < 0 {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }

    // All pre-provider database work happens with a scoped connection so
    // none is held across the provider call below.
    let order = {
        let mut conn = state.db.get()?;

        let product = resolve_product(&conn, &request.product_id, &request.product_slug)?;
        if !product.active {
            return Err(AppError::BadRequest("product is not available".into()));
        }

        // Coupon: validate for a precise rejection reason, then consume
        // one use atomically. The redeem can still lose a race after a
        // clean validation, which surfaces as the usage-limit error.
        let mut discount_cents = 0;
        let mut coupon_code = None;
        if let Some(ref code) = request.coupon_code {
            if !code.trim().is_empty() {
                let validation = queries::validate_coupon(&conn, code)?;
                let Some(discount_percent) = validation.discount_percent else {
                    return Err(AppError::BadRequest(
                        validation
                            .reason
                            .unwrap_or_else(|| "invalid coupon".to_string()),
                    ));
                };
                if !queries::try_redeem_coupon(&conn, code)? {
                    return Err(AppError::BadRequest("coupon usage limit reached".into()));
                }
                discount_cents = request.price_cents * discount_percent / 100;
                coupon_code = Some(code.trim().to_uppercase());
            }
        }

        let order = queries::create_order(
            &conn,
            &CreateOrder {
                customer_email: request.customer_email.clone(),
                product_id: product.id.clone(),
                product_name: request.product_name.clone(),
                duration: request.duration.clone(),
                amount_cents: request.price_cents,
                discount_cents,
                coupon_code,
                payment_method: None,
            },
        )?;

        // Fully discounted orders skip the provider entirely: complete
        // now and hand the key back.
        if order.total_cents == 0 {
            let outcome = complete_order(
                &state,
                &mut conn,
                "coupon",
                &order,
                None,
                Some("coupon"),
                None,
            )?;
            let license = match outcome {
                CompletionOutcome::Completed { license } => license,
                CompletionOutcome::AlreadyProcessed => {
                    return Err(AppError::Internal("fresh order already completed".into()))
                }
            };

            crate::handlers::emails::spawn_dispatch_trigger(
                state.http_client.clone(),
                state.base_url.clone(),
            );

            return Ok(Json(PurchaseResponse {
                success: true,
                order_number: order.order_number,
                checkout_url: None,
                license_key: Some(license.license_key),
            }));
        }

        order
    };

    match create_session_for_order(&state, &order, "usd").await {
        Ok((_, checkout_url)) => Ok(Json(PurchaseResponse {
            success: true,
            order_number: order.order_number,
            checkout_url: Some(checkout_url),
            license_key: None,
        })),
        Err(e) => {
            // Compensating action: the pending order is useless without a
            // session, so remove it before surfacing the provider error.
            let cleanup = state
                .db
                .get()
                .map_err(AppError::from)
                .and_then(|conn| queries::delete_pending_order(&conn, &order.id));
            if let Err(del_err) = cleanup {
                tracing::error!(
                    "failed to clean up order {} after session failure: {}",
                    order.order_number,
                    del_err
                );
            }
            Err(e)
        }
    }
}
