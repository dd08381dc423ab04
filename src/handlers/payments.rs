//! Payment session endpoints: create-session and check-status.
//!
//! Sessions live in the process-local cache and front the provider's
//! status API. Without a MoneyMotion API key the service issues local
//! mock sessions whose checkout URL points at the storefront's own
//! checkout page.

use axum::{
    routing::{get, post},
    Router,
};
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::{Json, Query};
use crate::id::EntityType;
use crate::models::{Order, PaymentSession, SessionStatus};
use crate::payments::new_session;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/payments/moneymotion/create-session",
            post(create_session),
        )
        .route(
            "/api/payments/moneymotion/check-status",
            get(check_status),
        )
        // Legacy storefront routes, same handlers
        .route("/api/payments/create-session", post(create_session))
        .route("/api/payments/check-status", get(check_status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub amount_cents: i64,
    pub currency: String,
    pub customer_email: String,
    /// Order number of the order being paid
    pub order_id: String,
    pub product_id: String,
    pub license_duration: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub success: bool,
    pub session_id: String,
    pub checkout_url: String,
}

/// Create a checkout session for an existing order and cache it.
///
/// Shared with the purchase flow, which calls this against the order it
/// just created. Acquires its own database connection after the provider
/// call returns, so callers must not hold one across this await.
pub async fn create_session_for_order(
    state: &AppState,
    order: &Order,
    currency: &str,
) -> Result<(String, String)> {
    let (session_id, checkout_url, method) = match &state.moneymotion {
        Some(client) => {
            let success_url = format!(
                "{}/payment/success?order={}",
                state.base_url, order.order_number
            );
            let cancel_url = format!("{}/payment/cancelled", state.base_url);

            let (session_id, checkout_url) = client
                .create_session(
                    order.total_cents,
                    currency,
                    &order.customer_email,
                    &order.order_number,
                    &order.product_id,
                    &order.duration,
                    &success_url,
                    &cancel_url,
                )
                .await?;
            (session_id, checkout_url, "moneymotion")
        }
        None => {
            // No provider configured: local mock checkout. The webhook
            // (or a dev tool) still drives completion.
            let session_id = EntityType::PaymentSession.gen_id();
            let checkout_url = format!("/payment/checkout?session={}", session_id);
            (session_id, checkout_url, "mock")
        }
    };

    state.sessions.insert(new_session(
        &session_id,
        &order.order_number,
        &order.product_id,
        order.total_cents,
        currency,
        &order.customer_email,
    ));
    {
        let conn = state.db.get()?;
        queries::set_order_session(&conn, &order.id, &session_id, Some(method))?;
    }

    Ok((session_id, checkout_url))
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>> {
    if request.amount_cents <= 0 {
        return Err(AppError::BadRequest("amount must be positive".into()));
    }
    if request.customer_email.trim().is_empty() {
        return Err(AppError::BadRequest(msg::EMAIL_EMPTY.into()));
    }

    let order = {
        let conn = state.db.get()?;
        queries::get_order_by_number(&conn, &request.order_id)?
            .or_not_found(msg::ORDER_NOT_FOUND)?
    };

    let (session_id, checkout_url) =
        create_session_for_order(&state, &order, &request.currency).await?;

    Ok(Json(CreateSessionResponse {
        success: true,
        session_id,
        checkout_url,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CheckStatusQuery {
    pub session: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckStatusResponse {
    pub success: bool,
    pub status: SessionStatus,
    pub paid: bool,
    pub amount_cents: i64,
    pub currency: String,
    pub customer_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<i64>,
}

impl CheckStatusResponse {
    fn from_session(session: &PaymentSession) -> Self {
        Self {
            success: true,
            status: session.status,
            paid: session.status == SessionStatus::Paid,
            amount_cents: session.amount_cents,
            currency: session.currency.clone(),
            customer_email: session.customer_email.clone(),
            paid_at: session.paid_at,
        }
    }
}

pub async fn check_status(
    State(state): State<AppState>,
    Query(query): Query<CheckStatusQuery>,
) -> Result<Json<CheckStatusResponse>> {
    // Terminal cached statuses are authoritative - the provider will
    // never change them again.
    if let Some(cached) = state.sessions.get(&query.session) {
        if cached.status.is_terminal() {
            return Ok(Json(CheckStatusResponse::from_session(&cached)));
        }
    }

    match &state.moneymotion {
        Some(client) => {
            let provider_session = client.fetch_session(&query.session).await?;
            let status = SessionStatus::from_str(&provider_session.status)
                .unwrap_or(SessionStatus::Pending);

            if !state
                .sessions
                .set_status(&query.session, status, provider_session.paid_at)
            {
                // Cache lost to a restart: rebuild the entry from the
                // provider snapshot so the next poll is a cache hit.
                let order_number = {
                    let conn = state.db.get()?;
                    queries::get_order_by_session(&conn, &query.session)?
                        .map(|o| o.order_number)
                        .unwrap_or_default()
                };
                let mut session = new_session(
                    &provider_session.id,
                    &order_number,
                    "",
                    provider_session.amount,
                    &provider_session.currency,
                    provider_session.customer_email.as_deref().unwrap_or(""),
                );
                session.status = status;
                session.paid_at = provider_session.paid_at;
                state.sessions.insert(session);
            }

            let session = state
                .sessions
                .get(&query.session)
                .or_not_found(msg::SESSION_NOT_FOUND)?;
            Ok(Json(CheckStatusResponse::from_session(&session)))
        }
        None => {
            // Mock mode has no provider to fall back to; the cache is all
            // there is.
            let session = state
                .sessions
                .get(&query.session)
                .or_not_found(msg::SESSION_NOT_FOUND)?;
            Ok(Json(CheckStatusResponse::from_session(&session)))
        }
    }
}
