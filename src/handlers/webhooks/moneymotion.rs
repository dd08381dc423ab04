//! MoneyMotion webhook endpoint (`POST /api/payments/moneymotion/webhook`).
//!
//! MoneyMotion references the checkout session in `external_id`, with
//! `metadata.order_id` as a fallback. Deliveries are signature-checked
//! when a webhook secret is configured.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde::Deserialize;

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::payments::verify_webhook_signature;

use super::common::{
    order_ref_from, process_event, CompletionData, WebhookAck, WebhookEvent,
};
use super::gateway::WebhookMetadata;

#[derive(Debug, Deserialize)]
pub struct MoneyMotionWebhook {
    pub event: String,
    /// Provider checkout session ID (`mm_sess_...`)
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<WebhookMetadata>,
    #[serde(default)]
    pub paid_at: Option<i64>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
}

fn parse_event(payload: MoneyMotionWebhook) -> Result<WebhookEvent> {
    let session_id = payload.external_id;
    let order_number = payload.metadata.and_then(|m| m.order_id);

    Ok(match payload.event.as_str() {
        "payment.completed" => WebhookEvent::CheckoutCompleted(CompletionData {
            order_ref: order_ref_from(session_id, order_number)?,
            paid_at: payload.paid_at,
            payment_method: payload.payment_method.or(Some("moneymotion".to_string())),
            event_id: payload.event_id,
        }),
        "payment.expired" => {
            WebhookEvent::CheckoutExpired(order_ref_from(session_id, order_number)?)
        }
        "payment.cancelled" => {
            WebhookEvent::CheckoutCancelled(order_ref_from(session_id, order_number)?)
        }
        "payment.failed" => WebhookEvent::CheckoutFailed(order_ref_from(session_id, order_number)?),
        other => {
            tracing::debug!("moneymotion webhook: ignoring event type '{}'", other);
            WebhookEvent::Ignored
        }
    })
}

pub async fn handle_moneymotion_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    // Verify the signature before touching the payload. Skipped when no
    // secret is configured (local/dev setups).
    if let Some(ref secret) = state.moneymotion_webhook_secret {
        let signature = headers
            .get("x-moneymotion-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::BadRequest("Missing x-moneymotion-signature header".into()))?;

        if !verify_webhook_signature(secret, &body, signature)? {
            return Err(AppError::Unauthorized);
        }
    }

    let payload: MoneyMotionWebhook = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON: {}", e)))?;

    let event = parse_event(payload)?;
    let ack = process_event(&state, "moneymotion", event).await?;
    Ok(Json(ack))
}
