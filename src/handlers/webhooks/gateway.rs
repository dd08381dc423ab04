//! Storefront gateway webhook endpoint (`POST /api/payments/webhook`).
//!
//! The gateway references orders by `order_number`, with
//! `metadata.order_id` as a legacy fallback.

use axum::extract::State;
use serde::Deserialize;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;

use super::common::{
    order_ref_from, process_event, CompletionData, WebhookAck, WebhookEvent,
};

#[derive(Debug, Deserialize)]
pub struct WebhookMetadata {
    #[serde(default)]
    pub order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GatewayWebhook {
    pub event: String,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub metadata: Option<WebhookMetadata>,
    #[serde(default)]
    pub paid_at: Option<i64>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
}

fn parse_event(payload: GatewayWebhook) -> Result<WebhookEvent> {
    let order_number = payload
        .order_number
        .or(payload.metadata.and_then(|m| m.order_id));

    Ok(match payload.event.as_str() {
        "checkout.completed" => WebhookEvent::CheckoutCompleted(CompletionData {
            order_ref: order_ref_from(None, order_number)?,
            paid_at: payload.paid_at,
            payment_method: payload.payment_method,
            event_id: payload.event_id,
        }),
        "checkout.expired" => WebhookEvent::CheckoutExpired(order_ref_from(None, order_number)?),
        "checkout.cancelled" => {
            WebhookEvent::CheckoutCancelled(order_ref_from(None, order_number)?)
        }
        "checkout.failed" => WebhookEvent::CheckoutFailed(order_ref_from(None, order_number)?),
        other => {
            tracing::debug!("gateway webhook: ignoring event type '{}'", other);
            WebhookEvent::Ignored
        }
    })
}

pub async fn handle_gateway_webhook(
    State(state): State<AppState>,
    Json(payload): Json<GatewayWebhook>,
) -> Result<Json<WebhookAck>> {
    let event = parse_event(payload)?;
    let ack = process_event(&state, "gateway", event).await?;
    Ok(Json(ack))
}
