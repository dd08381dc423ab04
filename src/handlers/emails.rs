//! Email outbox dispatch.
//!
//! The outbox is drained by `POST /api/emails/dispatch`: purchase
//! completion fires a fire-and-forget request at it, and the background
//! maintenance task calls the same drain directly as a safety net.

use std::time::Duration;

use axum::{routing::post, Router};
use axum::extract::State;
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::Result;
use crate::extractors::Json;
use crate::models::{EmailStatus, OrderConfirmationData, OutboundEmail};

/// Rows drained per dispatch call.
const DISPATCH_BATCH_SIZE: i64 = 20;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/emails/dispatch", post(dispatch_emails))
}

#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub success: bool,
    pub processed: usize,
    pub sent: usize,
    pub failed: usize,
}

async fn deliver(state: &AppState, email: &OutboundEmail) -> std::result::Result<(), String> {
    match email.template.as_str() {
        "order_confirmation" => {
            let data: OrderConfirmationData = serde_json::from_str(&email.template_data)
                .map_err(|e| format!("bad template data: {}", e))?;
            state
                .email_service
                .send_order_confirmation(&email.to_email, &email.subject, &data)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string())
        }
        other => Err(format!("unknown template: {}", other)),
    }
}

/// Drain a batch of pending outbox rows. Shared by the HTTP endpoint and
/// the background task.
pub async fn drain_outbox(state: &AppState) -> Result<DispatchResponse> {
    let batch = {
        let conn = state.db.get()?;
        queries::pending_emails(&conn, DISPATCH_BATCH_SIZE)?
    };

    let mut sent = 0;
    let mut failed = 0;

    for email in &batch {
        debug_assert_eq!(email.status, EmailStatus::Pending);

        match deliver(state, email).await {
            Ok(()) => {
                let conn = state.db.get()?;
                queries::mark_email_sent(&conn, &email.id)?;
                sent += 1;
            }
            Err(error) => {
                tracing::warn!(
                    email_id = %email.id,
                    to = %email.to_email,
                    "outbox delivery failed: {}",
                    error
                );
                let conn = state.db.get()?;
                queries::mark_email_failed(&conn, &email.id, &error)?;
                failed += 1;
            }
        }
    }

    Ok(DispatchResponse {
        success: true,
        processed: batch.len(),
        sent,
        failed,
    })
}

pub async fn dispatch_emails(State(state): State<AppState>) -> Result<Json<DispatchResponse>> {
    let response = drain_outbox(&state).await?;
    if response.processed > 0 {
        tracing::info!(
            "outbox dispatch: processed={}, sent={}, failed={}",
            response.processed,
            response.sent,
            response.failed
        );
    }
    Ok(Json(response))
}

/// Fire-and-forget nudge at the dispatch endpoint after a purchase
/// completes. Errors are swallowed: the background drain picks up
/// anything this misses.
pub fn spawn_dispatch_trigger(client: reqwest::Client, base_url: String) {
    tokio::spawn(async move {
        let url = format!("{}/api/emails/dispatch", base_url);
        if let Err(e) = client
            .post(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            tracing::debug!("outbox dispatch trigger failed: {}", e);
        }
    });
}
