//! Provider-agnostic webhook processing.
//!
//! Provider endpoints parse their payload into a `WebhookEvent` and hand
//! it to `process_event`. All order transitions go through the status
//! transition table plus a compare-and-swap UPDATE, so duplicate and
//! out-of-order deliveries are acknowledged without side effects instead
//! of corrupting state.

use rusqlite::Connection;
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::keygen;
use crate::models::{
    CreateLicense, License, LicenseStatus, Order, OrderConfirmationData, OrderStatus,
    SessionStatus,
};

use super::super::emails::spawn_dispatch_trigger;

/// Acknowledgement body returned to the provider.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub success: bool,
    pub received: bool,
}

impl WebhookAck {
    pub fn ok() -> Self {
        Self {
            success: true,
            received: true,
        }
    }
}

/// Where a payload points at the order: a provider session ID, an order
/// number, or both. Providers differ in which they send.
#[derive(Debug, Default)]
pub struct OrderRef {
    pub session_id: Option<String>,
    pub order_number: Option<String>,
}

impl OrderRef {
    pub fn is_empty(&self) -> bool {
        self.session_id.is_none() && self.order_number.is_none()
    }
}

/// Data carried by a completion event.
#[derive(Debug)]
pub struct CompletionData {
    pub order_ref: OrderRef,
    /// Provider-reported payment time (Unix seconds)
    pub paid_at: Option<i64>,
    pub payment_method: Option<String>,
    /// Provider event ID for replay prevention (when present)
    pub event_id: Option<String>,
}

/// Parsed webhook event with provider-agnostic data.
#[derive(Debug)]
pub enum WebhookEvent {
    /// Payment succeeded - completes the order, creates/reuses the
    /// license, queues the confirmation email
    CheckoutCompleted(CompletionData),
    /// Checkout session expired without payment
    CheckoutExpired(OrderRef),
    /// Customer cancelled at the provider
    CheckoutCancelled(OrderRef),
    /// Payment attempt failed
    CheckoutFailed(OrderRef),
    /// Event type not relevant to order management
    Ignored,
}

/// Resolve an order from whatever reference the payload carried.
/// Session IDs try the cache first, then the orders table directly
/// (the cache is process-local and may have been lost to a restart).
fn resolve_order(state: &AppState, conn: &Connection, order_ref: &OrderRef) -> Result<Order> {
    if let Some(ref session_id) = order_ref.session_id {
        if let Some(cached) = state.sessions.get(session_id) {
            if let Some(order) = queries::get_order_by_number(conn, &cached.order_id)? {
                return Ok(order);
            }
        }
        if let Some(order) = queries::get_order_by_session(conn, session_id)? {
            return Ok(order);
        }
    }
    if let Some(ref order_number) = order_ref.order_number {
        if let Some(order) = queries::get_order_by_number(conn, order_number)? {
            return Ok(order);
        }
    }
    Err(AppError::NotFound(msg::ORDER_NOT_FOUND.into()))
}

/// Outcome of the completion path.
pub enum CompletionOutcome {
    /// Order freshly completed; carries the (created or reused) license.
    Completed { license: License },
    /// Duplicate delivery - the order was already past `pending`.
    AlreadyProcessed,
}

/// Complete an order: transition it, create or reuse the license, and
/// queue the confirmation email - all in one database transaction.
///
/// Idempotent: re-delivery hits the compare-and-swap and returns
/// `AlreadyProcessed` without generating a second license or email.
/// Also called inline by the purchase flow for zero-total orders.
pub fn complete_order(
    state: &AppState,
    conn: &mut Connection,
    provider: &str,
    order: &Order,
    paid_at: Option<i64>,
    payment_method: Option<&str>,
    event_id: Option<&str>,
) -> Result<CompletionOutcome> {
    let tx = conn.transaction()?;

    // Replay guard for deliveries carrying an event ID. Inside the
    // transaction so a failed completion rolls the ledger entry back and
    // the provider's retry can succeed.
    if let Some(eid) = event_id {
        if !queries::try_record_webhook_event(&tx, provider, eid)? {
            return Ok(CompletionOutcome::AlreadyProcessed);
        }
    }

    if !queries::transition_order(&tx, &order.id, OrderStatus::Pending, OrderStatus::Completed)? {
        // Lost the race or the order is already terminal. Either way the
        // delivery is acknowledged; re-running the side effects is what
        // used to duplicate confirmation emails.
        return Ok(CompletionOutcome::AlreadyProcessed);
    }

    if let Some(method) = payment_method {
        queries::set_order_payment_method(&tx, &order.id, method)?;
    }

    // The license key embeds the product slug; fall back to the stored
    // product name if the product row has since been removed.
    let slug = match queries::get_product_by_id(&tx, &order.product_id)? {
        Some(product) => product.slug,
        None => order.product_name.clone(),
    };

    let base_time = paid_at.unwrap_or_else(|| chrono::Utc::now().timestamp());
    let expires_at = keygen::duration_seconds(&order.duration).map(|secs| base_time + secs);
    let license_key =
        keygen::generate_license_key(&state.license_key_prefix, &slug, &order.duration);

    let (license, created) = queries::find_or_create_license(
        &tx,
        &license_key,
        &CreateLicense {
            customer_email: order.customer_email.clone(),
            product_id: order.product_id.clone(),
            product_name: order.product_name.clone(),
            duration: order.duration.clone(),
            status: LicenseStatus::Active,
            expires_at,
        },
    )?;

    let template_data = OrderConfirmationData {
        order_number: order.order_number.clone(),
        product_name: order.product_name.clone(),
        duration: order.duration.clone(),
        license_key: license.license_key.clone(),
        expires_at: license.expires_at,
        total_paid: order.total_cents,
    };

    queries::enqueue_email(
        &tx,
        &order.id,
        &order.customer_email,
        &format!("Your {} license key", order.product_name),
        "order_confirmation",
        &serde_json::to_string(&template_data)?,
    )?;

    tx.commit()?;

    tracing::info!(
        "{} checkout completed: order={}, license={}, reused={}",
        provider,
        order.order_number,
        license.license_key,
        !created
    );

    Ok(CompletionOutcome::Completed { license })
}

/// Apply a non-completion lifecycle event (expired / cancelled / failed).
fn apply_status_event(
    state: &AppState,
    conn: &Connection,
    provider: &str,
    order: &Order,
    to: OrderStatus,
    session_status: SessionStatus,
) -> Result<()> {
    if !order.status.can_transition_to(to) {
        // Out-of-order delivery (e.g. `expired` arriving after the order
        // completed). Acknowledge so the provider stops retrying, but do
        // not regress the status.
        tracing::warn!(
            "{} webhook: stale {} event for order {} in status {} - ignored",
            provider,
            to,
            order.order_number,
            order.status
        );
        return Ok(());
    }

    if !queries::transition_order(conn, &order.id, order.status, to)? {
        tracing::warn!(
            "{} webhook: lost transition race for order {} ({} -> {})",
            provider,
            order.order_number,
            order.status,
            to
        );
        return Ok(());
    }

    if let Some(ref session_id) = order.payment_session_id {
        state.sessions.set_status(session_id, session_status, None);
    }

    tracing::info!(
        "{} webhook: order {} transitioned {} -> {}",
        provider,
        order.order_number,
        order.status,
        to
    );
    Ok(())
}

/// Shared processing for a parsed webhook event.
pub async fn process_event(
    state: &AppState,
    provider: &str,
    event: WebhookEvent,
) -> Result<WebhookAck> {
    let mut conn = state.db.get()?;

    match event {
        WebhookEvent::CheckoutCompleted(data) => {
            if data.order_ref.is_empty() {
                return Err(AppError::BadRequest("missing order reference".into()));
            }
            let order = resolve_order(state, &conn, &data.order_ref)?;

            let outcome = complete_order(
                state,
                &mut conn,
                provider,
                &order,
                data.paid_at,
                data.payment_method.as_deref(),
                data.event_id.as_deref(),
            )?;

            if let CompletionOutcome::Completed { .. } = outcome {
                // Reflect payment in the session cache for check-status.
                let session_id = data
                    .order_ref
                    .session_id
                    .clone()
                    .or_else(|| order.payment_session_id.clone());
                if let Some(session_id) = session_id {
                    state
                        .sessions
                        .set_status(&session_id, SessionStatus::Paid, data.paid_at);
                }

                // Nudge the outbox drain; errors are swallowed, the
                // background task picks up anything this misses.
                spawn_dispatch_trigger(state.http_client.clone(), state.base_url.clone());
            }

            Ok(WebhookAck::ok())
        }
        WebhookEvent::CheckoutExpired(order_ref) => {
            let order = resolve_order(state, &conn, &order_ref)?;
            apply_status_event(
                state,
                &conn,
                provider,
                &order,
                OrderStatus::Expired,
                SessionStatus::Expired,
            )?;
            Ok(WebhookAck::ok())
        }
        WebhookEvent::CheckoutCancelled(order_ref) => {
            let order = resolve_order(state, &conn, &order_ref)?;
            apply_status_event(
                state,
                &conn,
                provider,
                &order,
                OrderStatus::Cancelled,
                SessionStatus::Cancelled,
            )?;
            Ok(WebhookAck::ok())
        }
        WebhookEvent::CheckoutFailed(order_ref) => {
            let order = resolve_order(state, &conn, &order_ref)?;
            apply_status_event(
                state,
                &conn,
                provider,
                &order,
                OrderStatus::Failed,
                SessionStatus::Failed,
            )?;
            Ok(WebhookAck::ok())
        }
        WebhookEvent::Ignored => Ok(WebhookAck::ok()),
    }
}

/// Helper shared by provider payload parsers: pick the first non-empty
/// order reference out of the payload's candidate fields.
pub fn order_ref_from(
    session_id: Option<String>,
    order_number: Option<String>,
) -> Result<OrderRef> {
    let order_ref = OrderRef {
        session_id: session_id.filter(|s| !s.is_empty()),
        order_number: order_number.filter(|s| !s.is_empty()),
    };
    (!order_ref.is_empty())
        .then_some(order_ref)
        .or_bad_request("missing order reference")
}
