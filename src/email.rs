//! Confirmation email rendering and delivery.
//!
//! Two modes:
//! 1. Send via Resend API (when an API key is configured)
//! 2. Log-only (dev mode; the outbox row is still marked sent so the
//!    queue drains)

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::OrderConfirmationData;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Format a Unix timestamp as a human-readable date (e.g., "Jan 15, 2026")
fn format_date(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "Unknown date".to_string())
}

/// Format integer cents as a dollar string (e.g., "$29.99")
fn format_cents(cents: i64) -> String {
    format!("${}.{:02}", cents / 100, (cents % 100).abs())
}

/// Outcome of a delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailDeliveryResult {
    /// Delivered through the Resend API
    Sent,
    /// No API key configured; rendered and logged only
    Logged,
}

#[derive(Debug, Serialize)]
struct ResendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    text: String,
    html: String,
}

#[derive(Debug, Deserialize)]
struct ResendEmailResponse {
    #[allow(dead_code)]
    id: String,
}

/// Email service backed by the Resend API.
pub struct EmailService {
    api_key: Option<String>,
    from_email: String,
    http_client: Client,
}

impl EmailService {
    pub fn new(api_key: Option<String>, from_email: String) -> Self {
        Self {
            api_key,
            from_email,
            http_client: Client::new(),
        }
    }

    /// Render the order confirmation template: (text, html).
    pub fn render_order_confirmation(data: &OrderConfirmationData) -> (String, String) {
        let expires_line = match data.expires_at {
            Some(ts) => format!("Expires: {}", format_date(ts)),
            None => "Expires: never (lifetime access)".to_string(),
        };
        let total = format_cents(data.total_paid);

        let text = format!(
            "Thanks for your order!\n\nOrder {}\n{} - {}\nTotal paid: {}\n\nYour license key:\n\n{}\n\n{}\n\nKeep this key safe - you will need it to activate the product.",
            data.order_number,
            data.product_name,
            data.duration,
            total,
            data.license_key,
            expires_line,
        );

        let html = format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #333;">Thanks for your order!</h2>
<p><strong>Order {}</strong></p>
<p>{} <span style="color: #666;">({})</span></p>
<p>Total paid: <strong>{}</strong></p>
<div style="background: #f5f5f5; padding: 20px; border-radius: 8px; text-align: center; margin: 24px 0;">
<code style="font-size: 22px; font-weight: bold; letter-spacing: 2px; color: #333;">{}</code>
</div>
<p style="color: #666;">{}</p>
<hr style="border: none; border-top: 1px solid #eee; margin: 30px 0;">
<p style="color: #999; font-size: 12px;">Keep this key safe - you will need it to activate the product.</p>
</body>
</html>"#,
            data.order_number, data.product_name, data.duration, total, data.license_key, expires_line,
        );

        (text, html)
    }

    /// Deliver an order confirmation. Falls back to log-only when no API
    /// key is configured so dev environments drain the outbox too.
    pub async fn send_order_confirmation(
        &self,
        to_email: &str,
        subject: &str,
        data: &OrderConfirmationData,
    ) -> Result<EmailDeliveryResult> {
        let (text, html) = Self::render_order_confirmation(data);

        let Some(ref api_key) = self.api_key else {
            tracing::info!(
                to = %to_email,
                order = %data.order_number,
                "No Resend API key configured; confirmation email logged only"
            );
            tracing::debug!("Email body:\n{}", text);
            return Ok(EmailDeliveryResult::Logged);
        };

        let request = ResendEmailRequest {
            from: &self.from_email,
            to: vec![to_email],
            subject,
            text,
            html,
        };

        let response = self
            .http_client
            .post(RESEND_API_URL)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Email service error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Email service error: {} {}",
                status, body
            )));
        }

        let _result: ResendEmailResponse = response
            .json()
            .await
            .map_err(|_| AppError::Internal("Email service response error".into()))?;

        tracing::info!(to = %to_email, order = %data.order_number, "Confirmation email sent via Resend");
        Ok(EmailDeliveryResult::Sent)
    }
}
