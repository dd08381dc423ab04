use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{msg, AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a webhook timestamp before it's rejected (in seconds).
const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Serialize)]
struct CreateSessionBody<'a> {
    amount: i64,
    currency: &'a str,
    customer_email: &'a str,
    success_url: &'a str,
    cancel_url: &'a str,
    metadata: SessionMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct SessionMetadata<'a> {
    order_id: &'a str,
    product_id: &'a str,
    license_duration: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    id: String,
    checkout_url: String,
}

/// Provider-side session snapshot from the status API.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSession {
    pub id: String,
    pub status: String,
    pub amount: i64,
    pub currency: String,
    pub customer_email: Option<String>,
    pub paid_at: Option<i64>,
}

/// Thin client for the MoneyMotion hosted-checkout API.
#[derive(Clone)]
pub struct MoneyMotionClient {
    client: Client,
    api_key: String,
    api_url: String,
}

impl MoneyMotionClient {
    pub fn new(api_key: &str, api_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a hosted checkout session. Returns (session_id, checkout_url).
    #[allow(clippy::too_many_arguments)]
    pub async fn create_session(
        &self,
        amount_cents: i64,
        currency: &str,
        customer_email: &str,
        order_id: &str,
        product_id: &str,
        license_duration: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<(String, String)> {
        let body = CreateSessionBody {
            amount: amount_cents,
            currency,
            customer_email,
            success_url,
            cancel_url,
            metadata: SessionMetadata {
                order_id,
                product_id,
                license_duration,
            },
        };

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("MoneyMotion API error: {}", e)))?;

        let response = Self::check_status(response).await?;

        let session: CreateSessionResponse = response.json().await.map_err(|e| {
            AppError::Provider(format!("Failed to parse MoneyMotion response: {}", e))
        })?;

        Ok((session.id, session.checkout_url))
    }

    /// Fetch the authoritative session state from the provider.
    pub async fn fetch_session(&self, session_id: &str) -> Result<ProviderSession> {
        let response = self
            .client
            .get(format!("{}/checkout/sessions/{}", self.api_url, session_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("MoneyMotion API error: {}", e)))?;

        let response = Self::check_status(response).await?;

        response.json().await.map_err(|e| {
            AppError::Provider(format!("Failed to parse MoneyMotion response: {}", e))
        })
    }

    /// Map provider HTTP status codes onto the application error taxonomy.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED => Err(AppError::Unauthorized),
            StatusCode::NOT_FOUND => Err(AppError::NotFound(msg::SESSION_NOT_FOUND.into())),
            StatusCode::TOO_MANY_REQUESTS => {
                Err(AppError::RateLimited("MoneyMotion rate limit".into()))
            }
            _ => {
                let text = response.text().await.unwrap_or_default();
                Err(AppError::Provider(format!("MoneyMotion API error: {}", text)))
            }
        }
    }
}

/// Verify a MoneyMotion webhook signature header.
///
/// Header format: `t=<unix>,v1=<hex hmac-sha256(secret, "t.body")>`.
/// Stale timestamps are rejected to prevent replays; the comparison is
/// constant-time.
pub fn verify_webhook_signature(secret: &str, payload: &[u8], signature: &str) -> Result<bool> {
    let parts: Vec<&str> = signature.split(',').collect();

    let mut timestamp = None;
    let mut sig_v1 = None;

    for part in parts {
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = Some(t);
        } else if let Some(s) = part.strip_prefix("v1=") {
            sig_v1 = Some(s);
        }
    }

    let timestamp_str =
        timestamp.ok_or_else(|| AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()))?;
    let sig_v1 =
        sig_v1.ok_or_else(|| AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()))?;

    let timestamp: i64 = timestamp_str
        .parse()
        .map_err(|_| AppError::BadRequest(msg::INVALID_TIMESTAMP_IN_SIGNATURE.into()))?;

    let now = chrono::Utc::now().timestamp();
    let age = now - timestamp;

    if age > WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
        tracing::warn!(
            "MoneyMotion webhook rejected: timestamp too old (age={}s, max={}s)",
            age,
            WEBHOOK_TIMESTAMP_TOLERANCE_SECS
        );
        return Ok(false);
    }

    // Clock skew tolerance for future timestamps: 60 seconds
    if age < -60 {
        tracing::warn!(
            "MoneyMotion webhook rejected: timestamp in the future (age={}s)",
            age
        );
        return Ok(false);
    }

    let signed_payload = format!("{}.{}", timestamp_str, String::from_utf8_lossy(payload));

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal(msg::INVALID_WEBHOOK_SECRET.into()))?;
    mac.update(signed_payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    let expected_bytes = expected.as_bytes();
    let provided_bytes = sig_v1.as_bytes();

    // Length is not secret (always 64 hex chars for SHA-256), so this
    // early return leaks nothing.
    if expected_bytes.len() != provided_bytes.len() {
        return Ok(false);
    }

    Ok(expected_bytes.ct_eq(provided_bytes).into())
}
