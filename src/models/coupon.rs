use serde::{Deserialize, Serialize};

use crate::error::{msg, AppError, Result};

/// A flat-percentage discount code with usage and expiry limits.
/// No stacking and no per-product restriction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub id: String,
    pub code: String,
    pub discount_percent: i64,
    pub max_uses: i64,
    pub current_uses: i64,
    pub is_active: bool,
    /// None = no expiry
    pub valid_until: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateCoupon {
    pub code: String,
    pub discount_percent: i64,
    pub max_uses: i64,
    #[serde(default)]
    pub valid_until: Option<i64>,
}

impl CreateCoupon {
    pub fn validate(&self) -> Result<()> {
        if self.code.trim().is_empty() {
            return Err(AppError::BadRequest(msg::CODE_EMPTY.into()));
        }
        if !(1..=100).contains(&self.discount_percent) {
            return Err(AppError::BadRequest(
                "discount_percent must be between 1 and 100".into(),
            ));
        }
        if self.max_uses < 1 {
            return Err(AppError::BadRequest("max_uses must be at least 1".into()));
        }
        Ok(())
    }
}

/// Result of validating a coupon code against its limits.
#[derive(Debug, Clone, Serialize)]
pub struct CouponValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CouponValidation {
    pub fn ok(discount_percent: i64) -> Self {
        Self {
            valid: true,
            discount_percent: Some(discount_percent),
            reason: None,
        }
    }

    pub fn rejected(reason: &str) -> Self {
        Self {
            valid: false,
            discount_percent: None,
            reason: Some(reason.to_string()),
        }
    }
}
