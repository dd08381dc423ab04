//! Prefixed ID generation for Magma entities.
//!
//! All row IDs use an `mg_` brand prefix to guarantee collision avoidance
//! with payment provider IDs (MoneyMotion's `mm_sess_`, `mm_cus_`, etc.).
//!
//! Format: `mg_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// All known entity prefixes for validation.
const ALL_PREFIXES: &[&str] = &[
    "mg_prod_",
    "mg_ord_",
    "mg_lic_",
    "mg_cpn_",
    "mg_eml_",
    "mg_evt_",
    "mg_ps_",
];

/// Validate that a string is a valid Magma prefixed ID.
///
/// This is a cheap check to reject garbage before hitting the database.
/// Validates format: `mg_{entity}_{32_hex_chars}`
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    let hex_part = &s[prefix.len()..];

    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Entity types that have prefixed IDs in Magma.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    Product,
    Order,
    License,
    Coupon,
    OutboundEmail,
    WebhookEvent,
    PaymentSession,
}

impl EntityType {
    /// Returns the prefix for this entity type.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Product => "mg_prod",
            Self::Order => "mg_ord",
            Self::License => "mg_lic",
            Self::Coupon => "mg_cpn",
            Self::OutboundEmail => "mg_eml",
            Self::WebhookEvent => "mg_evt",
            Self::PaymentSession => "mg_ps",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}
