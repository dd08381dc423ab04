use serde::{Deserialize, Serialize};

/// A provider checkout session snapshot. Process-local only: this is a
/// read-through cache in front of the provider's status API, so losing it
/// on restart loses nothing durable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    pub session_id: String,
    /// Order number of the order this session pays for
    pub order_id: String,
    pub product_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: SessionStatus,
    pub customer_email: String,
    pub paid_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Paid,
    Expired,
    Cancelled,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" | "open" | "created" => Some(Self::Pending),
            "paid" | "complete" | "completed" => Some(Self::Paid),
            "expired" => Some(Self::Expired),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal statuses never change again, so a cached terminal status
    /// can be served without re-querying the provider.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
