use serde::{Deserialize, Serialize};

/// A row in the email outbox. Enqueued when a purchase completes and
/// drained by the dispatch endpoint or the background task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub id: String,
    pub order_id: String,
    pub to_email: String,
    pub subject: String,
    /// Template name, e.g. "order_confirmation"
    pub template: String,
    /// Opaque JSON payload fed to the template
    pub template_data: String,
    pub status: EmailStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    Pending,
    Sent,
    Failed,
}

impl EmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::str::FromStr for EmailStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EmailStatus::from_str(s).ok_or(())
    }
}

impl std::fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Template payload for the order confirmation email. Field names match
/// what the storefront's email templates already consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmationData {
    pub order_number: String,
    pub product_name: String,
    pub duration: String,
    pub license_key: String,
    /// None = lifetime
    pub expires_at: Option<i64>,
    /// Total charged, in cents
    pub total_paid: i64,
}
