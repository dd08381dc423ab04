use serde::{Deserialize, Serialize};

/// A purchase record, keyed by a human-readable order number.
/// Created `pending` at checkout initiation; mutated only by webhook
/// events or admin action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub order_number: String,
    pub customer_email: String,
    pub product_id: String,
    pub product_name: String,
    pub duration: String,
    /// Price before discount (cents)
    pub amount_cents: i64,
    /// Discount applied (cents)
    pub discount_cents: i64,
    /// Amount actually charged (cents)
    pub total_cents: i64,
    pub coupon_code: Option<String>,
    pub status: OrderStatus,
    pub payment_method: Option<String>,
    /// Provider session that is paying for this order (if any)
    pub payment_session_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Data required to create a new pending order.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrder {
    pub customer_email: String,
    pub product_id: String,
    pub product_name: String,
    pub duration: String,
    pub amount_cents: i64,
    pub discount_cents: i64,
    pub coupon_code: Option<String>,
    pub payment_method: Option<String>,
}

/// Dashboard counters. `in_progress` counts pending orders only, so
/// expired and cancelled checkouts drop out of it.
#[derive(Debug, Clone, Serialize)]
pub struct OrderStats {
    pub total: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub failed: i64,
    pub refunded: i64,
    pub expired: i64,
    pub cancelled: i64,
    /// Sum of total_cents over completed orders
    pub revenue_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
    Expired,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "refunded" => Some(Self::Refunded),
            "expired" => Some(Self::Expired),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// The order transition table. Terminal statuses never regress, so a
    /// stale `expired` delivery cannot undo a `completed` order.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (
                Self::Pending,
                Self::Completed | Self::Failed | Self::Expired | Self::Cancelled
            ) | (Self::Completed, Self::Refunded)
        )
    }

    /// Whether this status counts toward the dashboard "in progress" total.
    pub fn is_in_progress(self) -> bool {
        self == Self::Pending
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::from_str(s).ok_or(())
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Completed));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Expired));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Failed));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Refunded));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_completed_never_regresses() {
        assert!(OrderStatus::Completed.can_transition_to(OrderStatus::Refunded));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Expired));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Completed));
    }

    #[test]
    fn test_terminal_statuses_are_terminal() {
        for terminal in [
            OrderStatus::Failed,
            OrderStatus::Refunded,
            OrderStatus::Expired,
            OrderStatus::Cancelled,
        ] {
            for next in [
                OrderStatus::Pending,
                OrderStatus::Completed,
                OrderStatus::Failed,
                OrderStatus::Refunded,
                OrderStatus::Expired,
                OrderStatus::Cancelled,
            ] {
                assert!(
                    !terminal.can_transition_to(next),
                    "{} -> {} should be rejected",
                    terminal,
                    next
                );
            }
        }
    }

    #[test]
    fn test_round_trip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Completed,
            OrderStatus::Failed,
            OrderStatus::Refunded,
            OrderStatus::Expired,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_only_pending_is_in_progress() {
        assert!(OrderStatus::Pending.is_in_progress());
        assert!(!OrderStatus::Completed.is_in_progress());
        assert!(!OrderStatus::Expired.is_in_progress());
        assert!(!OrderStatus::Cancelled.is_in_progress());
    }
}
