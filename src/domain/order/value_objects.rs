use serde::{Deserialize, Serialize};

use crate::error::DomainError;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Order lifecycle status. Strictly forward-moving; `Cancelled` is reachable
/// from any non-terminal state; `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Collected,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Position in the forward progression; `Cancelled` sits outside the
    /// ordering and is handled separately.
    fn rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Confirmed => Some(1),
            Self::Processing => Some(2),
            Self::Collected => Some(3),
            Self::Shipped => Some(4),
            Self::Delivered => Some(5),
            Self::Cancelled => None,
        }
    }

    /// Exhaustive transition check: one or more steps forward, never back,
    /// plus cancellation from any non-terminal state.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        if self == next {
            return false;
        }
        match next {
            Self::Cancelled => !self.is_terminal(),
            _ => match (self.rank(), next.rank()) {
                (Some(from), Some(to)) => to > from,
                _ => false,
            },
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Processing => "PROCESSING",
            Self::Collected => "COLLECTED",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "PROCESSING" => Ok(Self::Processing),
            "COLLECTED" => Ok(Self::Collected),
            "SHIPPED" => Ok(Self::Shipped),
            "DELIVERED" => Ok(Self::Delivered),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(DomainError::validation(format!(
                "Invalid order status: {other}"
            ))),
        }
    }
}

/// Per-item fulfillment decision status, independent of the order's own
/// status and owned by the store named on the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderItemStatus {
    Pending,
    Accepted,
    Refused,
    Suggested,
    Approved,
}

/// Delivery priority; descriptive only, no workflow impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

// ============================================================================
// Unit Tests
// ============================================================================
