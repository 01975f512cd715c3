use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Payment - One-to-One Order Payment Record
// ============================================================================
//
// Created alongside the order. Only status outcomes are consumed here; the
// gateway wire protocol lives elsewhere.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    Cash,
    Wallet,
}

impl std::str::FromStr for PaymentMethod {
    type Err = crate::error::DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_uppercase().as_str() {
            "CARD" => Ok(Self::Card),
            "CASH" => Ok(Self::Cash),
            "WALLET" => Ok(Self::Wallet),
            other => Err(crate::error::DomainError::validation(format!(
                "Invalid payment method: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        order_id: Uuid,
        method: PaymentMethod,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            method,
            status: PaymentStatus::Pending,
            amount,
            created_at: now,
        }
    }
}
