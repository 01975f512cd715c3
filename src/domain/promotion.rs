use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Promotion - Time- and Usage-Bounded Discount Rule
// ============================================================================
//
// Validity failures are soft: the pricing preview reports them as data, not
// errors, so an invalid code never aborts order creation.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    Percentage,
    FixedAmount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Promotion {
    pub id: Uuid,
    /// Unique, matched case-insensitively (normalized to uppercase).
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub minimum_order_amount: Option<Decimal>,
    /// Caps percentage discounts only.
    pub maximum_discount_amount: Option<Decimal>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub usage_limit: Option<u64>,
    pub usage_count: u64,
    pub is_active: bool,
}

/// Why a promotion does not apply; rendered verbatim as `promotion_error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionRejection {
    Inactive,
    NotStarted,
    Expired,
    UsageExhausted,
    BelowMinimum { minimum: Decimal },
}

impl std::fmt::Display for PromotionRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inactive => write!(f, "Promotion is not active"),
            Self::NotStarted => write!(f, "Promotion is not yet valid"),
            Self::Expired => write!(f, "Promotion has expired"),
            Self::UsageExhausted => write!(f, "Promotion usage limit reached"),
            Self::BelowMinimum { minimum } => {
                write!(f, "Order subtotal is below the minimum of {minimum}")
            }
        }
    }
}

impl Promotion {
    /// Check validity against the clock and usage counters. Pure; never
    /// touches usage_count.
    pub fn check_valid(&self, now: DateTime<Utc>) -> Result<(), PromotionRejection> {
        if !self.is_active {
            return Err(PromotionRejection::Inactive);
        }
        if let Some(starts_at) = self.starts_at {
            if now < starts_at {
                return Err(PromotionRejection::NotStarted);
            }
        }
        if let Some(ends_at) = self.ends_at {
            if now > ends_at {
                return Err(PromotionRejection::Expired);
            }
        }
        if let Some(limit) = self.usage_limit {
            if self.usage_count >= limit {
                return Err(PromotionRejection::UsageExhausted);
            }
        }
        Ok(())
    }

    /// Discount for a given subtotal, assuming the promotion is valid and the
    /// minimum-order check has passed. Never exceeds the subtotal.
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        match self.discount_type {
            DiscountType::Percentage => {
                let mut discount = subtotal * self.discount_value / Decimal::from(100);
                if let Some(cap) = self.maximum_discount_amount {
                    discount = discount.min(cap);
                }
                discount.min(subtotal)
            }
            DiscountType::FixedAmount => self.discount_value.min(subtotal),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn percentage_promo(value: i64) -> Promotion {
        Promotion {
            id: Uuid::new_v4(),
            code: "SAVE10".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::from(value),
            minimum_order_amount: None,
            maximum_discount_amount: None,
            starts_at: None,
            ends_at: None,
            usage_limit: None,
            usage_count: 0,
            is_active: true,
        }
    }

    #[test]
    fn test_percentage_discount() {
        let promo = percentage_promo(10);
        assert_eq!(
            promo.discount_for(Decimal::from(1000)),
            Decimal::from(100)
        );
    }

    #[test]
    fn test_percentage_discount_capped() {
        let mut promo = percentage_promo(50);
        promo.maximum_discount_amount = Some(Decimal::from(75));
        assert_eq!(promo.discount_for(Decimal::from(1000)), Decimal::from(75));
    }

    #[test]
    fn test_fixed_discount_clamped_to_subtotal() {
        let mut promo = percentage_promo(0);
        promo.discount_type = DiscountType::FixedAmount;
        promo.discount_value = Decimal::from(200);
        assert_eq!(promo.discount_for(Decimal::from(150)), Decimal::from(150));
        assert_eq!(promo.discount_for(Decimal::from(500)), Decimal::from(200));
    }

    #[test]
    fn test_validity_window() {
        let now = Utc::now();
        let mut promo = percentage_promo(10);

        promo.starts_at = Some(now + Duration::hours(1));
        assert_eq!(promo.check_valid(now), Err(PromotionRejection::NotStarted));

        promo.starts_at = None;
        promo.ends_at = Some(now - Duration::hours(1));
        assert_eq!(promo.check_valid(now), Err(PromotionRejection::Expired));
    }

    #[test]
    fn test_usage_exhaustion() {
        let mut promo = percentage_promo(10);
        promo.usage_limit = Some(5);
        promo.usage_count = 5;
        assert_eq!(
            promo.check_valid(Utc::now()),
            Err(PromotionRejection::UsageExhausted)
        );

        promo.usage_count = 4;
        assert!(promo.check_valid(Utc::now()).is_ok());
    }

    #[test]
    fn test_inactive_promotion() {
        let mut promo = percentage_promo(10);
        promo.is_active = false;
        assert_eq!(promo.check_valid(Utc::now()), Err(PromotionRejection::Inactive));
    }
}
