use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Catalog & Directory - External Collaborator Read Models
// ============================================================================
//
// Products, store inventory listings, stores and couriers are owned by other
// parts of the platform; the fulfillment core only reads them (and updates
// courier delivery stats on confirmation).
//
// ============================================================================

/// Customer-facing catalog product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub is_active: bool,
}

/// One store's own inventory listing for a product; (store, product) unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreListing {
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub id: Uuid,
    pub name: String,
    /// Store-side QR payload presented at pickup.
    pub pickup_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Courier {
    pub id: Uuid,
    pub name: String,
    /// Lifetime stats, credited exactly once per delivered order.
    pub delivery_count: u64,
    pub total_earnings: Decimal,
    pub last_location: Option<String>,
}

impl Courier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            delivery_count: 0,
            total_earnings: Decimal::ZERO,
            last_location: None,
        }
    }

    pub fn credit_delivery(&mut self, fee: Decimal) {
        self.delivery_count += 1;
        self.total_earnings += fee;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_delivery_accumulates() {
        let mut courier = Courier::new("Sam");
        courier.credit_delivery(Decimal::new(500, 2));
        courier.credit_delivery(Decimal::new(750, 2));
        assert_eq!(courier.delivery_count, 2);
        assert_eq!(courier.total_earnings, Decimal::new(1250, 2));
    }
}
