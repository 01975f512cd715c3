use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::audit::Rating;
use crate::domain::payment::{Payment, PaymentMethod};
use crate::error::DomainError;

use super::value_objects::{OrderItemStatus, OrderStatus, Priority};

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// The aggregate owns the canonical status field and the totals invariant:
// total_amount == sum of item.total_price after every item-pricing mutation.
// Transition methods validate before mutating; timestamps are stamped at most
// once by the transition that produces them.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Customer-facing line total: catalog price x quantity at creation.
    pub total_price: Decimal,
    /// Store expected to fulfill this item; None when no store carries
    /// the product.
    pub store_id: Option<Uuid>,
    pub store_status: OrderItemStatus,
    /// Store's own listing price, set only on Accepted / Suggested.
    pub store_price: Option<Decimal>,
    pub suggested_product_id: Option<Uuid>,
    pub store_notes: Option<String>,
    pub store_action_at: Option<DateTime<Utc>>,
}

impl OrderItem {
    pub fn new(
        product_id: Uuid,
        quantity: i32,
        total_price: Decimal,
        store_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            quantity,
            total_price,
            store_id,
            store_status: OrderItemStatus::Pending,
            store_price: None,
            suggested_product_id: None,
            store_notes: None,
            store_action_at: None,
        }
    }

    pub fn record_acceptance(&mut self, store_price: Decimal, now: DateTime<Utc>) {
        self.store_status = OrderItemStatus::Accepted;
        self.store_price = Some(store_price);
        self.store_action_at = Some(now);
    }

    pub fn record_refusal(&mut self, reason: String, now: DateTime<Utc>) {
        self.store_status = OrderItemStatus::Refused;
        self.store_notes = Some(reason);
        self.store_action_at = Some(now);
    }

    pub fn record_suggestion(
        &mut self,
        suggested_product_id: Uuid,
        store_price: Decimal,
        note: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.store_status = OrderItemStatus::Suggested;
        self.suggested_product_id = Some(suggested_product_id);
        self.store_price = Some(store_price);
        self.store_notes = note;
        self.store_action_at = Some(now);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Human-facing identity, ORD-{year}-{6 digits}; globally unique.
    pub reference: String,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub customer_id: Uuid,
    /// Assigned courier; set exactly once by the assignment manager.
    pub deliverer: Option<Uuid>,
    /// Secret handoff token, ORDER-{reference}-{16 hex}.
    pub qr_code: String,
    /// Set at most once, by the delivery-side verification.
    pub qr_code_validated_at: Option<DateTime<Utc>>,
    /// Derived: always the sum of item.total_price, recomputed explicitly.
    pub total_amount: Decimal,
    pub delivery_fee: Decimal,
    pub payment: Payment,
    pub rating: Option<Rating>,
    /// Requested at creation; recorded but not applied to the persisted
    /// total (the preview path computes the discount).
    pub promotion_code: Option<String>,

    pub accepted_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub estimated_delivery_time: Option<DateTime<Utc>>,
    pub actual_delivery_time: Option<DateTime<Utc>>,

    pub location: String,
    pub priority: Priority,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub delivery_notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency version, bumped by storage on every commit.
    pub version: i64,
}

/// Creation-time descriptive fields, separated from workflow inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderDetails {
    pub location: String,
    pub priority: Priority,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub promotion_code: Option<String>,
}

impl Order {
    pub fn create(
        customer_id: Uuid,
        items: Vec<OrderItem>,
        payment_method: PaymentMethod,
        details: OrderDetails,
        reference: String,
        delivery_fee: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        let id = Uuid::new_v4();
        let qr_code = generate_qr_code(&reference);
        let total_amount: Decimal = items.iter().map(|item| item.total_price).sum();

        Self {
            id,
            qr_code,
            status: OrderStatus::Pending,
            items,
            customer_id,
            deliverer: None,
            qr_code_validated_at: None,
            total_amount,
            delivery_fee,
            payment: Payment::new(id, payment_method, total_amount, now),
            rating: None,
            promotion_code: details.promotion_code,
            accepted_at: None,
            picked_up_at: None,
            delivered_at: None,
            estimated_delivery_time: None,
            actual_delivery_time: None,
            location: details.location,
            priority: details.priority,
            scheduled_date: details.scheduled_date,
            notes: details.notes,
            delivery_notes: None,
            created_at: now,
            updated_at: now,
            version: 0,
            reference,
        }
    }

    /// Re-derive total_amount from current item totals. Called explicitly
    /// after any item-pricing mutation, never implicitly.
    pub fn recompute_total(&mut self) {
        self.total_amount = self.items.iter().map(|item| item.total_price).sum();
    }

    pub fn item(&self, item_id: Uuid) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn item_mut(&mut self, item_id: Uuid) -> Option<&mut OrderItem> {
        self.items.iter_mut().find(|item| item.id == item_id)
    }

    /// Whether the given store fulfills at least one item of this order.
    pub fn has_participating_store(&self, store_id: Uuid) -> bool {
        self.items.iter().any(|item| item.store_id == Some(store_id))
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Courier claims the order. The caller must run this inside the storage
    /// critical section so two concurrent claims cannot both pass the check.
    pub fn assign_deliverer(
        &mut self,
        courier_id: Uuid,
        estimated_delivery_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.deliverer.is_some() {
            return Err(DomainError::conflict("Order already assigned"));
        }
        if self.status != OrderStatus::Pending {
            return Err(DomainError::conflict("Order not available for assignment"));
        }
        self.deliverer = Some(courier_id);
        self.status = OrderStatus::Confirmed;
        self.accepted_at = Some(now);
        self.estimated_delivery_time = Some(estimated_delivery_time);
        self.touch(now);
        Ok(())
    }

    /// Pickup-side handoff: move to Collected and stamp picked_up_at once.
    /// Re-scanning a collected order is a no-op; already checked upstream.
    pub fn mark_collected(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "Order is {} and cannot be collected",
                self.status
            )));
        }
        self.status = OrderStatus::Collected;
        if self.picked_up_at.is_none() {
            self.picked_up_at = Some(now);
        }
        self.touch(now);
        Ok(())
    }

    /// Delivery confirmation forces Delivered regardless of prior status and
    /// stamps both delivery timestamps once.
    pub fn mark_delivered(&mut self, now: DateTime<Utc>) {
        self.status = OrderStatus::Delivered;
        if self.delivered_at.is_none() {
            self.delivered_at = Some(now);
        }
        if self.actual_delivery_time.is_none() {
            self.actual_delivery_time = Some(now);
        }
        self.touch(now);
    }

    /// Courier-driven transition for the non-QR-gated statuses.
    pub fn transition_to(
        &mut self,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::validation(format!(
                "Cannot transition order from {} to {}",
                self.status, next
            )));
        }
        if next == OrderStatus::Processing && self.picked_up_at.is_none() {
            self.picked_up_at = Some(now);
        }
        self.status = next;
        self.touch(now);
        Ok(())
    }

    pub fn record_rating(
        &mut self,
        stars: u8,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !(1..=5).contains(&stars) {
            return Err(DomainError::validation("Rating must be between 1 and 5"));
        }
        if self.status != OrderStatus::Delivered {
            return Err(DomainError::validation(
                "Only delivered orders can be rated",
            ));
        }
        if self.rating.is_some() {
            return Err(DomainError::conflict("Order already rated"));
        }
        self.rating = Some(Rating {
            stars,
            comment,
            rated_at: now,
        });
        self.touch(now);
        Ok(())
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

// ============================================================================
// Identifier Generation
// ============================================================================

/// ORD-{year}-{6-digit-random}; uniqueness is re-checked by storage before
/// persist and the caller regenerates on collision.
pub fn generate_reference(now: DateTime<Utc>) -> String {
    use chrono::Datelike;
    let digits: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("ORD-{}-{:06}", now.year(), digits)
}

/// ORDER-{reference}-{16 hex chars}; the delivery-side secret.
pub fn generate_qr_code(reference: &str) -> String {
    let secret: u64 = rand::thread_rng().gen();
    format!("ORDER-{}-{:016x}", reference, secret)
}

// ============================================================================
// Unit Tests
// ============================================================================
