use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::{OrderItemStatus, OrderStatus};

// ============================================================================
// Order Events - Outbound Domain Events
// ============================================================================
//
// Recorded to the outbox in the same commit as the state change and published
// after commit. Subscribers (notifications, payment reconciliation) consume
// these; their failures never touch the order transaction.
//
// ============================================================================

/// Order Event - union type for all outbound order events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Created(OrderCreatedEvent),
    StatusChanged(OrderStatusChangedEvent),
    ItemDecisionRecorded(ItemDecisionRecordedEvent),
    DeliveryConfirmed(DeliveryConfirmedEvent),
}

impl OrderEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => "OrderCreated",
            Self::StatusChanged(_) => "OrderStatusChanged",
            Self::ItemDecisionRecorded(_) => "ItemDecisionRecorded",
            Self::DeliveryConfirmed(_) => "DeliveryConfirmed",
        }
    }

    pub fn order_id(&self) -> Uuid {
        match self {
            Self::Created(e) => e.order_id,
            Self::StatusChanged(e) => e.order_id,
            Self::ItemDecisionRecorded(e) => e.order_id,
            Self::DeliveryConfirmed(e) => e.order_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order_id: Uuid,
    pub reference: String,
    pub customer_id: Uuid,
    pub total_amount: Decimal,
    pub item_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order_id: Uuid,
    pub reference: String,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub changed_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDecisionRecordedEvent {
    pub order_id: Uuid,
    pub order_item_id: Uuid,
    pub store_id: Uuid,
    pub decision: OrderItemStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfirmedEvent {
    pub order_id: Uuid,
    pub reference: String,
    pub courier_id: Uuid,
    pub delivery_fee: Decimal,
    pub delivered_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        let event = OrderEvent::StatusChanged(OrderStatusChangedEvent {
            order_id: Uuid::new_v4(),
            reference: "ORD-2026-000001".to_string(),
            from: OrderStatus::Pending,
            to: OrderStatus::Confirmed,
            changed_by: None,
        });
        assert_eq!(event.event_type(), "OrderStatusChanged");
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let order_id = Uuid::new_v4();
        let event = OrderEvent::DeliveryConfirmed(DeliveryConfirmedEvent {
            order_id,
            reference: "ORD-2026-000002".to_string(),
            courier_id: Uuid::new_v4(),
            delivery_fee: Decimal::new(500, 2),
            delivered_at: Utc::now(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "DeliveryConfirmed");
        assert_eq!(event.order_id(), order_id);

        let back: OrderEvent = serde_json::from_value(json).unwrap();
        assert!(matches!(back, OrderEvent::DeliveryConfirmed(_)));
    }
}
