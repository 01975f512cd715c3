use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::order::{Order, OrderItemStatus, OrderStatus, Priority};
use crate::domain::payment::{PaymentMethod, PaymentStatus};

// ============================================================================
// Per-Role Order Projections
// ============================================================================
//
// Each audience gets its own struct built field-by-field from the aggregate.
// What a role must not see is simply absent from its type: the store never
// sees payment or the QR secret, the courier never sees the QR secret or
// store prices, the customer never sees store-side pricing.
//
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CustomerOrderView {
    pub id: Uuid,
    pub reference: String,
    pub status: OrderStatus,
    pub items: Vec<CustomerItemView>,
    pub total_amount: Decimal,
    pub delivery_fee: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    /// The customer presents this at delivery.
    pub qr_code: String,
    pub promotion_code: Option<String>,
    pub estimated_delivery_time: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub rating: Option<u8>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub total_price: Decimal,
    pub store_status: OrderItemStatus,
    pub suggested_product_id: Option<Uuid>,
    pub store_notes: Option<String>,
}

impl CustomerOrderView {
    pub fn from_order(order: &Order) -> Self {
        Self {
            id: order.id,
            reference: order.reference.clone(),
            status: order.status,
            items: order
                .items
                .iter()
                .map(|item| CustomerItemView {
                    id: item.id,
                    product_id: item.product_id,
                    quantity: item.quantity,
                    total_price: item.total_price,
                    store_status: item.store_status,
                    suggested_product_id: item.suggested_product_id,
                    store_notes: item.store_notes.clone(),
                })
                .collect(),
            total_amount: order.total_amount,
            delivery_fee: order.delivery_fee,
            payment_method: order.payment.method,
            payment_status: order.payment.status,
            qr_code: order.qr_code.clone(),
            promotion_code: order.promotion_code.clone(),
            estimated_delivery_time: order.estimated_delivery_time,
            delivered_at: order.delivered_at,
            rating: order.rating.as_ref().map(|rating| rating.stars),
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreOrderView {
    pub order_id: Uuid,
    pub reference: String,
    pub status: OrderStatus,
    pub priority: Priority,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    /// Only the items this store fulfills.
    pub items: Vec<StoreItemView>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub store_status: OrderItemStatus,
    pub store_price: Option<Decimal>,
    pub suggested_product_id: Option<Uuid>,
    pub store_notes: Option<String>,
}

impl StoreOrderView {
    pub fn for_store(order: &Order, store_id: Uuid) -> Self {
        Self {
            order_id: order.id,
            reference: order.reference.clone(),
            status: order.status,
            priority: order.priority,
            scheduled_date: order.scheduled_date,
            notes: order.notes.clone(),
            items: order
                .items
                .iter()
                .filter(|item| item.store_id == Some(store_id))
                .map(|item| StoreItemView {
                    id: item.id,
                    product_id: item.product_id,
                    quantity: item.quantity,
                    store_status: item.store_status,
                    store_price: item.store_price,
                    suggested_product_id: item.suggested_product_id,
                    store_notes: item.store_notes.clone(),
                })
                .collect(),
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CourierOrderView {
    pub order_id: Uuid,
    pub reference: String,
    pub status: OrderStatus,
    pub priority: Priority,
    pub location: String,
    pub delivery_notes: Option<String>,
    pub items: Vec<CourierItemView>,
    /// Couriers collecting cash need the amount due.
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub delivery_fee: Decimal,
    pub estimated_delivery_time: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourierItemView {
    pub product_id: Uuid,
    pub quantity: i32,
    pub store_id: Option<Uuid>,
    pub store_status: OrderItemStatus,
}

impl CourierOrderView {
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_id: order.id,
            reference: order.reference.clone(),
            status: order.status,
            priority: order.priority,
            location: order.location.clone(),
            delivery_notes: order.delivery_notes.clone(),
            items: order
                .items
                .iter()
                .map(|item| CourierItemView {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    store_id: item.store_id,
                    store_status: item.store_status,
                })
                .collect(),
            total_amount: order.total_amount,
            payment_method: order.payment.method,
            delivery_fee: order.delivery_fee,
            estimated_delivery_time: order.estimated_delivery_time,
            picked_up_at: order.picked_up_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{generate_reference, OrderDetails, OrderItem};
    use chrono::Utc;

    fn two_store_order() -> (Order, Uuid, Uuid) {
        let store_a = Uuid::new_v4();
        let store_b = Uuid::new_v4();
        let items = vec![
            OrderItem::new(Uuid::new_v4(), 2, Decimal::from(10), Some(store_a)),
            OrderItem::new(Uuid::new_v4(), 1, Decimal::from(7), Some(store_b)),
        ];
        let order = Order::create(
            Uuid::new_v4(),
            items,
            PaymentMethod::Cash,
            OrderDetails::default(),
            generate_reference(Utc::now()),
            Decimal::new(500, 2),
            Utc::now(),
        );
        (order, store_a, store_b)
    }

    #[test]
    fn test_store_view_filters_to_own_items() {
        let (order, store_a, _) = two_store_order();

        let view = StoreOrderView::for_store(&order, store_a);
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].quantity, 2);

        let outsider = StoreOrderView::for_store(&order, Uuid::new_v4());
        assert!(outsider.items.is_empty());
    }

    #[test]
    fn test_customer_view_carries_qr_and_totals() {
        let (order, _, _) = two_store_order();

        let view = CustomerOrderView::from_order(&order);
        assert_eq!(view.qr_code, order.qr_code);
        assert_eq!(view.total_amount, Decimal::from(17));
        assert_eq!(view.items.len(), 2);
    }

    #[test]
    fn test_courier_view_serializes_without_qr() {
        let (order, _, _) = two_store_order();

        let view = CourierOrderView::from_order(&order);
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("qr_code").is_none());
        assert_eq!(json["payment_method"], "CASH");
    }
}
