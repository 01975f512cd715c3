use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::audit::{IssueReport, QrScanRecord};
use crate::domain::catalog::{Courier, Product, Store, StoreListing};
use crate::domain::order::{
    DeliveryConfirmedEvent, Order, OrderEvent, OrderStatus, OrderStatusChangedEvent,
};
use crate::domain::promotion::Promotion;
use crate::error::DomainError;
use crate::events::EventEnvelope;

use super::Storage;

// ============================================================================
// In-Memory Storage Backend
// ============================================================================
//
// One RwLock over the whole table set: a write-lock section is a transaction.
// State mutations and their outbox rows land inside the same critical
// section, so either both are visible or neither is, the same guarantee the
// production engine must give with a batch or transaction.
//
// ============================================================================

#[derive(Default)]
struct Tables {
    orders: HashMap<Uuid, Order>,
    products: HashMap<Uuid, Product>,
    listings: HashMap<(Uuid, Uuid), StoreListing>,
    stores: HashMap<Uuid, Store>,
    couriers: HashMap<Uuid, Courier>,
    promotions: HashMap<String, Promotion>,
    scan_log: Vec<QrScanRecord>,
    issues: Vec<IssueReport>,
    outbox: Vec<EventEnvelope>,
}

impl Tables {
    fn reference_taken(&self, reference: &str) -> bool {
        self.orders.values().any(|order| order.reference == reference)
    }

    fn active_order_count(&self, courier_id: Uuid) -> usize {
        self.orders
            .values()
            .filter(|order| {
                order.deliverer == Some(courier_id)
                    && matches!(
                        order.status,
                        OrderStatus::Pending
                            | OrderStatus::Confirmed
                            | OrderStatus::Processing
                            | OrderStatus::Collected
                            | OrderStatus::Shipped
                    )
            })
            .count()
    }

    fn record_events(&mut self, events: Vec<OrderEvent>) {
        self.outbox.extend(events.into_iter().map(EventEnvelope::new));
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    // Seed helpers for wiring and tests; the catalog and directory are owned
    // by external systems in production.

    pub async fn add_product(&self, product: Product) {
        self.tables.write().await.products.insert(product.id, product);
    }

    pub async fn add_store(&self, store: Store) {
        self.tables.write().await.stores.insert(store.id, store);
    }

    pub async fn add_listing(&self, listing: StoreListing) {
        self.tables
            .write()
            .await
            .listings
            .insert((listing.store_id, listing.product_id), listing);
    }

    pub async fn add_courier(&self, courier: Courier) {
        self.tables.write().await.couriers.insert(courier.id, courier);
    }

    pub async fn add_promotion(&self, promotion: Promotion) {
        self.tables
            .write()
            .await
            .promotions
            .insert(promotion.code.to_uppercase(), promotion);
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn insert_order(
        &self,
        mut order: Order,
        events: Vec<OrderEvent>,
    ) -> Result<Order, DomainError> {
        let mut tables = self.tables.write().await;
        if tables.reference_taken(&order.reference) {
            return Err(DomainError::conflict(format!(
                "Order reference {} already exists",
                order.reference
            )));
        }
        order.version = 1;
        tables.orders.insert(order.id, order.clone());
        tables.record_events(events);
        Ok(order)
    }

    async fn fetch_order(&self, order_id: Uuid) -> Result<Order, DomainError> {
        self.tables
            .read()
            .await
            .orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("Order {order_id} not found")))
    }

    async fn find_order_containing_item(
        &self,
        order_item_id: Uuid,
    ) -> Result<Option<Order>, DomainError> {
        Ok(self
            .tables
            .read()
            .await
            .orders
            .values()
            .find(|order| order.items.iter().any(|item| item.id == order_item_id))
            .cloned())
    }

    async fn update_order(
        &self,
        mut order: Order,
        events: Vec<OrderEvent>,
    ) -> Result<Order, DomainError> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .orders
            .get(&order.id)
            .ok_or_else(|| DomainError::not_found(format!("Order {} not found", order.id)))?;

        if stored.version != order.version {
            return Err(DomainError::conflict(format!(
                "{} of order {}: expected version {}, found {}",
                super::VERSION_CONFLICT_PREFIX,
                order.reference,
                order.version,
                stored.version
            )));
        }

        order.version += 1;
        tables.orders.insert(order.id, order.clone());
        tables.record_events(events);
        Ok(order)
    }

    async fn list_available_orders(&self) -> Result<Vec<Order>, DomainError> {
        let tables = self.tables.read().await;
        let mut available: Vec<Order> = tables
            .orders
            .values()
            .filter(|order| order.status == OrderStatus::Pending && order.deliverer.is_none())
            .cloned()
            .collect();
        available.sort_by_key(|order| order.created_at);
        Ok(available)
    }

    async fn assign_deliverer(
        &self,
        order_id: Uuid,
        courier_id: Uuid,
        estimated_delivery_time: DateTime<Utc>,
    ) -> Result<Order, DomainError> {
        let mut tables = self.tables.write().await;

        if !tables.couriers.contains_key(&courier_id) {
            return Err(DomainError::not_found(format!(
                "Courier {courier_id} not found"
            )));
        }
        if tables.active_order_count(courier_id) > 0 {
            return Err(DomainError::conflict(
                "Courier already has an active order",
            ));
        }

        let order = tables
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| DomainError::not_found(format!("Order {order_id} not found")))?;

        // Conditional update: the status/deliverer check and the write happen
        // under the same lock, so two concurrent claims cannot both pass.
        let now = Utc::now();
        order.assign_deliverer(courier_id, estimated_delivery_time, now)?;
        order.version += 1;
        let updated = order.clone();

        tables.record_events(vec![OrderEvent::StatusChanged(OrderStatusChangedEvent {
            order_id,
            reference: updated.reference.clone(),
            from: OrderStatus::Pending,
            to: OrderStatus::Confirmed,
            changed_by: Some(courier_id),
        })]);

        Ok(updated)
    }

    async fn confirm_delivery(
        &self,
        order_id: Uuid,
        courier_id: Uuid,
        via_qr: bool,
    ) -> Result<Order, DomainError> {
        let mut tables = self.tables.write().await;

        let order = tables
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| DomainError::not_found(format!("Order {order_id} not found")))?;

        if order.deliverer != Some(courier_id) {
            return Err(DomainError::access_denied(
                "Order is not assigned to this courier",
            ));
        }
        // Compare-and-swap on the validation stamp: the second QR validation
        // fails here regardless of interleaving.
        if via_qr && order.qr_code_validated_at.is_some() {
            return Err(DomainError::conflict("Order delivery already validated"));
        }

        let now = Utc::now();
        let previous_status = order.status;
        let already_delivered = previous_status == OrderStatus::Delivered;

        if !already_delivered {
            order.mark_delivered(now);
        }
        if via_qr {
            order.qr_code_validated_at = Some(now);
        }
        order.version += 1;
        let updated = order.clone();

        if !already_delivered {
            // Stats are credited in the same critical section as the status
            // change; a crash between the two cannot split them.
            if let Some(courier) = tables.couriers.get_mut(&courier_id) {
                courier.credit_delivery(updated.delivery_fee);
            }

            tables.record_events(vec![
                OrderEvent::StatusChanged(OrderStatusChangedEvent {
                    order_id,
                    reference: updated.reference.clone(),
                    from: previous_status,
                    to: OrderStatus::Delivered,
                    changed_by: Some(courier_id),
                }),
                OrderEvent::DeliveryConfirmed(DeliveryConfirmedEvent {
                    order_id,
                    reference: updated.reference.clone(),
                    courier_id,
                    delivery_fee: updated.delivery_fee,
                    delivered_at: updated.delivered_at.unwrap_or(now),
                }),
            ]);
        }

        Ok(updated)
    }

    async fn fetch_product(&self, product_id: Uuid) -> Result<Option<Product>, DomainError> {
        Ok(self.tables.read().await.products.get(&product_id).cloned())
    }

    async fn fetch_listing(
        &self,
        store_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<StoreListing>, DomainError> {
        Ok(self
            .tables
            .read()
            .await
            .listings
            .get(&(store_id, product_id))
            .cloned())
    }

    async fn listings_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<StoreListing>, DomainError> {
        Ok(self
            .tables
            .read()
            .await
            .listings
            .values()
            .filter(|listing| listing.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn fetch_store(&self, store_id: Uuid) -> Result<Option<Store>, DomainError> {
        Ok(self.tables.read().await.stores.get(&store_id).cloned())
    }

    async fn store_by_pickup_code(&self, code: &str) -> Result<Option<Store>, DomainError> {
        Ok(self
            .tables
            .read()
            .await
            .stores
            .values()
            .find(|store| store.pickup_code == code)
            .cloned())
    }

    async fn fetch_courier(&self, courier_id: Uuid) -> Result<Option<Courier>, DomainError> {
        Ok(self.tables.read().await.couriers.get(&courier_id).cloned())
    }

    async fn update_courier_location(
        &self,
        courier_id: Uuid,
        location: String,
    ) -> Result<(), DomainError> {
        let mut tables = self.tables.write().await;
        let courier = tables
            .couriers
            .get_mut(&courier_id)
            .ok_or_else(|| DomainError::not_found(format!("Courier {courier_id} not found")))?;
        courier.last_location = Some(location);
        Ok(())
    }

    async fn fetch_promotion(&self, code: &str) -> Result<Option<Promotion>, DomainError> {
        Ok(self
            .tables
            .read()
            .await
            .promotions
            .get(&code.to_uppercase())
            .cloned())
    }

    async fn append_scan_record(&self, record: QrScanRecord) -> Result<(), DomainError> {
        self.tables.write().await.scan_log.push(record);
        Ok(())
    }

    async fn scan_records_for(&self, order_id: Uuid) -> Result<Vec<QrScanRecord>, DomainError> {
        Ok(self
            .tables
            .read()
            .await
            .scan_log
            .iter()
            .filter(|record| record.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn append_issue_report(&self, report: IssueReport) -> Result<(), DomainError> {
        self.tables.write().await.issues.push(report);
        Ok(())
    }

    async fn drain_outbox(&self) -> Result<Vec<EventEnvelope>, DomainError> {
        Ok(std::mem::take(&mut self.tables.write().await.outbox))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{generate_reference, OrderDetails, OrderItem};
    use crate::domain::payment::PaymentMethod;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn order_with_items() -> Order {
        let item = OrderItem::new(Uuid::new_v4(), 2, Decimal::from(20), Some(Uuid::new_v4()));
        Order::create(
            Uuid::new_v4(),
            vec![item],
            PaymentMethod::Card,
            OrderDetails::default(),
            generate_reference(Utc::now()),
            Decimal::new(500, 2),
            Utc::now(),
        )
    }

    async fn seeded_storage_with_order() -> (Arc<MemoryStorage>, Order, Courier) {
        let storage = Arc::new(MemoryStorage::new());
        let courier = Courier::new("Avery");
        storage.add_courier(courier.clone()).await;
        let order = storage
            .insert_order(order_with_items(), vec![])
            .await
            .unwrap();
        (storage, order, courier)
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let storage = MemoryStorage::new();
        let order = order_with_items();
        let stored = storage.insert_order(order.clone(), vec![]).await.unwrap();
        assert_eq!(stored.version, 1);

        let fetched = storage.fetch_order(order.id).await.unwrap();
        assert_eq!(fetched.reference, order.reference);
    }

    #[tokio::test]
    async fn test_duplicate_reference_is_conflict() {
        let storage = MemoryStorage::new();
        let order = order_with_items();
        let mut clone = order_with_items();
        clone.reference = order.reference.clone();

        storage.insert_order(order, vec![]).await.unwrap();
        let result = storage.insert_order(clone, vec![]).await;
        assert!(matches!(result, Err(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_stale_version_update_is_conflict() {
        let storage = MemoryStorage::new();
        let stored = storage
            .insert_order(order_with_items(), vec![])
            .await
            .unwrap();

        let stale = stored.clone();
        storage.update_order(stored, vec![]).await.unwrap();

        let result = storage.update_order(stale, vec![]).await;
        assert!(matches!(result, Err(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_concurrent_assignment_yields_one_winner() {
        let (storage, order, _) = seeded_storage_with_order().await;
        let courier_a = Courier::new("A");
        let courier_b = Courier::new("B");
        storage.add_courier(courier_a.clone()).await;
        storage.add_courier(courier_b.clone()).await;

        let eta = Utc::now();
        let first = tokio::spawn({
            let storage = storage.clone();
            async move { storage.assign_deliverer(order.id, courier_a.id, eta).await }
        });
        let second = tokio::spawn({
            let storage = storage.clone();
            async move { storage.assign_deliverer(order.id, courier_b.id, eta).await }
        });

        let results = [first.await.unwrap(), second.await.unwrap()];
        let wins = results.iter().filter(|result| result.is_ok()).count();
        assert_eq!(wins, 1);
        assert!(results
            .iter()
            .any(|result| matches!(result, Err(DomainError::Conflict(_)))));
    }

    #[tokio::test]
    async fn test_courier_limited_to_one_active_order() {
        let (storage, order, courier) = seeded_storage_with_order().await;
        let other = storage
            .insert_order(order_with_items(), vec![])
            .await
            .unwrap();

        storage
            .assign_deliverer(order.id, courier.id, Utc::now())
            .await
            .unwrap();

        let result = storage
            .assign_deliverer(other.id, courier.id, Utc::now())
            .await;
        assert!(matches!(result, Err(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_qr_delivery_confirmation_is_exactly_once() {
        let (storage, order, courier) = seeded_storage_with_order().await;
        storage
            .assign_deliverer(order.id, courier.id, Utc::now())
            .await
            .unwrap();

        let delivered = storage
            .confirm_delivery(order.id, courier.id, true)
            .await
            .unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);
        assert!(delivered.qr_code_validated_at.is_some());

        let again = storage.confirm_delivery(order.id, courier.id, true).await;
        assert!(matches!(again, Err(DomainError::Conflict(_))));

        let stats = storage.fetch_courier(courier.id).await.unwrap().unwrap();
        assert_eq!(stats.delivery_count, 1);
        assert_eq!(stats.total_earnings, delivered.delivery_fee);
    }

    #[tokio::test]
    async fn test_status_path_then_qr_path_credits_once() {
        let (storage, order, courier) = seeded_storage_with_order().await;
        storage
            .assign_deliverer(order.id, courier.id, Utc::now())
            .await
            .unwrap();

        // Courier reports delivery without scanning first
        storage
            .confirm_delivery(order.id, courier.id, false)
            .await
            .unwrap();

        // The QR validation still records the stamp but must not re-credit
        let validated = storage
            .confirm_delivery(order.id, courier.id, true)
            .await
            .unwrap();
        assert!(validated.qr_code_validated_at.is_some());

        let stats = storage.fetch_courier(courier.id).await.unwrap().unwrap();
        assert_eq!(stats.delivery_count, 1);
    }

    #[tokio::test]
    async fn test_confirm_delivery_requires_assigned_courier() {
        let (storage, order, courier) = seeded_storage_with_order().await;
        storage
            .assign_deliverer(order.id, courier.id, Utc::now())
            .await
            .unwrap();

        let impostor = Courier::new("impostor");
        storage.add_courier(impostor.clone()).await;
        let result = storage.confirm_delivery(order.id, impostor.id, true).await;
        assert!(matches!(result, Err(DomainError::AccessDenied(_))));
    }

    #[tokio::test]
    async fn test_outbox_rows_written_with_the_commit() {
        let (storage, order, courier) = seeded_storage_with_order().await;
        storage.drain_outbox().await.unwrap();

        storage
            .assign_deliverer(order.id, courier.id, Utc::now())
            .await
            .unwrap();

        let envelopes = storage.drain_outbox().await.unwrap();
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].event_type, "OrderStatusChanged");

        // Drained means gone
        assert!(storage.drain_outbox().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_available_pool_excludes_assigned() {
        let (storage, order, courier) = seeded_storage_with_order().await;
        let other = storage
            .insert_order(order_with_items(), vec![])
            .await
            .unwrap();

        storage
            .assign_deliverer(order.id, courier.id, Utc::now())
            .await
            .unwrap();

        let available = storage.list_available_orders().await.unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id, other.id);
    }
}
