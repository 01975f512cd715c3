use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::audit::{IssueReport, QrScanRecord};
use crate::domain::catalog::{Courier, Product, Store, StoreListing};
use crate::domain::order::{Order, OrderEvent};
use crate::domain::promotion::Promotion;
use crate::error::DomainError;
use crate::events::EventEnvelope;

mod memory;

pub use memory::MemoryStorage;

/// Message prefix for optimistic-versioning conflicts; the retry helper keys
/// on it to tell a lost update apart from a business conflict.
pub const VERSION_CONFLICT_PREFIX: &str = "Concurrent modification";

// ============================================================================
// Storage - Unit-of-Work Persistence Seam
// ============================================================================
//
// The engine behind this trait is deliberately unspecified; the trait is the
// whole contract. Every mutating operation is one transaction: outbound events
// passed to (or produced by) an operation are recorded to the outbox in the
// same commit, and the conditional operations (assign_deliverer,
// confirm_delivery) perform their check-and-set atomically so concurrent
// callers cannot both succeed.
//
// ============================================================================

#[async_trait]
pub trait Storage: Send + Sync {
    // ---- Orders ----

    /// Persist a new order together with its outbound events. Fails with
    /// Conflict if the reference is already taken (caller regenerates).
    async fn insert_order(
        &self,
        order: Order,
        events: Vec<OrderEvent>,
    ) -> Result<Order, DomainError>;

    async fn fetch_order(&self, order_id: Uuid) -> Result<Order, DomainError>;

    /// Resolve the order that owns an item, used to tell a missing item apart
    /// from one attached to a different order.
    async fn find_order_containing_item(
        &self,
        order_item_id: Uuid,
    ) -> Result<Option<Order>, DomainError>;

    /// Optimistic commit: fails with Conflict unless the stored version
    /// matches the caller's snapshot; bumps the version on success.
    async fn update_order(
        &self,
        order: Order,
        events: Vec<OrderEvent>,
    ) -> Result<Order, DomainError>;

    /// Pending, unassigned orders visible to couriers.
    async fn list_available_orders(&self) -> Result<Vec<Order>, DomainError>;

    /// Atomic claim: requires the courier to have no active order and the
    /// target to be Pending and unassigned; exactly one of two concurrent
    /// claims succeeds.
    async fn assign_deliverer(
        &self,
        order_id: Uuid,
        courier_id: Uuid,
        estimated_delivery_time: DateTime<Utc>,
    ) -> Result<Order, DomainError>;

    /// Exactly-once delivery confirmation. `via_qr` additionally requires
    /// qr_code_validated_at to be unset (Conflict otherwise) and sets it.
    /// Courier stats are credited only when the order was not already
    /// Delivered, so the two delivery paths cannot double-credit.
    async fn confirm_delivery(
        &self,
        order_id: Uuid,
        courier_id: Uuid,
        via_qr: bool,
    ) -> Result<Order, DomainError>;

    // ---- Catalog & directory (external collaborators, read-mostly) ----

    async fn fetch_product(&self, product_id: Uuid) -> Result<Option<Product>, DomainError>;

    async fn fetch_listing(
        &self,
        store_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<StoreListing>, DomainError>;

    /// All store listings carrying a product, used to resolve item.store_id
    /// at order creation.
    async fn listings_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<StoreListing>, DomainError>;

    async fn fetch_store(&self, store_id: Uuid) -> Result<Option<Store>, DomainError>;

    async fn store_by_pickup_code(&self, code: &str) -> Result<Option<Store>, DomainError>;

    async fn fetch_courier(&self, courier_id: Uuid) -> Result<Option<Courier>, DomainError>;

    async fn update_courier_location(
        &self,
        courier_id: Uuid,
        location: String,
    ) -> Result<(), DomainError>;

    /// Lookup by normalized (uppercased) code.
    async fn fetch_promotion(&self, code: &str) -> Result<Option<Promotion>, DomainError>;

    // ---- Audit ----

    async fn append_scan_record(&self, record: QrScanRecord) -> Result<(), DomainError>;

    async fn scan_records_for(&self, order_id: Uuid) -> Result<Vec<QrScanRecord>, DomainError>;

    async fn append_issue_report(&self, report: IssueReport) -> Result<(), DomainError>;

    // ---- Outbox ----

    /// Take and clear every pending outbound envelope. Called after commit.
    async fn drain_outbox(&self) -> Result<Vec<EventEnvelope>, DomainError>;
}
