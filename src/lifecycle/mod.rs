use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::audit::{IssueReport, ReporterRole};
use crate::domain::order::{
    generate_reference, Order, OrderCreatedEvent, OrderDetails, OrderEvent, OrderItem,
};
use crate::domain::payment::PaymentMethod;
use crate::error::DomainError;
use crate::events::OutboundPipeline;
use crate::pricing::{OrderLineRequest, PricingEngine, Quote};
use crate::storage::Storage;

// ============================================================================
// Order Lifecycle - Creation, Preview, Rating, Issue Reports
// ============================================================================
//
// Creation prices every line through the same catalog validation the preview
// path uses, then persists the order with its OrderCreated event in one
// commit. A promotion code on the request is recorded on the order but the
// persisted total stays undiscounted; only the preview computes discounts.
//
// ============================================================================

const REFERENCE_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub lines: Vec<OrderLineRequest>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub details: OrderDetails,
}

pub struct OrderLifecycle {
    storage: Arc<dyn Storage>,
    outbound: Arc<OutboundPipeline>,
    pricing: PricingEngine,
    config: Config,
}

impl OrderLifecycle {
    pub fn new(storage: Arc<dyn Storage>, outbound: Arc<OutboundPipeline>, config: Config) -> Self {
        let pricing = PricingEngine::new(storage.clone());
        Self {
            storage,
            outbound,
            pricing,
            config,
        }
    }

    pub async fn create_order(
        &self,
        customer_id: Uuid,
        request: CreateOrderRequest,
    ) -> Result<Order, DomainError> {
        // Promotion stays a preview concern; creation validates lines only.
        let quote = self.pricing.quote(&request.lines, None).await?;

        let mut items = Vec::with_capacity(quote.lines.len());
        for line in &quote.lines {
            let store_id = self
                .storage
                .listings_for_product(line.product_id)
                .await?
                .first()
                .map(|listing| listing.store_id);
            items.push(OrderItem::new(
                line.product_id,
                line.quantity,
                line.line_total,
                store_id,
            ));
        }

        // References are random; regenerate on the rare collision.
        let mut attempt = 0;
        let created = loop {
            attempt += 1;
            let now = Utc::now();
            let order = Order::create(
                customer_id,
                items.clone(),
                request.payment_method,
                request.details.clone(),
                generate_reference(now),
                self.config.delivery_fee,
                now,
            );
            let event = OrderEvent::Created(OrderCreatedEvent {
                order_id: order.id,
                reference: order.reference.clone(),
                customer_id,
                total_amount: order.total_amount,
                item_count: order.items.len(),
            });

            match self.storage.insert_order(order, vec![event]).await {
                Ok(created) => break created,
                Err(DomainError::Conflict(_)) if attempt < REFERENCE_ATTEMPTS => continue,
                Err(error) => return Err(error),
            }
        };

        self.outbound.metrics().orders_created.inc();
        tracing::info!(
            order_id = %created.id,
            reference = %created.reference,
            customer_id = %customer_id,
            total_amount = %created.total_amount,
            item_count = created.items.len(),
            "✅ Order created"
        );

        self.outbound.flush(self.storage.as_ref()).await;
        Ok(created)
    }

    /// Price preview; persists nothing and consumes no promotion usage.
    pub async fn simulate_order(
        &self,
        lines: &[OrderLineRequest],
        promotion_code: Option<&str>,
    ) -> Result<Quote, DomainError> {
        self.pricing.quote(lines, promotion_code).await
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Order, DomainError> {
        self.storage.fetch_order(order_id).await
    }

    pub async fn rate_order(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
        stars: u8,
        comment: Option<String>,
    ) -> Result<Order, DomainError> {
        let mut order = self.storage.fetch_order(order_id).await?;
        if order.customer_id != customer_id {
            return Err(DomainError::access_denied(
                "Only the order's customer can rate it",
            ));
        }
        order.record_rating(stars, comment, Utc::now())?;
        let rated = self.storage.update_order(order, vec![]).await?;

        tracing::info!(order_id = %order_id, stars, "Order rated");
        Ok(rated)
    }

    pub async fn report_issue(
        &self,
        reporter_id: Uuid,
        order_id: Uuid,
        message: String,
    ) -> Result<(), DomainError> {
        if message.trim().is_empty() {
            return Err(DomainError::validation("Issue message is empty"));
        }

        let order = self.storage.fetch_order(order_id).await?;
        let role = if order.customer_id == reporter_id {
            ReporterRole::Customer
        } else if order.deliverer == Some(reporter_id) {
            ReporterRole::Courier
        } else {
            return Err(DomainError::access_denied(
                "Only the customer or assigned courier can report an issue",
            ));
        };

        if !order.is_active() {
            return Err(DomainError::validation(
                "Issues can only be reported on active orders",
            ));
        }

        let report = IssueReport {
            id: Uuid::new_v4(),
            order_id,
            reporter_id,
            reporter_role: role,
            message,
            reported_at: Utc::now(),
        };
        self.storage.append_issue_report(report).await?;

        tracing::info!(order_id = %order_id, reporter_id = %reporter_id, "📣 Issue reported");
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
