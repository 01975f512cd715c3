use chrono::Utc;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::order::{
    Order, OrderEvent, OrderStatus, OrderStatusChangedEvent,
};
use crate::error::DomainError;
use crate::events::OutboundPipeline;
use crate::storage::Storage;
use crate::utils::{commit_with_retries, RetryPolicy};

// ============================================================================
// Delivery Assignment Manager - Courier Claim and Progress Workflow
// ============================================================================
//
// Claiming is first-come-first-served with two exclusivity rules enforced in
// one storage critical section: an order takes at most one courier, and a
// courier carries at most one active order. Rejecting an offer is free and
// leaves the order on the open board.
//
// ============================================================================

pub struct DeliveryAssignmentManager {
    storage: Arc<dyn Storage>,
    outbound: Arc<OutboundPipeline>,
    config: Config,
    retry_policy: RetryPolicy,
}

impl DeliveryAssignmentManager {
    pub fn new(storage: Arc<dyn Storage>, outbound: Arc<OutboundPipeline>, config: Config) -> Self {
        let retry_policy = RetryPolicy::with_attempts(config.commit_retries);
        Self {
            storage,
            outbound,
            config,
            retry_policy,
        }
    }

    /// The open board: unassigned orders still in Pending.
    pub async fn list_available(&self) -> Result<Vec<Order>, DomainError> {
        self.storage.list_available_orders().await
    }

    /// Courier claims the order. Loses cleanly if another courier got there
    /// first or the courier is already carrying an active order.
    pub async fn accept(&self, courier_id: Uuid, order_id: Uuid) -> Result<Order, DomainError> {
        let eta = Utc::now()
            + chrono::Duration::from_std(self.config.eta_offset)
                .unwrap_or_else(|_| chrono::Duration::minutes(30));

        match self.storage.assign_deliverer(order_id, courier_id, eta).await {
            Ok(order) => {
                tracing::info!(
                    order_id = %order_id,
                    courier_id = %courier_id,
                    reference = %order.reference,
                    eta = %eta,
                    "✅ Order assigned to courier"
                );
                self.outbound.flush(self.storage.as_ref()).await;
                Ok(order)
            }
            Err(DomainError::Conflict(message)) => {
                self.outbound.metrics().assignment_conflicts.inc();
                tracing::debug!(
                    order_id = %order_id,
                    courier_id = %courier_id,
                    "Assignment lost: {message}"
                );
                Err(DomainError::Conflict(message))
            }
            Err(other) => Err(other),
        }
    }

    /// Declining an offer mutates nothing; the order stays on the board.
    pub async fn reject(&self, courier_id: Uuid, order_id: Uuid) -> Result<(), DomainError> {
        // Confirm the order exists so a bogus id still surfaces.
        let order = self.storage.fetch_order(order_id).await?;
        tracing::info!(
            order_id = %order.id,
            courier_id = %courier_id,
            "Courier declined order; left available"
        );
        Ok(())
    }

    /// Courier reports forward progress. Delivered goes through the
    /// exactly-once confirmation path; everything else is a plain monotonic
    /// transition.
    pub async fn update_status(
        &self,
        courier_id: Uuid,
        order_id: Uuid,
        status: &str,
        location: Option<String>,
    ) -> Result<Order, DomainError> {
        let next = OrderStatus::from_str(status)?;

        let order = self.storage.fetch_order(order_id).await?;
        if order.deliverer != Some(courier_id) {
            return Err(DomainError::access_denied(
                "Order is not assigned to this courier",
            ));
        }

        let updated = if next == OrderStatus::Delivered {
            let delivered = self
                .storage
                .confirm_delivery(order_id, courier_id, false)
                .await?;
            self.outbound.metrics().orders_delivered.inc();
            delivered
        } else {
            commit_with_retries(self.retry_policy, || async move {
                let mut fresh = self.storage.fetch_order(order_id).await?;
                let from = fresh.status;
                fresh.transition_to(next, Utc::now())?;
                let event = OrderEvent::StatusChanged(OrderStatusChangedEvent {
                    order_id: fresh.id,
                    reference: fresh.reference.clone(),
                    from,
                    to: next,
                    changed_by: Some(courier_id),
                });
                self.storage.update_order(fresh, vec![event]).await
            })
            .await?
        };

        if let Some(location) = location {
            self.storage
                .update_courier_location(courier_id, location)
                .await?;
        }

        tracing::info!(
            order_id = %order_id,
            courier_id = %courier_id,
            status = %updated.status,
            "Order status updated by courier"
        );

        self.outbound.flush(self.storage.as_ref()).await;
        Ok(updated)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
