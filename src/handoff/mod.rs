use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::audit::QrScanRecord;
use crate::domain::order::{Order, OrderStatus};
use crate::error::DomainError;
use crate::events::OutboundPipeline;
use crate::storage::Storage;
use crate::utils::{commit_with_retries, RetryPolicy};

// ============================================================================
// Handoff Verifier - QR-Gated Pickup and Delivery Checkpoints
// ============================================================================
//
// Two asymmetric checks. Pickup may be re-scanned harmlessly (phone re-reads,
// retries), so a scan of an already-collected order is a logged no-op.
// Delivery confirmation drives courier earnings and must fire exactly once;
// the compare-and-swap lives in Storage::confirm_delivery.
//
// Every pickup attempt, successful or not, lands in the append-only scan log.
//
// ============================================================================

const INVALID_PICKUP_CODE: &str = "Invalid code for this order";

pub struct HandoffVerifier {
    storage: Arc<dyn Storage>,
    outbound: Arc<OutboundPipeline>,
    retry_policy: RetryPolicy,
}

impl HandoffVerifier {
    pub fn new(storage: Arc<dyn Storage>, outbound: Arc<OutboundPipeline>) -> Self {
        Self {
            storage,
            outbound,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Store-side checkpoint: the courier scans the store's pickup code.
    pub async fn scan_pickup(
        &self,
        courier_id: Uuid,
        order_id: Uuid,
        scanned_code: &str,
    ) -> Result<Order, DomainError> {
        let order = self.storage.fetch_order(order_id).await?;

        let store = match self.storage.store_by_pickup_code(scanned_code).await? {
            Some(store) if order.has_participating_store(store.id) => store,
            resolved => {
                let store_id = resolved.map(|store| store.id);
                self.log_scan_failure(courier_id, order_id, store_id, scanned_code, INVALID_PICKUP_CODE)
                    .await;
                return Err(DomainError::validation(INVALID_PICKUP_CODE));
            }
        };

        // Idempotent re-scan: already collected means success, no mutation.
        if order.status == OrderStatus::Collected {
            self.log_scan_success(courier_id, order_id, store.id, scanned_code)
                .await;
            tracing::info!(
                order_id = %order_id,
                store_id = %store.id,
                "Pickup re-scan on collected order; no-op"
            );
            return Ok(order);
        }

        let collected = commit_with_retries(self.retry_policy, || async move {
            let mut fresh = self.storage.fetch_order(order_id).await?;
            if fresh.status == OrderStatus::Collected {
                return Ok(fresh);
            }
            fresh.mark_collected(Utc::now())?;
            self.storage.update_order(fresh, vec![]).await
        })
        .await;

        match collected {
            Ok(updated) => {
                self.log_scan_success(courier_id, order_id, store.id, scanned_code)
                    .await;
                tracing::info!(
                    order_id = %order_id,
                    store_id = %store.id,
                    courier_id = %courier_id,
                    "✅ Order collected at store"
                );
                self.outbound.flush(self.storage.as_ref()).await;
                Ok(updated)
            }
            Err(error) => {
                self.log_scan_failure(
                    courier_id,
                    order_id,
                    Some(store.id),
                    scanned_code,
                    error.to_string(),
                )
                .await;
                Err(error)
            }
        }
    }

    /// Courier-side checkpoint: the submitted code must match the order's own
    /// secret exactly, and validation fires exactly once.
    pub async fn validate_delivery(
        &self,
        courier_id: Uuid,
        order_id: Uuid,
        submitted_code: &str,
    ) -> Result<Order, DomainError> {
        let order = self.storage.fetch_order(order_id).await?;

        if submitted_code != order.qr_code {
            return Err(DomainError::validation("Invalid delivery code"));
        }

        let delivered = self
            .storage
            .confirm_delivery(order_id, courier_id, true)
            .await?;

        self.outbound.metrics().orders_delivered.inc();
        tracing::info!(
            order_id = %order_id,
            courier_id = %courier_id,
            reference = %delivered.reference,
            "✅ Delivery confirmed by QR validation"
        );

        self.outbound.flush(self.storage.as_ref()).await;
        Ok(delivered)
    }

    async fn log_scan_success(
        &self,
        courier_id: Uuid,
        order_id: Uuid,
        store_id: Uuid,
        scanned_code: &str,
    ) {
        self.outbound
            .metrics()
            .pickup_scans
            .with_label_values(&["success"])
            .inc();
        let record =
            QrScanRecord::success(courier_id, order_id, store_id, scanned_code.to_string(), Utc::now());
        if let Err(error) = self.storage.append_scan_record(record).await {
            tracing::warn!(error = %error, "Failed to append scan record");
        }
    }

    async fn log_scan_failure(
        &self,
        courier_id: Uuid,
        order_id: Uuid,
        store_id: Option<Uuid>,
        scanned_code: &str,
        message: impl Into<String>,
    ) {
        self.outbound
            .metrics()
            .pickup_scans
            .with_label_values(&["failure"])
            .inc();
        let record = QrScanRecord::failure(
            courier_id,
            order_id,
            store_id,
            scanned_code.to_string(),
            message,
            Utc::now(),
        );
        if let Err(error) = self.storage.append_scan_record(record).await {
            tracing::warn!(error = %error, "Failed to append scan record");
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
