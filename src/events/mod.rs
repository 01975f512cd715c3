use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::order::OrderEvent;

// ============================================================================
// Outbound Events - Envelope, Dispatcher, Subscribers
// ============================================================================
//
// Envelopes are written to the outbox in the same commit as the state change
// (see storage). After commit, services drain the outbox and hand the
// envelopes to the dispatcher, which fans them out to subscribers.
//
// Subscribers are best-effort by contract: a failing notification or payment
// hook is logged and dropped, never bubbled into the order transaction.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub order_id: Uuid,
    pub event_type: String,
    pub event: OrderEvent,
    pub occurred_at: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: OrderEvent) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            order_id: event.order_id(),
            event_type: event.event_type().to_string(),
            event,
            occurred_at: Utc::now(),
        }
    }
}

/// Consumer of outbound events. Implementations must be side-effect-only;
/// the dispatcher ignores their failures beyond logging them.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, envelope: &EventEnvelope) -> anyhow::Result<()>;
}

pub struct EventDispatcher {
    subscribers: Vec<Arc<dyn EventSubscriber>>,
}

impl EventDispatcher {
    pub fn new(subscribers: Vec<Arc<dyn EventSubscriber>>) -> Self {
        Self { subscribers }
    }

    /// Fan out a batch of envelopes to every subscriber. Failures are logged
    /// per subscriber and never propagated.
    pub async fn publish(&self, envelopes: &[EventEnvelope]) {
        for envelope in envelopes {
            let deliveries = self.subscribers.iter().map(|subscriber| {
                let subscriber = subscriber.clone();
                async move {
                    if let Err(error) = subscriber.handle(envelope).await {
                        tracing::warn!(
                            subscriber = subscriber.name(),
                            event_type = %envelope.event_type,
                            order_id = %envelope.order_id,
                            error = %error,
                            "Event subscriber failed; dropping"
                        );
                    }
                }
            });
            join_all(deliveries).await;

            tracing::debug!(
                event_type = %envelope.event_type,
                order_id = %envelope.order_id,
                "Published outbound event"
            );
        }
    }
}

/// Post-commit side-effect pipeline shared by the use-case services: drain
/// the outbox, count, publish. Entirely best-effort; a failure here can only
/// lose a notification, never a committed state change.
pub struct OutboundPipeline {
    dispatcher: EventDispatcher,
    metrics: Arc<crate::metrics::Metrics>,
}

impl OutboundPipeline {
    pub fn new(dispatcher: EventDispatcher, metrics: Arc<crate::metrics::Metrics>) -> Self {
        Self { dispatcher, metrics }
    }

    pub fn metrics(&self) -> &crate::metrics::Metrics {
        &self.metrics
    }

    pub async fn flush(&self, storage: &dyn crate::storage::Storage) {
        match storage.drain_outbox().await {
            Ok(envelopes) => {
                for envelope in &envelopes {
                    self.metrics
                        .outbox_events_published
                        .with_label_values(&[envelope.event_type.as_str()])
                        .inc();
                }
                self.dispatcher.publish(&envelopes).await;
            }
            Err(error) => {
                tracing::warn!(error = %error, "Failed to drain outbox; events remain queued");
            }
        }
    }
}

// ============================================================================
// Built-in Subscribers
// ============================================================================

/// Stand-in for the push/email notification channel: logs what would be sent.
pub struct LoggingNotifier;

#[async_trait]
impl EventSubscriber for LoggingNotifier {
    fn name(&self) -> &'static str {
        "notifications"
    }

    async fn handle(&self, envelope: &EventEnvelope) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&envelope.event)?;
        tracing::info!(
            event_type = %envelope.event_type,
            order_id = %envelope.order_id,
            payload = %payload,
            "📣 Notification dispatched"
        );
        Ok(())
    }
}

/// Propagates delivery confirmations toward payment reconciliation. Only the
/// status outcome crosses this boundary.
pub struct PaymentReconciler;

#[async_trait]
impl EventSubscriber for PaymentReconciler {
    fn name(&self) -> &'static str {
        "payment-reconciliation"
    }

    async fn handle(&self, envelope: &EventEnvelope) -> anyhow::Result<()> {
        if let OrderEvent::DeliveryConfirmed(event) = &envelope.event {
            tracing::info!(
                order_id = %event.order_id,
                reference = %event.reference,
                "💳 Payment reconciliation notified of delivery"
            );
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderCreatedEvent;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingSubscriber {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl EventSubscriber for CountingSubscriber {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn handle(&self, _envelope: &EventEnvelope) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("subscriber exploded");
            }
            Ok(())
        }
    }

    fn created_envelope() -> EventEnvelope {
        EventEnvelope::new(OrderEvent::Created(OrderCreatedEvent {
            order_id: Uuid::new_v4(),
            reference: "ORD-2026-123456".to_string(),
            customer_id: Uuid::new_v4(),
            total_amount: Decimal::from(10),
            item_count: 1,
        }))
    }

    #[tokio::test]
    async fn test_dispatch_reaches_all_subscribers() {
        let first = Arc::new(CountingSubscriber { calls: AtomicU32::new(0), fail: false });
        let second = Arc::new(CountingSubscriber { calls: AtomicU32::new(0), fail: false });
        let dispatcher = EventDispatcher::new(vec![
            first.clone() as Arc<dyn EventSubscriber>,
            second.clone() as Arc<dyn EventSubscriber>,
        ]);

        dispatcher.publish(&[created_envelope(), created_envelope()]).await;

        assert_eq!(first.calls.load(Ordering::SeqCst), 2);
        assert_eq!(second.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_subscriber_failure_does_not_stop_others() {
        let failing = Arc::new(CountingSubscriber { calls: AtomicU32::new(0), fail: true });
        let healthy = Arc::new(CountingSubscriber { calls: AtomicU32::new(0), fail: false });
        let dispatcher = EventDispatcher::new(vec![
            failing.clone() as Arc<dyn EventSubscriber>,
            healthy.clone() as Arc<dyn EventSubscriber>,
        ]);

        dispatcher.publish(&[created_envelope()]).await;

        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_envelope_captures_event_identity() {
        let envelope = created_envelope();
        assert_eq!(envelope.event_type, "OrderCreated");
        assert_eq!(envelope.order_id, envelope.event.order_id());
    }
}
