use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::order::{ItemDecisionRecordedEvent, Order, OrderEvent};
use crate::error::DomainError;
use crate::events::OutboundPipeline;
use crate::storage::Storage;
use crate::utils::{commit_with_retries, RetryPolicy};

// ============================================================================
// Item Fulfillment Coordinator - Per-Store Decision Workflow
// ============================================================================
//
// One store, one order, a batch of item decisions. The whole batch is
// validated and applied to an in-memory snapshot; nothing reaches storage
// until every action has passed. A failure anywhere aborts the batch.
//
// Two stores working the same order touch disjoint item subsets but both
// rewrite total_amount; the optimistic commit loses that race cleanly and
// re-applies on a fresh snapshot (see utils::retry).
//
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemAction {
    Accept,
    Refuse {
        reason: String,
    },
    Suggest {
        suggested_product_id: Uuid,
        note: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemActionRequest {
    pub order_item_id: Uuid,
    #[serde(flatten)]
    pub action: ItemAction,
}

pub struct ItemFulfillmentCoordinator {
    storage: Arc<dyn Storage>,
    outbound: Arc<OutboundPipeline>,
    retry_policy: RetryPolicy,
}

impl ItemFulfillmentCoordinator {
    pub fn new(storage: Arc<dyn Storage>, outbound: Arc<OutboundPipeline>) -> Self {
        Self {
            storage,
            outbound,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Apply a store's batch of accept / refuse / suggest decisions.
    /// All-or-nothing: any invalid action leaves the order untouched.
    pub async fn apply_batch(
        &self,
        store_id: Uuid,
        order_id: Uuid,
        actions: &[ItemActionRequest],
    ) -> Result<Order, DomainError> {
        if actions.is_empty() {
            return Err(DomainError::validation("Item action batch is empty"));
        }

        if self.storage.fetch_store(store_id).await?.is_none() {
            return Err(DomainError::not_found(format!("Store {store_id} not found")));
        }

        let committed = commit_with_retries(self.retry_policy, || async move {
            let mut order = self.storage.fetch_order(order_id).await?;
            let mut events = Vec::with_capacity(actions.len());

            for request in actions {
                let event = self
                    .apply_action(&mut order, store_id, request)
                    .await?;
                events.push(OrderEvent::ItemDecisionRecorded(event));
            }

            order.recompute_total();
            self.storage.update_order(order, events).await
        })
        .await?;

        tracing::info!(
            order_id = %order_id,
            store_id = %store_id,
            action_count = actions.len(),
            total_amount = %committed.total_amount,
            "✅ Store decisions applied"
        );

        self.outbound.flush(self.storage.as_ref()).await;
        Ok(committed)
    }

    async fn apply_action(
        &self,
        order: &mut Order,
        store_id: Uuid,
        request: &ItemActionRequest,
    ) -> Result<ItemDecisionRecordedEvent, DomainError> {
        let item_id = request.order_item_id;

        let Some(snapshot) = order.item(item_id) else {
            // Distinguish a missing item from one on a different order.
            return match self.storage.find_order_containing_item(item_id).await? {
                Some(_) => Err(DomainError::validation(format!(
                    "Order item {item_id} does not belong to order {}",
                    order.reference
                ))),
                None => Err(DomainError::not_found(format!(
                    "Order item {item_id} not found"
                ))),
            };
        };
        let (item_store, product_id) = (snapshot.store_id, snapshot.product_id);

        if item_store != Some(store_id) {
            return Err(DomainError::access_denied(
                "Item is fulfilled by a different store",
            ));
        }

        let now = Utc::now();
        let Some(item) = order.item_mut(item_id) else {
            return Err(DomainError::not_found(format!(
                "Order item {item_id} not found"
            )));
        };

        let decision = match &request.action {
            ItemAction::Accept => {
                let price = self.own_listing_price(store_id, product_id).await?;
                item.record_acceptance(price, now);
                item.store_status
            }
            ItemAction::Refuse { reason } => {
                if reason.trim().is_empty() {
                    return Err(DomainError::validation("Refusal requires a reason"));
                }
                item.record_refusal(reason.clone(), now);
                item.store_status
            }
            ItemAction::Suggest {
                suggested_product_id,
                note,
            } => {
                let price = self
                    .own_listing_price(store_id, *suggested_product_id)
                    .await?;
                item.record_suggestion(*suggested_product_id, price, note.clone(), now);
                item.store_status
            }
        };

        Ok(ItemDecisionRecordedEvent {
            order_id: order.id,
            order_item_id: item_id,
            store_id,
            decision,
        })
    }

    /// The acting store must carry the product in its own inventory with a
    /// positive price; the price returned is the store's, not the customer's.
    async fn own_listing_price(
        &self,
        store_id: Uuid,
        product_id: Uuid,
    ) -> Result<Decimal, DomainError> {
        let listing = self
            .storage
            .fetch_listing(store_id, product_id)
            .await?
            .ok_or_else(|| {
                DomainError::conflict(format!(
                    "Store does not carry product {product_id}"
                ))
            })?;

        if listing.price <= Decimal::ZERO {
            return Err(DomainError::conflict(format!(
                "Store listing for product {product_id} has no valid price"
            )));
        }
        Ok(listing.price)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{Store, StoreListing};
    use crate::domain::order::{
        generate_reference, OrderDetails, OrderItem, OrderItemStatus,
    };
    use crate::domain::payment::PaymentMethod;
    use crate::events::{EventDispatcher, OutboundPipeline};
    use crate::metrics::Metrics;
    use crate::storage::MemoryStorage;

    struct Fixture {
        storage: Arc<MemoryStorage>,
        coordinator: ItemFulfillmentCoordinator,
        store: Store,
        other_store: Store,
        order: Order,
    }

    fn pipeline() -> Arc<OutboundPipeline> {
        Arc::new(OutboundPipeline::new(
            EventDispatcher::new(vec![]),
            Arc::new(Metrics::new().unwrap()),
        ))
    }

    async fn fixture() -> Fixture {
        let storage = Arc::new(MemoryStorage::new());
        let store = Store {
            id: Uuid::new_v4(),
            name: "Corner Goods".to_string(),
            pickup_code: "STORE-A".to_string(),
        };
        let other_store = Store {
            id: Uuid::new_v4(),
            name: "Far Mart".to_string(),
            pickup_code: "STORE-B".to_string(),
        };
        storage.add_store(store.clone()).await;
        storage.add_store(other_store.clone()).await;

        let product_a = Uuid::new_v4();
        let product_b = Uuid::new_v4();
        storage
            .add_listing(StoreListing {
                store_id: store.id,
                product_id: product_a,
                price: Decimal::new(450, 2),
            })
            .await;

        let items = vec![
            OrderItem::new(product_a, 2, Decimal::from(10), Some(store.id)),
            OrderItem::new(product_b, 1, Decimal::from(8), Some(other_store.id)),
        ];
        let order = Order::create(
            Uuid::new_v4(),
            items,
            PaymentMethod::Card,
            OrderDetails::default(),
            generate_reference(Utc::now()),
            Decimal::new(500, 2),
            Utc::now(),
        );
        let order = storage.insert_order(order, vec![]).await.unwrap();

        let coordinator =
            ItemFulfillmentCoordinator::new(storage.clone(), pipeline());

        Fixture {
            storage,
            coordinator,
            store,
            other_store,
            order,
        }
    }

    fn accept(item_id: Uuid) -> ItemActionRequest {
        ItemActionRequest {
            order_item_id: item_id,
            action: ItemAction::Accept,
        }
    }

    #[tokio::test]
    async fn test_accept_uses_store_own_price() {
        let fx = fixture().await;
        let item_id = fx.order.items[0].id;

        let updated = fx
            .coordinator
            .apply_batch(fx.store.id, fx.order.id, &[accept(item_id)])
            .await
            .unwrap();

        let item = updated.item(item_id).unwrap();
        assert_eq!(item.store_status, OrderItemStatus::Accepted);
        assert_eq!(item.store_price, Some(Decimal::new(450, 2)));
        assert!(item.store_action_at.is_some());
        // Customer-facing line total is untouched by the store decision
        assert_eq!(item.total_price, Decimal::from(10));
    }

    #[tokio::test]
    async fn test_totals_invariant_after_batch() {
        let fx = fixture().await;
        let item_id = fx.order.items[0].id;

        let updated = fx
            .coordinator
            .apply_batch(fx.store.id, fx.order.id, &[accept(item_id)])
            .await
            .unwrap();

        let expected: Decimal = updated.items.iter().map(|item| item.total_price).sum();
        assert_eq!(updated.total_amount, expected);
    }

    #[tokio::test]
    async fn test_accept_without_listing_is_conflict() {
        let fx = fixture().await;
        // other_store has no listing for its item's product
        let item_id = fx.order.items[1].id;

        let result = fx
            .coordinator
            .apply_batch(fx.other_store.id, fx.order.id, &[accept(item_id)])
            .await;
        assert!(matches!(result, Err(DomainError::Conflict(_))));

        let order = fx.storage.fetch_order(fx.order.id).await.unwrap();
        assert_eq!(
            order.item(item_id).unwrap().store_status,
            OrderItemStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_wrong_store_is_access_denied() {
        let fx = fixture().await;
        let foreign_item = fx.order.items[1].id;

        let result = fx
            .coordinator
            .apply_batch(fx.store.id, fx.order.id, &[accept(foreign_item)])
            .await;
        assert!(matches!(result, Err(DomainError::AccessDenied(_))));

        let order = fx.storage.fetch_order(fx.order.id).await.unwrap();
        assert_eq!(
            order.item(foreign_item).unwrap().store_status,
            OrderItemStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let fx = fixture().await;
        let good_item = fx.order.items[0].id;
        let bad_refusal = ItemActionRequest {
            order_item_id: good_item,
            action: ItemAction::Refuse {
                reason: "  ".to_string(),
            },
        };

        let result = fx
            .coordinator
            .apply_batch(
                fx.store.id,
                fx.order.id,
                &[accept(good_item), bad_refusal],
            )
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));

        // The valid first action must not have leaked into storage
        let order = fx.storage.fetch_order(fx.order.id).await.unwrap();
        assert_eq!(
            order.item(good_item).unwrap().store_status,
            OrderItemStatus::Pending
        );
        assert_eq!(order.version, fx.order.version);
    }

    #[tokio::test]
    async fn test_refuse_records_reason() {
        let fx = fixture().await;
        let item_id = fx.order.items[0].id;

        let updated = fx
            .coordinator
            .apply_batch(
                fx.store.id,
                fx.order.id,
                &[ItemActionRequest {
                    order_item_id: item_id,
                    action: ItemAction::Refuse {
                        reason: "Out of stock".to_string(),
                    },
                }],
            )
            .await
            .unwrap();

        let item = updated.item(item_id).unwrap();
        assert_eq!(item.store_status, OrderItemStatus::Refused);
        assert_eq!(item.store_notes.as_deref(), Some("Out of stock"));
    }

    #[tokio::test]
    async fn test_suggest_requires_own_listing() {
        let fx = fixture().await;
        let item_id = fx.order.items[0].id;
        let replacement = Uuid::new_v4();

        // Not listed yet: conflict
        let result = fx
            .coordinator
            .apply_batch(
                fx.store.id,
                fx.order.id,
                &[ItemActionRequest {
                    order_item_id: item_id,
                    action: ItemAction::Suggest {
                        suggested_product_id: replacement,
                        note: None,
                    },
                }],
            )
            .await;
        assert!(matches!(result, Err(DomainError::Conflict(_))));

        fx.storage
            .add_listing(StoreListing {
                store_id: fx.store.id,
                product_id: replacement,
                price: Decimal::new(399, 2),
            })
            .await;

        let updated = fx
            .coordinator
            .apply_batch(
                fx.store.id,
                fx.order.id,
                &[ItemActionRequest {
                    order_item_id: item_id,
                    action: ItemAction::Suggest {
                        suggested_product_id: replacement,
                        note: Some("Similar brand".to_string()),
                    },
                }],
            )
            .await
            .unwrap();

        let item = updated.item(item_id).unwrap();
        assert_eq!(item.store_status, OrderItemStatus::Suggested);
        assert_eq!(item.suggested_product_id, Some(replacement));
        assert_eq!(item.store_price, Some(Decimal::new(399, 2)));
    }

    #[tokio::test]
    async fn test_item_of_other_order_is_validation() {
        let fx = fixture().await;

        // A second order owns a different item
        let stray_item = OrderItem::new(Uuid::new_v4(), 1, Decimal::from(5), Some(fx.store.id));
        let stray_id = stray_item.id;
        let other_order = Order::create(
            Uuid::new_v4(),
            vec![stray_item],
            PaymentMethod::Cash,
            OrderDetails::default(),
            generate_reference(Utc::now()),
            Decimal::new(500, 2),
            Utc::now(),
        );
        fx.storage.insert_order(other_order, vec![]).await.unwrap();

        let result = fx
            .coordinator
            .apply_batch(fx.store.id, fx.order.id, &[accept(stray_id)])
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_unknown_item_is_not_found() {
        let fx = fixture().await;
        let result = fx
            .coordinator
            .apply_batch(fx.store.id, fx.order.id, &[accept(Uuid::new_v4())])
            .await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_two_stores_both_commit() {
        let fx = fixture().await;
        let mine = fx.order.items[0].id;
        let theirs = fx.order.items[1].id;

        fx.coordinator
            .apply_batch(fx.store.id, fx.order.id, &[accept(mine)])
            .await
            .unwrap();

        // The other store refuses its own item afterwards; the first store's
        // decision must survive and the total stays consistent.
        let updated = fx
            .coordinator
            .apply_batch(
                fx.other_store.id,
                fx.order.id,
                &[ItemActionRequest {
                    order_item_id: theirs,
                    action: ItemAction::Refuse {
                        reason: "Discontinued".to_string(),
                    },
                }],
            )
            .await
            .unwrap();

        assert_eq!(
            updated.item(mine).unwrap().store_status,
            OrderItemStatus::Accepted
        );
        assert_eq!(
            updated.item(theirs).unwrap().store_status,
            OrderItemStatus::Refused
        );
        let expected: Decimal = updated.items.iter().map(|item| item.total_price).sum();
        assert_eq!(updated.total_amount, expected);
    }
}
