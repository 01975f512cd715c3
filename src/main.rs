use rust_decimal::Decimal;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod assignment;
mod config;
mod domain;
mod error;
mod events;
mod fulfillment;
mod handoff;
mod lifecycle;
mod metrics;
mod pricing;
mod storage;
mod utils;
mod views;

use assignment::DeliveryAssignmentManager;
use domain::catalog::{Courier, Product, Store, StoreListing};
use domain::order::OrderDetails;
use domain::payment::PaymentMethod;
use domain::promotion::{DiscountType, Promotion};
use events::{EventDispatcher, LoggingNotifier, OutboundPipeline, PaymentReconciler};
use fulfillment::{ItemAction, ItemActionRequest, ItemFulfillmentCoordinator};
use handoff::HandoffVerifier;
use lifecycle::{CreateOrderRequest, OrderLifecycle};
use pricing::OrderLineRequest;
use storage::{MemoryStorage, Storage};
use views::{CourierOrderView, CustomerOrderView, StoreOrderView};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_fulfillment=debug")),
        )
        .init();

    tracing::info!("🚀 Starting order fulfillment workflow demo");

    let config = config::Config::from_env();

    // === 1. Metrics registry and HTTP endpoint ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    let registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!("Failed to start metrics runtime: {}", e);
                return;
            }
        };
        rt.block_on(async {
            if let Err(e) = metrics::start_metrics_server(registry, metrics_port).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    });
    tracing::info!("📊 Metrics served on port {}", config.metrics_port);

    // === 2. Seed the in-memory catalog ===
    let storage = Arc::new(MemoryStorage::new());

    let bread = Product {
        id: uuid::Uuid::new_v4(),
        name: "Sourdough Loaf".to_string(),
        price: Decimal::from(6),
        is_active: true,
    };
    let coffee = Product {
        id: uuid::Uuid::new_v4(),
        name: "Espresso Beans 500g".to_string(),
        price: Decimal::from(14),
        is_active: true,
    };
    storage.add_product(bread.clone()).await;
    storage.add_product(coffee.clone()).await;

    let bakery = Store {
        id: uuid::Uuid::new_v4(),
        name: "Hill Bakery".to_string(),
        pickup_code: "PICKUP-BAKERY".to_string(),
    };
    let roastery = Store {
        id: uuid::Uuid::new_v4(),
        name: "North Roastery".to_string(),
        pickup_code: "PICKUP-ROAST".to_string(),
    };
    storage.add_store(bakery.clone()).await;
    storage.add_store(roastery.clone()).await;
    storage
        .add_listing(StoreListing {
            store_id: bakery.id,
            product_id: bread.id,
            price: Decimal::from(6),
        })
        .await;
    storage
        .add_listing(StoreListing {
            store_id: roastery.id,
            product_id: coffee.id,
            price: Decimal::from(13),
        })
        .await;

    let courier = Courier::new("Avery");
    storage.add_courier(courier.clone()).await;

    storage
        .add_promotion(Promotion {
            id: uuid::Uuid::new_v4(),
            code: "SAVE10".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::from(10),
            minimum_order_amount: Some(Decimal::from(10)),
            maximum_discount_amount: None,
            starts_at: None,
            ends_at: None,
            usage_limit: None,
            usage_count: 0,
            is_active: true,
        })
        .await;

    // === 3. Wire the services ===
    let dispatcher = EventDispatcher::new(vec![
        Arc::new(LoggingNotifier) as Arc<dyn events::EventSubscriber>,
        Arc::new(PaymentReconciler),
    ]);
    let outbound = Arc::new(OutboundPipeline::new(dispatcher, metrics.clone()));

    let lifecycle = OrderLifecycle::new(storage.clone(), outbound.clone(), config.clone());
    let fulfillment_svc =
        ItemFulfillmentCoordinator::new(storage.clone(), outbound.clone());
    let assignment_svc =
        DeliveryAssignmentManager::new(storage.clone(), outbound.clone(), config.clone());
    let handoff_svc = HandoffVerifier::new(storage.clone(), outbound.clone());

    // === 4. Walk one order through the whole workflow ===
    let customer_id = uuid::Uuid::new_v4();

    let preview = lifecycle
        .simulate_order(
            &[
                OrderLineRequest {
                    product_id: bread.id,
                    quantity: 2,
                },
                OrderLineRequest {
                    product_id: coffee.id,
                    quantity: 1,
                },
            ],
            Some("SAVE10"),
        )
        .await?;
    tracing::info!(
        subtotal = %preview.subtotal,
        discount = %preview.discount,
        total = %preview.total_amount,
        currency = %config.currency,
        "Price preview with SAVE10"
    );

    let order = lifecycle
        .create_order(
            customer_id,
            CreateOrderRequest {
                lines: vec![
                    OrderLineRequest {
                        product_id: bread.id,
                        quantity: 2,
                    },
                    OrderLineRequest {
                        product_id: coffee.id,
                        quantity: 1,
                    },
                ],
                payment_method: PaymentMethod::Card,
                details: OrderDetails {
                    location: "41.0082,28.9784".to_string(),
                    notes: Some("Leave at the door".to_string()),
                    promotion_code: Some("SAVE10".to_string()),
                    ..OrderDetails::default()
                },
            },
        )
        .await?;

    let customer_view = CustomerOrderView::from_order(&order);
    tracing::info!(
        reference = %customer_view.reference,
        qr_code = %customer_view.qr_code,
        "Customer sees the new order"
    );

    // Each store works its own slice of the order
    for store in [&bakery, &roastery] {
        let view = StoreOrderView::for_store(&order, store.id);
        let actions: Vec<ItemActionRequest> = view
            .items
            .iter()
            .map(|item| ItemActionRequest {
                order_item_id: item.id,
                action: ItemAction::Accept,
            })
            .collect();
        fulfillment_svc
            .apply_batch(store.id, order.id, &actions)
            .await?;
    }

    // Courier claims from the open board
    let board = assignment_svc.list_available().await?;
    tracing::info!(available = board.len(), "Orders on the open board");
    let assigned = assignment_svc.accept(courier.id, order.id).await?;
    tracing::info!(
        courier_view = ?CourierOrderView::from_order(&assigned).reference,
        "Courier accepted the order"
    );

    // Pickup scans at both stores, then en-route progress
    handoff_svc
        .scan_pickup(courier.id, order.id, &bakery.pickup_code)
        .await?;
    handoff_svc
        .scan_pickup(courier.id, order.id, &roastery.pickup_code)
        .await?;
    assignment_svc
        .update_status(
            courier.id,
            order.id,
            "SHIPPED",
            Some("41.0051,28.9770".to_string()),
        )
        .await?;

    // Delivery is gated on the customer's QR secret
    let delivered = handoff_svc
        .validate_delivery(courier.id, order.id, &order.qr_code)
        .await?;
    tracing::info!(
        reference = %delivered.reference,
        delivered_at = ?delivered.delivered_at,
        "✅ Order delivered"
    );

    lifecycle
        .rate_order(customer_id, order.id, 5, Some("Fast and friendly".to_string()))
        .await?;

    // A second rating is rejected; show the wire shape the API layer returns
    if let Err(error) = lifecycle.rate_order(customer_id, order.id, 4, None).await {
        let envelope = error.to_envelope();
        tracing::info!(
            code = envelope.code,
            status = %envelope.status,
            message = %envelope.message,
            "Duplicate rating rejected as expected"
        );
    }

    let final_courier = storage
        .fetch_courier(courier.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("courier vanished from storage"))?;
    tracing::info!(
        deliveries = final_courier.delivery_count,
        earnings = %final_courier.total_earnings,
        "Courier stats after the run"
    );
    tracing::info!(
        "📊 Metrics available at http://localhost:{}/metrics",
        config.metrics_port
    );

    // Give the metrics endpoint a moment before the process exits
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    Ok(())
}
