mod server;

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

pub use server::start_metrics_server;

// ============================================================================
// Metrics - Workflow Counters
// ============================================================================
//
// Registered with a dedicated Prometheus registry and scraped via /metrics.
//
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub orders_created: IntCounter,
    pub orders_delivered: IntCounter,
    pub pickup_scans: IntCounterVec,
    pub assignment_conflicts: IntCounter,
    pub outbox_events_published: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounter::with_opts(Opts::new(
            "orders_created_total",
            "Orders successfully created",
        ))?;
        registry.register(Box::new(orders_created.clone()))?;

        let orders_delivered = IntCounter::with_opts(Opts::new(
            "orders_delivered_total",
            "Orders confirmed delivered",
        ))?;
        registry.register(Box::new(orders_delivered.clone()))?;

        let pickup_scans = IntCounterVec::new(
            Opts::new("pickup_scans_total", "Pickup QR scans by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(pickup_scans.clone()))?;

        let assignment_conflicts = IntCounter::with_opts(Opts::new(
            "assignment_conflicts_total",
            "Courier claims rejected with a conflict",
        ))?;
        registry.register(Box::new(assignment_conflicts.clone()))?;

        let outbox_events_published = IntCounterVec::new(
            Opts::new(
                "outbox_events_published_total",
                "Outbound events published after commit, by type",
            ),
            &["event_type"],
        )?;
        registry.register(Box::new(outbox_events_published.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            orders_delivered,
            pickup_scans,
            assignment_conflicts,
            outbox_events_published,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
