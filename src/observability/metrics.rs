use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub orders_placed_total: IntCounterVec,
    pub status_transitions_total: IntCounterVec,
    pub broadcasts_total: IntCounter,
    pub claims_total: IntCounterVec,
    pub couriers_online: IntGauge,
    pub placement_latency_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_placed_total = IntCounterVec::new(
            Opts::new("orders_placed_total", "Orders placed by payment method"),
            &["payment_method"],
        )
        .expect("valid orders_placed_total metric");

        let status_transitions_total = IntCounterVec::new(
            Opts::new(
                "status_transitions_total",
                "Shop order status transitions by target status",
            ),
            &["target"],
        )
        .expect("valid status_transitions_total metric");

        let broadcasts_total = IntCounter::new(
            "broadcasts_total",
            "Delivery broadcasts created or refreshed",
        )
        .expect("valid broadcasts_total metric");

        let claims_total = IntCounterVec::new(
            Opts::new("claims_total", "Assignment claim attempts by outcome"),
            &["outcome"],
        )
        .expect("valid claims_total metric");

        let couriers_online = IntGauge::new("couriers_online", "Couriers currently online")
            .expect("valid couriers_online metric");

        let placement_latency_seconds = Histogram::with_opts(HistogramOpts::new(
            "placement_latency_seconds",
            "Latency of order placement in seconds",
        ))
        .expect("valid placement_latency_seconds metric");

        registry
            .register(Box::new(orders_placed_total.clone()))
            .expect("register orders_placed_total");
        registry
            .register(Box::new(status_transitions_total.clone()))
            .expect("register status_transitions_total");
        registry
            .register(Box::new(broadcasts_total.clone()))
            .expect("register broadcasts_total");
        registry
            .register(Box::new(claims_total.clone()))
            .expect("register claims_total");
        registry
            .register(Box::new(couriers_online.clone()))
            .expect("register couriers_online");
        registry
            .register(Box::new(placement_latency_seconds.clone()))
            .expect("register placement_latency_seconds");

        Self {
            registry,
            orders_placed_total,
            status_transitions_total,
            broadcasts_total,
            claims_total,
            couriers_online,
            placement_latency_seconds,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
