//! ## switchyard-telemetry::metrics
//! **Prometheus counters for the accept, analyze, sweep and send loops**

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGaugeVec, Opts, Registry};

use crate::TelemetryError;

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub events_accepted: IntCounter,
    pub events_rejected: IntCounter,
    pub replies_enqueued: IntCounter,
    pub deliveries: IntCounter,
    pub delivery_failures: IntCounter,
    pub deliveries_abandoned: IntCounter,
    pub replies_dropped: IntCounter,
    pub processing_timeouts: IntCounter,
    pub pool_size: IntGaugeVec,
    pub delivery_latency: Histogram,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, TelemetryError> {
        let registry = Registry::new();

        let counter = |name: &str, help: &str| -> Result<IntCounter, TelemetryError> {
            let counter = IntCounter::new(name, help)?;
            registry.register(Box::new(counter.clone()))?;
            Ok(counter)
        };

        let events_accepted = counter(
            "switchyard_events_accepted_total",
            "Inbound events admitted to the incoming pool",
        )?;
        let events_rejected = counter(
            "switchyard_events_rejected_total",
            "Inbound events refused (malformed, duplicate, dropped or not running)",
        )?;
        let replies_enqueued = counter(
            "switchyard_replies_enqueued_total",
            "Replies placed in the sending pool",
        )?;
        let deliveries = counter(
            "switchyard_deliveries_total",
            "Events delivered to their destination",
        )?;
        let delivery_failures = counter(
            "switchyard_delivery_failures_total",
            "Failed delivery attempts",
        )?;
        let deliveries_abandoned = counter(
            "switchyard_deliveries_abandoned_total",
            "Events dropped after exceeding the retry ceiling",
        )?;
        let replies_dropped = counter(
            "switchyard_replies_dropped_total",
            "Outbound events or requeues refused by the sending pool",
        )?;
        let processing_timeouts = counter(
            "switchyard_processing_timeouts_total",
            "In-flight events that exceeded their processing deadline",
        )?;

        let pool_size = IntGaugeVec::new(
            Opts::new("switchyard_pool_size", "Current number of entries per pool"),
            &["pool"],
        )?;
        registry.register(Box::new(pool_size.clone()))?;

        let delivery_latency = Histogram::with_opts(
            HistogramOpts::new(
                "switchyard_delivery_latency_seconds",
                "Time spent delivering one destination batch",
            )
            .buckets(vec![0.001, 0.01, 0.1, 1.0, 10.0]),
        )?;
        registry.register(Box::new(delivery_latency.clone()))?;

        Ok(Self {
            registry,
            events_accepted,
            events_rejected,
            replies_enqueued,
            deliveries,
            delivery_failures,
            deliveries_abandoned,
            replies_dropped,
            processing_timeouts,
            pool_size,
            delivery_latency,
        })
    }

    pub fn set_pool_size(&self, pool: &str, size: usize) {
        self.pool_size
            .with_label_values(&[pool])
            .set(i64::try_from(size).unwrap_or(i64::MAX));
    }

    pub fn gather_metrics(&self) -> Result<String, TelemetryError> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_counters_and_pool_gauges() {
        let metrics = MetricsRecorder::new().unwrap();
        metrics.events_accepted.inc();
        metrics.set_pool_size("incoming", 12);

        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("switchyard_events_accepted_total 1"));
        assert!(text.contains("switchyard_pool_size{pool=\"incoming\"} 12"));
    }

    #[test]
    fn recorders_are_independent() {
        let a = MetricsRecorder::new().unwrap();
        let b = MetricsRecorder::new().unwrap();
        a.deliveries.inc();
        assert_eq!(b.deliveries.get(), 0);
    }
}
