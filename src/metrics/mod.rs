//! Prometheus metrics for vibelink
//!
//! Exposes per-bridge traffic counters and link gauges at the /metrics
//! endpoint.

use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};

mod server;

pub use server::{MetricsServer, Readiness};

/// Why an outbound message never reached the external system
pub mod drop_reason {
    pub const NO_LINK: &str = "no_link";
    pub const TRANSLATION: &str = "translation";
    pub const SEND: &str = "send";
    pub const INACTIVE: &str = "inactive";
}

/// All bridge metrics in one place
#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Outbound
    pub messages_sent: IntCounterVec,
    pub messages_dropped: IntCounterVec,
    pub send_latency: Histogram,

    // Inbound
    pub messages_received: IntCounterVec,
    pub messages_delivered: IntCounterVec,
    pub messages_discarded: IntCounterVec,
    pub messages_acknowledged: IntCounterVec,
    pub handoff_failures: IntCounterVec,

    // Links and bridges
    pub links_active: IntGaugeVec,
    pub bridges_active: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let messages_sent = IntCounterVec::new(
            Opts::new(
                "vibelink_messages_sent_total",
                "Messages sent to the external system",
            ),
            &["bridge"],
        )
        .unwrap();

        let messages_dropped = IntCounterVec::new(
            Opts::new(
                "vibelink_messages_dropped_total",
                "Outbound messages dropped before reaching the external system",
            ),
            &["bridge", "reason"],
        )
        .unwrap();

        let send_latency = Histogram::with_opts(
            HistogramOpts::new(
                "vibelink_send_latency_seconds",
                "Time to translate and send one outbound message",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
        )
        .unwrap();

        let messages_received = IntCounterVec::new(
            Opts::new(
                "vibelink_messages_received_total",
                "Messages received from the external system",
            ),
            &["bridge"],
        )
        .unwrap();

        let messages_delivered = IntCounterVec::new(
            Opts::new(
                "vibelink_messages_delivered_total",
                "Inbound messages handed off to the broker",
            ),
            &["bridge"],
        )
        .unwrap();

        let messages_discarded = IntCounterVec::new(
            Opts::new(
                "vibelink_messages_discarded_total",
                "Inbound messages discarded for lack of a local mapping",
            ),
            &["bridge"],
        )
        .unwrap();

        let messages_acknowledged = IntCounterVec::new(
            Opts::new(
                "vibelink_messages_acknowledged_total",
                "Inbound messages acknowledged to the external system",
            ),
            &["bridge"],
        )
        .unwrap();

        let handoff_failures = IntCounterVec::new(
            Opts::new(
                "vibelink_handoff_failures_total",
                "Inbound messages the broker refused, left unacknowledged",
            ),
            &["bridge"],
        )
        .unwrap();

        let links_active = IntGaugeVec::new(
            Opts::new("vibelink_links_active", "Registered links by direction"),
            &["bridge", "direction"],
        )
        .unwrap();

        let bridges_active = IntGauge::with_opts(Opts::new(
            "vibelink_bridges_active",
            "Bridges currently in the Active state",
        ))
        .unwrap();

        registry.register(Box::new(messages_sent.clone())).unwrap();
        registry
            .register(Box::new(messages_dropped.clone()))
            .unwrap();
        registry.register(Box::new(send_latency.clone())).unwrap();
        registry
            .register(Box::new(messages_received.clone()))
            .unwrap();
        registry
            .register(Box::new(messages_delivered.clone()))
            .unwrap();
        registry
            .register(Box::new(messages_discarded.clone()))
            .unwrap();
        registry
            .register(Box::new(messages_acknowledged.clone()))
            .unwrap();
        registry
            .register(Box::new(handoff_failures.clone()))
            .unwrap();
        registry.register(Box::new(links_active.clone())).unwrap();
        registry.register(Box::new(bridges_active.clone())).unwrap();

        Metrics {
            registry,
            messages_sent,
            messages_dropped,
            send_latency,
            messages_received,
            messages_delivered,
            messages_discarded,
            messages_acknowledged,
            handoff_failures,
            links_active,
            bridges_active,
        }
    }

    // Outbound helpers

    pub fn message_sent(&self, bridge: &str, seconds: f64) {
        self.messages_sent.with_label_values(&[bridge]).inc();
        self.send_latency.observe(seconds);
    }

    pub fn message_dropped(&self, bridge: &str, reason: &str) {
        self.messages_dropped
            .with_label_values(&[bridge, reason])
            .inc();
    }

    // Inbound helpers

    pub fn message_received(&self, bridge: &str) {
        self.messages_received.with_label_values(&[bridge]).inc();
    }

    pub fn message_delivered(&self, bridge: &str) {
        self.messages_delivered.with_label_values(&[bridge]).inc();
    }

    pub fn message_discarded(&self, bridge: &str) {
        self.messages_discarded.with_label_values(&[bridge]).inc();
    }

    pub fn message_acknowledged(&self, bridge: &str) {
        self.messages_acknowledged
            .with_label_values(&[bridge])
            .inc();
    }

    pub fn handoff_failed(&self, bridge: &str) {
        self.handoff_failures.with_label_values(&[bridge]).inc();
    }

    // Link and lifecycle helpers

    pub fn links_set(&self, bridge: &str, direction: &str, count: usize) {
        self.links_active
            .with_label_values(&[bridge, direction])
            .set(count as i64);
    }

    pub fn bridge_activated(&self) {
        self.bridges_active.inc();
    }

    pub fn bridge_deactivated(&self) {
        self.bridges_active.dec();
    }

    /// Current value of a per-bridge counter, for status output and tests
    pub fn counter(&self, counter: &IntCounterVec, bridge: &str) -> u64 {
        counter.with_label_values(&[bridge]).get()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use prometheus::{Encoder, TextEncoder};

    use super::*;

    #[test]
    fn test_helpers_update_series() {
        let metrics = Metrics::new();
        metrics.message_sent("sns", 0.002);
        metrics.message_sent("sns", 0.004);
        metrics.message_dropped("sns", drop_reason::NO_LINK);
        metrics.links_set("sns", "out", 2);
        metrics.bridge_activated();

        assert_eq!(metrics.counter(&metrics.messages_sent, "sns"), 2);
        assert_eq!(
            metrics
                .messages_dropped
                .with_label_values(&["sns", drop_reason::NO_LINK])
                .get(),
            1
        );
        assert_eq!(
            metrics.links_active.with_label_values(&["sns", "out"]).get(),
            2
        );
        assert_eq!(metrics.bridges_active.get(), 1);
    }

    #[test]
    fn test_registry_encodes() {
        let metrics = Metrics::new();
        metrics.message_received("mq");

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metrics.registry.gather(), &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("vibelink_messages_received_total{bridge=\"mq\"} 1"));
    }
}
