//! Prometheus-backed `MetricsSink` for the demo agent.
//!
//! Kept out of `retina-core` so the library's dependency graph never carries
//! `prometheus` — only this binary needs a scrape endpoint. Shaped after
//! `huginn-proxy-lib::telemetry::metrics`: one `IntCounter` per counter,
//! registered once against a `Registry` that `http::serve_metrics` gathers
//! from on every request.

use prometheus::{IntCounter, Opts, Registry};
use retina_core::MetricsSink;

pub struct PrometheusMetrics {
    registry: Registry,
    table_evictions: IntCounter,
    emit_drops: IntCounter,
    overflow_skipped: IntCounter,
    invariant_violations: IntCounter,
}

impl PrometheusMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let table_evictions = IntCounter::with_opts(Opts::new(
            "retina_table_evictions_total",
            "Flow-table entries evicted under table pressure",
        ))
        .expect("static metric options are valid");
        let emit_drops = IntCounter::with_opts(Opts::new(
            "retina_emit_drops_total",
            "Records dropped because the emitter channel was full",
        ))
        .expect("static metric options are valid");
        let overflow_skipped = IntCounter::with_opts(Opts::new(
            "retina_overflow_skipped_total",
            "Eviction-time refreshes skipped because now + timeout overflowed u32",
        ))
        .expect("static metric options are valid");
        let invariant_violations = IntCounter::with_opts(Opts::new(
            "retina_invariant_violations_total",
            "Observed forward and reverse table entries for the same flow",
        ))
        .expect("static metric options are valid");

        for counter in [&table_evictions, &emit_drops, &overflow_skipped, &invariant_violations] {
            registry.register(Box::new(counter.clone())).expect("metric names are unique");
        }

        Self { registry, table_evictions, emit_drops, overflow_skipped, invariant_violations }
    }

    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }
}

impl Default for PrometheusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for PrometheusMetrics {
    fn table_evictions(&self) {
        self.table_evictions.inc();
    }

    fn emit_drops(&self) {
        self.emit_drops.inc();
    }

    fn overflow_skipped(&self) {
        self.overflow_skipped.inc();
    }

    fn invariant_violations(&self) {
        self.invariant_violations.inc();
    }
}
