//! Metrics sink contract (`spec.md` §7, expansion §6.7, C13).
//!
//! The core never fails a packet's forward path; resource pressure and
//! invariant violations are surfaced only as counters. `AtomicMetrics` is the
//! in-process default; `retina-agent` additionally renders these over a
//! minimal HTTP endpoint as a demonstration (`huginn-proxy-lib::telemetry`'s
//! shape), not a production exporter.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters an external collector would scrape. The packet path increments
/// these instead of ever returning an error (`spec.md` §7).
pub trait MetricsSink: Send + Sync {
    fn table_evictions(&self);
    fn emit_drops(&self);
    fn overflow_skipped(&self);
    fn invariant_violations(&self);
}

#[derive(Debug, Default)]
pub struct AtomicMetrics {
    pub table_evictions: AtomicU64,
    pub emit_drops: AtomicU64,
    pub overflow_skipped: AtomicU64,
    pub invariant_violations: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            table_evictions: self.table_evictions.load(Ordering::Relaxed),
            emit_drops: self.emit_drops.load(Ordering::Relaxed),
            overflow_skipped: self.overflow_skipped.load(Ordering::Relaxed),
            invariant_violations: self.invariant_violations.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSink for AtomicMetrics {
    fn table_evictions(&self) {
        self.table_evictions.fetch_add(1, Ordering::Relaxed);
    }

    fn emit_drops(&self) {
        self.emit_drops.fetch_add(1, Ordering::Relaxed);
    }

    fn overflow_skipped(&self) {
        self.overflow_skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn invariant_violations(&self) {
        self.invariant_violations.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub table_evictions: u64,
    pub emit_drops: u64,
    pub overflow_skipped: u64,
    pub invariant_violations: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment() {
        let m = AtomicMetrics::new();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
        m.table_evictions();
        m.table_evictions();
        m.emit_drops();
        let snap = m.snapshot();
        assert_eq!(snap.table_evictions, 2);
        assert_eq!(snap.emit_drops, 1);
    }
}
