//! The CT table's value type (`spec.md` §3.2) and its concurrent mutation.
//!
//! Mutable fields are independent atomics (`Ordering::Relaxed`), the same
//! choice `huginn-proxy-lib::proxy::connection::manager::ConnectionManager`
//! makes for its connection counters: approximate counts under contention are
//! acceptable, a global lock on the table is not (`spec.md` §5).

use crate::flags::{AtomicFlagHistogram, AtomicFlagsSeen};
use retina_wire::{FlowEntryRaw, TrafficDirection};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Direction-scoped view into a [`FlowEntry`]'s fields, so gate/state-machine
/// code doesn't have to branch on tx/rx at every field access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Tx,
    Rx,
}

impl Direction {
    pub fn other(self) -> Direction {
        match self {
            Direction::Tx => Direction::Rx,
            Direction::Rx => Direction::Tx,
        }
    }
}

#[derive(Debug)]
pub struct FlowEntry {
    pub eviction_time: AtomicU32,
    pub last_report_tx: AtomicU32,
    pub last_report_rx: AtomicU32,
    pub flags_seen_tx: AtomicFlagsSeen,
    pub flags_seen_rx: AtomicFlagsSeen,
    pub bytes_since_report_tx: AtomicU32,
    pub bytes_since_report_rx: AtomicU32,
    pub packets_since_report_tx: AtomicU32,
    pub packets_since_report_rx: AtomicU32,
    pub tcp_flags_hist_tx: AtomicFlagHistogram,
    pub tcp_flags_hist_rx: AtomicFlagHistogram,
    pub total_packets_tx: AtomicU32,
    pub total_packets_rx: AtomicU32,
    pub total_bytes_tx: AtomicU64,
    pub total_bytes_rx: AtomicU64,
    /// Fixed at creation, immutable thereafter (`spec.md` §3.2).
    pub traffic_direction: TrafficDirection,
    pub is_direction_unknown: bool,
    /// Sampling-LRU touch marker; updated on every lookup that hits this
    /// entry, not an atomic-correctness-critical field.
    pub last_touched: AtomicU32,
}

impl FlowEntry {
    pub fn new(now: u32, eviction_time: u32, traffic_direction: TrafficDirection, is_direction_unknown: bool) -> Self {
        Self {
            eviction_time: AtomicU32::new(eviction_time),
            last_report_tx: AtomicU32::new(0),
            last_report_rx: AtomicU32::new(0),
            flags_seen_tx: AtomicFlagsSeen::default(),
            flags_seen_rx: AtomicFlagsSeen::default(),
            bytes_since_report_tx: AtomicU32::new(0),
            bytes_since_report_rx: AtomicU32::new(0),
            packets_since_report_tx: AtomicU32::new(0),
            packets_since_report_rx: AtomicU32::new(0),
            tcp_flags_hist_tx: AtomicFlagHistogram::default(),
            tcp_flags_hist_rx: AtomicFlagHistogram::default(),
            total_packets_tx: AtomicU32::new(0),
            total_packets_rx: AtomicU32::new(0),
            total_bytes_tx: AtomicU64::new(0),
            total_bytes_rx: AtomicU64::new(0),
            traffic_direction,
            is_direction_unknown,
            last_touched: AtomicU32::new(now),
        }
    }

    pub fn touch(&self, now: u32) {
        self.last_touched.store(now, Ordering::Relaxed);
    }

    /// `now + delta`, overflow-checked against `u32::MAX`; on overflow the
    /// refresh is skipped rather than faulted (`spec.md` §4.5). Returns
    /// `true` if the refresh was skipped, so the caller can count it toward
    /// `overflow_skipped` (`spec.md` §7).
    pub fn refresh_eviction(&self, now: u32, delta: u32) -> bool {
        match now.checked_add(delta) {
            Some(new_eviction) => {
                self.eviction_time.store(new_eviction, Ordering::Relaxed);
                false
            }
            None => true,
        }
    }

    pub fn eviction_time(&self) -> u32 {
        self.eviction_time.load(Ordering::Relaxed)
    }

    pub fn flags_seen(&self, dir: Direction) -> &AtomicFlagsSeen {
        match dir {
            Direction::Tx => &self.flags_seen_tx,
            Direction::Rx => &self.flags_seen_rx,
        }
    }

    pub fn last_report(&self, dir: Direction) -> &AtomicU32 {
        match dir {
            Direction::Tx => &self.last_report_tx,
            Direction::Rx => &self.last_report_rx,
        }
    }

    pub fn bytes_since_report(&self, dir: Direction) -> &AtomicU32 {
        match dir {
            Direction::Tx => &self.bytes_since_report_tx,
            Direction::Rx => &self.bytes_since_report_rx,
        }
    }

    pub fn packets_since_report(&self, dir: Direction) -> &AtomicU32 {
        match dir {
            Direction::Tx => &self.packets_since_report_tx,
            Direction::Rx => &self.packets_since_report_rx,
        }
    }

    pub fn tcp_flags_hist(&self, dir: Direction) -> &AtomicFlagHistogram {
        match dir {
            Direction::Tx => &self.tcp_flags_hist_tx,
            Direction::Rx => &self.tcp_flags_hist_rx,
        }
    }

    pub fn total_packets(&self, dir: Direction) -> &AtomicU32 {
        match dir {
            Direction::Tx => &self.total_packets_tx,
            Direction::Rx => &self.total_packets_rx,
        }
    }

    pub fn total_bytes(&self, dir: Direction) -> &AtomicU64 {
        match dir {
            Direction::Tx => &self.total_bytes_tx,
            Direction::Rx => &self.total_bytes_rx,
        }
    }

    /// Saturating-add one packet of `bytes` to the lifetime counters for
    /// `dir`. Updated unconditionally before the gate runs (`spec.md` §4.7).
    pub fn record_lifetime(&self, dir: Direction, bytes: u32) {
        let pkts = self.total_packets(dir);
        let cur = pkts.load(Ordering::Relaxed);
        pkts.store(cur.saturating_add(1), Ordering::Relaxed);

        let total = self.total_bytes(dir);
        let cur = total.load(Ordering::Relaxed);
        total.store(cur.saturating_add(u64::from(bytes)), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FlowEntryRaw {
        FlowEntryRaw {
            eviction_time: self.eviction_time(),
            last_report_tx: self.last_report_tx.load(Ordering::Relaxed),
            last_report_rx: self.last_report_rx.load(Ordering::Relaxed),
            flags_seen_tx: self.flags_seen_tx.load(),
            flags_seen_rx: self.flags_seen_rx.load(),
            traffic_direction: self.traffic_direction as u8,
            is_direction_unknown: self.is_direction_unknown as u8,
            bytes_since_report_tx: self.bytes_since_report_tx.load(Ordering::Relaxed),
            bytes_since_report_rx: self.bytes_since_report_rx.load(Ordering::Relaxed),
            packets_since_report_tx: self.packets_since_report_tx.load(Ordering::Relaxed),
            packets_since_report_rx: self.packets_since_report_rx.load(Ordering::Relaxed),
            tcp_flags_hist_tx: self.tcp_flags_hist_tx.snapshot(),
            tcp_flags_hist_rx: self.tcp_flags_hist_rx.snapshot(),
            total_packets_tx: self.total_packets_tx.load(Ordering::Relaxed),
            total_packets_rx: self.total_packets_rx.load(Ordering::Relaxed),
            total_bytes_tx: self.total_bytes_tx.load(Ordering::Relaxed),
            total_bytes_rx: self.total_bytes_rx.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_eviction_skips_on_overflow() {
        let e = FlowEntry::new(0, 10, TrafficDirection::Unknown, false);
        assert!(e.refresh_eviction(u32::MAX - 1, 10));
        assert_eq!(e.eviction_time(), 10);
    }

    #[test]
    fn refresh_eviction_reports_no_skip_on_success() {
        let e = FlowEntry::new(0, 10, TrafficDirection::Unknown, false);
        assert!(!e.refresh_eviction(5, 10));
        assert_eq!(e.eviction_time(), 15);
    }

    #[test]
    fn record_lifetime_saturates() {
        let e = FlowEntry::new(0, 10, TrafficDirection::Egress, false);
        e.total_packets_tx.store(u32::MAX, Ordering::Relaxed);
        e.record_lifetime(Direction::Tx, 100);
        assert_eq!(e.total_packets_tx.load(Ordering::Relaxed), u32::MAX);
    }
}
