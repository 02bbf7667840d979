//! Report/aggregation gate (`spec.md` §4.7, C7).
//!
//! Grounded on `original_source/pkg/plugin/conntrack/_cprog/conntrack.c`'s
//! `_ct_should_report_packet`, translated from raw BPF-map reads into atomic
//! field operations on a shared [`FlowEntry`].

use crate::config::AggregationLevel;
use crate::entry::{Direction, FlowEntry};
use crate::flags::bit;
use crate::key::Proto;
use crate::record::drain_histogram;
use retina_wire::FlagHistogramRaw;
use std::sync::atomic::Ordering;

#[derive(Debug, Clone, Copy)]
pub struct GateConfig {
    pub report_interval: u32,
    pub aggregation_level: AggregationLevel,
}

/// Carry-over counters attached to an emitted record, valid for `Emit` and
/// `TeardownEmitAndDelete` (`spec.md` §4.7).
#[derive(Debug, Clone, Copy, Default)]
pub struct PreviouslyObserved {
    pub packets: u32,
    pub bytes: u32,
    pub flags: FlagHistogramRaw,
}

/// Why the gate tore an entry down. `spec.md` §4.5/§8 (E3) treats a
/// timed-out entry specially: the packet that discovers the timeout is also
/// the first packet of what the caller should treat as a new flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    Timeout,
    Reset,
    FinalAck,
}

#[derive(Debug, Clone, Copy)]
pub enum Decision {
    Emit(PreviouslyObserved),
    Suppress,
    TeardownEmitAndDelete(PreviouslyObserved, TeardownReason),
}

/// Evaluates the gate for one packet against `entry`'s *pre-packet* state and
/// mutates the entry's reporting fields accordingly. Does not touch
/// `eviction_time` refresh or entry deletion from the table — those remain
/// the caller's responsibility (`state::refresh_after_packet`, `FlowTable::delete`).
pub fn evaluate(
    entry: &FlowEntry,
    dir: Direction,
    proto: Proto,
    packet_flags: u8,
    bytes: u32,
    now: u32,
    cfg: GateConfig,
) -> Decision {
    let is_rst = proto == Proto::Tcp && packet_flags & bit::RST != 0;
    let is_final_ack = proto == Proto::Tcp
        && packet_flags == bit::ACK
        && entry.flags_seen(Direction::Tx).load() & bit::FIN != 0
        && entry.flags_seen(Direction::Rx).load() & bit::FIN != 0;
    let timed_out = now >= entry.eviction_time();

    if timed_out || is_rst || is_final_ack {
        let reason = if timed_out {
            TeardownReason::Timeout
        } else if is_rst {
            TeardownReason::Reset
        } else {
            TeardownReason::FinalAck
        };
        let observed = read_carry_over(entry, dir);
        return Decision::TeardownEmitAndDelete(observed, reason);
    }

    let flags_seen = entry.flags_seen(dir).load();
    let flags_new = packet_flags | flags_seen;

    let should_emit = cfg.aggregation_level == AggregationLevel::Low || {
        let has_significant_flag =
            packet_flags & (bit::SYN | bit::FIN | bit::URG | bit::ECE | bit::CWR) != 0;
        let flags_changed = flags_new != flags_seen;
        let last_report = entry.last_report(dir).load(Ordering::Relaxed);
        let report_due = now.saturating_sub(last_report) >= cfg.report_interval;
        has_significant_flag || flags_changed || report_due
    };

    if should_emit {
        let observed = read_carry_over(entry, dir);
        entry.flags_seen(dir).store(flags_new);
        entry.last_report(dir).store(now, Ordering::Relaxed);
        entry.bytes_since_report(dir).store(0, Ordering::Relaxed);
        entry.packets_since_report(dir).store(0, Ordering::Relaxed);
        Decision::Emit(observed)
    } else {
        let byte_ctr = entry.bytes_since_report(dir);
        let cur = byte_ctr.load(Ordering::Relaxed);
        byte_ctr.store(cur.saturating_add(bytes), Ordering::Relaxed);

        let pkt_ctr = entry.packets_since_report(dir);
        let cur = pkt_ctr.load(Ordering::Relaxed);
        pkt_ctr.store(cur.saturating_add(1), Ordering::Relaxed);

        entry.tcp_flags_hist(dir).record(packet_flags);
        Decision::Suppress
    }
}

fn read_carry_over(entry: &FlowEntry, dir: Direction) -> PreviouslyObserved {
    PreviouslyObserved {
        packets: entry.packets_since_report(dir).load(Ordering::Relaxed),
        bytes: entry.bytes_since_report(dir).load(Ordering::Relaxed),
        flags: drain_histogram(entry.tcp_flags_hist(dir)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retina_wire::TrafficDirection;

    fn cfg() -> GateConfig {
        GateConfig { report_interval: 30, aggregation_level: AggregationLevel::High }
    }

    #[test]
    fn syn_always_emits() {
        let e = FlowEntry::new(0, 1000, TrafficDirection::Egress, false);
        let d = evaluate(&e, Direction::Tx, Proto::Tcp, bit::SYN, 0, 0, cfg());
        assert!(matches!(d, Decision::Emit(_)));
    }

    #[test]
    fn repeat_identical_packet_suppresses() {
        let e = FlowEntry::new(0, 1000, TrafficDirection::Egress, false);
        let d1 = evaluate(&e, Direction::Tx, Proto::Tcp, bit::ACK, 100, 0, cfg());
        assert!(matches!(d1, Decision::Emit(_)));
        let d2 = evaluate(&e, Direction::Tx, Proto::Tcp, bit::ACK, 100, 1, cfg());
        assert!(matches!(d2, Decision::Suppress));
    }

    #[test]
    fn rst_tears_down() {
        let e = FlowEntry::new(0, 1000, TrafficDirection::Egress, false);
        let d = evaluate(&e, Direction::Tx, Proto::Tcp, bit::RST, 0, 5, cfg());
        assert!(matches!(d, Decision::TeardownEmitAndDelete(_, TeardownReason::Reset)));
    }

    #[test]
    fn timeout_tears_down() {
        let e = FlowEntry::new(0, 100, TrafficDirection::Egress, false);
        let d = evaluate(&e, Direction::Tx, Proto::Tcp, bit::ACK, 0, 100, cfg());
        assert!(matches!(d, Decision::TeardownEmitAndDelete(_, TeardownReason::Timeout)));
    }

    #[test]
    fn final_ack_after_both_fin_tears_down() {
        let e = FlowEntry::new(0, 1000, TrafficDirection::Egress, false);
        e.flags_seen(Direction::Tx).store(bit::FIN | bit::ACK);
        e.flags_seen(Direction::Rx).store(bit::FIN | bit::ACK);
        let d = evaluate(&e, Direction::Tx, Proto::Tcp, bit::ACK, 0, 10, cfg());
        assert!(matches!(d, Decision::TeardownEmitAndDelete(_, TeardownReason::FinalAck)));
    }

    #[test]
    fn report_interval_elapsed_forces_emit() {
        let e = FlowEntry::new(0, 1000, TrafficDirection::Egress, false);
        let d1 = evaluate(&e, Direction::Tx, Proto::Tcp, bit::ACK, 10, 0, cfg());
        assert!(matches!(d1, Decision::Emit(_)));
        let d2 = evaluate(&e, Direction::Tx, Proto::Tcp, bit::ACK, 10, 5, cfg());
        assert!(matches!(d2, Decision::Suppress));
        let d3 = evaluate(&e, Direction::Tx, Proto::Tcp, bit::ACK, 10, 31, cfg());
        assert!(matches!(d3, Decision::Emit(_)));
    }

    #[test]
    fn low_aggregation_always_emits() {
        let e = FlowEntry::new(0, 1000, TrafficDirection::Egress, false);
        let low_cfg = GateConfig { report_interval: 30, aggregation_level: AggregationLevel::Low };
        let d1 = evaluate(&e, Direction::Tx, Proto::Tcp, bit::ACK, 10, 0, low_cfg);
        assert!(matches!(d1, Decision::Emit(_)));
        let d2 = evaluate(&e, Direction::Tx, Proto::Tcp, bit::ACK, 10, 1, low_cfg);
        assert!(matches!(d2, Decision::Emit(_)));
    }
}
