//! Per-packet state transitions of a `FlowEntry` (`spec.md` §4.5, §4.6, C6).
//!
//! Grounded on `original_source/pkg/plugin/conntrack/_cprog/conntrack.c`'s
//! `_ct_create_new_tcp_connection` / `_ct_handle_udp_connection` /
//! `_ct_handle_tcp_connection`, adapted from raw BPF-map field writes to
//! atomic field updates on a shared `FlowEntry`.

use crate::entry::{Direction, FlowEntry};
use crate::flags::bit;
use crate::key::{FlowKey, Proto};
use retina_wire::{ObservationPoint, TrafficDirection};
use std::sync::Arc;

/// Timeout constants in seconds (`spec.md` §4.5, §6.4).
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub syn_timeout: u32,
    pub tcp_lifetime: u32,
    pub nontcp_lifetime: u32,
    pub time_wait_timeout: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { syn_timeout: 60, tcp_lifetime: 360, nontcp_lifetime: 60, time_wait_timeout: 30 }
    }
}

/// Result of creating a brand-new flow entry (§4.5, §4.6): the key it was
/// inserted under, the entry itself, and which direction the *triggering*
/// packet was in relative to that key.
pub struct NewFlow {
    pub key: FlowKey,
    pub entry: Arc<FlowEntry>,
    pub is_reply: bool,
    pub dir: Direction,
}

/// Builds a brand-new entry for a packet that matched neither `K` nor
/// `reverse(K)` (`spec.md` §4.5 "—" rows, §4.6).
pub fn create_new_flow(
    key: FlowKey,
    tcp_flags: u8,
    op: ObservationPoint,
    now: u32,
    timeouts: Timeouts,
) -> NewFlow {
    let new_flow = build_new_flow(key, tcp_flags, op, now, timeouts);
    tracing::trace!(
        is_reply = new_flow.is_reply,
        is_direction_unknown = new_flow.entry.is_direction_unknown,
        eviction_time = new_flow.entry.eviction_time(),
        "flow entry created"
    );
    new_flow
}

fn build_new_flow(
    key: FlowKey,
    tcp_flags: u8,
    op: ObservationPoint,
    now: u32,
    timeouts: Timeouts,
) -> NewFlow {
    match key.proto {
        Proto::Udp => {
            let entry = Arc::new(FlowEntry::new(
                now,
                now.saturating_add(timeouts.nontcp_lifetime),
                op.traffic_direction(),
                false,
            ));
            NewFlow { key, entry, is_reply: false, dir: Direction::Tx }
        }
        Proto::Tcp => {
            let is_syn = tcp_flags & bit::SYN != 0;
            let is_ack = tcp_flags & bit::ACK != 0;

            if is_syn && !is_ack {
                // Pure SYN: forward direction, entry under K.
                let entry = Arc::new(FlowEntry::new(
                    now,
                    now.saturating_add(timeouts.syn_timeout),
                    op.traffic_direction(),
                    false,
                ));
                entry.flags_seen(Direction::Tx).store(tcp_flags);
                NewFlow { key, entry, is_reply: false, dir: Direction::Tx }
            } else if is_syn && is_ack {
                // SYN+ACK: this is the reply leg; entry lives under reverse(K).
                let entry = Arc::new(FlowEntry::new(
                    now,
                    now.saturating_add(timeouts.syn_timeout),
                    op.traffic_direction(),
                    false,
                ));
                entry.flags_seen(Direction::Rx).store(tcp_flags);
                NewFlow { key: key.reverse(), entry, is_reply: true, dir: Direction::Rx }
            } else {
                // Non-SYN new flow (§4.6): ACK bit is the direction heuristic.
                let (stored_key, is_reply, dir) =
                    if is_ack { (key.reverse(), true, Direction::Rx) } else { (key, false, Direction::Tx) };
                let entry = Arc::new(FlowEntry::new(
                    now,
                    now.saturating_add(timeouts.tcp_lifetime),
                    op.traffic_direction(),
                    true,
                ));
                entry.flags_seen(dir).store(tcp_flags);
                NewFlow { key: stored_key, entry, is_reply, dir }
            }
        }
    }
}

/// Refreshes `eviction_time` after a non-teardown packet has been accounted
/// for by the report gate. Moves the entry toward CLOSING (`TIME_WAIT`) once
/// both directions' `flags_seen` carry FIN, otherwise keeps refreshing the
/// ordinary idle lifetime (`spec.md` §4.5). Returns `true` if the refresh was
/// skipped due to `now + delta` overflowing `u32::MAX` (`spec.md` §4.5, §7).
pub fn refresh_after_packet(entry: &FlowEntry, proto: Proto, now: u32, timeouts: Timeouts) -> bool {
    match proto {
        Proto::Udp => entry.refresh_eviction(now, timeouts.nontcp_lifetime),
        Proto::Tcp => {
            let both_fin = entry.flags_seen(Direction::Tx).load() & bit::FIN != 0
                && entry.flags_seen(Direction::Rx).load() & bit::FIN != 0;
            if both_fin {
                tracing::debug!(eviction_time = now.saturating_add(timeouts.time_wait_timeout), "flow entering TIME_WAIT");
                entry.refresh_eviction(now, timeouts.time_wait_timeout)
            } else {
                entry.refresh_eviction(now, timeouts.tcp_lifetime)
            }
        }
    }
}
