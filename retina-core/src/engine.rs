//! Top-level wiring: decoder → FlowKey → CT lookup → state machine + report
//! gate → sampler → emitter (`spec.md` §2 data-flow diagram).

use crate::clock::Clock;
use crate::config::CoreConfig;
use crate::decoder::{self, ObservationPoint, ParsedPacket};
use crate::entry::Direction;
use crate::filter::IpFilter;
use crate::gate::{self, GateConfig};
use crate::key::FlowKey;
use crate::metrics::MetricsSink;
use crate::record::PacketRecord;
use crate::sampler::Sampler;
use crate::state::{self, Timeouts};
use crate::table::{FlowTable, Lookup};
use std::sync::Arc;

/// A sink for emitted `PacketRecord`s (`spec.md` C9's external side).
pub trait PacketSink: Send + Sync {
    fn push(&self, record: PacketRecord);
}

/// Adapts any `Fn(PacketRecord)` closure into a [`PacketSink`], handy for
/// tests and the demo agent.
impl<F: Fn(PacketRecord) + Send + Sync> PacketSink for F {
    fn push(&self, record: PacketRecord) {
        self(record)
    }
}

pub struct RetinaCore {
    table: FlowTable,
    clock: Arc<dyn Clock>,
    filter: Arc<dyn IpFilter>,
    sink: Arc<dyn PacketSink>,
    metrics: Arc<dyn MetricsSink>,
    sampler: Sampler,
    config: CoreConfig,
}

impl RetinaCore {
    pub fn new(
        config: CoreConfig,
        clock: Arc<dyn Clock>,
        filter: Arc<dyn IpFilter>,
        sink: Arc<dyn PacketSink>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let sampler = Sampler::new(config.sampling_rate);
        Self {
            table: FlowTable::new(config.ct_map_size as usize),
            clock,
            filter,
            sink,
            metrics,
            sampler,
            config,
        }
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts {
            syn_timeout: self.config.syn_timeout,
            tcp_lifetime: self.config.tcp_lifetime,
            nontcp_lifetime: self.config.nontcp_lifetime,
            time_wait_timeout: self.config.time_wait_timeout,
        }
    }

    fn gate_config(&self) -> GateConfig {
        GateConfig {
            report_interval: self.config.report_interval,
            aggregation_level: self.config.data_aggregation_level,
        }
    }

    /// Number of live flows currently tracked. Exposed for diagnostics/tests.
    pub fn tracked_flows(&self) -> usize {
        self.table.len()
    }

    /// The single entry point invoked once per packet at `op` (`spec.md` §1).
    pub fn process_packet(&self, window: &[u8], op: ObservationPoint) {
        let Some(parsed) = decoder::decode(window) else {
            return;
        };

        if !self.config.bypass_filter
            && !(self.filter.is_of_interest(parsed.src_ip) || self.filter.is_of_interest(parsed.dst_ip))
        {
            return;
        }

        let now = self.clock.now_secs();
        let key = FlowKey::new(parsed.src_ip, parsed.dst_ip, parsed.src_port, parsed.dst_port, parsed.proto);

        match self.table.lookup(key, now) {
            Lookup::Forward(entry) => {
                // `spec.md` §7: both directions holding an entry for the same
                // flow should never happen; count it but keep the
                // forward-wins tie-break (`spec.md` §4.4).
                if self.table.has_reverse_entry(&key) {
                    tracing::warn!("both forward and reverse entries present for one flow");
                    self.metrics.invariant_violations();
                }
                if self.config.enable_metrics {
                    entry.record_lifetime(Direction::Tx, parsed.bytes);
                }
                self.run_gate(&key, key, entry, Direction::Tx, &parsed, op, false, now);
            }
            Lookup::Reply(matched_key, entry) => {
                if self.config.enable_metrics {
                    entry.record_lifetime(Direction::Rx, parsed.bytes);
                }
                self.run_gate(&matched_key, key, entry, Direction::Rx, &parsed, op, true, now);
            }
            Lookup::Miss => self.handle_new_flow(key, &parsed, op, now),
        }
    }

    fn handle_new_flow(&self, key: FlowKey, parsed: &ParsedPacket, op: ObservationPoint, now: u32) {
        let new_flow = state::create_new_flow(key, parsed.tcp_flags, op, now, self.timeouts());
        if self.config.enable_metrics {
            new_flow.entry.record_lifetime(new_flow.dir, parsed.bytes);
        }

        // A pure RST or FIN arriving as the very first packet of a flow
        // (`spec.md` §4.6) tears it down immediately instead of going live.
        let tears_down_immediately = parsed.proto == crate::key::Proto::Tcp
            && parsed.tcp_flags & (crate::flags::bit::RST | crate::flags::bit::FIN) != 0;

        if tears_down_immediately {
            self.emit_record(&new_flow.key, &new_flow.entry, parsed, op, new_flow.is_reply, Default::default());
            self.table.delete(&new_flow.key);
            return;
        }

        let evicted = self.table.insert(new_flow.key, Arc::clone(&new_flow.entry));
        if evicted {
            self.metrics.table_evictions();
        }
        self.emit_record(&new_flow.key, &new_flow.entry, parsed, op, new_flow.is_reply, Default::default());
    }

    #[allow(clippy::too_many_arguments)]
    fn run_gate(
        &self,
        key: &FlowKey,
        packet_key: FlowKey,
        entry: Arc<crate::entry::FlowEntry>,
        dir: Direction,
        parsed: &ParsedPacket,
        op: ObservationPoint,
        is_reply: bool,
        now: u32,
    ) {
        let decision = gate::evaluate(&entry, dir, parsed.proto, parsed.tcp_flags, parsed.bytes, now, self.gate_config());

        match decision {
            gate::Decision::Suppress => {}
            gate::Decision::Emit(observed) => {
                let overflowed = state::refresh_after_packet(&entry, parsed.proto, now, self.timeouts());
                if overflowed {
                    tracing::warn!("eviction_time refresh skipped: now + timeout overflowed u32");
                    self.metrics.overflow_skipped();
                }
                if self.sampler.should_downgrade() {
                    tracing::trace!("sampler downgraded EMIT to SUPPRESS");
                } else {
                    self.emit_record(key, &entry, parsed, op, is_reply, observed);
                }
            }
            gate::Decision::TeardownEmitAndDelete(observed, reason) => {
                tracing::debug!(?reason, "flow entry torn down");
                self.emit_record(key, &entry, parsed, op, is_reply, observed);
                self.table.delete(key);
                // `spec.md` §8 E3: a timed-out entry's discovering packet is
                // itself the first packet of a new flow, so it gets re-run
                // through new-flow handling instead of being merely dropped.
                // RST/FinalAck teardowns are genuine closes, not reprocessed.
                if reason == gate::TeardownReason::Timeout {
                    self.handle_new_flow(packet_key, parsed, op, now);
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_record(
        &self,
        key: &FlowKey,
        entry: &crate::entry::FlowEntry,
        parsed: &ParsedPacket,
        op: ObservationPoint,
        is_reply: bool,
        observed: gate::PreviouslyObserved,
    ) {
        let snap = entry.snapshot();
        let lifetime = crate::record::LifetimeCounters {
            tx_packets: snap.total_packets_tx,
            rx_packets: snap.total_packets_rx,
            tx_bytes: snap.total_bytes_tx,
            rx_bytes: snap.total_bytes_rx,
        };
        let record = PacketRecord {
            timestamp_ns: self.clock.now_nanos(),
            key: *key,
            tcp_flags: parsed.tcp_flags,
            tcp_seq: parsed.tcp_seq,
            tcp_ack: parsed.tcp_ack,
            tcp_tsval: parsed.tcp_tsval,
            tcp_tsecr: parsed.tcp_tsecr,
            observation_point: op,
            traffic_direction: entry_traffic_direction(entry),
            is_reply,
            bytes: parsed.bytes,
            previously_observed_packets: observed.packets,
            previously_observed_bytes: observed.bytes,
            previously_observed_flags: observed.flags,
            lifetime_counters: lifetime,
        };
        self.sink.push(record);
    }
}

fn entry_traffic_direction(entry: &crate::entry::FlowEntry) -> retina_wire::TrafficDirection {
    entry.traffic_direction
}
