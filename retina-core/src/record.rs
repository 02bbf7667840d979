//! Host-side `PacketRecord` (`spec.md` §3.4) and its wire conversion.

use crate::flags::AtomicFlagHistogram;
use crate::key::{FlowKey, Proto};
use retina_wire::{FlagHistogramRaw, LifetimeCountersRaw, ObservationPoint, PacketRecordRaw, TrafficDirection};

#[derive(Debug, Clone, Copy, Default)]
pub struct LifetimeCounters {
    pub tx_packets: u32,
    pub rx_packets: u32,
    pub tx_bytes: u64,
    pub rx_bytes: u64,
}

impl From<LifetimeCounters> for LifetimeCountersRaw {
    fn from(v: LifetimeCounters) -> Self {
        LifetimeCountersRaw {
            tx_packets: v.tx_packets,
            rx_packets: v.rx_packets,
            tx_bytes: v.tx_bytes,
            rx_bytes: v.rx_bytes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PacketRecord {
    pub timestamp_ns: u64,
    pub key: FlowKey,
    pub tcp_flags: u8,
    pub tcp_seq: u32,
    pub tcp_ack: u32,
    pub tcp_tsval: u32,
    pub tcp_tsecr: u32,
    pub observation_point: ObservationPoint,
    pub traffic_direction: TrafficDirection,
    pub is_reply: bool,
    pub bytes: u32,
    pub previously_observed_packets: u32,
    pub previously_observed_bytes: u32,
    pub previously_observed_flags: FlagHistogramRaw,
    pub lifetime_counters: LifetimeCounters,
}

impl PacketRecord {
    pub fn to_wire(&self) -> PacketRecordRaw {
        PacketRecordRaw {
            timestamp_ns: self.timestamp_ns,
            src_ip: u32::from(self.key.src_ip),
            dst_ip: u32::from(self.key.dst_ip),
            src_port: self.key.src_port,
            dst_port: self.key.dst_port,
            proto: self.key.proto.as_u8(),
            tcp_flags: self.tcp_flags,
            tcp_seq: self.tcp_seq,
            tcp_ack: self.tcp_ack,
            tcp_tsval: self.tcp_tsval,
            tcp_tsecr: self.tcp_tsecr,
            observation_point: self.observation_point as u8,
            traffic_direction: self.traffic_direction as u8,
            is_reply: self.is_reply as u8,
            bytes: self.bytes,
            previously_observed_packets: self.previously_observed_packets,
            previously_observed_bytes: self.previously_observed_bytes,
            previously_observed_flags: self.previously_observed_flags,
            lifetime_counters: self.lifetime_counters.into(),
        }
    }
}

pub(crate) fn drain_histogram(hist: &AtomicFlagHistogram) -> FlagHistogramRaw {
    let snap = hist.snapshot();
    hist.clear();
    snap
}
