//! Wire-format types for the connection-tracking core.
//!
//! This crate is `no_std` so the same definitions can, in principle, back a
//! BPF-side producer and a host-side consumer (mirroring how
//! `huginn-proxy-ebpf-common` shares `SynRawData` between the XDP program and
//! the userspace loader). Nothing in this workspace currently compiles for a
//! BPF target — attaching real kernel programs is out of scope here — but the
//! layout is kept wire-stable so that boundary can be added later without
//! touching `retina-core`.
//!
//! Enable the `aya` feature to get `aya::Pod` impls for reading these types
//! directly out of a pinned BPF map.
#![no_std]

/// Per-bit TCP control-flag counters, saturating at `u32::MAX`.
///
/// Order mirrors `spec.md` §3.2: SYN, ACK, FIN, RST, PSH, URG, ECE, CWR, NS.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlagHistogramRaw {
    pub syn: u32,
    pub ack: u32,
    pub fin: u32,
    pub rst: u32,
    pub psh: u32,
    pub urg: u32,
    pub ece: u32,
    pub cwr: u32,
    pub ns: u32,
}

impl FlagHistogramRaw {
    pub const WIRE_LEN: usize = 9 * 4;

    pub const fn to_le_bytes(self) -> [u8; Self::WIRE_LEN] {
        let mut out = [0u8; Self::WIRE_LEN];
        let fields = [
            self.syn, self.ack, self.fin, self.rst, self.psh, self.urg, self.ece, self.cwr,
            self.ns,
        ];
        let mut i = 0;
        while i < fields.len() {
            let b = fields[i].to_le_bytes();
            out[i * 4] = b[0];
            out[i * 4 + 1] = b[1];
            out[i * 4 + 2] = b[2];
            out[i * 4 + 3] = b[3];
            i += 1;
        }
        out
    }
}

/// Lifetime (non-resettable) per-direction packet/byte counters, saturating.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LifetimeCountersRaw {
    pub tx_packets: u32,
    pub rx_packets: u32,
    pub tx_bytes: u64,
    pub rx_bytes: u64,
}

impl LifetimeCountersRaw {
    pub const WIRE_LEN: usize = 4 + 4 + 8 + 8;

    pub const fn to_le_bytes(self) -> [u8; Self::WIRE_LEN] {
        let mut out = [0u8; Self::WIRE_LEN];
        let a = self.tx_packets.to_le_bytes();
        let b = self.rx_packets.to_le_bytes();
        let c = self.tx_bytes.to_le_bytes();
        let d = self.rx_bytes.to_le_bytes();
        let mut i = 0;
        while i < 4 {
            out[i] = a[i];
            out[4 + i] = b[i];
            i += 1;
        }
        i = 0;
        while i < 8 {
            out[8 + i] = c[i];
            out[16 + i] = d[i];
            i += 1;
        }
        out
    }
}

/// The hook in the network stack that delivered a packet to the core.
///
/// Maps to `traffic_direction` per `spec.md` §3.5.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationPoint {
    FromEndpoint = 0,
    ToEndpoint = 1,
    FromNetwork = 2,
    ToNetwork = 3,
}

impl ObservationPoint {
    pub fn traffic_direction(self) -> TrafficDirection {
        match self {
            ObservationPoint::FromEndpoint | ObservationPoint::ToNetwork => {
                TrafficDirection::Egress
            }
            ObservationPoint::ToEndpoint | ObservationPoint::FromNetwork => {
                TrafficDirection::Ingress
            }
        }
    }
}

/// Direction of a flow relative to the host, fixed at flow creation.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficDirection {
    Unknown = 0,
    Ingress = 1,
    Egress = 2,
}

/// IPv4 5-tuple flow key.
///
/// The external flow-table map (`spec.md` §6.2) represents this as a 13-byte
/// packed record (`src_ip`, `dst_ip`: 4 bytes each; `src_port`, `dst_port`: 2
/// bytes each; `proto`: 1 byte). This type keeps normal Rust alignment for safe
/// field access; [`FlowKeyRaw::to_wire_bytes`] produces the 13-byte external
/// encoding on demand.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKeyRaw {
    pub src_ip: u32,
    pub dst_ip: u32,
    pub src_port: u16,
    pub dst_port: u16,
    pub proto: u8,
}

impl FlowKeyRaw {
    pub const WIRE_LEN: usize = 4 + 4 + 2 + 2 + 1;

    pub const fn reverse(self) -> Self {
        Self {
            src_ip: self.dst_ip,
            dst_ip: self.src_ip,
            src_port: self.dst_port,
            dst_port: self.src_port,
            proto: self.proto,
        }
    }

    pub const fn to_wire_bytes(self) -> [u8; Self::WIRE_LEN] {
        let mut out = [0u8; Self::WIRE_LEN];
        let a = self.src_ip.to_le_bytes();
        let b = self.dst_ip.to_le_bytes();
        let c = self.src_port.to_le_bytes();
        let d = self.dst_port.to_le_bytes();
        out[0] = a[0];
        out[1] = a[1];
        out[2] = a[2];
        out[3] = a[3];
        out[4] = b[0];
        out[5] = b[1];
        out[6] = b[2];
        out[7] = b[3];
        out[8] = c[0];
        out[9] = c[1];
        out[10] = d[0];
        out[11] = d[1];
        out[12] = self.proto;
        out
    }
}

/// Snapshot of the flow-table value (`spec.md` §3.2, §6.2).
///
/// This is the read-only view exposed to diagnostic tooling over the pinned
/// map; the live, concurrently-mutated entry in `retina-core` uses atomics and
/// converts to this type on request.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlowEntryRaw {
    pub eviction_time: u32,
    pub last_report_tx: u32,
    pub last_report_rx: u32,
    pub flags_seen_tx: u8,
    pub flags_seen_rx: u8,
    pub traffic_direction: u8,
    pub is_direction_unknown: u8,
    pub bytes_since_report_tx: u32,
    pub bytes_since_report_rx: u32,
    pub packets_since_report_tx: u32,
    pub packets_since_report_rx: u32,
    pub tcp_flags_hist_tx: FlagHistogramRaw,
    pub tcp_flags_hist_rx: FlagHistogramRaw,
    pub total_packets_tx: u32,
    pub total_packets_rx: u32,
    pub total_bytes_tx: u64,
    pub total_bytes_rx: u64,
}

/// The on-the-wire `PacketRecord` emitted to the event channel (`spec.md` §3.4,
/// §6.1): little-endian, fixed width, fields in declaration order.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketRecordRaw {
    pub timestamp_ns: u64,
    pub src_ip: u32,
    pub dst_ip: u32,
    pub src_port: u16,
    pub dst_port: u16,
    pub proto: u8,
    pub tcp_flags: u8,
    pub tcp_seq: u32,
    pub tcp_ack: u32,
    pub tcp_tsval: u32,
    pub tcp_tsecr: u32,
    pub observation_point: u8,
    pub traffic_direction: u8,
    pub is_reply: u8,
    pub bytes: u32,
    pub previously_observed_packets: u32,
    pub previously_observed_bytes: u32,
    pub previously_observed_flags: FlagHistogramRaw,
    pub lifetime_counters: LifetimeCountersRaw,
}

impl PacketRecordRaw {
    pub const WIRE_LEN: usize = 8
        + 4
        + 4
        + 2
        + 2
        + 1
        + 1
        + 4
        + 4
        + 4
        + 4
        + 1
        + 1
        + 1
        + 4
        + 4
        + 4
        + FlagHistogramRaw::WIRE_LEN
        + LifetimeCountersRaw::WIRE_LEN;

    pub fn to_le_bytes(&self) -> [u8; Self::WIRE_LEN] {
        let mut out = [0u8; Self::WIRE_LEN];
        let mut off = 0usize;

        macro_rules! put {
            ($val:expr) => {{
                let bytes = $val.to_le_bytes();
                out[off..off + bytes.len()].copy_from_slice(&bytes);
                off += bytes.len();
            }};
        }

        put!(self.timestamp_ns);
        put!(self.src_ip);
        put!(self.dst_ip);
        put!(self.src_port);
        put!(self.dst_port);
        put!(self.proto);
        put!(self.tcp_flags);
        put!(self.tcp_seq);
        put!(self.tcp_ack);
        put!(self.tcp_tsval);
        put!(self.tcp_tsecr);
        put!(self.observation_point);
        put!(self.traffic_direction);
        put!(self.is_reply);
        put!(self.bytes);
        put!(self.previously_observed_packets);
        put!(self.previously_observed_bytes);

        let hist = self.previously_observed_flags.to_le_bytes();
        out[off..off + hist.len()].copy_from_slice(&hist);
        off += hist.len();

        let lifetime = self.lifetime_counters.to_le_bytes();
        out[off..off + lifetime.len()].copy_from_slice(&lifetime);
        off += lifetime.len();

        debug_assert_eq!(off, Self::WIRE_LEN);
        out
    }
}

/// Implement `aya::Pod` for the map key/value types so a userspace loader can
/// read them directly out of a pinned BPF map. Only compiled when the `aya`
/// feature is enabled (i.e. never for a BPF-target build of this crate).
///
/// SAFETY: both types are `#[repr(C)]`, `Copy`, and built entirely from
/// fixed-width integers — any bit pattern is a valid value.
#[cfg(feature = "aya")]
mod pod_impls {
    use super::{FlowEntryRaw, FlowKeyRaw};

    unsafe impl aya::Pod for FlowKeyRaw {}
    unsafe impl aya::Pod for FlowEntryRaw {}
}
