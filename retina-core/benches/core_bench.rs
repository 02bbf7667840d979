//! Decode + table-lookup + gate throughput per packet.
//!
//! ```bash
//! cargo bench --bench core_bench
//! ```
//!
//! Mirrors `benches/bench_fingerprinting.rs`'s shape: pure CPU, no network,
//! no IO, fixtures built in-code rather than captured from the wire since
//! the shapes under test (Ethernet/IPv4/TCP headers) are small and easy to
//! construct deterministically.

use criterion::{criterion_group, criterion_main, Criterion};
use retina_core::clock::TestClock;
use retina_core::config::CoreConfig;
use retina_core::engine::{PacketSink, RetinaCore};
use retina_core::filter::BypassFilter;
use retina_core::metrics::AtomicMetrics;
use retina_core::record::PacketRecord;
use retina_wire::ObservationPoint;
use std::sync::Arc;

struct NullSink;
impl PacketSink for NullSink {
    fn push(&self, _record: PacketRecord) {}
}

fn eth_ipv4_tcp(src: [u8; 4], dst: [u8; 4], src_port: u16, dst_port: u16, flags: u8, payload: usize) -> Vec<u8> {
    let mut v = vec![0u8; 14];
    v[12] = 0x08;
    v[13] = 0x00;
    let mut ip = vec![0u8; 20];
    ip[0] = 0x45;
    ip[9] = 6;
    ip[12..16].copy_from_slice(&src);
    ip[16..20].copy_from_slice(&dst);
    v.extend_from_slice(&ip);
    let mut tcp = vec![0u8; 20 + payload];
    tcp[0..2].copy_from_slice(&src_port.to_be_bytes());
    tcp[2..4].copy_from_slice(&dst_port.to_be_bytes());
    tcp[12] = 5 << 4;
    tcp[13] = flags;
    v.extend_from_slice(&tcp);
    v
}

fn bench_new_flow_per_packet(c: &mut Criterion) {
    c.bench_function("process_packet: distinct new flows", |b| {
        let clock = Arc::new(TestClock::new());
        let core = RetinaCore::new(
            CoreConfig::default(),
            clock,
            Arc::new(BypassFilter),
            Arc::new(NullSink),
            Arc::new(AtomicMetrics::new()),
        );
        let mut port: u16 = 1;
        b.iter(|| {
            port = port.wrapping_add(1).max(1);
            let frame = eth_ipv4_tcp([10, 0, 0, 1], [10, 0, 0, 2], port, 80, 0b0000_0010, 0);
            core.process_packet(&frame, ObservationPoint::FromEndpoint);
        });
    });
}

fn bench_established_flow_steady_state(c: &mut Criterion) {
    c.bench_function("process_packet: established flow, steady ACKs", |b| {
        let clock = Arc::new(TestClock::new());
        let core = RetinaCore::new(
            CoreConfig::default(),
            clock,
            Arc::new(BypassFilter),
            Arc::new(NullSink),
            Arc::new(AtomicMetrics::new()),
        );
        core.process_packet(
            &eth_ipv4_tcp([10, 0, 0, 1], [10, 0, 0, 2], 1000, 80, 0b0000_0010, 0),
            ObservationPoint::FromEndpoint,
        );
        let frame = eth_ipv4_tcp([10, 0, 0, 1], [10, 0, 0, 2], 1000, 80, 0b0001_0000, 64);
        b.iter(|| {
            core.process_packet(&frame, ObservationPoint::FromEndpoint);
        });
    });
}

criterion_group!(benches, bench_new_flow_per_packet, bench_established_flow_steady_state);
criterion_main!(benches);
