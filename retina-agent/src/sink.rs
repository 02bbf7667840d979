//! Wires `retina_core::RetinaCore`'s `PacketSink` onto the library's own
//! bounded `Emitter` (`spec.md` §4.9, C9) instead of logging records inline
//! on the packet path, so a full channel actually drops and counts
//! `emit_drops` the way an operator would observe it.

use retina_core::engine::PacketSink;
use retina_core::record::PacketRecord;
use retina_core::{emitter::Emitter, MetricsSink};
use std::sync::Arc;
use tracing::info;

/// Adapts an `Emitter` to `PacketSink`: `process_packet` calls `push`, which
/// forwards to `Emitter::emit` (`try_send`, never blocking the caller).
pub struct EmittingSink(Emitter);

impl EmittingSink {
    pub fn new(capacity: usize, metrics: Arc<dyn MetricsSink>) -> (Self, crossbeam_channel::Receiver<PacketRecord>) {
        let (emitter, rx) = Emitter::new(capacity, metrics);
        (Self(emitter), rx)
    }
}

impl PacketSink for EmittingSink {
    fn push(&self, record: PacketRecord) {
        self.0.emit(record);
    }
}

/// Drains the channel on a dedicated blocking task, logging each record the
/// way the demo previously logged inline. Exits once every `EmittingSink`
/// clone (and thus every `Sender`) has been dropped.
pub fn spawn_drain(rx: crossbeam_channel::Receiver<PacketRecord>) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        for record in rx {
            info!(
                src_port = record.key.src_port,
                dst_port = record.key.dst_port,
                flags = record.tcp_flags,
                bytes = record.bytes,
                is_reply = record.is_reply,
                "emitted packet record"
            );
        }
    })
}
