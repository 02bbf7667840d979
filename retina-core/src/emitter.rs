//! Bounded per-CPU event channel to user-space (`spec.md` §4.9, C9).
//!
//! `huginn-proxy-lib`'s own channels (`tokio::sync::watch` in
//! `ConnectionManager`) assume an async runtime with suspension points; §5
//! forbids blocking primitives and suspension on the packet path, so the
//! synchronous, non-blocking `crossbeam-channel` is used instead — `try_send`
//! never parks the caller.

use crate::metrics::MetricsSink;
use crate::record::PacketRecord;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::Arc;

/// Default channel depth per CPU; generous enough that bursts rarely overflow
/// while keeping memory bounded.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4096;

pub struct Emitter {
    tx: Sender<PacketRecord>,
    metrics: Arc<dyn MetricsSink>,
}

impl Emitter {
    pub fn new(capacity: usize, metrics: Arc<dyn MetricsSink>) -> (Self, Receiver<PacketRecord>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx, metrics }, rx)
    }

    /// Push a record onto the channel. If full, the record is dropped and
    /// `emit_drops` is incremented — the only permitted form of observation
    /// loss in the core (`spec.md` §4.9).
    pub fn emit(&self, record: PacketRecord) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(record) {
            self.metrics.emit_drops();
        }
    }
}
