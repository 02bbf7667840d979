//! The single source of "now" for the core (`spec.md` C1).
//!
//! Every table and gate operation takes `now` as an explicit argument rather
//! than reading a clock itself, so tests can drive time deterministically.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Monotonic seconds since boot, plus a nanosecond wall-clock reading for
/// `PacketRecord::timestamp_ns`. `spec.md` §9 standardises CT timestamps on
/// seconds and the emitted record's `timestamp_ns` on nanoseconds.
pub trait Clock: Send + Sync {
    /// Monotonic seconds, used for `eviction_time`, `last_report_*`, and all
    /// timeout arithmetic.
    fn now_secs(&self) -> u32;

    /// Wall-clock nanoseconds, stamped onto emitted records only.
    fn now_nanos(&self) -> u64;
}

/// Production clock backed by the OS monotonic/wall clocks.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    start: std::time::Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { start: std::time::Instant::now() }
    }
}

impl Clock for MonotonicClock {
    fn now_secs(&self) -> u32 {
        let elapsed = self.start.elapsed().as_secs();
        u32::try_from(elapsed).unwrap_or(u32::MAX)
    }

    fn now_nanos(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or(0)
    }
}

/// A clock a test can advance by hand, mirroring how `huginn-proxy-lib`'s
/// integration tests build fixtures by hand rather than through real I/O.
#[derive(Debug, Default)]
pub struct TestClock {
    secs: AtomicU32,
    nanos: AtomicU64,
}

impl TestClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_secs(&self, secs: u32) {
        self.secs.store(secs, Ordering::Relaxed);
        self.nanos.store(u64::from(secs) * 1_000_000_000, Ordering::Relaxed);
    }

    pub fn advance_secs(&self, delta: u32) {
        let new = self.secs.load(Ordering::Relaxed).saturating_add(delta);
        self.set_secs(new);
    }
}

impl Clock for TestClock {
    fn now_secs(&self) -> u32 {
        self.secs.load(Ordering::Relaxed)
    }

    fn now_nanos(&self) -> u64 {
        self.nanos.load(Ordering::Relaxed)
    }
}
