//! Per-direction TCP control-flag bookkeeping (`spec.md` §3.2).

use retina_wire::FlagHistogramRaw;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// Single-byte, bitwise-OR accumulator of control bits observed in one
/// direction. Bit layout matches the decoder's output (`spec.md` §4.1):
/// bit 0 FIN, 1 SYN, 2 RST, 3 PSH, 4 ACK, 5 URG, 6 ECE, 7 CWR.
pub mod bit {
    pub const FIN: u8 = 1 << 0;
    pub const SYN: u8 = 1 << 1;
    pub const RST: u8 = 1 << 2;
    pub const PSH: u8 = 1 << 3;
    pub const ACK: u8 = 1 << 4;
    pub const URG: u8 = 1 << 5;
    pub const ECE: u8 = 1 << 6;
    pub const CWR: u8 = 1 << 7;
}

#[derive(Debug, Default)]
pub struct AtomicFlagsSeen(AtomicU8);

impl AtomicFlagsSeen {
    pub fn load(&self) -> u8 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn store(&self, v: u8) {
        self.0.store(v, Ordering::Relaxed);
    }

    /// Bitwise-OR `bits` into the accumulator, returning the new value.
    pub fn fetch_or(&self, bits: u8) -> u8 {
        self.0.fetch_or(bits, Ordering::Relaxed) | bits
    }
}

/// Per-bit counters {SYN, ACK, FIN, RST, PSH, URG, ECE, CWR, NS}, saturating.
/// `spec.md` §3.2 names NS as a tracked bit even though the decoder (§4.1)
/// only normalizes the 8 bits it can read off a 20-byte TCP header; this
/// histogram always carries `ns` at 0 until/unless a future decoder revision
/// surfaces it, matching `conntrack.c`'s `tcpflagscount` layout.
#[derive(Debug, Default)]
pub struct AtomicFlagHistogram {
    pub syn: AtomicU32,
    pub ack: AtomicU32,
    pub fin: AtomicU32,
    pub rst: AtomicU32,
    pub psh: AtomicU32,
    pub urg: AtomicU32,
    pub ece: AtomicU32,
    pub cwr: AtomicU32,
    pub ns: AtomicU32,
}

impl AtomicFlagHistogram {
    fn bump(counter: &AtomicU32) {
        let cur = counter.load(Ordering::Relaxed);
        if cur != u32::MAX {
            counter.store(cur.saturating_add(1), Ordering::Relaxed);
        }
    }

    /// Record one packet's flag byte into the histogram: every set bit's
    /// counter is saturating-incremented by one.
    pub fn record(&self, flags: u8) {
        if flags & bit::SYN != 0 {
            Self::bump(&self.syn);
        }
        if flags & bit::ACK != 0 {
            Self::bump(&self.ack);
        }
        if flags & bit::FIN != 0 {
            Self::bump(&self.fin);
        }
        if flags & bit::RST != 0 {
            Self::bump(&self.rst);
        }
        if flags & bit::PSH != 0 {
            Self::bump(&self.psh);
        }
        if flags & bit::URG != 0 {
            Self::bump(&self.urg);
        }
        if flags & bit::ECE != 0 {
            Self::bump(&self.ece);
        }
        if flags & bit::CWR != 0 {
            Self::bump(&self.cwr);
        }
    }

    pub fn snapshot(&self) -> FlagHistogramRaw {
        FlagHistogramRaw {
            syn: self.syn.load(Ordering::Relaxed),
            ack: self.ack.load(Ordering::Relaxed),
            fin: self.fin.load(Ordering::Relaxed),
            rst: self.rst.load(Ordering::Relaxed),
            psh: self.psh.load(Ordering::Relaxed),
            urg: self.urg.load(Ordering::Relaxed),
            ece: self.ece.load(Ordering::Relaxed),
            cwr: self.cwr.load(Ordering::Relaxed),
            ns: self.ns.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero (on EMIT, per `spec.md` §4.7).
    pub fn clear(&self) {
        self.syn.store(0, Ordering::Relaxed);
        self.ack.store(0, Ordering::Relaxed);
        self.fin.store(0, Ordering::Relaxed);
        self.rst.store(0, Ordering::Relaxed);
        self.psh.store(0, Ordering::Relaxed);
        self.urg.store(0, Ordering::Relaxed);
        self.ece.store(0, Ordering::Relaxed);
        self.cwr.store(0, Ordering::Relaxed);
        self.ns.store(0, Ordering::Relaxed);
    }
}
