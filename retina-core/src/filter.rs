//! IP-of-interest membership test (`spec.md` §4.2, C2).
//!
//! Grounded on `huginn-proxy-lib::security::ip_filter::is_ip_allowed`'s
//! allow/deny matching style, backed by `ipnet` (already a dependency of this
//! workspace) instead of a bespoke LPM trie — this table is populated
//! by an external control plane at sizes (hundreds of prefixes) where a linear
//! longest-match scan over a `Vec<Ipv4Net>` is adequate.

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use std::sync::RwLock;

/// Set-membership test consulted by the decoder via
/// `is_of_interest(src) || is_of_interest(dst)`.
pub trait IpFilter: Send + Sync {
    fn is_of_interest(&self, ip: Ipv4Addr) -> bool;
}

/// `BYPASS_FILTER = true` (`spec.md` §6.4): every address is of interest.
#[derive(Debug, Default, Clone, Copy)]
pub struct BypassFilter;

impl IpFilter for BypassFilter {
    fn is_of_interest(&self, _ip: Ipv4Addr) -> bool {
        true
    }
}

/// Longest-prefix-match filter populated by `insert` (`spec.md` §4.2, §6.3).
/// Writes come exclusively from an external control plane; the core only
/// reads via `contains`.
#[derive(Debug, Default)]
pub struct LpmFilter {
    prefixes: RwLock<Vec<Ipv4Net>>,
}

impl LpmFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, prefix: Ipv4Addr, prefix_len: u8) {
        if let Ok(net) = Ipv4Net::new(prefix, prefix_len) {
            let mut guard = self.prefixes.write().expect("ip filter lock poisoned");
            guard.push(net.trunc());
        }
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let guard = self.prefixes.read().expect("ip filter lock poisoned");
        guard.iter().any(|net| net.contains(&ip))
    }
}

impl IpFilter for LpmFilter {
    fn is_of_interest(&self, ip: Ipv4Addr) -> bool {
        self.contains(ip)
    }
}
