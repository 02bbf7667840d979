//! Host-side `FlowKey` (`spec.md` §3.1, §4.4).

use retina_wire::FlowKeyRaw;
use std::net::Ipv4Addr;

/// Transport protocol carried by a flow. Only the two protocols the decoder
/// recognises; anything else never reaches `FlowKey` construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Proto {
    Tcp,
    Udp,
}

impl Proto {
    pub const fn as_u8(self) -> u8 {
        match self {
            Proto::Tcp => 6,
            Proto::Udp => 17,
        }
    }

    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            6 => Some(Proto::Tcp),
            17 => Some(Proto::Udp),
            _ => None,
        }
    }
}

/// Canonical 5-tuple flow key. Equality is bitwise (`spec.md` §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub proto: Proto,
}

impl FlowKey {
    pub fn new(
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        src_port: u16,
        dst_port: u16,
        proto: Proto,
    ) -> Self {
        Self { src_ip, dst_ip, src_port, dst_port, proto }
    }

    /// Swaps src/dst ip and port, preserves proto. `reverse(reverse(K)) == K`.
    pub fn reverse(self) -> Self {
        Self {
            src_ip: self.dst_ip,
            dst_ip: self.src_ip,
            src_port: self.dst_port,
            dst_port: self.src_port,
            proto: self.proto,
        }
    }

    pub fn to_wire(self) -> FlowKeyRaw {
        FlowKeyRaw {
            src_ip: u32::from(self.src_ip),
            dst_ip: u32::from(self.dst_ip),
            src_port: self.src_port,
            dst_port: self.dst_port,
            proto: self.proto.as_u8(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_is_an_involution() {
        let k = FlowKey::new(
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            1234,
            80,
            Proto::Tcp,
        );
        assert_eq!(k.reverse().reverse(), k);
        assert_ne!(k.reverse(), k);
    }

    #[test]
    fn proto_round_trips_through_wire_byte() {
        assert_eq!(Proto::from_u8(Proto::Tcp.as_u8()), Some(Proto::Tcp));
        assert_eq!(Proto::from_u8(Proto::Udp.as_u8()), Some(Proto::Udp));
        assert_eq!(Proto::from_u8(1), None);
    }
}
