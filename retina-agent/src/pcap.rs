//! Packet source for the demo agent: either a captured `.pcap` file or a
//! small built-in synthetic capture.
//!
//! The pcap-reading loop is modeled on
//! `mikemiles-dev-netflow_parser`'s `examples/netflow_pcap.rs`: a
//! `LegacyPcapReader` consumed in a `next`/`consume`/`refill` loop, bailing
//! out on `PcapError::Eof`. Unlike that example we don't need `etherparse` to
//! pick the transport out of the frame — `retina_core`'s own decoder already
//! walks Ethernet/IPv4/TCP, so each captured frame is handed to it raw.

use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{LegacyPcapReader, PcapBlockOwned, PcapError};
use std::fs::File;
use std::path::Path;

/// Read every captured frame's link-layer bytes out of `path`, in order.
pub fn read_frames(path: &Path) -> std::io::Result<Vec<Vec<u8>>> {
    let file = File::open(path)?;
    let mut reader = LegacyPcapReader::new(65536, file)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, format!("{e}")))?;

    let mut frames = Vec::new();
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                if let PcapBlockOwned::Legacy(pcap_block) = block {
                    frames.push(pcap_block.data.to_vec());
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete(_)) => {
                reader.refill().map_err(|e| std::io::Error::new(std::io::ErrorKind::UnexpectedEof, format!("{e}")))?;
            }
            Err(e) => return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, format!("{e:?}"))),
        }
    }
    Ok(frames)
}

fn eth_ipv4_tcp(src: [u8; 4], dst: [u8; 4], src_port: u16, dst_port: u16, flags: u8, payload_len: usize) -> Vec<u8> {
    let mut frame = vec![0u8; 14];
    frame[12] = 0x08;
    frame[13] = 0x00;

    let mut ip = vec![0u8; 20];
    ip[0] = 0x45;
    ip[9] = 6;
    ip[12..16].copy_from_slice(&src);
    ip[16..20].copy_from_slice(&dst);
    frame.extend_from_slice(&ip);

    let mut tcp = vec![0u8; 20 + payload_len];
    tcp[0..2].copy_from_slice(&src_port.to_be_bytes());
    tcp[2..4].copy_from_slice(&dst_port.to_be_bytes());
    tcp[12] = 5 << 4;
    tcp[13] = flags;
    frame.extend_from_slice(&tcp);
    frame
}

/// A tiny hand-built SYN / SYN-ACK / ACK / data / FIN exchange, used when no
/// `--pcap` file is given so the agent has something to process out of the box.
pub fn synthetic_capture() -> Vec<Vec<u8>> {
    const CLIENT: [u8; 4] = [10, 0, 0, 1];
    const SERVER: [u8; 4] = [10, 0, 0, 2];
    const SYN: u8 = 0b0000_0010;
    const SYN_ACK: u8 = 0b0001_0010;
    const ACK: u8 = 0b0001_0000;
    const FIN_ACK: u8 = 0b0001_0001;

    vec![
        eth_ipv4_tcp(CLIENT, SERVER, 5000, 443, SYN, 0),
        eth_ipv4_tcp(SERVER, CLIENT, 443, 5000, SYN_ACK, 0),
        eth_ipv4_tcp(CLIENT, SERVER, 5000, 443, ACK, 0),
        eth_ipv4_tcp(CLIENT, SERVER, 5000, 443, ACK, 256),
        eth_ipv4_tcp(SERVER, CLIENT, 443, 5000, ACK, 512),
        eth_ipv4_tcp(CLIENT, SERVER, 5000, 443, FIN_ACK, 0),
        eth_ipv4_tcp(SERVER, CLIENT, 443, 5000, FIN_ACK, 0),
        eth_ipv4_tcp(CLIENT, SERVER, 5000, 443, ACK, 0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_capture_is_nonempty_and_well_formed() {
        let frames = synthetic_capture();
        assert_eq!(frames.len(), 8);
        for frame in &frames {
            assert!(frame.len() >= 34);
            assert_eq!(frame[12], 0x08);
            assert_eq!(frame[13], 0x00);
        }
    }
}
