//! Internet checksums (RFC 1071) for `IPv4`, `ICMP`, `UDP` and `TCP`.
//!
//! Each function sums the given bytes as big-endian 16 bit words, skipping the word that holds the
//! checksum itself, so a checksum may be computed over a header whose checksum field is stale.

use crate::IpProtocol;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const IPV4_CHECKSUM_WORD: usize = 5;
const ICMP_CHECKSUM_WORD: usize = 1;
const UDP_CHECKSUM_WORD: usize = 3;
const TCP_CHECKSUM_WORD: usize = 8;

/// The checksum of an `IPv4` header.
#[must_use]
pub fn ipv4_header_checksum(header: &[u8]) -> u16 {
    unframed(header, IPV4_CHECKSUM_WORD)
}

/// The checksum of an `ICMP` message.
#[must_use]
pub fn icmp_ipv4_checksum(message: &[u8]) -> u16 {
    unframed(message, ICMP_CHECKSUM_WORD)
}

#[must_use]
pub fn udp_ipv4_checksum(datagram: &[u8], src: Ipv4Addr, dst: Ipv4Addr) -> u16 {
    pseudo_header(src.into(), dst.into(), IpProtocol::Udp, datagram.len())
        .add_bytes(datagram, Some(UDP_CHECKSUM_WORD))
        .finish()
}

#[must_use]
pub fn tcp_ipv4_checksum(segment: &[u8], src: Ipv4Addr, dst: Ipv4Addr) -> u16 {
    pseudo_header(src.into(), dst.into(), IpProtocol::Tcp, segment.len())
        .add_bytes(segment, Some(TCP_CHECKSUM_WORD))
        .finish()
}

#[must_use]
pub fn udp_ipv6_checksum(datagram: &[u8], src: Ipv6Addr, dst: Ipv6Addr) -> u16 {
    pseudo_header(src.into(), dst.into(), IpProtocol::Udp, datagram.len())
        .add_bytes(datagram, Some(UDP_CHECKSUM_WORD))
        .finish()
}

#[must_use]
pub fn tcp_ipv6_checksum(segment: &[u8], src: Ipv6Addr, dst: Ipv6Addr) -> u16 {
    pseudo_header(src.into(), dst.into(), IpProtocol::Tcp, segment.len())
        .add_bytes(segment, Some(TCP_CHECKSUM_WORD))
        .finish()
}

/// The checksum of a transport payload under the pseudo-header of `src` and `dst`.
///
/// The checksum field is skipped for `TCP` and `UDP`, for other protocols every word is summed.
/// Returns `None` if the addresses are of mixed families.
#[must_use]
pub fn transport_checksum(
    data: &[u8],
    protocol: IpProtocol,
    src: IpAddr,
    dst: IpAddr,
) -> Option<u16> {
    if src.is_ipv4() != dst.is_ipv4() {
        return None;
    }
    let skip = match protocol {
        IpProtocol::Tcp => Some(TCP_CHECKSUM_WORD),
        IpProtocol::Udp => Some(UDP_CHECKSUM_WORD),
        _ => None,
    };
    Some(
        pseudo_header(src, dst, protocol, data.len())
            .add_bytes(data, skip)
            .finish(),
    )
}

fn unframed(data: &[u8], skip: usize) -> u16 {
    if data.is_empty() {
        return 0;
    }
    Sum::default().add_bytes(data, Some(skip)).finish()
}

fn pseudo_header(src: IpAddr, dst: IpAddr, protocol: IpProtocol, len: usize) -> Sum {
    Sum::default()
        .add_addr(src)
        .add_addr(dst)
        .add(u64::from(protocol.id()))
        .add(len as u64)
}

/// A ones' complement sum, folded to 16 bits when finished.
#[derive(Debug, Default, Clone, Copy)]
struct Sum(u64);

impl Sum {
    const fn add(self, val: u64) -> Self {
        Self(self.0 + val)
    }

    fn add_addr(self, addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => self.add_bytes(&v4.octets(), None),
            IpAddr::V6(v6) => self.add_bytes(&v6.octets(), None),
        }
    }

    /// Add `data` as big-endian words, a trailing odd byte is padded with zero.
    fn add_bytes(self, data: &[u8], skip: Option<usize>) -> Self {
        data.chunks(2)
            .enumerate()
            .filter(|&(index, _)| Some(index) != skip)
            .fold(self, |sum, (_, pair)| match *pair {
                [hi, lo] => sum.add(u64::from(u16::from_be_bytes([hi, lo]))),
                [hi] => sum.add(u64::from(hi) << 8),
                _ => sum,
            })
    }

    const fn finish(self) -> u16 {
        let mut sum = self.0;
        while sum > 0xffff {
            sum = (sum >> 16) + (sum & 0xffff);
        }
        !(sum as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_empty() {
        assert_eq!(0, ipv4_header_checksum(&[]));
        assert_eq!(0, icmp_ipv4_checksum(&[]));
    }

    #[test]
    fn test_odd_length() {
        assert_eq!(0xffff, ipv4_header_checksum(&[0x00]));
        assert_eq!(0xfeff, icmp_ipv4_checksum(&[0x01]));
    }

    #[test]
    fn test_ipv4_header_checksum() {
        let bytes = hex!("45 00 0f fc 38 c0 00 00 40 01 2e 3b 0a 00 00 02 0a 00 00 01");
        assert_eq!(0x1e3f, ipv4_header_checksum(&bytes));
    }

    #[test]
    fn test_ipv4_header_checksum_validates() {
        let mut bytes = hex!("45 00 00 20 00 01 00 00 40 11 00 00 c0 a8 00 01 08 08 08 08");
        let checksum = ipv4_header_checksum(&bytes);
        bytes[10..12].copy_from_slice(&checksum.to_be_bytes());
        assert_eq!(0, Sum::default().add_bytes(&bytes, None).finish());
    }

    #[test]
    fn test_tcp_ipv4_checksum() {
        let bytes = hex!("00 50 80 ea 00 00 00 00 95 9d 2e c7 50 12 ff ff 55 cc 00 00");
        let src = Ipv4Addr::new(10, 0, 0, 103);
        let dst = Ipv4Addr::new(10, 0, 0, 1);
        assert_eq!(0x55cc, tcp_ipv4_checksum(&bytes, src, dst));
        assert_eq!(
            Some(0x55cc),
            transport_checksum(&bytes, IpProtocol::Tcp, src.into(), dst.into())
        );
    }

    #[test]
    fn test_transport_checksum_mixed_families() {
        let src = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let dst = IpAddr::V6(Ipv6Addr::LOCALHOST);
        assert_eq!(None, transport_checksum(&[], IpProtocol::Udp, src, dst));
    }

    #[test]
    fn test_udp_ipv6_checksum_ignores_checksum_field() {
        let src = Ipv6Addr::LOCALHOST;
        let with_zero = hex!("30 39 00 35 00 0c 00 00 74 65 73 74");
        let with_junk = hex!("30 39 00 35 00 0c ab cd 74 65 73 74");
        assert_eq!(
            udp_ipv6_checksum(&with_zero, src, src),
            udp_ipv6_checksum(&with_junk, src, src)
        );
        assert_ne!(
            tcp_ipv6_checksum(&with_zero, src, src),
            tcp_ipv6_checksum(&with_junk, src, src)
        );
    }
}
