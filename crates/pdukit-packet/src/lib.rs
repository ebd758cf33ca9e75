//! Packet wire format parsing and building.
//!
//! Every supported protocol is represented by a plain struct holding its header fields which can
//! be linked into a [`Pdu`] chain. A chain owns each of its layers and can be serialized to, and
//! decoded from, its wire format.
//!
//! The following protocols are supported:
//! - `EthernetII`
//! - `IEEE 802.11` (management, control and data frames) and `RadioTap`
//! - `LLC/SNAP`, Linux cooked capture (`SLL`) and BSD loopback
//! - `ARP`
//! - `IPv4` and `IPv6`
//! - `TCP`, `UDP` and `ICMP`
//! - `DNS`
//! - `DHCP` (over `BOOTP`)
//! - `EAPOL` (including `RSN`/`WPA` key frames)
//!
//! Lower level, zero-copy views of the fixed size headers (such as [`ipv4::Ipv4Packet`]) are also
//! available.
//!
//! # Endianness
//!
//! Wire formats are held in network byte order (big-endian), except where a protocol defines a
//! little-endian field (for instance the 802.11 duration). All accessor methods take and return
//! data in host byte order, converting as necessary for the given architecture.
//!
//! # Example
//!
//! The following example builds an `UDP` datagram, serializes it and decodes it again:
//!
//! ```rust
//! # fn main() -> anyhow::Result<()> {
//! use pdukit_packet::ethernet::EthernetII;
//! use pdukit_packet::ipv4::Ipv4;
//! use pdukit_packet::raw::RawPdu;
//! use pdukit_packet::udp::Udp;
//! use pdukit_packet::{HwAddress, Pdu};
//! use std::net::Ipv4Addr;
//!
//! let pdu = EthernetII::new(HwAddress::BROADCAST, "aa:bb:cc:dd:ee:ff".parse()?)
//!     / Ipv4::new(Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::new(10, 0, 0, 1))
//!     / Udp::new(53, 12345)
//!     / RawPdu::new(b"test".to_vec());
//! let bytes = pdu.serialize()?;
//! let reparsed = Pdu::parse::<EthernetII>(&bytes)?;
//! assert_eq!(Some(53), reparsed.find::<Udp>().map(|udp| udp.dport));
//! assert_eq!(Some(&b"test"[..]), reparsed.find::<RawPdu>().map(RawPdu::payload));
//! # Ok(())
//! # }
//! ```
//!
//! The following example reads the fields of an `UDP` header without copying:
//!
//! ```rust
//! # fn main() -> anyhow::Result<()> {
//! use pdukit_packet::udp::UdpPacket;
//!
//! let buf = hex_literal::hex!("68 bf 81 b6 00 40 ac be");
//! let packet = UdpPacket::new_view(&buf)?;
//! assert_eq!(26815, packet.get_source());
//! assert_eq!(33206, packet.get_destination());
//! assert_eq!(64, packet.get_length());
//! assert_eq!(44222, packet.get_checksum());
//! # Ok(())
//! # }
//! ```
#![warn(clippy::all, clippy::pedantic, clippy::nursery, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::use_self,
    clippy::option_if_let_else,
    clippy::missing_const_for_fn,
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc
)]
#![forbid(unsafe_code)]

mod buffer;
mod hw_address;
mod link;
mod pdu;

/// Packet errors.
pub mod error;

/// Functions for calculating network checksums.
pub mod checksum;

/// Tagged (type, length, value) option lists.
pub mod options;

/// `EthernetII` frames.
pub mod ethernet;

/// `IEEE 802.11` frames.
pub mod dot11;

/// `RadioTap` headers.
pub mod radiotap;

/// `LLC/SNAP` headers.
pub mod snap;

/// Linux cooked capture headers.
pub mod sll;

/// BSD loopback (`DLT_NULL`) headers.
pub mod loopback;

/// `ARP` packets.
pub mod arp;

/// `IPv4` packets.
pub mod ipv4;

/// `IPv6` packets.
pub mod ipv6;

/// `TCP` segments.
pub mod tcp;

/// `UDP` datagrams.
pub mod udp;

/// `ICMP` packets.
pub mod icmp;

/// `DNS` messages.
pub mod dns;

/// `DHCP` messages.
pub mod dhcp;

/// `EAPOL` frames.
pub mod eapol;

/// Opaque payloads.
pub mod raw;

pub use hw_address::HwAddress;
pub use link::LinkType;
pub use pdu::{Decoded, Layer, Pdu, PduKind, Protocol};

/// The IP packet next layer protocol.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum IpProtocol {
    Icmp,
    Tcp,
    Udp,
    IcmpV6,
    Other(u8),
}

impl IpProtocol {
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::Icmp => 1,
            Self::Tcp => 6,
            Self::Udp => 17,
            Self::IcmpV6 => 58,
            Self::Other(id) => id,
        }
    }

    /// The protocol carried by a layer of the given kind, if it is an IP transport.
    #[must_use]
    pub const fn from_kind(kind: PduKind) -> Option<Self> {
        match kind {
            PduKind::Icmp => Some(Self::Icmp),
            PduKind::Tcp => Some(Self::Tcp),
            PduKind::Udp => Some(Self::Udp),
            _ => None,
        }
    }

    /// The kind of layer which decodes this protocol, if supported.
    #[must_use]
    pub const fn kind(self) -> Option<PduKind> {
        match self {
            Self::Icmp => Some(PduKind::Icmp),
            Self::Tcp => Some(PduKind::Tcp),
            Self::Udp => Some(PduKind::Udp),
            Self::IcmpV6 | Self::Other(_) => None,
        }
    }
}

impl From<u8> for IpProtocol {
    fn from(id: u8) -> Self {
        match id {
            1 => Self::Icmp,
            6 => Self::Tcp,
            17 => Self::Udp,
            58 => Self::IcmpV6,
            p => Self::Other(p),
        }
    }
}

/// The link layer payload protocol.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum EtherType {
    Ipv4,
    Arp,
    Ipv6,
    Eapol,
    Other(u16),
}

impl EtherType {
    #[must_use]
    pub const fn id(self) -> u16 {
        match self {
            Self::Ipv4 => 0x0800,
            Self::Arp => 0x0806,
            Self::Ipv6 => 0x86dd,
            Self::Eapol => 0x888e,
            Self::Other(id) => id,
        }
    }

    /// The type carried by a layer of the given kind, if it has a registered `EtherType`.
    #[must_use]
    pub const fn from_kind(kind: PduKind) -> Option<Self> {
        match kind {
            PduKind::Ipv4 => Some(Self::Ipv4),
            PduKind::Arp => Some(Self::Arp),
            PduKind::Ipv6 => Some(Self::Ipv6),
            PduKind::Eapol => Some(Self::Eapol),
            _ => None,
        }
    }

    /// The kind of layer which decodes this type, if supported.
    #[must_use]
    pub const fn kind(self) -> Option<PduKind> {
        match self {
            Self::Ipv4 => Some(PduKind::Ipv4),
            Self::Arp => Some(PduKind::Arp),
            Self::Ipv6 => Some(PduKind::Ipv6),
            Self::Eapol => Some(PduKind::Eapol),
            Self::Other(_) => None,
        }
    }
}

impl From<u16> for EtherType {
    fn from(id: u16) -> Self {
        match id {
            0x0800 => Self::Ipv4,
            0x0806 => Self::Arp,
            0x86dd => Self::Ipv6,
            0x888e => Self::Eapol,
            t => Self::Other(t),
        }
    }
}

/// Resolve the value of a type field for an outer layer.
///
/// The type of a known inner layer wins over the value set on the outer layer.
pub(crate) fn ether_type_for(inner: Option<PduKind>, current: u16) -> u16 {
    inner
        .and_then(EtherType::from_kind)
        .map_or(current, EtherType::id)
}

/// Format a payload as a hexadecimal string.
#[must_use]
pub fn fmt_payload(bytes: &[u8]) -> String {
    use itertools::Itertools as _;
    format!("{:02x}", bytes.iter().format(" "))
}
