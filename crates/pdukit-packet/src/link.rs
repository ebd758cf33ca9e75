use crate::error::Result;
use crate::pdu::{Pdu, PduKind};
use crate::raw::RawPdu;
use std::fmt::{Display, Formatter};

/// A pcap data link type (`DLT`).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum LinkType {
    /// BSD loopback.
    Null,
    Ethernet,
    /// Raw `IPv4` or `IPv6`.
    Raw,
    Ieee80211,
    LinuxSll,
    Radiotap,
    Other(u32),
}

impl LinkType {
    #[must_use]
    pub const fn id(self) -> u32 {
        match self {
            Self::Null => 0,
            Self::Ethernet => 1,
            Self::Raw => 101,
            Self::Ieee80211 => 105,
            Self::LinuxSll => 113,
            Self::Radiotap => 127,
            Self::Other(id) => id,
        }
    }

    /// The kind of the outermost layer of frames of this link type.
    #[must_use]
    pub const fn kind(self) -> Option<PduKind> {
        match self {
            Self::Null => Some(PduKind::Loopback),
            Self::Ethernet => Some(PduKind::EthernetII),
            Self::Ieee80211 => Some(PduKind::Dot11),
            Self::LinuxSll => Some(PduKind::Sll),
            Self::Radiotap => Some(PduKind::RadioTap),
            Self::Raw | Self::Other(_) => None,
        }
    }
}

impl From<u32> for LinkType {
    fn from(id: u32) -> Self {
        match id {
            0 => Self::Null,
            1 => Self::Ethernet,
            101 => Self::Raw,
            105 => Self::Ieee80211,
            113 => Self::LinuxSll,
            127 => Self::Radiotap,
            id => Self::Other(id),
        }
    }
}

impl Display for LinkType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Ethernet => write!(f, "ethernet"),
            Self::Raw => write!(f, "raw"),
            Self::Ieee80211 => write!(f, "ieee802.11"),
            Self::LinuxSll => write!(f, "linux-sll"),
            Self::Radiotap => write!(f, "radiotap"),
            Self::Other(id) => write!(f, "dlt-{id}"),
        }
    }
}

impl Pdu {
    /// Decode a captured frame of the given link type.
    ///
    /// Frames of an unsupported link type are returned as a single [`RawPdu`].
    pub fn from_link_bytes(link_type: LinkType, bytes: &[u8]) -> Result<Self> {
        let kind = match link_type {
            LinkType::Raw => match bytes.first().map(|b| b >> 4) {
                Some(4) => Some(PduKind::Ipv4),
                Some(6) => Some(PduKind::Ipv6),
                _ => None,
            },
            link_type => link_type.kind(),
        };
        match kind {
            Some(kind) => Self::parse_kind(kind, bytes),
            None => Ok(Self::new(RawPdu::new(bytes.to_vec()))),
        }
    }
}
