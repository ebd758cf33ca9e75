use crate::arp::Arp;
use crate::dhcp::Dhcp;
use crate::dns::Dns;
use crate::dot11::Dot11;
use crate::eapol::Eapol;
use crate::error::{Error, Result};
use crate::ethernet::EthernetII;
use crate::icmp::Icmp;
use crate::ipv4::Ipv4;
use crate::ipv6::Ipv6;
use crate::loopback::Loopback;
use crate::radiotap::RadioTap;
use crate::raw::RawPdu;
use crate::sll::Sll;
use crate::snap::Snap;
use crate::tcp::Tcp;
use crate::udp::Udp;
use std::fmt::{Display, Formatter};
use std::net::IpAddr;
use std::ops::Div;

/// Identifies the concrete protocol of a [`Pdu`] node.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum PduKind {
    EthernetII,
    Dot11,
    RadioTap,
    Snap,
    Sll,
    Loopback,
    Arp,
    Ipv4,
    Ipv6,
    Tcp,
    Udp,
    Icmp,
    Dns,
    Dhcp,
    Eapol,
    Raw,
}

impl Display for PduKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EthernetII => write!(f, "EthernetII"),
            Self::Dot11 => write!(f, "802.11"),
            Self::RadioTap => write!(f, "RadioTap"),
            Self::Snap => write!(f, "SNAP"),
            Self::Sll => write!(f, "SLL"),
            Self::Loopback => write!(f, "Loopback"),
            Self::Arp => write!(f, "ARP"),
            Self::Ipv4 => write!(f, "IPv4"),
            Self::Ipv6 => write!(f, "IPv6"),
            Self::Tcp => write!(f, "TCP"),
            Self::Udp => write!(f, "UDP"),
            Self::Icmp => write!(f, "ICMP"),
            Self::Dns => write!(f, "DNS"),
            Self::Dhcp => write!(f, "DHCP"),
            Self::Eapol => write!(f, "EAPOL"),
            Self::Raw => write!(f, "Raw"),
        }
    }
}

/// The result of decoding a single protocol header from the front of a buffer.
#[derive(Debug)]
pub struct Decoded<'a, T> {
    /// The decoded header.
    pub header: T,
    /// The bytes which follow the header and belong to the inner layers.
    pub payload: &'a [u8],
    /// The protocol the payload should be decoded as, or `None` for an opaque payload.
    pub next: Option<PduKind>,
}

impl<'a, T> Decoded<'a, T> {
    pub const fn new(header: T, payload: &'a [u8], next: Option<PduKind>) -> Self {
        Self {
            header,
            payload,
            next,
        }
    }
}

/// A single protocol layer which can be linked into a [`Pdu`] chain.
pub trait Protocol: Sized + Into<Layer> {
    /// The kind tag of this protocol.
    const KIND: PduKind;

    /// The size of this layer's header in bytes.
    fn header_size(&self) -> u32;

    /// The size of any trailer written after the inner layers.
    fn trailer_size(&self, _inner_size: u32) -> u32 {
        0
    }

    /// Write this layer into `frame`.
    ///
    /// `frame` spans the header, every inner layer and the trailer. The inner layers have already
    /// been written when this is called.
    fn write(&self, frame: &mut [u8], inner: Option<PduKind>, parent: Option<&Layer>)
        -> Result<()>;

    /// Decode this layer's header from the front of `bytes`.
    fn decode(bytes: &[u8]) -> Result<Decoded<'_, Self>>;

    /// Borrow this protocol out of a `Layer`.
    fn from_layer(layer: &Layer) -> Option<&Self>;

    /// Mutably borrow this protocol out of a `Layer`.
    fn from_layer_mut(layer: &mut Layer) -> Option<&mut Self>;
}

macro_rules! layers {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        /// A protocol layer of any supported kind.
        #[derive(Debug, Clone, Eq, PartialEq)]
        pub enum Layer {
            $($variant($ty)),+
        }

        impl Layer {
            /// The kind of this layer.
            #[must_use]
            pub const fn kind(&self) -> PduKind {
                match self {
                    $(Self::$variant(_) => PduKind::$variant),+
                }
            }

            /// The size of this layer's header in bytes.
            #[must_use]
            pub fn header_size(&self) -> u32 {
                match self {
                    $(Self::$variant(layer) => layer.header_size()),+
                }
            }

            /// The size of this layer's trailer given the size of the inner layers.
            #[must_use]
            pub fn trailer_size(&self, inner_size: u32) -> u32 {
                match self {
                    $(Self::$variant(layer) => layer.trailer_size(inner_size)),+
                }
            }

            fn write(
                &self,
                frame: &mut [u8],
                inner: Option<PduKind>,
                parent: Option<&Layer>,
            ) -> Result<()> {
                match self {
                    $(Self::$variant(layer) => layer.write(frame, inner, parent)),+
                }
            }
        }

        $(
            impl From<$ty> for Layer {
                fn from(layer: $ty) -> Self {
                    Self::$variant(layer)
                }
            }

            impl From<$ty> for Pdu {
                fn from(layer: $ty) -> Self {
                    Self::new(layer)
                }
            }

            impl<R: Into<Layer>> Div<R> for $ty {
                type Output = Pdu;

                fn div(self, rhs: R) -> Pdu {
                    Pdu::new(self) / rhs
                }
            }
        )+

        impl Pdu {
            /// Decode a chain whose outermost layer is of the given kind.
            pub fn parse_kind(kind: PduKind, bytes: &[u8]) -> Result<Self> {
                match kind {
                    $(PduKind::$variant => Self::parse::<$ty>(bytes)),+
                }
            }
        }
    };
}

layers!(
    EthernetII(EthernetII),
    Dot11(Dot11),
    RadioTap(RadioTap),
    Snap(Snap),
    Sll(Sll),
    Loopback(Loopback),
    Arp(Arp),
    Ipv4(Ipv4),
    Ipv6(Ipv6),
    Tcp(Tcp),
    Udp(Udp),
    Icmp(Icmp),
    Dns(Dns),
    Dhcp(Dhcp),
    Eapol(Eapol),
    Raw(RawPdu),
);

impl Layer {
    /// The source and destination addresses if this is an IP layer.
    #[must_use]
    pub fn ip_addresses(&self) -> Option<(IpAddr, IpAddr)> {
        match self {
            Self::Ipv4(ip) => Some((IpAddr::V4(ip.src), IpAddr::V4(ip.dst))),
            Self::Ipv6(ip) => Some((IpAddr::V6(ip.src), IpAddr::V6(ip.dst))),
            _ => None,
        }
    }
}

/// A Protocol Data Unit: one layer plus the chain of layers it encapsulates.
///
/// Each node exclusively owns its inner node. Replacing the inner node drops the previous one.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Pdu {
    layer: Layer,
    inner: Option<Box<Pdu>>,
}

impl Pdu {
    /// Create a single node chain.
    pub fn new(layer: impl Into<Layer>) -> Self {
        Self {
            layer: layer.into(),
            inner: None,
        }
    }

    /// Decode a chain whose outermost layer is `T`.
    ///
    /// Bytes which follow the last recognised layer become a [`RawPdu`] leaf. Any malformed
    /// layer fails the whole decode.
    pub fn parse<T: Protocol>(bytes: &[u8]) -> Result<Self> {
        let Decoded {
            header,
            payload,
            next,
        } = T::decode(bytes).map_err(|err| match err {
            Error::InsufficientPacketBuffer(name, minimum, provided) => Error::MalformedPacket(
                format!("{name} requires {minimum} bytes, {provided} available"),
            ),
            err => err,
        })?;
        let consumed = header.header_size() as usize;
        if consumed > bytes.len() {
            return Err(Error::MalformedPacket(format!(
                "{} header of {consumed} bytes exceeds buffer of {} bytes",
                T::KIND,
                bytes.len()
            )));
        }
        let mut pdu = Self::new(header);
        if !payload.is_empty() {
            let inner = match next {
                Some(kind) => Self::parse_kind(kind, payload)?,
                None => Self::new(RawPdu::new(payload.to_vec())),
            };
            pdu.set_inner(inner);
        }
        tracing::trace!(kind = %T::KIND, consumed, payload = payload.len());
        Ok(pdu)
    }

    /// The kind of the outermost layer.
    #[must_use]
    pub const fn kind(&self) -> PduKind {
        self.layer.kind()
    }

    /// The outermost layer.
    #[must_use]
    pub const fn layer(&self) -> &Layer {
        &self.layer
    }

    /// The outermost layer, mutably.
    pub fn layer_mut(&mut self) -> &mut Layer {
        &mut self.layer
    }

    /// The inner chain, if any.
    #[must_use]
    pub fn inner(&self) -> Option<&Self> {
        self.inner.as_deref()
    }

    /// The inner chain, mutably.
    pub fn inner_mut(&mut self) -> Option<&mut Self> {
        self.inner.as_deref_mut()
    }

    /// Replace the inner chain, dropping any previous one.
    pub fn set_inner(&mut self, inner: impl Into<Self>) {
        self.inner = Some(Box::new(inner.into()));
    }

    /// Detach and return the inner chain.
    pub fn release_inner(&mut self) -> Option<Self> {
        self.inner.take().map(|inner| *inner)
    }

    /// Append a chain after the innermost layer.
    pub fn push(&mut self, pdu: impl Into<Self>) {
        match self.inner.as_deref_mut() {
            Some(inner) => inner.push(pdu),
            None => self.set_inner(pdu),
        }
    }

    /// Iterate over every node from this one to the end of the chain.
    pub fn iter(&self) -> impl Iterator<Item = &Self> {
        std::iter::successors(Some(self), |pdu| pdu.inner())
    }

    /// The size of the outermost header.
    #[must_use]
    pub fn header_size(&self) -> u32 {
        self.layer.header_size()
    }

    /// The size of the outermost trailer.
    #[must_use]
    pub fn trailer_size(&self) -> u32 {
        self.layer
            .trailer_size(self.inner().map_or(0, Self::total_size))
    }

    /// The size of the whole chain: every header and every trailer.
    #[must_use]
    pub fn total_size(&self) -> u32 {
        let inner_size = self.inner().map_or(0, Self::total_size);
        self.layer.header_size() + inner_size + self.layer.trailer_size(inner_size)
    }

    /// Serialize the whole chain to its wire format.
    ///
    /// Each layer's inner chain is written before its own header so lengths, type fields and
    /// checksums can be derived from the inner bytes.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0_u8; self.total_size() as usize];
        self.write_into(&mut buf, None)?;
        Ok(buf)
    }

    fn write_into(&self, frame: &mut [u8], parent: Option<&Layer>) -> Result<()> {
        if let Some(inner) = self.inner() {
            let start = self.layer.header_size() as usize;
            let end = start + inner.total_size() as usize;
            inner.write_into(&mut frame[start..end], Some(&self.layer))?;
        }
        self.layer
            .write(frame, self.inner().map(Self::kind), parent)
    }

    /// Find the first layer of type `T` from this node downwards.
    #[must_use]
    pub fn find<T: Protocol>(&self) -> Option<&T> {
        self.iter().find_map(|pdu| T::from_layer(&pdu.layer))
    }

    /// Find the first layer of type `T` from this node downwards, mutably.
    pub fn find_mut<T: Protocol>(&mut self) -> Option<&mut T> {
        self.find_pdu_mut(T::KIND)
            .and_then(|pdu| T::from_layer_mut(&mut pdu.layer))
    }

    /// Find the first node of the given kind from this node downwards.
    #[must_use]
    pub fn find_pdu(&self, kind: PduKind) -> Option<&Self> {
        self.iter().find(|pdu| pdu.kind() == kind)
    }

    /// Find the first node of the given kind from this node downwards, mutably.
    pub fn find_pdu_mut(&mut self, kind: PduKind) -> Option<&mut Self> {
        let mut node = self;
        loop {
            if node.kind() == kind {
                return Some(node);
            }
            node = node.inner.as_deref_mut()?;
        }
    }

    /// Detach the first inner node of the given kind, together with its own inner chain.
    ///
    /// The outermost node itself is never removed.
    pub fn take_inner_of_kind(&mut self, kind: PduKind) -> Option<Self> {
        let mut node = self;
        loop {
            if node.inner.as_ref()?.kind() == kind {
                return node.release_inner();
            }
            node = node.inner.as_deref_mut()?;
        }
    }
}

impl From<Layer> for Pdu {
    fn from(layer: Layer) -> Self {
        Self::new(layer)
    }
}

impl<R: Into<Layer>> Div<R> for Pdu {
    type Output = Self;

    fn div(mut self, rhs: R) -> Self {
        self.push(Self::new(rhs));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HwAddress;
    use std::net::Ipv4Addr;

    fn udp_chain() -> Pdu {
        EthernetII::new(HwAddress::BROADCAST, HwAddress([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]))
            / Ipv4::new(Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::new(192, 168, 0, 1))
            / Udp::new(53, 12345)
            / RawPdu::new(b"test".to_vec())
    }

    #[test]
    fn test_chain_order() {
        let pdu = udp_chain();
        let kinds = pdu.iter().map(Pdu::kind).collect::<Vec<_>>();
        assert_eq!(
            vec![PduKind::EthernetII, PduKind::Ipv4, PduKind::Udp, PduKind::Raw],
            kinds
        );
    }

    #[test]
    fn test_total_size_includes_trailer() {
        let pdu = udp_chain();
        let headers = pdu.iter().map(Pdu::header_size).sum::<u32>();
        assert_eq!(14 + 20 + 8 + 4, headers);
        assert_eq!(60, pdu.total_size());
        assert_eq!(14, pdu.trailer_size());
        assert_eq!(60, pdu.serialize().unwrap().len());
    }

    #[test]
    fn test_find() {
        let pdu = udp_chain();
        assert_eq!(53, pdu.find::<Udp>().unwrap().dport);
        assert!(pdu.find::<crate::tcp::Tcp>().is_none());
        let ip = pdu.find_pdu(PduKind::Ipv4).unwrap();
        assert!(ip.find::<EthernetII>().is_none());
    }

    #[test]
    fn test_find_mut() {
        let mut pdu = udp_chain();
        pdu.find_mut::<Udp>().unwrap().dport = 5353;
        assert_eq!(5353, pdu.find::<Udp>().unwrap().dport);
    }

    #[test]
    fn test_set_inner_replaces_chain() {
        let mut pdu = udp_chain();
        pdu.set_inner(RawPdu::new(vec![1, 2, 3]));
        assert_eq!(2, pdu.iter().count());
        assert!(pdu.find::<Ipv4>().is_none());
    }

    #[test]
    fn test_release_inner() {
        let mut pdu = udp_chain();
        let inner = pdu.release_inner().unwrap();
        assert_eq!(PduKind::Ipv4, inner.kind());
        assert!(pdu.inner().is_none());
        assert_eq!(14 + 46, pdu.total_size());
    }

    #[test]
    fn test_take_inner_of_kind() {
        let mut pdu = udp_chain();
        let udp = pdu.take_inner_of_kind(PduKind::Udp).unwrap();
        assert_eq!(2, udp.iter().count());
        assert_eq!(2, pdu.iter().count());
        assert!(pdu.take_inner_of_kind(PduKind::Tcp).is_none());
    }

    #[test]
    fn test_end_to_end_round_trip() {
        let bytes = udp_chain().serialize().unwrap();
        let reparsed = Pdu::parse::<EthernetII>(&bytes).unwrap();
        assert_eq!(53, reparsed.find::<Udp>().unwrap().dport);
        assert_eq!(12345, reparsed.find::<Udp>().unwrap().sport);
        assert_eq!(b"test", reparsed.find::<RawPdu>().unwrap().payload());
        assert_eq!(
            Ipv4Addr::new(8, 8, 8, 8),
            reparsed.find::<Ipv4>().unwrap().dst
        );
    }

    #[test]
    fn test_truncated_inner_fails_whole_chain() {
        let mut bytes = udp_chain().serialize().unwrap();
        bytes.truncate(14 + 10);
        let err = Pdu::parse::<EthernetII>(&bytes).unwrap_err();
        assert!(matches!(err, Error::MalformedPacket(_)));
    }

    #[test]
    fn test_unknown_payload_is_raw() {
        let eth = EthernetII {
            payload_type: 0x1234,
            ..EthernetII::new(HwAddress::BROADCAST, HwAddress::default())
        };
        let bytes = (eth / RawPdu::new(vec![0xde, 0xad])).serialize().unwrap();
        let pdu = Pdu::parse::<EthernetII>(&bytes).unwrap();
        assert_eq!(0x1234, pdu.find::<EthernetII>().unwrap().payload_type);
        assert_eq!(46, pdu.find::<RawPdu>().unwrap().payload().len());
    }
}
