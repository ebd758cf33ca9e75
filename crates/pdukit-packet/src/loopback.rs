use crate::error::{Error, Result};
use crate::pdu::{Decoded, Layer, PduKind, Protocol};

/// `AF_INET`.
pub const FAMILY_INET: u32 = 2;

/// `AF_INET6` as written by `NetBSD` and `OpenBSD`.
pub const FAMILY_INET6_BSD: u32 = 24;

/// `AF_INET6` as written by `FreeBSD`.
pub const FAMILY_INET6_FREEBSD: u32 = 28;

/// `AF_INET6` as written by macOS.
pub const FAMILY_INET6_DARWIN: u32 = 30;

const HEADER_SIZE: usize = 4;

/// A BSD loopback (`DLT_NULL`) layer.
///
/// The family is stored in the byte order of the capturing host. It is decoded as little-endian
/// unless that yields a value which cannot be a family, in which case big-endian is used. It is
/// always written little-endian.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Loopback {
    /// The family used when the inner layer has no known family.
    pub family: u32,
}

impl Loopback {
    #[must_use]
    pub const fn new(family: u32) -> Self {
        Self { family }
    }

    const fn family_for(inner: Option<PduKind>, current: u32) -> u32 {
        match inner {
            Some(PduKind::Ipv4) => FAMILY_INET,
            Some(PduKind::Ipv6) => match current {
                FAMILY_INET6_BSD | FAMILY_INET6_FREEBSD | FAMILY_INET6_DARWIN => current,
                _ => FAMILY_INET6_BSD,
            },
            _ => current,
        }
    }

    const fn next_kind(family: u32) -> Option<PduKind> {
        match family {
            FAMILY_INET => Some(PduKind::Ipv4),
            FAMILY_INET6_BSD | FAMILY_INET6_FREEBSD | FAMILY_INET6_DARWIN => Some(PduKind::Ipv6),
            _ => None,
        }
    }
}

impl Protocol for Loopback {
    const KIND: PduKind = PduKind::Loopback;

    fn header_size(&self) -> u32 {
        HEADER_SIZE as u32
    }

    fn write(&self, frame: &mut [u8], inner: Option<PduKind>, _: Option<&Layer>) -> Result<()> {
        let family = Self::family_for(inner, self.family);
        let available = frame.len();
        frame
            .get_mut(..HEADER_SIZE)
            .ok_or_else(|| {
                Error::InsufficientPacketBuffer(String::from("Loopback"), HEADER_SIZE, available)
            })?
            .copy_from_slice(&family.to_le_bytes());
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Decoded<'_, Self>> {
        let raw: [u8; HEADER_SIZE] = bytes
            .get(..HEADER_SIZE)
            .and_then(|family| family.try_into().ok())
            .ok_or_else(|| {
                Error::InsufficientPacketBuffer(String::from("Loopback"), HEADER_SIZE, bytes.len())
            })?;
        let family = match u32::from_le_bytes(raw) {
            family if family > 0xffff => u32::from_be_bytes(raw),
            family => family,
        };
        Ok(Decoded::new(
            Self::new(family),
            &bytes[HEADER_SIZE..],
            Self::next_kind(family),
        ))
    }

    fn from_layer(layer: &Layer) -> Option<&Self> {
        match layer {
            Layer::Loopback(lo) => Some(lo),
            _ => None,
        }
    }

    fn from_layer_mut(layer: &mut Layer) -> Option<&mut Self> {
        match layer {
            Layer::Loopback(lo) => Some(lo),
            _ => None,
        }
    }
}
