use crate::error::{Error, Result};
use itertools::Itertools;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// A 48-bit IEEE 802 hardware address.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct HwAddress(pub [u8; 6]);

impl HwAddress {
    /// The broadcast address `ff:ff:ff:ff:ff:ff`.
    pub const BROADCAST: Self = Self([0xff; 6]);

    /// The size of an address in bytes.
    pub const SIZE: usize = 6;

    /// Read an address from the first 6 bytes of a slice.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        bytes
            .get(..Self::SIZE)
            .and_then(|addr| <[u8; 6]>::try_from(addr).ok())
            .map(Self)
            .ok_or_else(|| {
                Error::InsufficientPacketBuffer(String::from("HwAddress"), Self::SIZE, bytes.len())
            })
    }

    #[must_use]
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Whether the group bit of the first octet is set.
    #[must_use]
    pub const fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }

    #[must_use]
    pub const fn is_unicast(&self) -> bool {
        !self.is_multicast()
    }
}

impl From<[u8; 6]> for HwAddress {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl FromStr for HwAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidAddress(s.to_string());
        let mut octets = [0_u8; 6];
        let mut parts = s.split([':', '-']);
        for octet in &mut octets {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || part.len() > 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(octets))
    }
}

impl Display for HwAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02x}", self.0.iter().format(":"))
    }
}

impl Debug for HwAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "HwAddress({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("aa:bb:cc:dd:ee:ff", [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]; "colon separated")]
    #[test_case("00-11-22-33-44-55", [0x00, 0x11, 0x22, 0x33, 0x44, 0x55]; "dash separated")]
    #[test_case("0:1:2:3:4:5", [0, 1, 2, 3, 4, 5]; "single digits")]
    fn test_parse(input: &str, expected: [u8; 6]) {
        assert_eq!(HwAddress(expected), HwAddress::from_str(input).unwrap());
    }

    #[test_case(""; "empty")]
    #[test_case("aa:bb:cc:dd:ee"; "too short")]
    #[test_case("aa:bb:cc:dd:ee:ff:00"; "too long")]
    #[test_case("aa:bb:cc:dd:ee:fg"; "bad digit")]
    #[test_case("aaa:bb:cc:dd:ee:ff"; "wide octet")]
    fn test_parse_invalid(input: &str) {
        assert_eq!(
            Err(Error::InvalidAddress(input.to_string())),
            HwAddress::from_str(input)
        );
    }

    #[test]
    fn test_display() {
        let addr = HwAddress([0x00, 0x1b, 0x11, 0xaa, 0x0f, 0xff]);
        assert_eq!("00:1b:11:aa:0f:ff", addr.to_string());
        assert_eq!("HwAddress(00:1b:11:aa:0f:ff)", format!("{addr:?}"));
    }

    #[test]
    fn test_classification() {
        assert!(HwAddress::BROADCAST.is_broadcast());
        assert!(HwAddress::BROADCAST.is_multicast());
        assert!(HwAddress([0x01, 0, 0x5e, 0, 0, 1]).is_multicast());
        assert!(HwAddress([0x00, 0x1b, 0x11, 0, 0, 1]).is_unicast());
    }

    #[test]
    fn test_from_slice() {
        let bytes = [1, 2, 3, 4, 5, 6, 7];
        assert_eq!(
            HwAddress([1, 2, 3, 4, 5, 6]),
            HwAddress::from_slice(&bytes).unwrap()
        );
        assert!(HwAddress::from_slice(&bytes[..5]).is_err());
    }
}
