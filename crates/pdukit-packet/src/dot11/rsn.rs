use crate::error::{Error, Result};

/// A cipher suite selector, the little-endian value of an `OUI` followed by a suite type.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum CipherSuite {
    Wep40,
    Tkip,
    Ccmp,
    Wep104,
    Other(u32),
}

impl CipherSuite {
    #[must_use]
    pub const fn id(self) -> u32 {
        match self {
            Self::Wep40 => 0x01ac_0f00,
            Self::Tkip => 0x02ac_0f00,
            Self::Ccmp => 0x04ac_0f00,
            Self::Wep104 => 0x05ac_0f00,
            Self::Other(id) => id,
        }
    }
}

impl From<u32> for CipherSuite {
    fn from(id: u32) -> Self {
        match id {
            0x01ac_0f00 => Self::Wep40,
            0x02ac_0f00 => Self::Tkip,
            0x04ac_0f00 => Self::Ccmp,
            0x05ac_0f00 => Self::Wep104,
            id => Self::Other(id),
        }
    }
}

/// An authentication and key management suite selector.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum AkmSuite {
    /// 802.1X authentication.
    Pmksa,
    /// Pre-shared key.
    Psk,
    Other(u32),
}

impl AkmSuite {
    #[must_use]
    pub const fn id(self) -> u32 {
        match self {
            Self::Pmksa => 0x01ac_0f00,
            Self::Psk => 0x02ac_0f00,
            Self::Other(id) => id,
        }
    }
}

impl From<u32> for AkmSuite {
    fn from(id: u32) -> Self {
        match id {
            0x01ac_0f00 => Self::Pmksa,
            0x02ac_0f00 => Self::Psk,
            id => Self::Other(id),
        }
    }
}

/// The `RSN` information element.
///
/// Every field is little-endian on the wire.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RsnInformation {
    pub version: u16,
    pub group_suite: CipherSuite,
    pub pairwise_ciphers: Vec<CipherSuite>,
    pub akm_ciphers: Vec<AkmSuite>,
    pub capabilities: u16,
}

impl Default for RsnInformation {
    fn default() -> Self {
        Self {
            version: 1,
            group_suite: CipherSuite::Other(0),
            pairwise_ciphers: Vec::new(),
            akm_ciphers: Vec::new(),
            capabilities: 0,
        }
    }
}

impl RsnInformation {
    /// The element advertised by a `WPA2` personal network.
    #[must_use]
    pub fn wpa2_psk() -> Self {
        Self {
            group_suite: CipherSuite::Ccmp,
            pairwise_ciphers: vec![CipherSuite::Ccmp],
            akm_ciphers: vec![AkmSuite::Psk],
            ..Self::default()
        }
    }

    /// Decode the value of an `RSN` information option with the given tag.
    pub fn parse(tag: u8, bytes: &[u8]) -> Result<Self> {
        let mut reader = LeReader { bytes, tag };
        let version = reader.u16()?;
        let group_suite = CipherSuite::from(reader.u32()?);
        let pairwise_count = reader.u16()?;
        let pairwise_ciphers = (0..pairwise_count)
            .map(|_| reader.u32().map(CipherSuite::from))
            .collect::<Result<Vec<_>>>()?;
        let akm_count = reader.u16()?;
        let akm_ciphers = (0..akm_count)
            .map(|_| reader.u32().map(AkmSuite::from))
            .collect::<Result<Vec<_>>>()?;
        let capabilities = reader.u16()?;
        Ok(Self {
            version,
            group_suite,
            pairwise_ciphers,
            akm_ciphers,
            capabilities,
        })
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes =
            Vec::with_capacity(12 + 4 * (self.pairwise_ciphers.len() + self.akm_ciphers.len()));
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(&self.group_suite.id().to_le_bytes());
        bytes.extend_from_slice(&(self.pairwise_ciphers.len() as u16).to_le_bytes());
        for cipher in &self.pairwise_ciphers {
            bytes.extend_from_slice(&cipher.id().to_le_bytes());
        }
        bytes.extend_from_slice(&(self.akm_ciphers.len() as u16).to_le_bytes());
        for akm in &self.akm_ciphers {
            bytes.extend_from_slice(&akm.id().to_le_bytes());
        }
        bytes.extend_from_slice(&self.capabilities.to_le_bytes());
        bytes
    }
}

struct LeReader<'a> {
    bytes: &'a [u8],
    tag: u8,
}

impl LeReader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let value = self
            .bytes
            .get(..N)
            .and_then(|bytes| <[u8; N]>::try_from(bytes).ok())
            .ok_or(Error::MalformedOption(self.tag))?;
        self.bytes = &self.bytes[N..];
        Ok(value)
    }

    fn u16(&mut self) -> Result<u16> {
        self.take().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32> {
        self.take().map(u32::from_le_bytes)
    }
}
