use crate::dot11::{FrameFlags, SequenceHeader};
use crate::error::{Error, Result};

pub const SUBTYPE_DATA: u8 = 0;
pub const SUBTYPE_NULL: u8 = 4;
pub const SUBTYPE_QOS_DATA: u8 = 8;
pub const SUBTYPE_QOS_NULL: u8 = 12;

const QOS_SUBTYPE_BIT: u8 = 0x08;
const QOS_CONTROL_SIZE: usize = 2;

/// The header of a data frame.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Dot11Data {
    pub subtype: u8,
    pub header: SequenceHeader,
    /// Only written by `QoS` subtypes.
    pub qos_control: u16,
}

impl Dot11Data {
    #[must_use]
    pub fn new(subtype: u8, header: SequenceHeader) -> Self {
        Self {
            subtype,
            header,
            qos_control: 0,
        }
    }

    #[must_use]
    pub const fn is_qos(&self) -> bool {
        self.subtype & QOS_SUBTYPE_BIT != 0
    }

    /// The traffic identifier of a `QoS` frame.
    #[must_use]
    pub const fn tid(&self) -> u8 {
        (self.qos_control & 0x0f) as u8
    }

    pub(crate) const fn size(&self, flags: FrameFlags) -> usize {
        SequenceHeader::size(flags) + if self.is_qos() { QOS_CONTROL_SIZE } else { 0 }
    }

    pub(crate) fn parse(subtype: u8, bytes: &[u8], flags: FrameFlags) -> Result<Self> {
        let header = SequenceHeader::parse(bytes, flags)?;
        let mut data = Self::new(subtype, header);
        if data.is_qos() {
            let offset = SequenceHeader::size(flags);
            data.qos_control = bytes
                .get(offset..offset + QOS_CONTROL_SIZE)
                .map(|qos| u16::from_le_bytes([qos[0], qos[1]]))
                .ok_or_else(|| {
                    Error::InsufficientPacketBuffer(
                        String::from("Dot11Data"),
                        offset + QOS_CONTROL_SIZE,
                        bytes.len(),
                    )
                })?;
        }
        Ok(data)
    }

    pub(crate) fn write(&self, buf: &mut [u8], flags: FrameFlags) {
        self.header.write(buf, flags);
        if self.is_qos() {
            let offset = SequenceHeader::size(flags);
            buf[offset..offset + QOS_CONTROL_SIZE].copy_from_slice(&self.qos_control.to_le_bytes());
        }
    }
}
