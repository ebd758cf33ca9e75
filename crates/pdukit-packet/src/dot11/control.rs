use crate::error::{Error, Result};
use crate::HwAddress;

pub const SUBTYPE_BLOCK_ACK_REQUEST: u8 = 8;
pub const SUBTYPE_BLOCK_ACK: u8 = 9;
pub const SUBTYPE_PS_POLL: u8 = 10;
pub const SUBTYPE_RTS: u8 = 11;
pub const SUBTYPE_CTS: u8 = 12;
pub const SUBTYPE_ACK: u8 = 13;
pub const SUBTYPE_CF_END: u8 = 14;
pub const SUBTYPE_CF_END_ACK: u8 = 15;

const BITMAP_SIZE: usize = 8;

/// The body of a control frame.
///
/// The receiver address is the first address of the enclosing frame.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Dot11Control {
    Rts {
        ta: HwAddress,
    },
    Cts,
    Ack,
    PsPoll {
        ta: HwAddress,
    },
    CfEnd {
        ta: HwAddress,
    },
    CfEndAck {
        ta: HwAddress,
    },
    BlockAckRequest {
        ta: HwAddress,
        bar_control: u16,
        start_sequence: u16,
    },
    BlockAck {
        ta: HwAddress,
        bar_control: u16,
        start_sequence: u16,
        bitmap: [u8; BITMAP_SIZE],
    },
    /// A subtype without a body.
    Other(u8),
}

impl Dot11Control {
    #[must_use]
    pub const fn subtype(&self) -> u8 {
        match self {
            Self::Rts { .. } => SUBTYPE_RTS,
            Self::Cts => SUBTYPE_CTS,
            Self::Ack => SUBTYPE_ACK,
            Self::PsPoll { .. } => SUBTYPE_PS_POLL,
            Self::CfEnd { .. } => SUBTYPE_CF_END,
            Self::CfEndAck { .. } => SUBTYPE_CF_END_ACK,
            Self::BlockAckRequest { .. } => SUBTYPE_BLOCK_ACK_REQUEST,
            Self::BlockAck { .. } => SUBTYPE_BLOCK_ACK,
            Self::Other(subtype) => *subtype,
        }
    }

    /// The transmitter address, if the subtype carries one.
    #[must_use]
    pub const fn ta(&self) -> Option<HwAddress> {
        match self {
            Self::Rts { ta }
            | Self::PsPoll { ta }
            | Self::CfEnd { ta }
            | Self::CfEndAck { ta }
            | Self::BlockAckRequest { ta, .. }
            | Self::BlockAck { ta, .. } => Some(*ta),
            Self::Cts | Self::Ack | Self::Other(_) => None,
        }
    }

    /// The size of the body which follows the receiver address.
    #[must_use]
    pub const fn size(&self) -> usize {
        match self {
            Self::Rts { .. } | Self::PsPoll { .. } | Self::CfEnd { .. } | Self::CfEndAck { .. } => {
                HwAddress::SIZE
            }
            Self::BlockAckRequest { .. } => HwAddress::SIZE + 4,
            Self::BlockAck { .. } => HwAddress::SIZE + 4 + BITMAP_SIZE,
            Self::Cts | Self::Ack | Self::Other(_) => 0,
        }
    }

    pub(crate) fn parse(subtype: u8, bytes: &[u8]) -> Result<Self> {
        let le_u16 = |offset: usize| -> Result<u16> {
            bytes
                .get(offset..offset + 2)
                .map(|val| u16::from_le_bytes([val[0], val[1]]))
                .ok_or_else(|| {
                    Error::InsufficientPacketBuffer(
                        String::from("Dot11Control"),
                        offset + 2,
                        bytes.len(),
                    )
                })
        };
        let control = match subtype {
            SUBTYPE_RTS => Self::Rts {
                ta: HwAddress::from_slice(bytes)?,
            },
            SUBTYPE_CTS => Self::Cts,
            SUBTYPE_ACK => Self::Ack,
            SUBTYPE_PS_POLL => Self::PsPoll {
                ta: HwAddress::from_slice(bytes)?,
            },
            SUBTYPE_CF_END => Self::CfEnd {
                ta: HwAddress::from_slice(bytes)?,
            },
            SUBTYPE_CF_END_ACK => Self::CfEndAck {
                ta: HwAddress::from_slice(bytes)?,
            },
            SUBTYPE_BLOCK_ACK_REQUEST => Self::BlockAckRequest {
                ta: HwAddress::from_slice(bytes)?,
                bar_control: le_u16(6)?,
                start_sequence: le_u16(8)?,
            },
            SUBTYPE_BLOCK_ACK => {
                let bitmap = bytes
                    .get(10..10 + BITMAP_SIZE)
                    .and_then(|bitmap| <[u8; BITMAP_SIZE]>::try_from(bitmap).ok())
                    .ok_or_else(|| {
                        Error::InsufficientPacketBuffer(
                            String::from("Dot11Control"),
                            10 + BITMAP_SIZE,
                            bytes.len(),
                        )
                    })?;
                Self::BlockAck {
                    ta: HwAddress::from_slice(bytes)?,
                    bar_control: le_u16(6)?,
                    start_sequence: le_u16(8)?,
                    bitmap,
                }
            }
            subtype => Self::Other(subtype),
        };
        Ok(control)
    }

    pub(crate) fn write(&self, buf: &mut [u8]) {
        if let Some(ta) = self.ta() {
            buf[0..6].copy_from_slice(&ta.octets());
        }
        match self {
            Self::BlockAckRequest {
                bar_control,
                start_sequence,
                ..
            } => {
                buf[6..8].copy_from_slice(&bar_control.to_le_bytes());
                buf[8..10].copy_from_slice(&start_sequence.to_le_bytes());
            }
            Self::BlockAck {
                bar_control,
                start_sequence,
                bitmap,
                ..
            } => {
                buf[6..8].copy_from_slice(&bar_control.to_le_bytes());
                buf[8..10].copy_from_slice(&start_sequence.to_le_bytes());
                buf[10..10 + BITMAP_SIZE].copy_from_slice(bitmap);
            }
            _ => {}
        }
    }
}
