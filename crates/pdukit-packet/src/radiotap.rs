use crate::error::{Error, Result};
use crate::fmt_payload;
use crate::pdu::{Decoded, Layer, PduKind, Protocol};
use bitflags::bitflags;
use std::fmt::{Debug, Formatter};

const LENGTH_OFFSET: usize = 2;
const PRESENT_OFFSET: usize = 4;
const MINIMUM_HEADER_SIZE: usize = 8;
const FCS_SIZE: usize = 4;
const EXT_BIT: u32 = 1 << 31;

/// Present flag bits of the fields which can be read.
pub mod field {
    pub const TSFT: u32 = 0;
    pub const FLAGS: u32 = 1;
    pub const RATE: u32 = 2;
    pub const CHANNEL: u32 = 3;
    pub const DBM_SIGNAL: u32 = 5;
    pub const DBM_NOISE: u32 = 6;
    pub const ANTENNA: u32 = 11;
}

/// The (size, alignment) of each field of the first present word, in bit order.
const FIELD_LAYOUT: [(usize, usize); 15] = [
    (8, 8),
    (1, 1),
    (1, 1),
    (4, 2),
    (2, 1),
    (1, 1),
    (1, 1),
    (2, 2),
    (2, 2),
    (2, 2),
    (1, 1),
    (1, 1),
    (1, 1),
    (1, 1),
    (2, 2),
];

bitflags! {
    /// The `flags` field.
    #[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
    pub struct RadioTapFlags: u8 {
        const CFP = 0x01;
        const SHORT_PREAMBLE = 0x02;
        const WEP = 0x04;
        const FRAGMENTATION = 0x08;
        /// The frame is followed by its 4 byte `FCS`.
        const FCS = 0x10;
        const DATA_PAD = 0x20;
        const FAILED_FCS = 0x40;
    }
}

/// A `RadioTap` layer.
///
/// The header is carried through unchanged apart from its length field, the fields which are
/// commonly needed can be read with the accessor methods. All fields are little-endian.
#[derive(Clone, Eq, PartialEq)]
pub struct RadioTap {
    header: Vec<u8>,
}

impl Default for RadioTap {
    fn default() -> Self {
        Self {
            header: vec![0, 0, MINIMUM_HEADER_SIZE as u8, 0, 0, 0, 0, 0],
        }
    }
}

impl RadioTap {
    /// A header carrying only the `flags` field.
    #[must_use]
    pub fn with_flags(flags: RadioTapFlags) -> Self {
        let mut header = Self::default().header;
        header[PRESENT_OFFSET..PRESENT_OFFSET + 4]
            .copy_from_slice(&(1_u32 << field::FLAGS).to_le_bytes());
        header.push(flags.bits());
        let len = header.len() as u16;
        header[LENGTH_OFFSET..LENGTH_OFFSET + 2].copy_from_slice(&len.to_le_bytes());
        Self { header }
    }

    /// The raw header bytes.
    #[must_use]
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    #[must_use]
    pub fn version(&self) -> u8 {
        self.header[0]
    }

    /// The first present word.
    #[must_use]
    pub fn present(&self) -> u32 {
        u32::from_le_bytes([
            self.header[PRESENT_OFFSET],
            self.header[PRESENT_OFFSET + 1],
            self.header[PRESENT_OFFSET + 2],
            self.header[PRESENT_OFFSET + 3],
        ])
    }

    #[must_use]
    pub fn tsft(&self) -> Option<u64> {
        self.field(field::TSFT)
            .and_then(|val| <[u8; 8]>::try_from(val).ok())
            .map(u64::from_le_bytes)
    }

    #[must_use]
    pub fn flags(&self) -> Option<RadioTapFlags> {
        self.field(field::FLAGS)
            .map(|val| RadioTapFlags::from_bits_retain(val[0]))
    }

    /// The rate in units of 500 kbps.
    #[must_use]
    pub fn rate(&self) -> Option<u8> {
        self.field(field::RATE).map(|val| val[0])
    }

    /// The channel frequency in MHz and the channel flags.
    #[must_use]
    pub fn channel(&self) -> Option<(u16, u16)> {
        self.field(field::CHANNEL).map(|val| {
            (
                u16::from_le_bytes([val[0], val[1]]),
                u16::from_le_bytes([val[2], val[3]]),
            )
        })
    }

    #[must_use]
    pub fn dbm_signal(&self) -> Option<i8> {
        self.field(field::DBM_SIGNAL)
            .map(|val| i8::from_le_bytes([val[0]]))
    }

    #[must_use]
    pub fn dbm_noise(&self) -> Option<i8> {
        self.field(field::DBM_NOISE)
            .map(|val| i8::from_le_bytes([val[0]]))
    }

    #[must_use]
    pub fn antenna(&self) -> Option<u8> {
        self.field(field::ANTENNA).map(|val| val[0])
    }

    /// Whether the frame is followed by its `FCS`.
    #[must_use]
    pub fn has_fcs(&self) -> bool {
        self.flags()
            .is_some_and(|flags| flags.contains(RadioTapFlags::FCS))
    }

    /// The offset of the first field, after every present word.
    fn fields_offset(header: &[u8]) -> Option<usize> {
        let mut offset = PRESENT_OFFSET;
        loop {
            let word = header.get(offset..offset + 4)?;
            offset += 4;
            if u32::from_le_bytes([word[0], word[1], word[2], word[3]]) & EXT_BIT == 0 {
                return Some(offset);
            }
        }
    }

    fn field(&self, bit: u32) -> Option<&[u8]> {
        let present = self.present();
        if present & (1 << bit) == 0 {
            return None;
        }
        let mut offset = Self::fields_offset(&self.header)?;
        for (index, (size, align)) in FIELD_LAYOUT.iter().enumerate() {
            if present & (1 << index) == 0 {
                continue;
            }
            offset = offset.next_multiple_of(*align);
            if index as u32 == bit {
                return self.header.get(offset..offset + size);
            }
            offset += size;
        }
        None
    }
}

impl Debug for RadioTap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadioTap")
            .field("version", &self.version())
            .field("present", &format_args!("{:#010x}", self.present()))
            .field("flags", &self.flags())
            .field("header", &fmt_payload(&self.header))
            .finish()
    }
}

impl Protocol for RadioTap {
    const KIND: PduKind = PduKind::RadioTap;

    fn header_size(&self) -> u32 {
        self.header.len() as u32
    }

    fn trailer_size(&self, _inner_size: u32) -> u32 {
        if self.has_fcs() {
            FCS_SIZE as u32
        } else {
            0
        }
    }

    fn write(&self, frame: &mut [u8], _: Option<PduKind>, _: Option<&Layer>) -> Result<()> {
        let header_size = self.header.len();
        let length = u16::try_from(header_size)
            .map_err(|_| {
                Error::MalformedPacket(format!("RadioTap header of {header_size} bytes"))
            })?;
        frame[..header_size].copy_from_slice(&self.header);
        frame[LENGTH_OFFSET..LENGTH_OFFSET + 2].copy_from_slice(&length.to_le_bytes());
        if self.has_fcs() {
            let fcs_offset = frame.len() - FCS_SIZE;
            let fcs = crc32fast::hash(&frame[header_size..fcs_offset]);
            frame[fcs_offset..].copy_from_slice(&fcs.to_le_bytes());
        }
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Decoded<'_, Self>> {
        if bytes.len() < MINIMUM_HEADER_SIZE {
            return Err(Error::InsufficientPacketBuffer(
                String::from("RadioTap"),
                MINIMUM_HEADER_SIZE,
                bytes.len(),
            ));
        }
        let length = usize::from(u16::from_le_bytes([
            bytes[LENGTH_OFFSET],
            bytes[LENGTH_OFFSET + 1],
        ]));
        if length < MINIMUM_HEADER_SIZE || length > bytes.len() {
            return Err(Error::MalformedPacket(format!(
                "RadioTap length {length} with {} bytes available",
                bytes.len()
            )));
        }
        let header = bytes[..length].to_vec();
        if Self::fields_offset(&header).is_none() {
            return Err(Error::MalformedPacket(String::from(
                "RadioTap present words exceed the header",
            )));
        }
        let radiotap = Self { header };
        let mut end = bytes.len();
        if let Some(flags) = radiotap.flags() {
            if flags.contains(RadioTapFlags::FCS) {
                if end - length < FCS_SIZE {
                    return Err(Error::MalformedPacket(String::from(
                        "RadioTap frame too short for its FCS",
                    )));
                }
                if flags.contains(RadioTapFlags::FAILED_FCS) {
                    return Err(Error::MalformedPacket(String::from(
                        "RadioTap frame with a failed FCS",
                    )));
                }
                end -= FCS_SIZE;
            }
        }
        Ok(Decoded::new(
            radiotap,
            &bytes[length..end],
            Some(PduKind::Dot11),
        ))
    }

    fn from_layer(layer: &Layer) -> Option<&Self> {
        match layer {
            Layer::RadioTap(radiotap) => Some(radiotap),
            _ => None,
        }
    }

    fn from_layer_mut(layer: &mut Layer) -> Option<&mut Self> {
        match layer {
            Layer::RadioTap(radiotap) => Some(radiotap),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dot11::{Dot11, Dot11Control, Dot11Frame};
    use crate::raw::RawPdu;
    use crate::{HwAddress, Pdu};
    use hex_literal::hex;

    const CAPTURED: [u8; 38] = hex!(
        "00 00 18 00 2f 08 00 00 01 00 00 00 00 00 00 00"
        "10 02 6c 09 a0 00 ce 01 d4 00 00 00 00 01 02 03"
        "04 05 de ad be ef"
    );

    #[test]
    fn test_fields() {
        let decoded = RadioTap::decode(&CAPTURED).unwrap();
        let radiotap = decoded.header;
        assert_eq!(0, radiotap.version());
        assert_eq!(24, radiotap.header_size());
        assert_eq!(Some(1), radiotap.tsft());
        assert_eq!(Some(RadioTapFlags::FCS), radiotap.flags());
        assert_eq!(Some(2), radiotap.rate());
        assert_eq!(Some((2412, 0x00a0)), radiotap.channel());
        assert_eq!(Some(-50), radiotap.dbm_signal());
        assert_eq!(None, radiotap.dbm_noise());
        assert_eq!(Some(1), radiotap.antenna());
        assert_eq!(10, decoded.payload.len());
    }

    #[test]
    fn test_fcs_is_stripped() {
        let pdu = Pdu::parse::<RadioTap>(&CAPTURED).unwrap();
        let dot11 = pdu.find::<Dot11>().unwrap();
        assert_eq!(Some(&Dot11Control::Ack), dot11.control());
        assert!(pdu.find::<RawPdu>().is_none());
    }

    #[test]
    fn test_failed_fcs() {
        let mut buf = CAPTURED;
        buf[16] = (RadioTapFlags::FCS | RadioTapFlags::FAILED_FCS).bits();
        assert!(matches!(
            Pdu::parse::<RadioTap>(&buf),
            Err(Error::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_extended_present_words() {
        let buf = hex!("00 00 0d 00 02 00 00 80 00 00 00 00 00 d4 00 00 00 00 01 02 03 04 05");
        let pdu = Pdu::parse::<RadioTap>(&buf).unwrap();
        let radiotap = pdu.find::<RadioTap>().unwrap();
        assert_eq!(Some(RadioTapFlags::empty()), radiotap.flags());
        assert!(pdu.find::<Dot11>().is_some());
    }

    #[test]
    fn test_bad_length() {
        let buf = hex!("00 00 40 00 00 00 00 00 00 00");
        assert!(matches!(
            Pdu::parse::<RadioTap>(&buf),
            Err(Error::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_write_appends_fcs() {
        let ack = Dot11::new(
            HwAddress([0, 1, 2, 3, 4, 5]),
            Dot11Frame::Control(Dot11Control::Ack),
        );
        let pdu = RadioTap::with_flags(RadioTapFlags::FCS) / ack;
        assert_eq!(9 + 10 + 4, pdu.total_size());
        let bytes = pdu.serialize().unwrap();
        assert_eq!(hex!("00 00 09 00 02 00 00 00 10"), bytes[..9]);
        let fcs = crc32fast::hash(&bytes[9..19]);
        assert_eq!(fcs.to_le_bytes(), bytes[19..]);
        let reparsed = Pdu::parse::<RadioTap>(&bytes).unwrap();
        assert!(reparsed.find::<Dot11>().is_some());
        assert!(reparsed.find::<RawPdu>().is_none());
    }
}
