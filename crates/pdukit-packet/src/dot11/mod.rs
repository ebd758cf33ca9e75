//! `IEEE 802.11` frames.
//!
//! A [`Dot11`] layer holds the fields common to every frame (frame control, duration and the
//! first address) plus a [`Dot11Frame`] which holds the fields specific to the frame type:
//!
//! - management frames carry a subtype specific set of fixed fields followed by a tagged
//!   option list, see [`mgmt`]
//! - control frames carry up to one extra address and some block ack fields, see [`control`]
//! - data frames carry a sequence header, an optional `QoS` control field and an `LLC/SNAP`
//!   payload (or an opaque payload when protected), see [`data`]
//!
//! Multi-byte fields of the 802.11 header are little-endian on the wire.

pub mod control;
pub mod data;
pub mod mgmt;
pub mod rsn;

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::pdu::{Decoded, Layer, PduKind, Protocol};
use crate::{fmt_payload, HwAddress};
use bitflags::bitflags;
use std::fmt::{Debug, Formatter};

pub use control::Dot11Control;
pub use data::Dot11Data;
pub use mgmt::{Dot11Management, Dot11Options, ManagementFixed};
pub use rsn::{AkmSuite, CipherSuite, RsnInformation};

/// The management frame type.
pub const TYPE_MANAGEMENT: u8 = 0;

/// The control frame type.
pub const TYPE_CONTROL: u8 = 1;

/// The data frame type.
pub const TYPE_DATA: u8 = 2;

const FRAME_CONTROL_OFFSET: usize = 0;
const FLAGS_OFFSET: usize = 1;
const DURATION_ID_OFFSET: usize = 2;
const ADDR1_OFFSET: usize = 4;

/// The size of the fields shared by every frame.
pub const BASE_HEADER_SIZE: usize = 10;

bitflags! {
    /// The second byte of the frame control field.
    #[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
    pub struct FrameFlags: u8 {
        const TO_DS = 0x01;
        const FROM_DS = 0x02;
        const MORE_FRAG = 0x04;
        const RETRY = 0x08;
        const POWER_MGMT = 0x10;
        const MORE_DATA = 0x20;
        const PROTECTED = 0x40;
        const ORDER = 0x80;
    }
}

impl FrameFlags {
    /// Whether both distribution system bits are set, in which case the frame carries a fourth
    /// address.
    #[must_use]
    pub const fn is_wds(self) -> bool {
        self.contains(Self::TO_DS.union(Self::FROM_DS))
    }
}

/// Represents the fields shared by every `IEEE 802.11` frame.
pub struct Dot11Packet<'a> {
    buf: Buffer<'a>,
}

impl<'a> Dot11Packet<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        let buf = Buffer::mutable("Dot11Packet", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        let buf = Buffer::view("Dot11Packet", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        BASE_HEADER_SIZE
    }

    #[must_use]
    pub fn get_protocol(&self) -> u8 {
        self.buf.read(FRAME_CONTROL_OFFSET) & 0x03
    }

    #[must_use]
    pub fn get_frame_type(&self) -> u8 {
        (self.buf.read(FRAME_CONTROL_OFFSET) >> 2) & 0x03
    }

    #[must_use]
    pub fn get_subtype(&self) -> u8 {
        self.buf.read(FRAME_CONTROL_OFFSET) >> 4
    }

    #[must_use]
    pub fn get_flags(&self) -> FrameFlags {
        FrameFlags::from_bits_retain(self.buf.read(FLAGS_OFFSET))
    }

    #[must_use]
    pub fn get_duration_id(&self) -> u16 {
        u16::from_le_bytes(self.buf.get_bytes(DURATION_ID_OFFSET))
    }

    #[must_use]
    pub fn get_addr1(&self) -> HwAddress {
        HwAddress(self.buf.get_bytes(ADDR1_OFFSET))
    }

    pub fn set_frame_control(&mut self, protocol: u8, frame_type: u8, subtype: u8) {
        *self.buf.write(FRAME_CONTROL_OFFSET) =
            (protocol & 0x03) | ((frame_type & 0x03) << 2) | ((subtype & 0x0f) << 4);
    }

    pub fn set_flags(&mut self, val: FrameFlags) {
        *self.buf.write(FLAGS_OFFSET) = val.bits();
    }

    pub fn set_duration_id(&mut self, val: u16) {
        self.buf.set_bytes(DURATION_ID_OFFSET, val.to_le_bytes());
    }

    pub fn set_addr1(&mut self, val: HwAddress) {
        self.buf.set_bytes(ADDR1_OFFSET, val.octets());
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }

    /// The bytes following the shared fields.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.buf.as_slice()[BASE_HEADER_SIZE..]
    }
}

impl Debug for Dot11Packet<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dot11Packet")
            .field("protocol", &self.get_protocol())
            .field("frame_type", &self.get_frame_type())
            .field("subtype", &self.get_subtype())
            .field("flags", &self.get_flags())
            .field("duration_id", &self.get_duration_id())
            .field("addr1", &self.get_addr1())
            .field("body", &fmt_payload(self.body()))
            .finish()
    }
}

/// The addresses and sequence control shared by management and data frames.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct SequenceHeader {
    pub addr2: HwAddress,
    pub addr3: HwAddress,
    /// The 4-bit fragment number.
    pub frag_num: u8,
    /// The 12-bit sequence number.
    pub seq_num: u16,
    /// Only written when both distribution system flags are set.
    pub addr4: HwAddress,
}

impl SequenceHeader {
    #[must_use]
    pub const fn size(flags: FrameFlags) -> usize {
        if flags.is_wds() {
            20
        } else {
            14
        }
    }

    /// The sequence control field.
    #[must_use]
    pub const fn sequence_control(&self) -> u16 {
        (self.frag_num as u16 & 0x0f) | (self.seq_num << 4)
    }

    pub(crate) fn parse(bytes: &[u8], flags: FrameFlags) -> Result<Self> {
        if bytes.len() < Self::size(flags) {
            return Err(Error::InsufficientPacketBuffer(
                String::from("SequenceHeader"),
                Self::size(flags),
                bytes.len(),
            ));
        }
        let sequence_control = u16::from_le_bytes([bytes[12], bytes[13]]);
        Ok(Self {
            addr2: HwAddress::from_slice(&bytes[0..6])?,
            addr3: HwAddress::from_slice(&bytes[6..12])?,
            frag_num: (sequence_control & 0x0f) as u8,
            seq_num: sequence_control >> 4,
            addr4: if flags.is_wds() {
                HwAddress::from_slice(&bytes[14..20])?
            } else {
                HwAddress::default()
            },
        })
    }

    pub(crate) fn write(&self, buf: &mut [u8], flags: FrameFlags) {
        buf[0..6].copy_from_slice(&self.addr2.octets());
        buf[6..12].copy_from_slice(&self.addr3.octets());
        buf[12..14].copy_from_slice(&self.sequence_control().to_le_bytes());
        if flags.is_wds() {
            buf[14..20].copy_from_slice(&self.addr4.octets());
        }
    }
}

/// The type specific part of an `IEEE 802.11` frame.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Dot11Frame {
    Management(Dot11Management),
    Control(Dot11Control),
    Data(Dot11Data),
    /// A frame of a reserved type, only the shared fields are decoded.
    Other { frame_type: u8, subtype: u8 },
}

impl Dot11Frame {
    #[must_use]
    pub const fn frame_type(&self) -> u8 {
        match self {
            Self::Management(_) => TYPE_MANAGEMENT,
            Self::Control(_) => TYPE_CONTROL,
            Self::Data(_) => TYPE_DATA,
            Self::Other { frame_type, .. } => *frame_type,
        }
    }

    #[must_use]
    pub const fn subtype(&self) -> u8 {
        match self {
            Self::Management(mgmt) => mgmt.fixed.subtype(),
            Self::Control(control) => control.subtype(),
            Self::Data(data) => data.subtype,
            Self::Other { subtype, .. } => *subtype,
        }
    }

    fn body_size(&self, flags: FrameFlags) -> usize {
        match self {
            Self::Management(mgmt) => mgmt.size(flags),
            Self::Control(control) => control.size(),
            Self::Data(data) => data.size(flags),
            Self::Other { .. } => 0,
        }
    }

    fn write(&self, buf: &mut [u8], flags: FrameFlags) -> Result<()> {
        match self {
            Self::Management(mgmt) => mgmt.write(buf, flags),
            Self::Control(control) => {
                control.write(buf);
                Ok(())
            }
            Self::Data(data) => {
                data.write(buf, flags);
                Ok(())
            }
            Self::Other { .. } => Ok(()),
        }
    }
}

/// An `IEEE 802.11` layer.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Dot11 {
    pub protocol: u8,
    pub flags: FrameFlags,
    pub duration_id: u16,
    pub addr1: HwAddress,
    pub frame: Dot11Frame,
}

impl Dot11 {
    #[must_use]
    pub const fn new(addr1: HwAddress, frame: Dot11Frame) -> Self {
        Self {
            protocol: 0,
            flags: FrameFlags::empty(),
            duration_id: 0,
            addr1,
            frame,
        }
    }

    #[must_use]
    pub const fn frame_type(&self) -> u8 {
        self.frame.frame_type()
    }

    #[must_use]
    pub const fn subtype(&self) -> u8 {
        self.frame.subtype()
    }

    #[must_use]
    pub const fn is_protected(&self) -> bool {
        self.flags.contains(FrameFlags::PROTECTED)
    }

    #[must_use]
    pub const fn management(&self) -> Option<&Dot11Management> {
        match &self.frame {
            Dot11Frame::Management(mgmt) => Some(mgmt),
            _ => None,
        }
    }

    pub fn management_mut(&mut self) -> Option<&mut Dot11Management> {
        match &mut self.frame {
            Dot11Frame::Management(mgmt) => Some(mgmt),
            _ => None,
        }
    }

    #[must_use]
    pub const fn control(&self) -> Option<&Dot11Control> {
        match &self.frame {
            Dot11Frame::Control(control) => Some(control),
            _ => None,
        }
    }

    #[must_use]
    pub const fn data(&self) -> Option<&Dot11Data> {
        match &self.frame {
            Dot11Frame::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn data_mut(&mut self) -> Option<&mut Dot11Data> {
        match &mut self.frame {
            Dot11Frame::Data(data) => Some(data),
            _ => None,
        }
    }

    const fn sequence_header(&self) -> Option<&SequenceHeader> {
        match &self.frame {
            Dot11Frame::Management(mgmt) => Some(&mgmt.header),
            Dot11Frame::Data(data) => Some(&data.header),
            _ => None,
        }
    }
}

/// Access to the addresses of an `IEEE 802.11` frame.
pub trait HasAddressFields {
    fn frame_flags(&self) -> FrameFlags;

    fn addr1(&self) -> HwAddress;

    fn addr2(&self) -> Option<HwAddress>;

    fn addr3(&self) -> Option<HwAddress>;

    /// The fourth address, present only when both distribution system flags are set.
    fn addr4(&self) -> Option<HwAddress>;

    /// The `BSSID` as selected by the distribution system flags.
    ///
    /// A frame with both flags set is a wireless distribution system frame which has no single
    /// `BSSID`, the third address is used.
    fn bssid(&self) -> Option<HwAddress> {
        let flags = self.frame_flags();
        match (
            flags.contains(FrameFlags::TO_DS),
            flags.contains(FrameFlags::FROM_DS),
        ) {
            (false, false) | (true, true) => self.addr3(),
            (true, false) => Some(self.addr1()),
            (false, true) => self.addr2(),
        }
    }

    /// The original sender of the frame.
    fn src_addr(&self) -> Option<HwAddress> {
        let flags = self.frame_flags();
        match (
            flags.contains(FrameFlags::TO_DS),
            flags.contains(FrameFlags::FROM_DS),
        ) {
            (_, false) => self.addr2(),
            (false, true) => self.addr3(),
            (true, true) => self.addr4(),
        }
    }

    /// The final recipient of the frame.
    fn dst_addr(&self) -> Option<HwAddress> {
        if self.frame_flags().contains(FrameFlags::TO_DS) {
            self.addr3()
        } else {
            Some(self.addr1())
        }
    }
}

impl HasAddressFields for Dot11 {
    fn frame_flags(&self) -> FrameFlags {
        self.flags
    }

    fn addr1(&self) -> HwAddress {
        self.addr1
    }

    fn addr2(&self) -> Option<HwAddress> {
        match &self.frame {
            Dot11Frame::Control(control) => control.ta(),
            _ => self.sequence_header().map(|header| header.addr2),
        }
    }

    fn addr3(&self) -> Option<HwAddress> {
        self.sequence_header().map(|header| header.addr3)
    }

    fn addr4(&self) -> Option<HwAddress> {
        self.sequence_header()
            .filter(|_| self.flags.is_wds())
            .map(|header| header.addr4)
    }
}

impl Protocol for Dot11 {
    const KIND: PduKind = PduKind::Dot11;

    fn header_size(&self) -> u32 {
        (BASE_HEADER_SIZE + self.frame.body_size(self.flags)) as u32
    }

    fn write(&self, frame: &mut [u8], _: Option<PduKind>, _: Option<&Layer>) -> Result<()> {
        let header_size = self.header_size() as usize;
        let mut packet = Dot11Packet::new(&mut frame[..header_size])?;
        packet.set_frame_control(self.protocol, self.frame_type(), self.subtype());
        packet.set_flags(self.flags);
        packet.set_duration_id(self.duration_id);
        packet.set_addr1(self.addr1);
        self.frame
            .write(&mut frame[BASE_HEADER_SIZE..header_size], self.flags)
    }

    fn decode(bytes: &[u8]) -> Result<Decoded<'_, Self>> {
        let packet = Dot11Packet::new_view(bytes)?;
        let flags = packet.get_flags();
        let subtype = packet.get_subtype();
        let body = packet.body();
        let (frame, consumed, next) = match packet.get_frame_type() {
            TYPE_MANAGEMENT => {
                let (mgmt, consumed) = Dot11Management::parse(subtype, body, flags)?;
                (Dot11Frame::Management(mgmt), consumed, None)
            }
            TYPE_CONTROL => {
                let control = Dot11Control::parse(subtype, body)?;
                let consumed = control.size();
                (Dot11Frame::Control(control), consumed, None)
            }
            TYPE_DATA => {
                let data = Dot11Data::parse(subtype, body, flags)?;
                let consumed = data.size(flags);
                let next = if flags.contains(FrameFlags::PROTECTED) {
                    None
                } else {
                    Some(PduKind::Snap)
                };
                (Dot11Frame::Data(data), consumed, next)
            }
            frame_type => (Dot11Frame::Other { frame_type, subtype }, 0, None),
        };
        let header = Self {
            protocol: packet.get_protocol(),
            flags,
            duration_id: packet.get_duration_id(),
            addr1: packet.get_addr1(),
            frame,
        };
        Ok(Decoded::new(
            header,
            &bytes[BASE_HEADER_SIZE + consumed..],
            next,
        ))
    }

    fn from_layer(layer: &Layer) -> Option<&Self> {
        match layer {
            Layer::Dot11(dot11) => Some(dot11),
            _ => None,
        }
    }

    fn from_layer_mut(layer: &mut Layer) -> Option<&mut Self> {
        match layer {
            Layer::Dot11(dot11) => Some(dot11),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawPdu;
    use crate::snap::Snap;
    use crate::Pdu;
    use hex_literal::hex;
    use test_case::test_case;

    const AP: HwAddress = HwAddress([0x00, 0x01, 0x02, 0x03, 0x04, 0x05]);
    const STA: HwAddress = HwAddress([0x10, 0x11, 0x12, 0x13, 0x14, 0x15]);
    const HOST: HwAddress = HwAddress([0x20, 0x21, 0x22, 0x23, 0x24, 0x25]);
    const PEER: HwAddress = HwAddress([0x30, 0x31, 0x32, 0x33, 0x34, 0x35]);

    fn data_frame(flags: FrameFlags) -> Dot11 {
        let data = Dot11Data {
            header: SequenceHeader {
                addr2: STA,
                addr3: HOST,
                addr4: PEER,
                ..SequenceHeader::default()
            },
            ..Dot11Data::default()
        };
        Dot11 {
            flags,
            ..Dot11::new(AP, Dot11Frame::Data(data))
        }
    }

    #[test]
    fn test_view() {
        let buf = hex!("08 41 3a 01 00 01 02 03 04 05 ff");
        let packet = Dot11Packet::new_view(&buf).unwrap();
        assert_eq!(0, packet.get_protocol());
        assert_eq!(TYPE_DATA, packet.get_frame_type());
        assert_eq!(0, packet.get_subtype());
        assert_eq!(FrameFlags::TO_DS | FrameFlags::PROTECTED, packet.get_flags());
        assert_eq!(0x013a, packet.get_duration_id());
        assert_eq!(AP, packet.get_addr1());
        assert_eq!(&[0xff], packet.body());
    }

    #[test]
    fn test_frame_control() {
        let mut buf = [0_u8; BASE_HEADER_SIZE];
        let mut packet = Dot11Packet::new(&mut buf).unwrap();
        packet.set_frame_control(0, TYPE_MANAGEMENT, mgmt::SUBTYPE_BEACON);
        packet.set_duration_id(0x0102);
        assert_eq!(hex!("80 00 02 01"), packet.packet()[..4]);
    }

    #[test_case(FrameFlags::empty(), Some(HOST); "no distribution system")]
    #[test_case(FrameFlags::TO_DS, Some(AP); "to distribution system")]
    #[test_case(FrameFlags::FROM_DS, Some(STA); "from distribution system")]
    #[test_case(FrameFlags::TO_DS | FrameFlags::FROM_DS, Some(HOST); "wireless distribution system")]
    fn test_bssid(flags: FrameFlags, expected: Option<HwAddress>) {
        assert_eq!(expected, data_frame(flags).bssid());
    }

    #[test]
    fn test_addr4_only_with_wds() {
        assert_eq!(None, data_frame(FrameFlags::TO_DS).addr4());
        let wds = data_frame(FrameFlags::TO_DS | FrameFlags::FROM_DS);
        assert_eq!(Some(PEER), wds.addr4());
        assert_eq!(Some(PEER), wds.src_addr());
        assert_eq!(30, wds.header_size());
        assert_eq!(24, data_frame(FrameFlags::FROM_DS).header_size());
    }

    #[test]
    fn test_data_round_trip_with_snap() {
        let pdu = data_frame(FrameFlags::FROM_DS) / Snap::default() / RawPdu::new(vec![1, 2]);
        let bytes = pdu.serialize().unwrap();
        assert_eq!(24 + 8 + 2, bytes.len());
        let reparsed = Pdu::parse::<Dot11>(&bytes).unwrap();
        let dot11 = reparsed.find::<Dot11>().unwrap();
        assert_eq!(Some(STA), dot11.addr2());
        assert_eq!(Some(HOST), dot11.addr3());
        assert!(reparsed.find::<Snap>().is_some());
    }

    #[test]
    fn test_protected_payload_is_raw() {
        let pdu = data_frame(FrameFlags::PROTECTED) / RawPdu::new(vec![0xaa; 16]);
        let bytes = pdu.serialize().unwrap();
        let reparsed = Pdu::parse::<Dot11>(&bytes).unwrap();
        assert!(reparsed.find::<Dot11>().unwrap().is_protected());
        assert_eq!(16, reparsed.find::<RawPdu>().unwrap().payload().len());
        assert!(reparsed.find::<Snap>().is_none());
    }

    #[test]
    fn test_reserved_frame_type() {
        let buf = hex!("0c 00 00 00 ff ff ff ff ff ff 01 02");
        let pdu = Pdu::parse::<Dot11>(&buf).unwrap();
        let dot11 = pdu.find::<Dot11>().unwrap();
        assert_eq!(3, dot11.frame_type());
        assert_eq!(None, dot11.addr2());
        assert_eq!(Some(&[1_u8, 2][..]), pdu.find::<RawPdu>().map(RawPdu::payload));
    }

    #[test]
    fn test_truncated_data_header() {
        let buf = hex!("08 00 00 00 ff ff ff ff ff ff 01 02");
        assert!(matches!(
            Pdu::parse::<Dot11>(&buf),
            Err(Error::MalformedPacket(_))
        ));
    }
}
