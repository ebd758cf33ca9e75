use crate::buffer::Buffer;
use crate::checksum::icmp_ipv4_checksum;
use crate::error::Result;
use crate::fmt_payload;
use crate::pdu::{Decoded, Layer, PduKind, Protocol};
use std::fmt::{Debug, Formatter};

/// The type of `ICMP` packet.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub enum IcmpType {
    EchoReply,
    DestinationUnreachable,
    EchoRequest,
    TimeExceeded,
    Other(u8),
}

impl IcmpType {
    #[must_use]
    pub const fn id(&self) -> u8 {
        match self {
            Self::EchoReply => 0,
            Self::DestinationUnreachable => 3,
            Self::EchoRequest => 8,
            Self::TimeExceeded => 11,
            Self::Other(id) => *id,
        }
    }
}

impl From<u8> for IcmpType {
    fn from(val: u8) -> Self {
        match val {
            0 => Self::EchoReply,
            3 => Self::DestinationUnreachable,
            8 => Self::EchoRequest,
            11 => Self::TimeExceeded,
            id => Self::Other(id),
        }
    }
}

/// The `ICMP` code.
#[derive(Debug, Copy, Clone, Default, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct IcmpCode(pub u8);

impl From<u8> for IcmpCode {
    fn from(val: u8) -> Self {
        Self(val)
    }
}

const TYPE_OFFSET: usize = 0;
const CODE_OFFSET: usize = 1;
const CHECKSUM_OFFSET: usize = 2;
const IDENTIFIER_OFFSET: usize = 4;
const SEQUENCE_OFFSET: usize = 6;

/// Represents an ICMP packet.
///
/// The four bytes following the checksum are exposed as an identifier and sequence number, as
/// used by echo requests and replies.
pub struct IcmpPacket<'a> {
    buf: Buffer<'a>,
}

impl<'a> IcmpPacket<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        let buf = Buffer::mutable("IcmpPacket", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        let buf = Buffer::view("IcmpPacket", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        8
    }

    #[must_use]
    pub fn get_icmp_type(&self) -> IcmpType {
        IcmpType::from(self.buf.read(TYPE_OFFSET))
    }

    #[must_use]
    pub fn get_icmp_code(&self) -> IcmpCode {
        IcmpCode::from(self.buf.read(CODE_OFFSET))
    }

    #[must_use]
    pub fn get_checksum(&self) -> u16 {
        self.buf.read_u16(CHECKSUM_OFFSET)
    }

    #[must_use]
    pub fn get_identifier(&self) -> u16 {
        self.buf.read_u16(IDENTIFIER_OFFSET)
    }

    #[must_use]
    pub fn get_sequence(&self) -> u16 {
        self.buf.read_u16(SEQUENCE_OFFSET)
    }

    pub fn set_icmp_type(&mut self, val: IcmpType) {
        *self.buf.write(TYPE_OFFSET) = val.id();
    }

    pub fn set_icmp_code(&mut self, val: IcmpCode) {
        *self.buf.write(CODE_OFFSET) = val.0;
    }

    pub fn set_checksum(&mut self, val: u16) {
        self.buf.write_u16(CHECKSUM_OFFSET, val);
    }

    pub fn set_identifier(&mut self, val: u16) {
        self.buf.write_u16(IDENTIFIER_OFFSET, val);
    }

    pub fn set_sequence(&mut self, val: u16) {
        self.buf.write_u16(SEQUENCE_OFFSET, val);
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.buf.as_slice()[Self::minimum_packet_size()..]
    }
}

impl Debug for IcmpPacket<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IcmpPacket")
            .field("icmp_type", &self.get_icmp_type())
            .field("icmp_code", &self.get_icmp_code())
            .field("checksum", &self.get_checksum())
            .field("identifier", &self.get_identifier())
            .field("sequence", &self.get_sequence())
            .field("payload", &fmt_payload(self.payload()))
            .finish()
    }
}

/// An `ICMP` layer.
///
/// The checksum is computed over the header and every inner layer when serialized.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Icmp {
    pub icmp_type: IcmpType,
    pub code: IcmpCode,
    pub identifier: u16,
    pub sequence: u16,
    /// The checksum found when the packet was decoded.
    pub checksum: u16,
}

impl Icmp {
    #[must_use]
    pub const fn new(icmp_type: IcmpType) -> Self {
        Self {
            icmp_type,
            code: IcmpCode(0),
            identifier: 0,
            sequence: 0,
            checksum: 0,
        }
    }

    #[must_use]
    pub const fn echo_request(identifier: u16, sequence: u16) -> Self {
        Self {
            identifier,
            sequence,
            ..Self::new(IcmpType::EchoRequest)
        }
    }
}

impl Default for Icmp {
    fn default() -> Self {
        Self::new(IcmpType::EchoRequest)
    }
}

impl Protocol for Icmp {
    const KIND: PduKind = PduKind::Icmp;

    fn header_size(&self) -> u32 {
        IcmpPacket::minimum_packet_size() as u32
    }

    fn write(&self, frame: &mut [u8], _: Option<PduKind>, _: Option<&Layer>) -> Result<()> {
        let mut packet = IcmpPacket::new(frame)?;
        packet.set_icmp_type(self.icmp_type);
        packet.set_icmp_code(self.code);
        packet.set_identifier(self.identifier);
        packet.set_sequence(self.sequence);
        packet.set_checksum(0);
        let checksum = icmp_ipv4_checksum(packet.packet());
        packet.set_checksum(checksum);
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Decoded<'_, Self>> {
        let packet = IcmpPacket::new_view(bytes)?;
        let header = Self {
            icmp_type: packet.get_icmp_type(),
            code: packet.get_icmp_code(),
            identifier: packet.get_identifier(),
            sequence: packet.get_sequence(),
            checksum: packet.get_checksum(),
        };
        Ok(Decoded::new(
            header,
            &bytes[IcmpPacket::minimum_packet_size()..],
            None,
        ))
    }

    fn from_layer(layer: &Layer) -> Option<&Self> {
        match layer {
            Layer::Icmp(icmp) => Some(icmp),
            _ => None,
        }
    }

    fn from_layer_mut(layer: &mut Layer) -> Option<&mut Self> {
        match layer {
            Layer::Icmp(icmp) => Some(icmp),
            _ => None,
        }
    }
}
