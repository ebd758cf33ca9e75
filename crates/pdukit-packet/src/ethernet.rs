use crate::buffer::Buffer;
use crate::error::Result;
use crate::pdu::{Decoded, Layer, PduKind, Protocol};
use crate::{ether_type_for, fmt_payload, EtherType, HwAddress};
use std::fmt::{Debug, Formatter};

const DESTINATION_OFFSET: usize = 0;
const SOURCE_OFFSET: usize = 6;
const ETHER_TYPE_OFFSET: usize = 12;

/// The minimum size of an Ethernet frame, excluding the frame check sequence.
pub const MINIMUM_FRAME_SIZE: usize = 60;

/// A view of an `EthernetII` frame.
pub struct EthernetPacket<'a> {
    buf: Buffer<'a>,
}

impl<'a> EthernetPacket<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        let buf = Buffer::mutable("EthernetPacket", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        let buf = Buffer::view("EthernetPacket", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        14
    }

    #[must_use]
    pub fn get_destination(&self) -> HwAddress {
        HwAddress(self.buf.get_bytes(DESTINATION_OFFSET))
    }

    #[must_use]
    pub fn get_source(&self) -> HwAddress {
        HwAddress(self.buf.get_bytes(SOURCE_OFFSET))
    }

    #[must_use]
    pub fn get_ether_type(&self) -> EtherType {
        EtherType::from(self.buf.read_u16(ETHER_TYPE_OFFSET))
    }

    pub fn set_destination(&mut self, val: HwAddress) {
        self.buf.set_bytes(DESTINATION_OFFSET, val.octets());
    }

    pub fn set_source(&mut self, val: HwAddress) {
        self.buf.set_bytes(SOURCE_OFFSET, val.octets());
    }

    pub fn set_ether_type(&mut self, val: EtherType) {
        self.buf.set_bytes(ETHER_TYPE_OFFSET, val.id().to_be_bytes());
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

impl Debug for EthernetPacket<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthernetPacket")
            .field("destination", &self.get_destination())
            .field("source", &self.get_source())
            .field("ether_type", &self.get_ether_type())
            .field("payload", &fmt_payload(self.payload()))
            .finish()
    }
}

/// An `EthernetII` layer.
///
/// Frames shorter than [`MINIMUM_FRAME_SIZE`] are zero padded when serialized.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct EthernetII {
    pub dst: HwAddress,
    pub src: HwAddress,
    /// The `EtherType` used when the inner layer has no registered type.
    pub payload_type: u16,
}

impl EthernetII {
    #[must_use]
    pub const fn new(dst: HwAddress, src: HwAddress) -> Self {
        Self {
            dst,
            src,
            payload_type: 0,
        }
    }
}

impl Protocol for EthernetII {
    const KIND: PduKind = PduKind::EthernetII;

    fn header_size(&self) -> u32 {
        EthernetPacket::minimum_packet_size() as u32
    }

    fn trailer_size(&self, inner_size: u32) -> u32 {
        (MINIMUM_FRAME_SIZE as u32).saturating_sub(self.header_size() + inner_size)
    }

    fn write(&self, frame: &mut [u8], inner: Option<PduKind>, _: Option<&Layer>) -> Result<()> {
        let mut packet = EthernetPacket::new(frame)?;
        packet.set_destination(self.dst);
        packet.set_source(self.src);
        packet.set_ether_type(EtherType::from(ether_type_for(inner, self.payload_type)));
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Decoded<'_, Self>> {
        let packet = EthernetPacket::new_view(bytes)?;
        let ether_type = packet.get_ether_type();
        let header = Self {
            dst: packet.get_destination(),
            src: packet.get_source(),
            payload_type: ether_type.id(),
        };
        Ok(Decoded::new(header, &bytes[14..], ether_type.kind()))
    }

    fn from_layer(layer: &Layer) -> Option<&Self> {
        match layer {
            Layer::EthernetII(eth) => Some(eth),
            _ => None,
        }
    }

    fn from_layer_mut(layer: &mut Layer) -> Option<&mut Self> {
        match layer {
            Layer::EthernetII(eth) => Some(eth),
            _ => None,
        }
    }
}
