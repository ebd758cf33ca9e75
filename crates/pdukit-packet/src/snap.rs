use crate::buffer::Buffer;
use crate::error::Result;
use crate::pdu::{Decoded, Layer, PduKind, Protocol};
use crate::{ether_type_for, fmt_payload, EtherType};
use std::fmt::{Debug, Formatter};

const DSAP_OFFSET: usize = 0;
const SSAP_OFFSET: usize = 1;
const CONTROL_OFFSET: usize = 2;
const ORG_CODE_OFFSET: usize = 3;
const ETHER_TYPE_OFFSET: usize = 6;

/// The `DSAP` and `SSAP` value of a `SNAP` header.
pub const SNAP_SAP: u8 = 0xaa;

/// The unnumbered information control value.
pub const CONTROL_UI: u8 = 0x03;

/// Represents an `LLC/SNAP` header.
pub struct SnapPacket<'a> {
    buf: Buffer<'a>,
}

impl<'a> SnapPacket<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        let buf = Buffer::mutable("SnapPacket", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        let buf = Buffer::view("SnapPacket", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        8
    }

    #[must_use]
    pub fn get_dsap(&self) -> u8 {
        self.buf.read(DSAP_OFFSET)
    }

    #[must_use]
    pub fn get_ssap(&self) -> u8 {
        self.buf.read(SSAP_OFFSET)
    }

    #[must_use]
    pub fn get_control(&self) -> u8 {
        self.buf.read(CONTROL_OFFSET)
    }

    /// The 24-bit organization code.
    #[must_use]
    pub fn get_org_code(&self) -> u32 {
        let [a, b, c] = self.buf.get_bytes(ORG_CODE_OFFSET);
        u32::from_be_bytes([0, a, b, c])
    }

    #[must_use]
    pub fn get_ether_type(&self) -> EtherType {
        EtherType::from(self.buf.read_u16(ETHER_TYPE_OFFSET))
    }

    pub fn set_dsap(&mut self, val: u8) {
        *self.buf.write(DSAP_OFFSET) = val;
    }

    pub fn set_ssap(&mut self, val: u8) {
        *self.buf.write(SSAP_OFFSET) = val;
    }

    pub fn set_control(&mut self, val: u8) {
        *self.buf.write(CONTROL_OFFSET) = val;
    }

    pub fn set_org_code(&mut self, val: u32) {
        let [_, a, b, c] = val.to_be_bytes();
        self.buf.set_bytes(ORG_CODE_OFFSET, [a, b, c]);
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

impl Debug for SnapPacket<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapPacket")
            .field("dsap", &self.get_dsap())
            .field("ssap", &self.get_ssap())
            .field("control", &self.get_control())
            .field("org_code", &self.get_org_code())
            .field("ether_type", &self.get_ether_type())
            .field("payload", &fmt_payload(self.payload()))
            .finish()
    }
}

/// An `LLC/SNAP` layer, the encapsulation used by 802.11 data frames.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Snap {
    pub control: u8,
    pub org_code: u32,
    /// The `EtherType` used when the inner layer has no registered type.
    pub eth_type: u16,
}

impl Default for Snap {
    fn default() -> Self {
        Self {
            control: CONTROL_UI,
            org_code: 0,
            eth_type: 0,
        }
    }
}

impl Protocol for Snap {
    const KIND: PduKind = PduKind::Snap;

    fn header_size(&self) -> u32 {
        SnapPacket::minimum_packet_size() as u32
    }

    fn write(&self, frame: &mut [u8], inner: Option<PduKind>, _: Option<&Layer>) -> Result<()> {
        let mut packet = SnapPacket::new(frame)?;
        packet.set_dsap(SNAP_SAP);
        packet.set_ssap(SNAP_SAP);
        packet.set_control(self.control);
        packet.set_org_code(self.org_code);
        packet.set_ether_type(EtherType::from(ether_type_for(inner, self.eth_type)));
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Decoded<'_, Self>> {
        let packet = SnapPacket::new_view(bytes)?;
        let ether_type = packet.get_ether_type();
        let header = Self {
            control: packet.get_control(),
            org_code: packet.get_org_code(),
            eth_type: ether_type.id(),
        };
        Ok(Decoded::new(
            header,
            &bytes[SnapPacket::minimum_packet_size()..],
            ether_type.kind(),
        ))
    }

    fn from_layer(layer: &Layer) -> Option<&Self> {
        match layer {
            Layer::Snap(snap) => Some(snap),
            _ => None,
        }
    }

    fn from_layer_mut(layer: &mut Layer) -> Option<&mut Self> {
        match layer {
            Layer::Snap(snap) => Some(snap),
            _ => None,
        }
    }
}
