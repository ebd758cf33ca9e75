use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::pdu::{Decoded, Layer, PduKind, Protocol};
use crate::{EtherType, HwAddress};
use std::fmt::{Debug, Formatter};
use std::net::Ipv4Addr;

const HARDWARE_TYPE_OFFSET: usize = 0;
const PROTOCOL_TYPE_OFFSET: usize = 2;
const HARDWARE_LENGTH_OFFSET: usize = 4;
const PROTOCOL_LENGTH_OFFSET: usize = 5;
const OPCODE_OFFSET: usize = 6;
const SENDER_HW_OFFSET: usize = 8;
const SENDER_IP_OFFSET: usize = 14;
const TARGET_HW_OFFSET: usize = 18;
const TARGET_IP_OFFSET: usize = 24;

/// The `ARP` hardware type for Ethernet.
pub const HARDWARE_TYPE_ETHERNET: u16 = 1;

/// The `ARP` operation.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ArpOperation {
    Request,
    Reply,
    Other(u16),
}

impl ArpOperation {
    #[must_use]
    pub const fn id(self) -> u16 {
        match self {
            Self::Request => 1,
            Self::Reply => 2,
            Self::Other(id) => id,
        }
    }
}

impl From<u16> for ArpOperation {
    fn from(id: u16) -> Self {
        match id {
            1 => Self::Request,
            2 => Self::Reply,
            id => Self::Other(id),
        }
    }
}

/// A view of an Ethernet/IPv4 `ARP` packet.
pub struct ArpPacket<'a> {
    buf: Buffer<'a>,
}

impl<'a> ArpPacket<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        let buf = Buffer::mutable("ArpPacket", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        let buf = Buffer::view("ArpPacket", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        28
    }

    #[must_use]
    pub fn get_hardware_type(&self) -> u16 {
        self.buf.read_u16(HARDWARE_TYPE_OFFSET)
    }

    #[must_use]
    pub fn get_protocol_type(&self) -> u16 {
        self.buf.read_u16(PROTOCOL_TYPE_OFFSET)
    }

    #[must_use]
    pub fn get_hardware_length(&self) -> u8 {
        self.buf.read(HARDWARE_LENGTH_OFFSET)
    }

    #[must_use]
    pub fn get_protocol_length(&self) -> u8 {
        self.buf.read(PROTOCOL_LENGTH_OFFSET)
    }

    #[must_use]
    pub fn get_operation(&self) -> ArpOperation {
        ArpOperation::from(self.buf.read_u16(OPCODE_OFFSET))
    }

    #[must_use]
    pub fn get_sender_hw_addr(&self) -> HwAddress {
        HwAddress(self.buf.get_bytes(SENDER_HW_OFFSET))
    }

    #[must_use]
    pub fn get_sender_ip_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.buf.get_bytes(SENDER_IP_OFFSET))
    }

    #[must_use]
    pub fn get_target_hw_addr(&self) -> HwAddress {
        HwAddress(self.buf.get_bytes(TARGET_HW_OFFSET))
    }

    #[must_use]
    pub fn get_target_ip_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.buf.get_bytes(TARGET_IP_OFFSET))
    }

    pub fn set_hardware_type(&mut self, val: u16) {
        self.buf.write_u16(HARDWARE_TYPE_OFFSET, val);
    }

    pub fn set_protocol_type(&mut self, val: u16) {
        self.buf.write_u16(PROTOCOL_TYPE_OFFSET, val);
    }

    pub fn set_hardware_length(&mut self, val: u8) {
        *self.buf.write(HARDWARE_LENGTH_OFFSET) = val;
    }

    pub fn set_protocol_length(&mut self, val: u8) {
        *self.buf.write(PROTOCOL_LENGTH_OFFSET) = val;
    }

    pub fn set_operation(&mut self, val: ArpOperation) {
        self.buf.set_bytes(OPCODE_OFFSET, val.id().to_be_bytes());
    }

    pub fn set_sender_hw_addr(&mut self, val: HwAddress) {
        self.buf.set_bytes(SENDER_HW_OFFSET, val.octets());
    }

    pub fn set_sender_ip_addr(&mut self, val: Ipv4Addr) {
        self.buf.set_bytes(SENDER_IP_OFFSET, val.octets());
    }

    pub fn set_target_hw_addr(&mut self, val: HwAddress) {
        self.buf.set_bytes(TARGET_HW_OFFSET, val.octets());
    }

    pub fn set_target_ip_addr(&mut self, val: Ipv4Addr) {
        self.buf.set_bytes(TARGET_IP_OFFSET, val.octets());
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }
}

impl Debug for ArpPacket<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArpPacket")
            .field("hardware_type", &self.get_hardware_type())
            .field("protocol_type", &self.get_protocol_type())
            .field("hardware_length", &self.get_hardware_length())
            .field("protocol_length", &self.get_protocol_length())
            .field("operation", &self.get_operation())
            .field("sender_hw_addr", &self.get_sender_hw_addr())
            .field("sender_ip_addr", &self.get_sender_ip_addr())
            .field("target_hw_addr", &self.get_target_hw_addr())
            .field("target_ip_addr", &self.get_target_ip_addr())
            .finish()
    }
}

/// An Ethernet/IPv4 `ARP` layer.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Arp {
    pub operation: ArpOperation,
    pub sender_hw_addr: HwAddress,
    pub sender_ip_addr: Ipv4Addr,
    pub target_hw_addr: HwAddress,
    pub target_ip_addr: Ipv4Addr,
}

impl Default for Arp {
    fn default() -> Self {
        Self {
            operation: ArpOperation::Request,
            sender_hw_addr: HwAddress::default(),
            sender_ip_addr: Ipv4Addr::UNSPECIFIED,
            target_hw_addr: HwAddress::default(),
            target_ip_addr: Ipv4Addr::UNSPECIFIED,
        }
    }
}

impl Arp {
    /// Build a "who has `target`, tell `sender`" request.
    #[must_use]
    pub fn request(target: Ipv4Addr, sender: Ipv4Addr, sender_hw_addr: HwAddress) -> Self {
        Self {
            operation: ArpOperation::Request,
            sender_hw_addr,
            sender_ip_addr: sender,
            target_hw_addr: HwAddress::default(),
            target_ip_addr: target,
        }
    }

    /// Build a "`sender` is at `sender_hw_addr`" reply.
    #[must_use]
    pub fn reply(
        target: Ipv4Addr,
        sender: Ipv4Addr,
        target_hw_addr: HwAddress,
        sender_hw_addr: HwAddress,
    ) -> Self {
        Self {
            operation: ArpOperation::Reply,
            sender_hw_addr,
            sender_ip_addr: sender,
            target_hw_addr,
            target_ip_addr: target,
        }
    }
}

impl Protocol for Arp {
    const KIND: PduKind = PduKind::Arp;

    fn header_size(&self) -> u32 {
        ArpPacket::minimum_packet_size() as u32
    }

    fn write(&self, frame: &mut [u8], _: Option<PduKind>, _: Option<&Layer>) -> Result<()> {
        let mut packet = ArpPacket::new(frame)?;
        packet.set_hardware_type(HARDWARE_TYPE_ETHERNET);
        packet.set_protocol_type(EtherType::Ipv4.id());
        packet.set_hardware_length(HwAddress::SIZE as u8);
        packet.set_protocol_length(4);
        packet.set_operation(self.operation);
        packet.set_sender_hw_addr(self.sender_hw_addr);
        packet.set_sender_ip_addr(self.sender_ip_addr);
        packet.set_target_hw_addr(self.target_hw_addr);
        packet.set_target_ip_addr(self.target_ip_addr);
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Decoded<'_, Self>> {
        let packet = ArpPacket::new_view(bytes)?;
        if packet.get_hardware_length() != 6 || packet.get_protocol_length() != 4 {
            return Err(Error::MalformedPacket(format!(
                "unsupported ARP address lengths hw={} proto={}",
                packet.get_hardware_length(),
                packet.get_protocol_length()
            )));
        }
        let header = Self {
            operation: packet.get_operation(),
            sender_hw_addr: packet.get_sender_hw_addr(),
            sender_ip_addr: packet.get_sender_ip_addr(),
            target_hw_addr: packet.get_target_hw_addr(),
            target_ip_addr: packet.get_target_ip_addr(),
        };
        let payload = &bytes[ArpPacket::minimum_packet_size()..];
        Ok(Decoded::new(header, payload, None))
    }

    fn from_layer(layer: &Layer) -> Option<&Self> {
        match layer {
            Layer::Arp(arp) => Some(arp),
            _ => None,
        }
    }

    fn from_layer_mut(layer: &mut Layer) -> Option<&mut Self> {
        match layer {
            Layer::Arp(arp) => Some(arp),
            _ => None,
        }
    }
}
