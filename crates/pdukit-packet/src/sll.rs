use crate::buffer::Buffer;
use crate::error::Result;
use crate::pdu::{Decoded, Layer, PduKind, Protocol};
use crate::{ether_type_for, fmt_payload, EtherType};
use std::fmt::{Debug, Formatter};

const PACKET_TYPE_OFFSET: usize = 0;
const LLADDR_TYPE_OFFSET: usize = 2;
const LLADDR_LEN_OFFSET: usize = 4;
const ADDRESS_OFFSET: usize = 6;
const PROTOCOL_OFFSET: usize = 14;

/// `ARPHRD_ETHER`, the link layer address type of Ethernet devices.
pub const ARPHRD_ETHER: u16 = 1;

/// Represents a Linux cooked capture (`SLL`) header.
pub struct SllPacket<'a> {
    buf: Buffer<'a>,
}

impl<'a> SllPacket<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        let buf = Buffer::mutable("SllPacket", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        let buf = Buffer::view("SllPacket", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        16
    }

    #[must_use]
    pub fn get_packet_type(&self) -> u16 {
        self.buf.read_u16(PACKET_TYPE_OFFSET)
    }

    #[must_use]
    pub fn get_lladdr_type(&self) -> u16 {
        self.buf.read_u16(LLADDR_TYPE_OFFSET)
    }

    #[must_use]
    pub fn get_lladdr_len(&self) -> u16 {
        self.buf.read_u16(LLADDR_LEN_OFFSET)
    }

    #[must_use]
    pub fn get_address(&self) -> [u8; 8] {
        self.buf.get_bytes(ADDRESS_OFFSET)
    }

    #[must_use]
    pub fn get_protocol(&self) -> EtherType {
        EtherType::from(self.buf.read_u16(PROTOCOL_OFFSET))
    }

    pub fn set_packet_type(&mut self, val: u16) {
        self.buf.write_u16(PACKET_TYPE_OFFSET, val);
    }

    pub fn set_lladdr_type(&mut self, val: u16) {
        self.buf.write_u16(LLADDR_TYPE_OFFSET, val);
    }

    pub fn set_lladdr_len(&mut self, val: u16) {
        self.buf.write_u16(LLADDR_LEN_OFFSET, val);
    }

    pub fn set_address(&mut self, val: [u8; 8]) {
        self.buf.set_bytes(ADDRESS_OFFSET, val);
    }

    pub fn set_protocol(&mut self, val: EtherType) {
        self.buf.set_bytes(PROTOCOL_OFFSET, val.id().to_be_bytes());
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

impl Debug for SllPacket<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SllPacket")
            .field("packet_type", &self.get_packet_type())
            .field("lladdr_type", &self.get_lladdr_type())
            .field("lladdr_len", &self.get_lladdr_len())
            .field("address", &fmt_payload(&self.get_address()))
            .field("protocol", &self.get_protocol())
            .field("payload", &fmt_payload(self.payload()))
            .finish()
    }
}

/// A Linux cooked capture layer.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Sll {
    pub packet_type: u16,
    pub lladdr_type: u16,
    pub lladdr_len: u16,
    pub address: [u8; 8],
    /// The `EtherType` used when the inner layer has no registered type.
    pub protocol: u16,
}

impl Protocol for Sll {
    const KIND: PduKind = PduKind::Sll;

    fn header_size(&self) -> u32 {
        SllPacket::minimum_packet_size() as u32
    }

    fn write(&self, frame: &mut [u8], inner: Option<PduKind>, _: Option<&Layer>) -> Result<()> {
        let mut packet = SllPacket::new(frame)?;
        packet.set_packet_type(self.packet_type);
        packet.set_lladdr_type(self.lladdr_type);
        packet.set_lladdr_len(self.lladdr_len);
        packet.set_address(self.address);
        packet.set_protocol(EtherType::from(ether_type_for(inner, self.protocol)));
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Decoded<'_, Self>> {
        let packet = SllPacket::new_view(bytes)?;
        let protocol = packet.get_protocol();
        let header = Self {
            packet_type: packet.get_packet_type(),
            lladdr_type: packet.get_lladdr_type(),
            lladdr_len: packet.get_lladdr_len(),
            address: packet.get_address(),
            protocol: protocol.id(),
        };
        Ok(Decoded::new(
            header,
            &bytes[SllPacket::minimum_packet_size()..],
            protocol.kind(),
        ))
    }

    fn from_layer(layer: &Layer) -> Option<&Self> {
        match layer {
            Layer::Sll(sll) => Some(sll),
            _ => None,
        }
    }

    fn from_layer_mut(layer: &mut Layer) -> Option<&mut Self> {
        match layer {
            Layer::Sll(sll) => Some(sll),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipv4::Ipv4;
    use crate::Pdu;
    use hex_literal::hex;
    use std::net::Ipv4Addr;

    #[test]
    fn test_view() {
        let buf = hex!("00 04 00 01 00 06 00 1b 11 aa 0f ff 00 00 08 00");
        let packet = SllPacket::new_view(&buf).unwrap();
        assert_eq!(4, packet.get_packet_type());
        assert_eq!(ARPHRD_ETHER, packet.get_lladdr_type());
        assert_eq!(6, packet.get_lladdr_len());
        assert_eq!(hex!("00 1b 11 aa 0f ff 00 00"), packet.get_address());
        assert_eq!(EtherType::Ipv4, packet.get_protocol());
        assert!(packet.payload().is_empty());
    }

    #[test]
    fn test_round_trip() {
        let sll = Sll {
            lladdr_type: ARPHRD_ETHER,
            lladdr_len: 6,
            address: [1, 2, 3, 4, 5, 6, 0, 0],
            ..Sll::default()
        };
        let pdu = sll.clone() / Ipv4::new(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST);
        let bytes = pdu.serialize().unwrap();
        assert_eq!([0x08, 0x00], bytes[14..16]);
        let reparsed = Pdu::parse::<Sll>(&bytes).unwrap();
        assert_eq!(
            Sll {
                protocol: 0x0800,
                ..sll
            },
            *reparsed.find::<Sll>().unwrap()
        );
        assert!(reparsed.find::<Ipv4>().is_some());
    }
}
