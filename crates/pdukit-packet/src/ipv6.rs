use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::pdu::{Decoded, Layer, PduKind, Protocol};
use crate::{fmt_payload, IpProtocol};
use std::fmt::{Debug, Formatter};
use std::net::Ipv6Addr;

const HEADER_SIZE: usize = 40;

// version (4 bits), traffic class (8 bits) and flow label (20 bits) share the first word
const WORD_OFFSET: usize = 0;
const PAYLOAD_LENGTH_OFFSET: usize = 4;
const NEXT_HEADER_OFFSET: usize = 6;
const HOP_LIMIT_OFFSET: usize = 7;
const SOURCE_OFFSET: usize = 8;
const DESTINATION_OFFSET: usize = 24;

const FLOW_LABEL_MASK: u32 = 0x000f_ffff;

/// A view of the fixed `IPv6` header.
pub struct Ipv6Packet<'a> {
    buf: Buffer<'a>,
}

impl<'a> Ipv6Packet<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        let buf = Buffer::mutable("Ipv6Packet", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        let buf = Buffer::view("Ipv6Packet", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        HEADER_SIZE
    }

    fn word(&self) -> u32 {
        self.buf.read_u32(WORD_OFFSET)
    }

    fn set_word(&mut self, mask: u32, val: u32) {
        let word = (self.word() & !mask) | (val & mask);
        self.buf.write_u32(WORD_OFFSET, word);
    }

    #[must_use]
    pub fn get_version(&self) -> u8 {
        (self.word() >> 28) as u8
    }

    #[must_use]
    pub fn get_traffic_class(&self) -> u8 {
        (self.word() >> 20) as u8
    }

    #[must_use]
    pub fn get_flow_label(&self) -> u32 {
        self.word() & FLOW_LABEL_MASK
    }

    #[must_use]
    pub fn get_payload_length(&self) -> u16 {
        self.buf.read_u16(PAYLOAD_LENGTH_OFFSET)
    }

    #[must_use]
    pub fn get_next_header(&self) -> IpProtocol {
        IpProtocol::from(self.buf.read(NEXT_HEADER_OFFSET))
    }

    #[must_use]
    pub fn get_hop_limit(&self) -> u8 {
        self.buf.read(HOP_LIMIT_OFFSET)
    }

    #[must_use]
    pub fn get_source_address(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.buf.get_bytes(SOURCE_OFFSET))
    }

    #[must_use]
    pub fn get_destination_address(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.buf.get_bytes(DESTINATION_OFFSET))
    }

    pub fn set_version(&mut self, val: u8) {
        self.set_word(0xf000_0000, u32::from(val) << 28);
    }

    pub fn set_traffic_class(&mut self, val: u8) {
        self.set_word(0x0ff0_0000, u32::from(val) << 20);
    }

    pub fn set_flow_label(&mut self, val: u32) {
        self.set_word(FLOW_LABEL_MASK, val);
    }

    pub fn set_payload_length(&mut self, val: u16) {
        self.buf.write_u16(PAYLOAD_LENGTH_OFFSET, val);
    }

    pub fn set_next_header(&mut self, val: IpProtocol) {
        *self.buf.write(NEXT_HEADER_OFFSET) = val.id();
    }

    pub fn set_hop_limit(&mut self, val: u8) {
        *self.buf.write(HOP_LIMIT_OFFSET) = val;
    }

    pub fn set_source_address(&mut self, val: Ipv6Addr) {
        self.buf.set_bytes(SOURCE_OFFSET, val.octets());
    }

    pub fn set_destination_address(&mut self, val: Ipv6Addr) {
        self.buf.set_bytes(DESTINATION_OFFSET, val.octets());
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }

    /// The bytes following the header, bounded by the payload length field.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        let bytes = &self.buf.as_slice()[HEADER_SIZE..];
        let declared = usize::from(self.get_payload_length());
        &bytes[..declared.min(bytes.len())]
    }
}

impl Debug for Ipv6Packet<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ipv6Packet")
            .field("traffic_class", &self.get_traffic_class())
            .field("flow_label", &self.get_flow_label())
            .field("next_header", &self.get_next_header())
            .field("hop_limit", &self.get_hop_limit())
            .field("src", &self.get_source_address())
            .field("dst", &self.get_destination_address())
            .field("payload", &fmt_payload(self.payload()))
            .finish()
    }
}

/// An `IPv6` layer.
///
/// Only the fixed header is supported, extension headers are carried in the payload. The payload
/// length is computed when serialized and the next header is taken from a known inner transport.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Ipv6 {
    pub traffic_class: u8,
    pub flow_label: u32,
    pub next_header: IpProtocol,
    pub hop_limit: u8,
    pub src: Ipv6Addr,
    pub dst: Ipv6Addr,
}

impl Ipv6 {
    #[must_use]
    pub const fn new(dst: Ipv6Addr, src: Ipv6Addr) -> Self {
        Self {
            traffic_class: 0,
            flow_label: 0,
            next_header: IpProtocol::Other(59),
            hop_limit: 64,
            src,
            dst,
        }
    }
}

impl Protocol for Ipv6 {
    const KIND: PduKind = PduKind::Ipv6;

    fn header_size(&self) -> u32 {
        HEADER_SIZE as u32
    }

    fn write(&self, frame: &mut [u8], inner: Option<PduKind>, _: Option<&Layer>) -> Result<()> {
        let payload_length = frame.len().saturating_sub(HEADER_SIZE);
        let payload_length = u16::try_from(payload_length).map_err(|_| {
            Error::MalformedPacket(format!("IPv6 payload of {payload_length} bytes"))
        })?;
        let next_header = inner
            .and_then(IpProtocol::from_kind)
            .unwrap_or(self.next_header);
        let mut packet = Ipv6Packet::new(frame)?;
        packet.set_version(6);
        packet.set_traffic_class(self.traffic_class);
        packet.set_flow_label(self.flow_label);
        packet.set_payload_length(payload_length);
        packet.set_next_header(next_header);
        packet.set_hop_limit(self.hop_limit);
        packet.set_source_address(self.src);
        packet.set_destination_address(self.dst);
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Decoded<'_, Self>> {
        let packet = Ipv6Packet::new_view(bytes)?;
        if packet.get_version() != 6 {
            return Err(Error::MalformedPacket(format!(
                "invalid IPv6 version {}",
                packet.get_version()
            )));
        }
        let next_header = packet.get_next_header();
        let header = Self {
            traffic_class: packet.get_traffic_class(),
            flow_label: packet.get_flow_label(),
            next_header,
            hop_limit: packet.get_hop_limit(),
            src: packet.get_source_address(),
            dst: packet.get_destination_address(),
        };
        let end = HEADER_SIZE + packet.payload().len();
        Ok(Decoded::new(header, &bytes[HEADER_SIZE..end], next_header.kind()))
    }

    fn from_layer(layer: &Layer) -> Option<&Self> {
        match layer {
            Layer::Ipv6(ip) => Some(ip),
            _ => None,
        }
    }

    fn from_layer_mut(layer: &mut Layer) -> Option<&mut Self> {
        match layer {
            Layer::Ipv6(ip) => Some(ip),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::udp_ipv6_checksum;
    use crate::raw::RawPdu;
    use crate::udp::{Udp, UdpPacket};
    use crate::Pdu;
    use hex_literal::hex;
    use std::str::FromStr;

    #[test]
    fn test_traffic_class_and_flow_label() {
        let mut buf = [0_u8; Ipv6Packet::minimum_packet_size()];
        let mut packet = Ipv6Packet::new(&mut buf).unwrap();
        packet.set_version(6);
        packet.set_traffic_class(0xab);
        packet.set_flow_label(0x000c_def0);
        assert_eq!(6, packet.get_version());
        assert_eq!(0xab, packet.get_traffic_class());
        assert_eq!(0x000c_def0, packet.get_flow_label());
        assert_eq!(hex!("6a bc de f0"), packet.packet()[..4]);
    }

    #[test]
    fn test_view() {
        let mut buf = [0_u8; 44];
        buf[..8].copy_from_slice(&hex!("60 00 00 00 00 04 11 40"));
        buf[8..24].copy_from_slice(&Ipv6Addr::LOCALHOST.octets());
        buf[24..40].copy_from_slice(&Ipv6Addr::LOCALHOST.octets());
        buf[40..].copy_from_slice(&[1, 2, 3, 4]);
        let packet = Ipv6Packet::new_view(&buf).unwrap();
        assert_eq!(4, packet.get_payload_length());
        assert_eq!(IpProtocol::Udp, packet.get_next_header());
        assert_eq!(64, packet.get_hop_limit());
        assert_eq!(Ipv6Addr::LOCALHOST, packet.get_source_address());
        assert_eq!(&[1, 2, 3, 4], packet.payload());
    }

    #[test]
    fn test_serialize_udp() {
        let src = Ipv6Addr::from_str("fe80::1").unwrap();
        let dst = Ipv6Addr::from_str("fe80::2").unwrap();
        let pdu = Ipv6::new(dst, src) / Udp::new(547, 546) / RawPdu::new(vec![0xff; 3]);
        let bytes = pdu.serialize().unwrap();
        let packet = Ipv6Packet::new_view(&bytes).unwrap();
        assert_eq!(11, packet.get_payload_length());
        assert_eq!(IpProtocol::Udp, packet.get_next_header());
        let udp = UdpPacket::new_view(packet.payload()).unwrap();
        assert_eq!(udp_ipv6_checksum(udp.packet(), src, dst), udp.get_checksum());
    }

    #[test]
    fn test_round_trip() {
        let mut ip = Ipv6::new(Ipv6Addr::LOCALHOST, Ipv6Addr::UNSPECIFIED);
        ip.hop_limit = 1;
        ip.flow_label = 0x12345;
        let bytes = (ip / Udp::new(1, 2)).serialize().unwrap();
        let reparsed = Pdu::parse::<Ipv6>(&bytes).unwrap();
        let decoded = reparsed.find::<Ipv6>().unwrap();
        assert_eq!(1, decoded.hop_limit);
        assert_eq!(0x12345, decoded.flow_label);
        assert_eq!(Some(1), reparsed.find::<Udp>().map(|udp| udp.dport));
    }

    #[test]
    fn test_wrong_version() {
        let buf = [0x40; Ipv6Packet::minimum_packet_size()];
        assert!(matches!(
            Pdu::parse::<Ipv6>(&buf),
            Err(Error::MalformedPacket(_))
        ));
    }
}
