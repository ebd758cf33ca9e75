use crate::buffer::Buffer;
use crate::checksum::ipv4_header_checksum;
use crate::error::{Error, Result};
use crate::pdu::{Decoded, Layer, PduKind, Protocol};
use crate::{fmt_payload, IpProtocol};
use std::fmt::{Debug, Formatter};
use std::net::Ipv4Addr;

const HEADER_SIZE: usize = 20;

// version in the high nibble, header length in 32 bit words in the low nibble
const VERSION_IHL_OFFSET: usize = 0;
const TOS_OFFSET: usize = 1;
const TOTAL_LENGTH_OFFSET: usize = 2;
const IDENTIFICATION_OFFSET: usize = 4;
const FRAGMENT_OFFSET: usize = 6;
const TTL_OFFSET: usize = 8;
const PROTOCOL_OFFSET: usize = 9;
const CHECKSUM_OFFSET: usize = 10;
const SOURCE_OFFSET: usize = 12;
const DESTINATION_OFFSET: usize = 16;

/// The "don't fragment" flag.
pub const FLAG_DONT_FRAGMENT: u16 = 0x4000;

/// The "more fragments" flag.
pub const FLAG_MORE_FRAGMENTS: u16 = 0x2000;

/// The default time to live of built packets.
pub const DEFAULT_TTL: u8 = 128;

/// A view of an `IPv4` header and the bytes which follow it.
pub struct Ipv4Packet<'a> {
    buf: Buffer<'a>,
}

impl<'a> Ipv4Packet<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        let buf = Buffer::mutable("Ipv4Packet", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        let buf = Buffer::view("Ipv4Packet", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    /// The size of a header without options.
    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        HEADER_SIZE
    }

    #[must_use]
    pub fn get_version(&self) -> u8 {
        self.buf.read(VERSION_IHL_OFFSET) >> 4
    }

    /// The header length in 32 bit words.
    #[must_use]
    pub fn get_header_length(&self) -> u8 {
        self.buf.read(VERSION_IHL_OFFSET) & 0x0f
    }

    #[must_use]
    pub fn get_tos(&self) -> u8 {
        self.buf.read(TOS_OFFSET)
    }

    #[must_use]
    pub fn get_total_length(&self) -> u16 {
        self.buf.read_u16(TOTAL_LENGTH_OFFSET)
    }

    #[must_use]
    pub fn get_identification(&self) -> u16 {
        self.buf.read_u16(IDENTIFICATION_OFFSET)
    }

    #[must_use]
    pub fn get_flags_and_fragment_offset(&self) -> u16 {
        self.buf.read_u16(FRAGMENT_OFFSET)
    }

    #[must_use]
    pub fn get_ttl(&self) -> u8 {
        self.buf.read(TTL_OFFSET)
    }

    #[must_use]
    pub fn get_protocol(&self) -> IpProtocol {
        IpProtocol::from(self.buf.read(PROTOCOL_OFFSET))
    }

    #[must_use]
    pub fn get_checksum(&self) -> u16 {
        self.buf.read_u16(CHECKSUM_OFFSET)
    }

    #[must_use]
    pub fn get_source(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.buf.get_bytes(SOURCE_OFFSET))
    }

    #[must_use]
    pub fn get_destination(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.buf.get_bytes(DESTINATION_OFFSET))
    }

    /// The option bytes between the fixed header and the payload, empty if the header length
    /// field is too small or points past the buffer.
    #[must_use]
    pub fn get_options_raw(&self) -> &[u8] {
        let end = self.header_end().max(HEADER_SIZE);
        &self.buf.as_slice()[HEADER_SIZE..end]
    }

    pub fn set_version(&mut self, val: u8) {
        self.buf.write_masked(VERSION_IHL_OFFSET, 0xf0, val << 4);
    }

    pub fn set_header_length(&mut self, val: u8) {
        self.buf.write_masked(VERSION_IHL_OFFSET, 0x0f, val);
    }

    pub fn set_tos(&mut self, val: u8) {
        *self.buf.write(TOS_OFFSET) = val;
    }

    pub fn set_total_length(&mut self, val: u16) {
        self.buf.write_u16(TOTAL_LENGTH_OFFSET, val);
    }

    pub fn set_identification(&mut self, val: u16) {
        self.buf.write_u16(IDENTIFICATION_OFFSET, val);
    }

    pub fn set_flags_and_fragment_offset(&mut self, val: u16) {
        self.buf.write_u16(FRAGMENT_OFFSET, val);
    }

    pub fn set_ttl(&mut self, val: u8) {
        *self.buf.write(TTL_OFFSET) = val;
    }

    pub fn set_protocol(&mut self, val: IpProtocol) {
        *self.buf.write(PROTOCOL_OFFSET) = val.id();
    }

    pub fn set_checksum(&mut self, val: u16) {
        self.buf.write_u16(CHECKSUM_OFFSET, val);
    }

    pub fn set_source(&mut self, val: Ipv4Addr) {
        self.buf.set_bytes(SOURCE_OFFSET, val.octets());
    }

    pub fn set_destination(&mut self, val: Ipv4Addr) {
        self.buf.set_bytes(DESTINATION_OFFSET, val.octets());
    }

    pub fn set_options_raw(&mut self, options: &[u8]) {
        let end = HEADER_SIZE + options.len();
        self.buf.as_slice_mut()[HEADER_SIZE..end].copy_from_slice(options);
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }

    #[must_use]
    pub fn header(&self) -> &[u8] {
        &self.buf.as_slice()[..self.header_end()]
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.buf.as_slice()[self.header_end()..]
    }

    fn header_end(&self) -> usize {
        (usize::from(self.get_header_length()) * 4).min(self.buf.len())
    }
}

impl Debug for Ipv4Packet<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ipv4Packet")
            .field("ihl", &self.get_header_length())
            .field("tos", &self.get_tos())
            .field("total_length", &self.get_total_length())
            .field("id", &self.get_identification())
            .field("fragment", &self.get_flags_and_fragment_offset())
            .field("ttl", &self.get_ttl())
            .field("protocol", &self.get_protocol())
            .field("checksum", &self.get_checksum())
            .field("src", &self.get_source())
            .field("dst", &self.get_destination())
            .field("options", &self.get_options_raw())
            .field("payload", &fmt_payload(self.payload()))
            .finish()
    }
}

/// An `IPv4` layer.
///
/// The header length, total length and checksum are computed when the layer is serialized. The
/// protocol field is taken from the inner layer when it is a known IP transport.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Ipv4 {
    pub tos: u8,
    pub identification: u16,
    pub flags_and_fragment_offset: u16,
    pub ttl: u8,
    pub protocol: IpProtocol,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    /// Raw options, zero padded to a multiple of 4 bytes when written.
    pub options: Vec<u8>,
    /// The checksum found when the header was decoded.
    pub checksum: u16,
}

impl Ipv4 {
    #[must_use]
    pub fn new(dst: Ipv4Addr, src: Ipv4Addr) -> Self {
        Self {
            tos: 0,
            identification: 1,
            flags_and_fragment_offset: 0,
            ttl: DEFAULT_TTL,
            protocol: IpProtocol::Other(0),
            src,
            dst,
            options: Vec::new(),
            checksum: 0,
        }
    }

    #[must_use]
    pub const fn dont_fragment(&self) -> bool {
        self.flags_and_fragment_offset & FLAG_DONT_FRAGMENT != 0
    }

    #[must_use]
    pub const fn more_fragments(&self) -> bool {
        self.flags_and_fragment_offset & FLAG_MORE_FRAGMENTS != 0
    }

    /// The fragment offset in units of 8 bytes.
    #[must_use]
    pub const fn fragment_offset(&self) -> u16 {
        self.flags_and_fragment_offset & 0x1fff
    }

    /// Whether this header belongs to a fragment of a larger datagram.
    #[must_use]
    pub const fn is_fragmented(&self) -> bool {
        self.more_fragments() || self.fragment_offset() != 0
    }

    fn padded_options_len(&self) -> usize {
        self.options.len().div_ceil(4) * 4
    }
}

impl Protocol for Ipv4 {
    const KIND: PduKind = PduKind::Ipv4;

    fn header_size(&self) -> u32 {
        (HEADER_SIZE + self.padded_options_len()) as u32
    }

    fn write(&self, frame: &mut [u8], inner: Option<PduKind>, _: Option<&Layer>) -> Result<()> {
        let header_size = self.header_size() as usize;
        let total_length = u16::try_from(frame.len()).map_err(|_| {
            Error::MalformedPacket(format!("IPv4 datagram of {} bytes", frame.len()))
        })?;
        let protocol = inner
            .and_then(IpProtocol::from_kind)
            .unwrap_or(self.protocol);
        let mut packet = Ipv4Packet::new(&mut frame[..header_size])?;
        packet.set_version(4);
        packet.set_header_length((header_size / 4) as u8);
        packet.set_tos(self.tos);
        packet.set_total_length(total_length);
        packet.set_identification(self.identification);
        packet.set_flags_and_fragment_offset(self.flags_and_fragment_offset);
        packet.set_ttl(self.ttl);
        packet.set_protocol(protocol);
        packet.set_source(self.src);
        packet.set_destination(self.dst);
        packet.set_options_raw(&self.options);
        packet.set_checksum(0);
        let checksum = ipv4_header_checksum(packet.packet());
        packet.set_checksum(checksum);
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Decoded<'_, Self>> {
        let packet = Ipv4Packet::new_view(bytes)?;
        let header_len = usize::from(packet.get_header_length()) * 4;
        if packet.get_version() != 4
            || header_len < HEADER_SIZE
            || header_len > bytes.len()
        {
            return Err(Error::MalformedPacket(format!(
                "invalid IPv4 header version={} ihl={}",
                packet.get_version(),
                packet.get_header_length()
            )));
        }
        let total_length = match usize::from(packet.get_total_length()) {
            0 => bytes.len(),
            len if len < header_len => {
                return Err(Error::MalformedPacket(format!(
                    "IPv4 total length {len} shorter than header {header_len}"
                )))
            }
            len => len.min(bytes.len()),
        };
        let protocol = packet.get_protocol();
        let header = Self {
            tos: packet.get_tos(),
            identification: packet.get_identification(),
            flags_and_fragment_offset: packet.get_flags_and_fragment_offset(),
            ttl: packet.get_ttl(),
            protocol,
            src: packet.get_source(),
            dst: packet.get_destination(),
            options: packet.get_options_raw().to_vec(),
            checksum: packet.get_checksum(),
        };
        // a fragment only carries part of the transport datagram
        let next = if header.is_fragmented() {
            None
        } else {
            protocol.kind()
        };
        Ok(Decoded::new(header, &bytes[header_len..total_length], next))
    }

    fn from_layer(layer: &Layer) -> Option<&Self> {
        match layer {
            Layer::Ipv4(ip) => Some(ip),
            _ => None,
        }
    }

    fn from_layer_mut(layer: &mut Layer) -> Option<&mut Self> {
        match layer {
            Layer::Ipv4(ip) => Some(ip),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawPdu;
    use crate::udp::Udp;
    use crate::Pdu;
    use hex_literal::hex;
    use test_case::test_case;

    #[test]
    fn test_version_and_header_length() {
        let mut buf = [0_u8; Ipv4Packet::minimum_packet_size()];
        let mut packet = Ipv4Packet::new(&mut buf).unwrap();
        packet.set_version(4);
        packet.set_header_length(5);
        assert_eq!(4, packet.get_version());
        assert_eq!(5, packet.get_header_length());
        assert_eq!([0x45], packet.packet()[..1]);
    }

    #[test]
    fn test_addresses() {
        let mut buf = [0_u8; Ipv4Packet::minimum_packet_size()];
        let mut packet = Ipv4Packet::new(&mut buf).unwrap();
        packet.set_source(Ipv4Addr::new(192, 168, 1, 1));
        packet.set_destination(Ipv4Addr::new(8, 8, 4, 4));
        assert_eq!(Ipv4Addr::new(192, 168, 1, 1), packet.get_source());
        assert_eq!(Ipv4Addr::new(8, 8, 4, 4), packet.get_destination());
        assert_eq!(hex!("c0 a8 01 01 08 08 04 04"), packet.packet()[12..20]);
    }

    #[test]
    fn test_view() {
        let buf = hex!(
            "
            45 00 00 1c 38 c0 40 00 40 11 00 00 c0 a8 01 15
            01 01 01 01 04 d2 00 35 00 08 00 00
            "
        );
        let packet = Ipv4Packet::new_view(&buf).unwrap();
        assert_eq!(28, packet.get_total_length());
        assert_eq!(0x38c0, packet.get_identification());
        assert_eq!(FLAG_DONT_FRAGMENT, packet.get_flags_and_fragment_offset());
        assert_eq!(64, packet.get_ttl());
        assert_eq!(IpProtocol::Udp, packet.get_protocol());
        assert!(packet.get_options_raw().is_empty());
        assert_eq!(8, packet.payload().len());
    }

    #[test]
    fn test_serialize_computes_lengths_and_checksum() {
        let pdu = Ipv4::new(Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(192, 168, 1, 21))
            / Udp::new(53, 1234)
            / RawPdu::new(vec![0; 4]);
        let bytes = pdu.serialize().unwrap();
        let packet = Ipv4Packet::new_view(&bytes).unwrap();
        assert_eq!(32, packet.get_total_length());
        assert_eq!(5, packet.get_header_length());
        assert_eq!(IpProtocol::Udp, packet.get_protocol());
        assert_eq!(ipv4_header_checksum(packet.header()), packet.get_checksum());
        assert_ne!(0, packet.get_checksum());
    }

    #[test]
    fn test_options_are_padded() {
        let mut ip = Ipv4::new(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST);
        ip.options = vec![0x94, 0x04, 0x00];
        assert_eq!(24, ip.header_size());
        let bytes = Pdu::new(ip).serialize().unwrap();
        assert_eq!(0x46, bytes[0]);
        assert_eq!(hex!("94 04 00 00"), bytes[20..24]);
        let reparsed = Pdu::parse::<Ipv4>(&bytes).unwrap();
        assert_eq!(
            vec![0x94, 0x04, 0x00, 0x00],
            reparsed.find::<Ipv4>().unwrap().options
        );
    }

    #[test]
    fn test_round_trip() {
        let mut ip = Ipv4::new(Ipv4Addr::new(10, 1, 2, 3), Ipv4Addr::new(172, 16, 0, 9));
        ip.tos = 0xb8;
        ip.ttl = 17;
        ip.identification = 0xbeef;
        ip.flags_and_fragment_offset = FLAG_DONT_FRAGMENT;
        ip.protocol = IpProtocol::Other(99);
        let bytes = (ip.clone() / RawPdu::new(vec![1, 2, 3])).serialize().unwrap();
        let reparsed = Pdu::parse::<Ipv4>(&bytes).unwrap();
        let decoded = reparsed.find::<Ipv4>().unwrap();
        assert_eq!(ip.tos, decoded.tos);
        assert_eq!(ip.ttl, decoded.ttl);
        assert_eq!(ip.identification, decoded.identification);
        assert_eq!(ip.protocol, decoded.protocol);
        assert!(decoded.dont_fragment());
        assert_eq!(Some(&[1_u8, 2, 3][..]), reparsed.find::<RawPdu>().map(RawPdu::payload));
    }

    #[test]
    fn test_total_length_excludes_trailing_bytes() {
        let mut bytes = Pdu::new(Ipv4::new(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST))
            .serialize()
            .unwrap();
        bytes.extend_from_slice(&[0; 6]);
        let reparsed = Pdu::parse::<Ipv4>(&bytes).unwrap();
        assert!(reparsed.inner().is_none());
    }

    #[test_case(0x0010; "later fragment")]
    #[test_case(FLAG_MORE_FRAGMENTS; "first fragment")]
    fn test_fragment_payload_is_raw(flags_and_fragment_offset: u16) {
        let mut ip = Ipv4::new(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST);
        ip.flags_and_fragment_offset = flags_and_fragment_offset;
        let pdu = ip / Udp::new(1, 2);
        let bytes = pdu.serialize().unwrap();
        let reparsed = Pdu::parse::<Ipv4>(&bytes).unwrap();
        assert!(reparsed.find::<Udp>().is_none());
        assert!(reparsed.find::<RawPdu>().is_some());
    }

    #[test]
    fn test_invalid_header_length() {
        let buf = hex!("44 00 00 14 00 00 00 00 40 11 00 00 7f 00 00 01 7f 00 00 01");
        assert!(matches!(
            Pdu::parse::<Ipv4>(&buf),
            Err(Error::MalformedPacket(_))
        ));
    }
}
