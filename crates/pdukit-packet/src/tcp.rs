use crate::buffer::Buffer;
use crate::checksum::transport_checksum;
use crate::error::{Error, Result};
use crate::pdu::{Decoded, Layer, PduKind, Protocol};
use crate::{fmt_payload, IpProtocol};
use bitflags::bitflags;
use std::fmt::{Debug, Formatter};

const SOURCE_PORT_OFFSET: usize = 0;
const DESTINATION_PORT_OFFSET: usize = 2;
const SEQUENCE_OFFSET: usize = 4;
const ACKNOWLEDGEMENT_OFFSET: usize = 8;
const DATA_OFFSET_OFFSET: usize = 12;
const FLAGS_OFFSET: usize = 13;
const WINDOW_SIZE_OFFSET: usize = 14;
const CHECKSUM_OFFSET: usize = 16;
const URGENT_POINTER_OFFSET: usize = 18;

bitflags! {
    /// The `TCP` control flags.
    #[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
    pub struct TcpFlags: u8 {
        const FIN = 0x01;
        const SYN = 0x02;
        const RST = 0x04;
        const PSH = 0x08;
        const ACK = 0x10;
        const URG = 0x20;
        const ECE = 0x40;
        const CWR = 0x80;
    }
}

/// A view of a `TCP` segment.
///
/// Options are exposed raw, use [`Tcp`] for the decoded form.
pub struct TcpPacket<'a> {
    buf: Buffer<'a>,
}

impl<'a> TcpPacket<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        let buf = Buffer::mutable("TcpPacket", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        let buf = Buffer::view("TcpPacket", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        20
    }

    #[must_use]
    pub fn get_source(&self) -> u16 {
        self.buf.read_u16(SOURCE_PORT_OFFSET)
    }

    #[must_use]
    pub fn get_destination(&self) -> u16 {
        self.buf.read_u16(DESTINATION_PORT_OFFSET)
    }

    #[must_use]
    pub fn get_sequence(&self) -> u32 {
        self.buf.read_u32(SEQUENCE_OFFSET)
    }

    #[must_use]
    pub fn get_acknowledgement(&self) -> u32 {
        self.buf.read_u32(ACKNOWLEDGEMENT_OFFSET)
    }

    /// The header length in 32-bit words.
    #[must_use]
    pub fn get_data_offset(&self) -> u8 {
        self.buf.read(DATA_OFFSET_OFFSET) >> 4
    }

    #[must_use]
    pub fn get_flags(&self) -> TcpFlags {
        TcpFlags::from_bits_retain(self.buf.read(FLAGS_OFFSET))
    }

    #[must_use]
    pub fn get_window_size(&self) -> u16 {
        self.buf.read_u16(WINDOW_SIZE_OFFSET)
    }

    #[must_use]
    pub fn get_checksum(&self) -> u16 {
        self.buf.read_u16(CHECKSUM_OFFSET)
    }

    #[must_use]
    pub fn get_urgent_pointer(&self) -> u16 {
        self.buf.read_u16(URGENT_POINTER_OFFSET)
    }

    #[must_use]
    pub fn get_options_raw(&self) -> &[u8] {
        let start = Self::minimum_packet_size();
        let end = self.header_len().clamp(start, self.buf.len());
        &self.buf.as_slice()[start..end]
    }

    pub fn set_source(&mut self, val: u16) {
        self.buf.write_u16(SOURCE_PORT_OFFSET, val);
    }

    pub fn set_destination(&mut self, val: u16) {
        self.buf.write_u16(DESTINATION_PORT_OFFSET, val);
    }

    pub fn set_sequence(&mut self, val: u32) {
        self.buf.write_u32(SEQUENCE_OFFSET, val);
    }

    pub fn set_acknowledgement(&mut self, val: u32) {
        self.buf.write_u32(ACKNOWLEDGEMENT_OFFSET, val);
    }

    pub fn set_data_offset(&mut self, val: u8) {
        self.buf.write_masked(DATA_OFFSET_OFFSET, 0xf0, val << 4);
    }

    pub fn set_flags(&mut self, val: TcpFlags) {
        *self.buf.write(FLAGS_OFFSET) = val.bits();
    }

    pub fn set_window_size(&mut self, val: u16) {
        self.buf.write_u16(WINDOW_SIZE_OFFSET, val);
    }

    pub fn set_checksum(&mut self, val: u16) {
        self.buf.write_u16(CHECKSUM_OFFSET, val);
    }

    pub fn set_urgent_pointer(&mut self, val: u16) {
        self.buf.write_u16(URGENT_POINTER_OFFSET, val);
    }

    pub fn set_options_raw(&mut self, options: &[u8]) {
        let end = Self::minimum_packet_size() + options.len();
        self.buf.as_slice_mut()[Self::minimum_packet_size()..end].copy_from_slice(options);
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        let start = self.header_len().min(self.buf.len());
        &self.buf.as_slice()[start..]
    }

    fn header_len(&self) -> usize {
        usize::from(self.get_data_offset()) * 4
    }
}

impl Debug for TcpPacket<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpPacket")
            .field("source", &self.get_source())
            .field("destination", &self.get_destination())
            .field("sequence", &self.get_sequence())
            .field("acknowledgement", &self.get_acknowledgement())
            .field("data_offset", &self.get_data_offset())
            .field("flags", &self.get_flags())
            .field("window_size", &self.get_window_size())
            .field("checksum", &self.get_checksum())
            .field("urgent_pointer", &self.get_urgent_pointer())
            .field("options_raw", &fmt_payload(self.get_options_raw()))
            .field("payload", &fmt_payload(self.payload()))
            .finish()
    }
}

/// Well known `TCP` option kinds.
pub mod option_kind {
    pub const END_OF_LIST: u8 = 0;
    pub const NOP: u8 = 1;
    pub const MSS: u8 = 2;
    pub const WINDOW_SCALE: u8 = 3;
    pub const SACK_PERMITTED: u8 = 4;
    pub const SACK: u8 = 5;
    pub const TIMESTAMP: u8 = 8;
}

/// A single `TCP` option.
///
/// `NOP` and end of list options are a single byte, every other option is written as kind,
/// length and data.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TcpOption {
    pub kind: u8,
    pub data: Vec<u8>,
}

impl TcpOption {
    #[must_use]
    pub const fn new(kind: u8, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    #[must_use]
    pub const fn nop() -> Self {
        Self::new(option_kind::NOP, Vec::new())
    }

    #[must_use]
    pub fn mss(mss: u16) -> Self {
        Self::new(option_kind::MSS, mss.to_be_bytes().to_vec())
    }

    #[must_use]
    pub fn window_scale(shift: u8) -> Self {
        Self::new(option_kind::WINDOW_SCALE, vec![shift])
    }

    #[must_use]
    pub const fn sack_permitted() -> Self {
        Self::new(option_kind::SACK_PERMITTED, Vec::new())
    }

    #[must_use]
    pub fn timestamp(value: u32, echo_reply: u32) -> Self {
        let mut data = value.to_be_bytes().to_vec();
        data.extend_from_slice(&echo_reply.to_be_bytes());
        Self::new(option_kind::TIMESTAMP, data)
    }

    const fn is_single_byte(&self) -> bool {
        matches!(self.kind, option_kind::END_OF_LIST | option_kind::NOP)
    }

    fn wire_size(&self) -> usize {
        if self.is_single_byte() {
            1
        } else {
            2 + self.data.len()
        }
    }
}

/// Decode a raw `TCP` option block.
fn parse_options(mut bytes: &[u8]) -> Result<Vec<TcpOption>> {
    let mut options = Vec::new();
    while let [kind, rest @ ..] = bytes {
        match *kind {
            option_kind::END_OF_LIST => break,
            option_kind::NOP => {
                options.push(TcpOption::nop());
                bytes = rest;
            }
            kind => {
                let len = rest.first().map(|len| usize::from(*len)).unwrap_or_default();
                if len < 2 || len > bytes.len() {
                    return Err(Error::MalformedPacket(format!(
                        "TCP option {kind} with length {len}"
                    )));
                }
                options.push(TcpOption::new(kind, bytes[2..len].to_vec()));
                bytes = &bytes[len..];
            }
        }
    }
    Ok(options)
}

/// A `TCP` layer.
///
/// The data offset and checksum are computed when serialized, the checksum only when the
/// enclosing layer is `IPv4` or `IPv6`.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Tcp {
    pub sport: u16,
    pub dport: u16,
    pub seq: u32,
    pub ack_seq: u32,
    pub flags: TcpFlags,
    pub window: u16,
    pub urgent_ptr: u16,
    pub options: Vec<TcpOption>,
    /// The checksum found when the segment was decoded.
    pub checksum: u16,
}

impl Tcp {
    /// The default window size of built segments.
    pub const DEFAULT_WINDOW: u16 = 32678;

    #[must_use]
    pub fn new(dport: u16, sport: u16) -> Self {
        Self {
            sport,
            dport,
            window: Self::DEFAULT_WINDOW,
            ..Default::default()
        }
    }

    #[must_use]
    pub const fn has_flags(&self, flags: TcpFlags) -> bool {
        self.flags.contains(flags)
    }

    /// Find the first option of the given kind.
    #[must_use]
    pub fn search_option(&self, kind: u8) -> Option<&TcpOption> {
        self.options.iter().find(|opt| opt.kind == kind)
    }

    /// The maximum segment size option.
    pub fn mss(&self) -> Result<u16> {
        let opt = self
            .search_option(option_kind::MSS)
            .ok_or(Error::OptionNotFound(option_kind::MSS))?;
        <[u8; 2]>::try_from(opt.data.as_slice())
            .map(u16::from_be_bytes)
            .map_err(|_| Error::MalformedOption(option_kind::MSS))
    }

    /// The window scale option.
    pub fn window_scale(&self) -> Result<u8> {
        match self.search_option(option_kind::WINDOW_SCALE) {
            Some(TcpOption { data, .. }) if data.len() == 1 => Ok(data[0]),
            Some(_) => Err(Error::MalformedOption(option_kind::WINDOW_SCALE)),
            None => Err(Error::OptionNotFound(option_kind::WINDOW_SCALE)),
        }
    }

    /// The timestamp option as `(value, echo reply)`.
    pub fn timestamp(&self) -> Result<(u32, u32)> {
        let opt = self
            .search_option(option_kind::TIMESTAMP)
            .ok_or(Error::OptionNotFound(option_kind::TIMESTAMP))?;
        match opt.data.as_slice() {
            [a, b, c, d, e, f, g, h] => Ok((
                u32::from_be_bytes([*a, *b, *c, *d]),
                u32::from_be_bytes([*e, *f, *g, *h]),
            )),
            _ => Err(Error::MalformedOption(option_kind::TIMESTAMP)),
        }
    }

    fn padded_options_len(&self) -> usize {
        self.options
            .iter()
            .map(TcpOption::wire_size)
            .sum::<usize>()
            .div_ceil(4)
            * 4
    }

    fn options_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.padded_options_len());
        for opt in &self.options {
            bytes.push(opt.kind);
            if !opt.is_single_byte() {
                bytes.push((2 + opt.data.len()) as u8);
                bytes.extend_from_slice(&opt.data);
            }
        }
        bytes.resize(self.padded_options_len(), 0);
        bytes
    }
}

impl Protocol for Tcp {
    const KIND: PduKind = PduKind::Tcp;

    fn header_size(&self) -> u32 {
        (TcpPacket::minimum_packet_size() + self.padded_options_len()) as u32
    }

    fn write(&self, frame: &mut [u8], _: Option<PduKind>, parent: Option<&Layer>) -> Result<()> {
        let header_size = self.header_size() as usize;
        if header_size > 60 {
            return Err(Error::MalformedPacket(format!(
                "TCP header of {header_size} bytes"
            )));
        }
        let mut packet = TcpPacket::new(frame)?;
        packet.set_source(self.sport);
        packet.set_destination(self.dport);
        packet.set_sequence(self.seq);
        packet.set_acknowledgement(self.ack_seq);
        packet.set_data_offset((header_size / 4) as u8);
        packet.set_flags(self.flags);
        packet.set_window_size(self.window);
        packet.set_urgent_pointer(self.urgent_ptr);
        packet.set_options_raw(&self.options_bytes());
        packet.set_checksum(0);
        if let Some((src, dst)) = parent.and_then(Layer::ip_addresses) {
            if let Some(checksum) = transport_checksum(packet.packet(), IpProtocol::Tcp, src, dst)
            {
                packet.set_checksum(checksum);
            }
        }
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Decoded<'_, Self>> {
        let packet = TcpPacket::new_view(bytes)?;
        let header_len = usize::from(packet.get_data_offset()) * 4;
        if header_len < TcpPacket::minimum_packet_size() || header_len > bytes.len() {
            return Err(Error::MalformedPacket(format!(
                "invalid TCP data offset {}",
                packet.get_data_offset()
            )));
        }
        let header = Self {
            sport: packet.get_source(),
            dport: packet.get_destination(),
            seq: packet.get_sequence(),
            ack_seq: packet.get_acknowledgement(),
            flags: packet.get_flags(),
            window: packet.get_window_size(),
            urgent_ptr: packet.get_urgent_pointer(),
            options: parse_options(packet.get_options_raw())?,
            checksum: packet.get_checksum(),
        };
        Ok(Decoded::new(header, &bytes[header_len..], None))
    }

    fn from_layer(layer: &Layer) -> Option<&Self> {
        match layer {
            Layer::Tcp(tcp) => Some(tcp),
            _ => None,
        }
    }

    fn from_layer_mut(layer: &mut Layer) -> Option<&mut Self> {
        match layer {
            Layer::Tcp(tcp) => Some(tcp),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::tcp_ipv4_checksum;
    use crate::ipv4::Ipv4;
    use crate::raw::RawPdu;
    use crate::Pdu;
    use hex_literal::hex;
    use std::net::Ipv4Addr;

    #[test]
    fn test_view() {
        let buf = hex!("00 50 80 ea 00 00 00 00 95 9d 2e c7 50 12 ff ff 55 cc 00 00");
        let packet = TcpPacket::new_view(&buf).unwrap();
        assert_eq!(80, packet.get_source());
        assert_eq!(33002, packet.get_destination());
        assert_eq!(0, packet.get_sequence());
        assert_eq!(0x959d_2ec7, packet.get_acknowledgement());
        assert_eq!(5, packet.get_data_offset());
        assert_eq!(TcpFlags::SYN | TcpFlags::ACK, packet.get_flags());
        assert_eq!(0xffff, packet.get_window_size());
        assert_eq!(0x55cc, packet.get_checksum());
        assert!(packet.get_options_raw().is_empty());
    }

    #[test]
    fn test_data_offset_and_flags() {
        let mut buf = [0_u8; TcpPacket::minimum_packet_size()];
        let mut packet = TcpPacket::new(&mut buf).unwrap();
        packet.set_data_offset(8);
        packet.set_flags(TcpFlags::FIN | TcpFlags::PSH);
        assert_eq!(8, packet.get_data_offset());
        assert_eq!(hex!("80 09"), packet.packet()[12..14]);
    }

    #[test]
    fn test_options_are_padded() {
        let mut tcp = Tcp::new(80, 1024);
        tcp.options = vec![TcpOption::mss(1460), TcpOption::sack_permitted(), TcpOption::nop()];
        assert_eq!(28, tcp.header_size());
        let bytes = Pdu::new(tcp).serialize().unwrap();
        assert_eq!(7, bytes[12] >> 4);
        assert_eq!(hex!("02 04 05 b4 04 02 01 00"), bytes[20..28]);
    }

    #[test]
    fn test_option_round_trip() {
        let mut tcp = Tcp::new(443, 50000);
        tcp.flags = TcpFlags::SYN;
        tcp.seq = 0xdead_beef;
        tcp.options = vec![
            TcpOption::mss(1400),
            TcpOption::nop(),
            TcpOption::window_scale(7),
            TcpOption::timestamp(1, 2),
        ];
        let bytes = Pdu::new(tcp.clone()).serialize().unwrap();
        let reparsed = Pdu::parse::<Tcp>(&bytes).unwrap();
        let decoded = reparsed.find::<Tcp>().unwrap();
        assert_eq!(Ok(1400), decoded.mss());
        assert_eq!(Ok(7), decoded.window_scale());
        assert_eq!(Ok((1, 2)), decoded.timestamp());
        assert_eq!(tcp.seq, decoded.seq);
        assert!(decoded.has_flags(TcpFlags::SYN));
    }

    #[test]
    fn test_missing_option() {
        let tcp = Tcp::new(1, 2);
        assert_eq!(Err(Error::OptionNotFound(option_kind::MSS)), tcp.mss());
    }

    #[test]
    fn test_checksum_from_parent() {
        let src = Ipv4Addr::new(10, 0, 0, 1);
        let dst = Ipv4Addr::new(10, 0, 0, 2);
        let pdu = Ipv4::new(dst, src) / Tcp::new(80, 4000) / RawPdu::new(b"GET /".to_vec());
        let bytes = pdu.serialize().unwrap();
        let tcp = TcpPacket::new_view(&bytes[20..]).unwrap();
        assert_eq!(tcp_ipv4_checksum(tcp.packet(), src, dst), tcp.get_checksum());
        assert_eq!(b"GET /", tcp.payload());
        assert_eq!(6, bytes[9]);
    }

    #[test]
    fn test_bad_option_length() {
        let mut buf = [0_u8; 24];
        buf[12] = 0x60;
        buf[20..].copy_from_slice(&hex!("02 09 05 b4"));
        assert!(matches!(
            Pdu::parse::<Tcp>(&buf),
            Err(Error::MalformedPacket(_))
        ));
    }
}
