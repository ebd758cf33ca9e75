use crate::buffer::Buffer;
use crate::checksum::transport_checksum;
use crate::error::{Error, Result};
use crate::pdu::{Decoded, Layer, PduKind, Protocol};
use crate::{fmt_payload, IpProtocol};
use std::fmt::{Debug, Formatter};

const SOURCE_PORT_OFFSET: usize = 0;
const DESTINATION_PORT_OFFSET: usize = 2;
const LENGTH_OFFSET: usize = 4;
const CHECKSUM_OFFSET: usize = 6;

/// A view of an `UDP` header and its payload.
pub struct UdpPacket<'a> {
    buf: Buffer<'a>,
}

impl<'a> UdpPacket<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        let buf = Buffer::mutable("UdpPacket", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        let buf = Buffer::view("UdpPacket", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        8
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
    pub fn get_length(&self) -> u16 {
        self.buf.read_u16(LENGTH_OFFSET)
    }

    #[must_use]
    pub fn get_checksum(&self) -> u16 {
        self.buf.read_u16(CHECKSUM_OFFSET)
    }

    pub fn set_source(&mut self, val: u16) {
        self.buf.write_u16(SOURCE_PORT_OFFSET, val);
    }

    pub fn set_destination(&mut self, val: u16) {
        self.buf.write_u16(DESTINATION_PORT_OFFSET, val);
    }

    pub fn set_length(&mut self, val: u16) {
        self.buf.write_u16(LENGTH_OFFSET, val);
    }

    pub fn set_checksum(&mut self, val: u16) {
        self.buf.write_u16(CHECKSUM_OFFSET, val);
    }

    pub fn set_payload(&mut self, payload: &[u8]) {
        let end = Self::minimum_packet_size() + payload.len();
        self.buf.as_slice_mut()[Self::minimum_packet_size()..end].copy_from_slice(payload);
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

impl Debug for UdpPacket<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpPacket")
            .field("source", &self.get_source())
            .field("destination", &self.get_destination())
            .field("length", &self.get_length())
            .field("checksum", &self.get_checksum())
            .field("payload", &fmt_payload(self.payload()))
            .finish()
    }
}

/// An `UDP` layer.
///
/// The payload of an `UDP` datagram is always decoded as a [`crate::raw::RawPdu`], use
/// [`crate::raw::RawPdu::to_pdu`] to decode application protocols such as `DNS` or `DHCP`.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Udp {
    pub sport: u16,
    pub dport: u16,
    /// The checksum found when the datagram was decoded.
    pub checksum: u16,
}

impl Udp {
    #[must_use]
    pub const fn new(dport: u16, sport: u16) -> Self {
        Self {
            sport,
            dport,
            checksum: 0,
        }
    }
}

impl Protocol for Udp {
    const KIND: PduKind = PduKind::Udp;

    fn header_size(&self) -> u32 {
        UdpPacket::minimum_packet_size() as u32
    }

    fn write(&self, frame: &mut [u8], _: Option<PduKind>, parent: Option<&Layer>) -> Result<()> {
        let length = u16::try_from(frame.len())
            .map_err(|_| Error::MalformedPacket(format!("UDP datagram of {} bytes", frame.len())))?;
        let mut packet = UdpPacket::new(frame)?;
        packet.set_source(self.sport);
        packet.set_destination(self.dport);
        packet.set_length(length);
        packet.set_checksum(0);
        if let Some((src, dst)) = parent.and_then(Layer::ip_addresses) {
            if let Some(checksum) = transport_checksum(packet.packet(), IpProtocol::Udp, src, dst)
            {
                packet.set_checksum(checksum);
            }
        }
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Decoded<'_, Self>> {
        let packet = UdpPacket::new_view(bytes)?;
        let end = match usize::from(packet.get_length()) {
            len if (UdpPacket::minimum_packet_size()..=bytes.len()).contains(&len) => len,
            _ => bytes.len(),
        };
        let header = Self {
            sport: packet.get_source(),
            dport: packet.get_destination(),
            checksum: packet.get_checksum(),
        };
        Ok(Decoded::new(
            header,
            &bytes[UdpPacket::minimum_packet_size()..end],
            None,
        ))
    }

    fn from_layer(layer: &Layer) -> Option<&Self> {
        match layer {
            Layer::Udp(udp) => Some(udp),
            _ => None,
        }
    }

    fn from_layer_mut(layer: &mut Layer) -> Option<&mut Self> {
        match layer {
            Layer::Udp(udp) => Some(udp),
            _ => None,
        }
    }
}
