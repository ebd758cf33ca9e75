use crate::error::{Error, Result};
use crate::pdu::{Decoded, Layer, PduKind, Protocol};
use bitflags::bitflags;
use std::net::{Ipv4Addr, Ipv6Addr};

const HEADER_SIZE: usize = 12;
const MAX_NAME_LENGTH: usize = 255;
const MAX_LABEL_LENGTH: usize = 63;
const MAX_POINTER_JUMPS: usize = 64;
const POINTER_MASK: u8 = 0xc0;

/// Resource record types.
pub mod record_type {
    pub const A: u16 = 1;
    pub const NS: u16 = 2;
    pub const CNAME: u16 = 5;
    pub const SOA: u16 = 6;
    pub const PTR: u16 = 12;
    pub const MX: u16 = 15;
    pub const TXT: u16 = 16;
    pub const AAAA: u16 = 28;
    pub const ANY: u16 = 255;
}

/// The Internet class.
pub const CLASS_IN: u16 = 1;

bitflags! {
    /// The flags word of the header.
    ///
    /// The opcode (bits 11-14) and response code (bits 0-3) are kept as unnamed bits.
    #[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
    pub struct DnsFlags: u16 {
        const RESPONSE = 0x8000;
        const AUTHORITATIVE = 0x0400;
        const TRUNCATED = 0x0200;
        const RECURSION_DESIRED = 0x0100;
        const RECURSION_AVAILABLE = 0x0080;
        const AUTHENTIC_DATA = 0x0020;
        const CHECKING_DISABLED = 0x0010;
    }
}

impl DnsFlags {
    #[must_use]
    pub const fn opcode(self) -> u8 {
        ((self.bits() >> 11) & 0x0f) as u8
    }

    #[must_use]
    pub const fn rcode(self) -> u8 {
        (self.bits() & 0x0f) as u8
    }

    #[must_use]
    pub const fn with_rcode(self, rcode: u8) -> Self {
        Self::from_bits_retain((self.bits() & !0x0f) | (rcode as u16 & 0x0f))
    }
}

/// An entry of the question section.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Query {
    pub name: String,
    pub query_type: u16,
    pub query_class: u16,
}

impl Query {
    #[must_use]
    pub fn new(name: impl Into<String>, query_type: u16) -> Self {
        Self {
            name: name.into(),
            query_type,
            query_class: CLASS_IN,
        }
    }

    fn size(&self) -> usize {
        name_size(&self.name) + 4
    }
}

/// The decoded data of a resource record.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RecordData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    /// The target of a `NS`, `CNAME` or `PTR` record.
    Name(String),
    Mx {
        preference: u16,
        exchange: String,
    },
    /// The data of any other type, as found on the wire.
    Raw(Vec<u8>),
}

impl RecordData {
    fn size(&self) -> usize {
        match self {
            Self::A(_) => 4,
            Self::Aaaa(_) => 16,
            Self::Name(name) => name_size(name),
            Self::Mx { exchange, .. } => 2 + name_size(exchange),
            Self::Raw(data) => data.len(),
        }
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::A(addr) => out.extend_from_slice(&addr.octets()),
            Self::Aaaa(addr) => out.extend_from_slice(&addr.octets()),
            Self::Name(name) => encode_name(name, out)?,
            Self::Mx {
                preference,
                exchange,
            } => {
                out.extend_from_slice(&preference.to_be_bytes());
                encode_name(exchange, out)?;
            }
            Self::Raw(data) => out.extend_from_slice(data),
        }
        Ok(())
    }
}

/// An entry of the answer, authority or additional sections.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Resource {
    pub name: String,
    pub record_type: u16,
    pub record_class: u16,
    pub ttl: u32,
    pub data: RecordData,
}

impl Resource {
    /// A record whose type is derived from its data, falling back to `record_type` for raw data.
    #[must_use]
    pub fn new(name: impl Into<String>, ttl: u32, data: RecordData) -> Self {
        let record_type = match &data {
            RecordData::A(_) => record_type::A,
            RecordData::Aaaa(_) => record_type::AAAA,
            RecordData::Name(_) => record_type::CNAME,
            RecordData::Mx { .. } => record_type::MX,
            RecordData::Raw(_) => record_type::TXT,
        };
        Self {
            name: name.into(),
            record_type,
            record_class: CLASS_IN,
            ttl,
            data,
        }
    }

    fn size(&self) -> usize {
        name_size(&self.name) + 10 + self.data.size()
    }
}

/// A `DNS` message.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Dns {
    pub id: u16,
    pub flags: DnsFlags,
    pub queries: Vec<Query>,
    pub answers: Vec<Resource>,
    pub authority: Vec<Resource>,
    pub additional: Vec<Resource>,
}

impl Dns {
    /// A recursive query for a single name.
    #[must_use]
    pub fn query(id: u16, name: impl Into<String>, query_type: u16) -> Self {
        Self {
            id,
            flags: DnsFlags::RECURSION_DESIRED,
            queries: vec![Query::new(name, query_type)],
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn is_response(&self) -> bool {
        self.flags.contains(DnsFlags::RESPONSE)
    }

    /// Turn this query into a response carrying the given answers.
    #[must_use]
    pub fn into_response(mut self, answers: Vec<Resource>) -> Self {
        self.flags |= DnsFlags::RESPONSE | DnsFlags::RECURSION_AVAILABLE;
        self.answers = answers;
        self
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let count = |len: usize, section: &str| {
            u16::try_from(len)
                .map_err(|_| Error::MalformedPacket(format!("too many DNS {section}")))
        };
        let mut out = Vec::with_capacity(self.header_size() as usize);
        out.extend_from_slice(&self.id.to_be_bytes());
        out.extend_from_slice(&self.flags.bits().to_be_bytes());
        out.extend_from_slice(&count(self.queries.len(), "queries")?.to_be_bytes());
        out.extend_from_slice(&count(self.answers.len(), "answers")?.to_be_bytes());
        out.extend_from_slice(&count(self.authority.len(), "authority records")?.to_be_bytes());
        out.extend_from_slice(&count(self.additional.len(), "additional records")?.to_be_bytes());
        for query in &self.queries {
            encode_name(&query.name, &mut out)?;
            out.extend_from_slice(&query.query_type.to_be_bytes());
            out.extend_from_slice(&query.query_class.to_be_bytes());
        }
        for record in self
            .answers
            .iter()
            .chain(&self.authority)
            .chain(&self.additional)
        {
            encode_name(&record.name, &mut out)?;
            out.extend_from_slice(&record.record_type.to_be_bytes());
            out.extend_from_slice(&record.record_class.to_be_bytes());
            out.extend_from_slice(&record.ttl.to_be_bytes());
            out.extend_from_slice(&count(record.data.size(), "record data bytes")?.to_be_bytes());
            record.data.write(&mut out)?;
        }
        Ok(out)
    }
}

impl Protocol for Dns {
    const KIND: PduKind = PduKind::Dns;

    fn header_size(&self) -> u32 {
        let records = self
            .answers
            .iter()
            .chain(&self.authority)
            .chain(&self.additional)
            .map(Resource::size)
            .sum::<usize>();
        (HEADER_SIZE + self.queries.iter().map(Query::size).sum::<usize>() + records) as u32
    }

    fn write(&self, frame: &mut [u8], _: Option<PduKind>, _: Option<&Layer>) -> Result<()> {
        let bytes = self.to_bytes()?;
        let available = frame.len();
        frame
            .get_mut(..bytes.len())
            .ok_or_else(|| {
                Error::InsufficientPacketBuffer(String::from("Dns"), bytes.len(), available)
            })?
            .copy_from_slice(&bytes);
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Decoded<'_, Self>> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::InsufficientPacketBuffer(
                String::from("Dns"),
                HEADER_SIZE,
                bytes.len(),
            ));
        }
        let word = |offset: usize| u16::from_be_bytes([bytes[offset], bytes[offset + 1]]);
        let mut reader = MessageReader {
            message: bytes,
            offset: HEADER_SIZE,
        };
        let queries = (0..word(4))
            .map(|_| reader.query())
            .collect::<Result<Vec<_>>>()?;
        let answers = reader.resources(word(6))?;
        let authority = reader.resources(word(8))?;
        let additional = reader.resources(word(10))?;
        let dns = Self {
            id: word(0),
            flags: DnsFlags::from_bits_retain(word(2)),
            queries,
            answers,
            authority,
            additional,
        };
        Ok(Decoded::new(dns, &bytes[reader.offset..], None))
    }

    fn from_layer(layer: &Layer) -> Option<&Self> {
        match layer {
            Layer::Dns(dns) => Some(dns),
            _ => None,
        }
    }

    fn from_layer_mut(layer: &mut Layer) -> Option<&mut Self> {
        match layer {
            Layer::Dns(dns) => Some(dns),
            _ => None,
        }
    }
}

/// The number of bytes of a name written without compression.
fn name_size(name: &str) -> usize {
    let name = name.trim_end_matches('.');
    if name.is_empty() {
        1
    } else {
        name.split('.').map(|label| label.len() + 1).sum::<usize>() + 1
    }
}

fn encode_name(name: &str, out: &mut Vec<u8>) -> Result<()> {
    let trimmed = name.trim_end_matches('.');
    if name_size(trimmed) > MAX_NAME_LENGTH {
        return Err(Error::MalformedPacket(format!("DNS name too long: {name}")));
    }
    if !trimmed.is_empty() {
        for label in trimmed.split('.') {
            if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
                return Err(Error::MalformedPacket(format!("invalid DNS label in {name}")));
            }
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
    }
    out.push(0);
    Ok(())
}

struct MessageReader<'a> {
    message: &'a [u8],
    offset: usize,
}

impl MessageReader<'_> {
    fn malformed(&self, what: &str) -> Error {
        Error::MalformedPacket(format!("DNS {what} at offset {}", self.offset))
    }

    fn take(&mut self, len: usize) -> Result<&[u8]> {
        let bytes = self
            .message
            .get(self.offset..self.offset + len)
            .ok_or_else(|| self.malformed("truncated message"))?;
        self.offset += len;
        Ok(bytes)
    }

    fn u16(&mut self) -> Result<u16> {
        self.take(2).map(|val| u16::from_be_bytes([val[0], val[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        self.take(4)
            .map(|val| u32::from_be_bytes([val[0], val[1], val[2], val[3]]))
    }

    /// Read a possibly compressed name, leaving the offset after its encoding.
    fn name(&mut self) -> Result<String> {
        let (name, end) = read_name(self.message, self.offset)?;
        self.offset = end;
        Ok(name)
    }

    fn query(&mut self) -> Result<Query> {
        Ok(Query {
            name: self.name()?,
            query_type: self.u16()?,
            query_class: self.u16()?,
        })
    }

    fn resources(&mut self, count: u16) -> Result<Vec<Resource>> {
        (0..count).map(|_| self.resource()).collect()
    }

    fn resource(&mut self) -> Result<Resource> {
        let name = self.name()?;
        let record_type = self.u16()?;
        let record_class = self.u16()?;
        let ttl = self.u32()?;
        let data_length = usize::from(self.u16()?);
        let start = self.offset;
        let raw = self.take(data_length)?.to_vec();
        let data = match (record_type, raw.len()) {
            (record_type::A, 4) => RecordData::A(Ipv4Addr::new(raw[0], raw[1], raw[2], raw[3])),
            (record_type::AAAA, 16) => {
                let mut octets = [0_u8; 16];
                octets.copy_from_slice(&raw);
                RecordData::Aaaa(Ipv6Addr::from(octets))
            }
            (record_type::A | record_type::AAAA, _) => {
                return Err(self.malformed("address record of unexpected length"))
            }
            (record_type::NS | record_type::CNAME | record_type::PTR, _) => {
                RecordData::Name(read_name(self.message, start)?.0)
            }
            (record_type::MX, len) if len >= 3 => RecordData::Mx {
                preference: u16::from_be_bytes([raw[0], raw[1]]),
                exchange: read_name(self.message, start + 2)?.0,
            },
            _ => RecordData::Raw(raw),
        };
        Ok(Resource {
            name,
            record_type,
            record_class,
            ttl,
            data,
        })
    }
}

/// Decode the name at `offset` in `message`, following compression pointers.
///
/// Returns the dotted name and the offset just after its encoding at the original position.
fn read_name(message: &[u8], mut offset: usize) -> Result<(String, usize)> {
    let malformed = |what: &str| Error::MalformedPacket(format!("DNS name {what}"));
    let mut labels: Vec<String> = Vec::new();
    let mut length = 0;
    let mut end = None;
    let mut jumps = 0;
    loop {
        let len = *message.get(offset).ok_or_else(|| malformed("truncated"))?;
        match len & POINTER_MASK {
            0 if len == 0 => break,
            0 => {
                let label = message
                    .get(offset + 1..offset + 1 + usize::from(len))
                    .ok_or_else(|| malformed("label truncated"))?;
                length += usize::from(len) + 1;
                if length > MAX_NAME_LENGTH {
                    return Err(malformed("too long"));
                }
                labels.push(String::from_utf8_lossy(label).into_owned());
                offset += 1 + usize::from(len);
            }
            POINTER_MASK => {
                let low = *message
                    .get(offset + 1)
                    .ok_or_else(|| malformed("pointer truncated"))?;
                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return Err(malformed("compression loop"));
                }
                let target = usize::from(u16::from_be_bytes([len & !POINTER_MASK, low]));
                if target < HEADER_SIZE || target >= message.len() {
                    return Err(malformed("pointer out of range"));
                }
                end.get_or_insert(offset + 2);
                offset = target;
            }
            _ => return Err(malformed("with unsupported label type")),
        }
    }
    Ok((labels.join("."), end.unwrap_or(offset + 1)))
}
