use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::options::{HasTaggedOptions, OptionFormat, OptionList, TaggedOption, DHCP_END};
use crate::pdu::{Decoded, Layer, PduKind, Protocol};
use crate::HwAddress;
use std::fmt::{Debug, Formatter};
use std::net::Ipv4Addr;

const OPCODE_OFFSET: usize = 0;
const HTYPE_OFFSET: usize = 1;
const HLEN_OFFSET: usize = 2;
const HOPS_OFFSET: usize = 3;
const XID_OFFSET: usize = 4;
const SECS_OFFSET: usize = 8;
const FLAGS_OFFSET: usize = 10;
const CIADDR_OFFSET: usize = 12;
const YIADDR_OFFSET: usize = 16;
const SIADDR_OFFSET: usize = 20;
const GIADDR_OFFSET: usize = 24;
const CHADDR_OFFSET: usize = 28;
const SNAME_OFFSET: usize = 44;
const FILE_OFFSET: usize = 108;
const MAGIC_OFFSET: usize = 236;

const CHADDR_SIZE: usize = 16;
const SNAME_SIZE: usize = 64;
const FILE_SIZE: usize = 128;

/// The cookie which separates the `BOOTP` header from the `DHCP` options.
pub const MAGIC_COOKIE: u32 = 0x6382_5363;

pub const BOOTREQUEST: u8 = 1;
pub const BOOTREPLY: u8 = 2;

/// The hardware type for Ethernet.
pub const HTYPE_ETHERNET: u8 = 1;

/// The broadcast bit of the flags field.
pub const FLAG_BROADCAST: u16 = 0x8000;

/// `DHCP` option tags.
pub mod option_id {
    pub const SUBNET_MASK: u8 = 1;
    pub const ROUTERS: u8 = 3;
    pub const DOMAIN_NAME_SERVERS: u8 = 6;
    pub const HOST_NAME: u8 = 12;
    pub const DOMAIN_NAME: u8 = 15;
    pub const BROADCAST_ADDRESS: u8 = 28;
    pub const REQUESTED_ADDRESS: u8 = 50;
    pub const LEASE_TIME: u8 = 51;
    pub const MESSAGE_TYPE: u8 = 53;
    pub const SERVER_IDENTIFIER: u8 = 54;
    pub const PARAMETER_REQUEST_LIST: u8 = 55;
    pub const RENEWAL_TIME: u8 = 58;
    pub const REBINDING_TIME: u8 = 59;
}

/// The value of the message type option.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DhcpMessageType {
    Discover,
    Offer,
    Request,
    Decline,
    Ack,
    Nak,
    Release,
    Inform,
}

impl DhcpMessageType {
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::Discover => 1,
            Self::Offer => 2,
            Self::Request => 3,
            Self::Decline => 4,
            Self::Ack => 5,
            Self::Nak => 6,
            Self::Release => 7,
            Self::Inform => 8,
        }
    }
}

impl TryFrom<u8> for DhcpMessageType {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        Ok(match id {
            1 => Self::Discover,
            2 => Self::Offer,
            3 => Self::Request,
            4 => Self::Decline,
            5 => Self::Ack,
            6 => Self::Nak,
            7 => Self::Release,
            8 => Self::Inform,
            _ => return Err(Error::MalformedOption(option_id::MESSAGE_TYPE)),
        })
    }
}

/// A view of the fixed `BOOTP` header, followed by the `DHCP` magic cookie.
pub struct BootpPacket<'a> {
    buf: Buffer<'a>,
}

impl<'a> BootpPacket<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        let buf = Buffer::mutable("BootpPacket", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        let buf = Buffer::view("BootpPacket", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        MAGIC_OFFSET + 4
    }

    #[must_use]
    pub fn get_opcode(&self) -> u8 {
        self.buf.read(OPCODE_OFFSET)
    }

    #[must_use]
    pub fn get_htype(&self) -> u8 {
        self.buf.read(HTYPE_OFFSET)
    }

    #[must_use]
    pub fn get_hlen(&self) -> u8 {
        self.buf.read(HLEN_OFFSET)
    }

    #[must_use]
    pub fn get_hops(&self) -> u8 {
        self.buf.read(HOPS_OFFSET)
    }

    #[must_use]
    pub fn get_xid(&self) -> u32 {
        self.buf.read_u32(XID_OFFSET)
    }

    #[must_use]
    pub fn get_secs(&self) -> u16 {
        self.buf.read_u16(SECS_OFFSET)
    }

    #[must_use]
    pub fn get_flags(&self) -> u16 {
        self.buf.read_u16(FLAGS_OFFSET)
    }

    #[must_use]
    pub fn get_ciaddr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.buf.get_bytes(CIADDR_OFFSET))
    }

    #[must_use]
    pub fn get_yiaddr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.buf.get_bytes(YIADDR_OFFSET))
    }

    #[must_use]
    pub fn get_siaddr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.buf.get_bytes(SIADDR_OFFSET))
    }

    #[must_use]
    pub fn get_giaddr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.buf.get_bytes(GIADDR_OFFSET))
    }

    #[must_use]
    pub fn get_chaddr(&self) -> [u8; CHADDR_SIZE] {
        self.buf.get_bytes(CHADDR_OFFSET)
    }

    #[must_use]
    pub fn get_sname(&self) -> [u8; SNAME_SIZE] {
        self.buf.get_bytes(SNAME_OFFSET)
    }

    #[must_use]
    pub fn get_file(&self) -> [u8; FILE_SIZE] {
        self.buf.get_bytes(FILE_OFFSET)
    }

    #[must_use]
    pub fn get_magic(&self) -> u32 {
        self.buf.read_u32(MAGIC_OFFSET)
    }

    pub fn set_opcode(&mut self, val: u8) {
        *self.buf.write(OPCODE_OFFSET) = val;
    }

    pub fn set_htype(&mut self, val: u8) {
        *self.buf.write(HTYPE_OFFSET) = val;
    }

    pub fn set_hlen(&mut self, val: u8) {
        *self.buf.write(HLEN_OFFSET) = val;
    }

    pub fn set_hops(&mut self, val: u8) {
        *self.buf.write(HOPS_OFFSET) = val;
    }

    pub fn set_xid(&mut self, val: u32) {
        self.buf.write_u32(XID_OFFSET, val);
    }

    pub fn set_secs(&mut self, val: u16) {
        self.buf.write_u16(SECS_OFFSET, val);
    }

    pub fn set_flags(&mut self, val: u16) {
        self.buf.write_u16(FLAGS_OFFSET, val);
    }

    pub fn set_ciaddr(&mut self, val: Ipv4Addr) {
        self.buf.set_bytes(CIADDR_OFFSET, val.octets());
    }

    pub fn set_yiaddr(&mut self, val: Ipv4Addr) {
        self.buf.set_bytes(YIADDR_OFFSET, val.octets());
    }

    pub fn set_siaddr(&mut self, val: Ipv4Addr) {
        self.buf.set_bytes(SIADDR_OFFSET, val.octets());
    }

    pub fn set_giaddr(&mut self, val: Ipv4Addr) {
        self.buf.set_bytes(GIADDR_OFFSET, val.octets());
    }

    pub fn set_chaddr(&mut self, val: [u8; CHADDR_SIZE]) {
        self.buf.set_bytes(CHADDR_OFFSET, val);
    }

    pub fn set_sname(&mut self, val: [u8; SNAME_SIZE]) {
        self.buf.set_bytes(SNAME_OFFSET, val);
    }

    pub fn set_file(&mut self, val: [u8; FILE_SIZE]) {
        self.buf.set_bytes(FILE_OFFSET, val);
    }

    pub fn set_magic(&mut self, val: u32) {
        self.buf.write_u32(MAGIC_OFFSET, val);
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }

    /// The options which follow the magic cookie.
    #[must_use]
    pub fn options(&self) -> &[u8] {
        &self.buf.as_slice()[Self::minimum_packet_size()..]
    }
}

impl Debug for BootpPacket<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootpPacket")
            .field("opcode", &self.get_opcode())
            .field("htype", &self.get_htype())
            .field("hlen", &self.get_hlen())
            .field("hops", &self.get_hops())
            .field("xid", &self.get_xid())
            .field("secs", &self.get_secs())
            .field("flags", &self.get_flags())
            .field("ciaddr", &self.get_ciaddr())
            .field("yiaddr", &self.get_yiaddr())
            .field("siaddr", &self.get_siaddr())
            .field("giaddr", &self.get_giaddr())
            .field("magic", &self.get_magic())
            .finish_non_exhaustive()
    }
}

/// A `DHCP` message, the `BOOTP` header fields followed by a tagged option list.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Dhcp {
    pub opcode: u8,
    pub htype: u8,
    pub hlen: u8,
    pub hops: u8,
    pub xid: u32,
    pub secs: u16,
    pub flags: u16,
    pub ciaddr: Ipv4Addr,
    pub yiaddr: Ipv4Addr,
    pub siaddr: Ipv4Addr,
    pub giaddr: Ipv4Addr,
    pub chaddr: [u8; CHADDR_SIZE],
    pub sname: [u8; SNAME_SIZE],
    pub file: [u8; FILE_SIZE],
    pub options: OptionList,
}

impl Default for Dhcp {
    fn default() -> Self {
        Self {
            opcode: BOOTREQUEST,
            htype: HTYPE_ETHERNET,
            hlen: HwAddress::SIZE as u8,
            hops: 0,
            xid: 0,
            secs: 0,
            flags: 0,
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::UNSPECIFIED,
            siaddr: Ipv4Addr::UNSPECIFIED,
            giaddr: Ipv4Addr::UNSPECIFIED,
            chaddr: [0; CHADDR_SIZE],
            sname: [0; SNAME_SIZE],
            file: [0; FILE_SIZE],
            options: OptionList::new(),
        }
    }
}

impl Dhcp {
    /// A request from the client with the given hardware address, carrying only the message type.
    #[must_use]
    pub fn request(message_type: DhcpMessageType, xid: u32, client: HwAddress) -> Self {
        let mut dhcp = Self {
            xid,
            ..Self::default()
        };
        dhcp.set_client_hw_addr(client);
        dhcp.set_message_type(message_type);
        dhcp
    }

    /// The client hardware address, assuming an Ethernet `chaddr`.
    #[must_use]
    pub fn client_hw_addr(&self) -> HwAddress {
        let mut octets = [0; HwAddress::SIZE];
        octets.copy_from_slice(&self.chaddr[..HwAddress::SIZE]);
        HwAddress(octets)
    }

    pub fn set_client_hw_addr(&mut self, addr: HwAddress) {
        self.chaddr = [0; CHADDR_SIZE];
        self.chaddr[..HwAddress::SIZE].copy_from_slice(&addr.octets());
        self.hlen = HwAddress::SIZE as u8;
    }

    pub fn message_type(&self) -> Result<DhcpMessageType> {
        DhcpMessageType::try_from(self.options.get(option_id::MESSAGE_TYPE)?.to_u8()?)
    }

    pub fn set_message_type(&mut self, message_type: DhcpMessageType) {
        self.set_option(option_id::MESSAGE_TYPE, vec![message_type.id()]);
    }

    pub fn server_identifier(&self) -> Result<Ipv4Addr> {
        self.options.get(option_id::SERVER_IDENTIFIER)?.to_ipv4()
    }

    pub fn set_server_identifier(&mut self, addr: Ipv4Addr) {
        self.set_option(option_id::SERVER_IDENTIFIER, addr.octets().to_vec());
    }

    /// The lease time in seconds.
    pub fn lease_time(&self) -> Result<u32> {
        self.options.get(option_id::LEASE_TIME)?.to_u32()
    }

    pub fn set_lease_time(&mut self, secs: u32) {
        self.set_option(option_id::LEASE_TIME, secs.to_be_bytes().to_vec());
    }

    pub fn renewal_time(&self) -> Result<u32> {
        self.options.get(option_id::RENEWAL_TIME)?.to_u32()
    }

    pub fn set_renewal_time(&mut self, secs: u32) {
        self.set_option(option_id::RENEWAL_TIME, secs.to_be_bytes().to_vec());
    }

    pub fn rebind_time(&self) -> Result<u32> {
        self.options.get(option_id::REBINDING_TIME)?.to_u32()
    }

    pub fn set_rebind_time(&mut self, secs: u32) {
        self.set_option(option_id::REBINDING_TIME, secs.to_be_bytes().to_vec());
    }

    pub fn subnet_mask(&self) -> Result<Ipv4Addr> {
        self.options.get(option_id::SUBNET_MASK)?.to_ipv4()
    }

    pub fn set_subnet_mask(&mut self, mask: Ipv4Addr) {
        self.set_option(option_id::SUBNET_MASK, mask.octets().to_vec());
    }

    pub fn routers(&self) -> Result<Vec<Ipv4Addr>> {
        self.options.get(option_id::ROUTERS)?.to_ipv4_list()
    }

    pub fn set_routers(&mut self, routers: &[Ipv4Addr]) {
        self.set_option(option_id::ROUTERS, flatten(routers));
    }

    pub fn domain_name_servers(&self) -> Result<Vec<Ipv4Addr>> {
        self.options
            .get(option_id::DOMAIN_NAME_SERVERS)?
            .to_ipv4_list()
    }

    pub fn set_domain_name_servers(&mut self, servers: &[Ipv4Addr]) {
        self.set_option(option_id::DOMAIN_NAME_SERVERS, flatten(servers));
    }

    pub fn broadcast(&self) -> Result<Ipv4Addr> {
        self.options.get(option_id::BROADCAST_ADDRESS)?.to_ipv4()
    }

    pub fn set_broadcast(&mut self, addr: Ipv4Addr) {
        self.set_option(option_id::BROADCAST_ADDRESS, addr.octets().to_vec());
    }

    pub fn requested_ip(&self) -> Result<Ipv4Addr> {
        self.options.get(option_id::REQUESTED_ADDRESS)?.to_ipv4()
    }

    pub fn set_requested_ip(&mut self, addr: Ipv4Addr) {
        self.set_option(option_id::REQUESTED_ADDRESS, addr.octets().to_vec());
    }

    pub fn domain_name(&self) -> Result<String> {
        self.options.get(option_id::DOMAIN_NAME)?.to_string_value()
    }

    pub fn set_domain_name(&mut self, name: &str) {
        self.set_option(option_id::DOMAIN_NAME, name.as_bytes().to_vec());
    }

    pub fn hostname(&self) -> Result<String> {
        self.options.get(option_id::HOST_NAME)?.to_string_value()
    }

    pub fn set_hostname(&mut self, name: &str) {
        self.set_option(option_id::HOST_NAME, name.as_bytes().to_vec());
    }

    /// Append the `END` option.
    pub fn end(&mut self) {
        self.options.add(TaggedOption::new(DHCP_END, Vec::new()));
    }

    fn set_option(&mut self, tag: u8, value: Vec<u8>) {
        self.options.set(TaggedOption::new(tag, value));
    }
}

fn flatten(addrs: &[Ipv4Addr]) -> Vec<u8> {
    addrs.iter().flat_map(Ipv4Addr::octets).collect()
}

impl HasTaggedOptions for Dhcp {
    fn options(&self) -> &OptionList {
        &self.options
    }

    fn options_mut(&mut self) -> &mut OptionList {
        &mut self.options
    }
}

impl Protocol for Dhcp {
    const KIND: PduKind = PduKind::Dhcp;

    fn header_size(&self) -> u32 {
        (BootpPacket::minimum_packet_size() + self.options.wire_size(OptionFormat::Dhcp)) as u32
    }

    fn write(&self, frame: &mut [u8], _: Option<PduKind>, _: Option<&Layer>) -> Result<()> {
        let mut packet = BootpPacket::new(frame)?;
        packet.set_opcode(self.opcode);
        packet.set_htype(self.htype);
        packet.set_hlen(self.hlen);
        packet.set_hops(self.hops);
        packet.set_xid(self.xid);
        packet.set_secs(self.secs);
        packet.set_flags(self.flags);
        packet.set_ciaddr(self.ciaddr);
        packet.set_yiaddr(self.yiaddr);
        packet.set_siaddr(self.siaddr);
        packet.set_giaddr(self.giaddr);
        packet.set_chaddr(self.chaddr);
        packet.set_sname(self.sname);
        packet.set_file(self.file);
        packet.set_magic(MAGIC_COOKIE);
        self.options.write(
            &mut frame[BootpPacket::minimum_packet_size()..],
            OptionFormat::Dhcp,
        )?;
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Decoded<'_, Self>> {
        let packet = BootpPacket::new_view(bytes)?;
        if packet.get_magic() != MAGIC_COOKIE {
            return Err(Error::MalformedPacket(format!(
                "invalid DHCP magic cookie {:#010x}",
                packet.get_magic()
            )));
        }
        let header = Self {
            opcode: packet.get_opcode(),
            htype: packet.get_htype(),
            hlen: packet.get_hlen(),
            hops: packet.get_hops(),
            xid: packet.get_xid(),
            secs: packet.get_secs(),
            flags: packet.get_flags(),
            ciaddr: packet.get_ciaddr(),
            yiaddr: packet.get_yiaddr(),
            siaddr: packet.get_siaddr(),
            giaddr: packet.get_giaddr(),
            chaddr: packet.get_chaddr(),
            sname: packet.get_sname(),
            file: packet.get_file(),
            options: OptionList::parse(packet.options(), OptionFormat::Dhcp),
        };
        Ok(Decoded::new(header, &[], None))
    }

    fn from_layer(layer: &Layer) -> Option<&Self> {
        match layer {
            Layer::Dhcp(dhcp) => Some(dhcp),
            _ => None,
        }
    }

    fn from_layer_mut(layer: &mut Layer) -> Option<&mut Self> {
        match layer {
            Layer::Dhcp(dhcp) => Some(dhcp),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipv4::Ipv4;
    use crate::options::DHCP_PAD;
    use crate::raw::RawPdu;
    use crate::udp::Udp;
    use crate::Pdu;
    use hex_literal::hex;

    const CLIENT: HwAddress = HwAddress([0x00, 0x0b, 0x82, 0x01, 0xfc, 0x42]);

    fn bootp_bytes(options: &[u8]) -> Vec<u8> {
        let mut buf = vec![0_u8; BootpPacket::minimum_packet_size()];
        buf[..12].copy_from_slice(&hex!("02 01 06 00 00 00 3d 1e 00 00 80 00"));
        buf[YIADDR_OFFSET..YIADDR_OFFSET + 4].copy_from_slice(&[192, 168, 0, 10]);
        buf[CHADDR_OFFSET..CHADDR_OFFSET + 6].copy_from_slice(&CLIENT.octets());
        buf[MAGIC_OFFSET..].copy_from_slice(&hex!("63 82 53 63"));
        buf.extend_from_slice(options);
        buf
    }

    #[test]
    fn test_encode_discover() {
        let mut dhcp = Dhcp::request(DhcpMessageType::Discover, 0x3d1d, CLIENT);
        dhcp.end();
        assert_eq!(244, dhcp.header_size());
        let bytes = Pdu::new(dhcp).serialize().unwrap();
        assert_eq!(hex!("01 01 06 00 00 00 3d 1d"), bytes[..8]);
        assert_eq!(CLIENT.octets(), bytes[CHADDR_OFFSET..CHADDR_OFFSET + 6]);
        assert_eq!(hex!("63 82 53 63 35 01 01 ff"), bytes[MAGIC_OFFSET..]);
    }

    #[test]
    fn test_decode_offer() {
        let buf = bootp_bytes(&hex!(
            "35 01 02 36 04 c0 a8 00 01 33 04 00 00 0e 10 01"
            "04 ff ff ff 00 03 04 c0 a8 00 01 06 08 08 08 08"
            "08 08 08 04 04 ff"
        ));
        let dhcp = Dhcp::decode(&buf).unwrap().header;
        assert_eq!(BOOTREPLY, dhcp.opcode);
        assert_eq!(0x3d1e, dhcp.xid);
        assert_eq!(FLAG_BROADCAST, dhcp.flags);
        assert_eq!(Ipv4Addr::new(192, 168, 0, 10), dhcp.yiaddr);
        assert_eq!(CLIENT, dhcp.client_hw_addr());
        assert_eq!(Ok(DhcpMessageType::Offer), dhcp.message_type());
        assert_eq!(Ok(Ipv4Addr::new(192, 168, 0, 1)), dhcp.server_identifier());
        assert_eq!(Ok(3600), dhcp.lease_time());
        assert_eq!(Ok(Ipv4Addr::new(255, 255, 255, 0)), dhcp.subnet_mask());
        assert_eq!(Ok(vec![Ipv4Addr::new(192, 168, 0, 1)]), dhcp.routers());
        assert_eq!(
            Ok(vec![Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::new(8, 8, 4, 4)]),
            dhcp.domain_name_servers()
        );
        assert_eq!(Err(Error::OptionNotFound(option_id::HOST_NAME)), dhcp.hostname());
        assert_eq!(DHCP_END, dhcp.options.iter().last().unwrap().tag);
    }

    #[test]
    fn test_pad_options() {
        let buf = bootp_bytes(&hex!("00 00 35 01 05 ff"));
        let dhcp = Dhcp::decode(&buf).unwrap().header;
        let tags = dhcp.options.iter().map(|opt| opt.tag).collect::<Vec<_>>();
        assert_eq!(vec![DHCP_PAD, DHCP_PAD, option_id::MESSAGE_TYPE, DHCP_END], tags);
        assert_eq!(Ok(DhcpMessageType::Ack), dhcp.message_type());
        assert_eq!(buf.len() as u32, dhcp.header_size());
    }

    #[test]
    fn test_options_after_end_are_ignored() {
        let buf = bootp_bytes(&hex!("35 01 01 ff 03 04 0a 00 00 01 00 00 00"));
        let dhcp = Dhcp::decode(&buf).unwrap().header;
        assert_eq!(2, dhcp.options.len());
        assert_eq!(Ok(DhcpMessageType::Discover), dhcp.message_type());
        assert_eq!(Err(Error::OptionNotFound(option_id::ROUTERS)), dhcp.routers());
        assert_eq!(
            (BootpPacket::minimum_packet_size() + 4) as u32,
            dhcp.header_size()
        );
    }

    #[test]
    fn test_round_trip_helpers() {
        let mut dhcp = Dhcp::request(DhcpMessageType::Request, 7, CLIENT);
        dhcp.set_requested_ip(Ipv4Addr::new(10, 1, 1, 20));
        dhcp.set_hostname("printer");
        dhcp.set_domain_name("example.org");
        dhcp.set_renewal_time(1800);
        dhcp.set_rebind_time(3150);
        dhcp.set_broadcast(Ipv4Addr::new(10, 1, 1, 255));
        dhcp.end();
        let bytes = Pdu::new(dhcp.clone()).serialize().unwrap();
        let decoded = Dhcp::decode(&bytes).unwrap().header;
        assert_eq!(dhcp, decoded);
        assert_eq!(Ok(Ipv4Addr::new(10, 1, 1, 20)), decoded.requested_ip());
        assert_eq!(Ok(String::from("printer")), decoded.hostname());
        assert_eq!(Ok(String::from("example.org")), decoded.domain_name());
        assert_eq!(Ok(1800), decoded.renewal_time());
        assert_eq!(Ok(3150), decoded.rebind_time());
        assert_eq!(Ok(Ipv4Addr::new(10, 1, 1, 255)), decoded.broadcast());
    }

    #[test]
    fn test_set_replaces_option() {
        let mut dhcp = Dhcp::request(DhcpMessageType::Discover, 1, CLIENT);
        dhcp.set_message_type(DhcpMessageType::Release);
        assert_eq!(1, dhcp.options.len());
        assert_eq!(Ok(DhcpMessageType::Release), dhcp.message_type());
        assert!(dhcp.remove_option(option_id::MESSAGE_TYPE));
        assert!(dhcp.search_option(option_id::MESSAGE_TYPE).is_none());
    }

    #[test]
    fn test_unknown_message_type() {
        let dhcp = Dhcp::decode(&bootp_bytes(&hex!("35 01 63"))).unwrap().header;
        assert_eq!(
            Err(Error::MalformedOption(option_id::MESSAGE_TYPE)),
            dhcp.message_type()
        );
    }

    #[test]
    fn test_bad_magic() {
        let mut buf = bootp_bytes(&[]);
        buf[MAGIC_OFFSET] = 0;
        assert!(matches!(
            Dhcp::decode(&buf),
            Err(Error::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_truncated() {
        let buf = bootp_bytes(&[]);
        assert!(matches!(
            Pdu::parse::<Dhcp>(&buf[..200]),
            Err(Error::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_over_udp() {
        let mut dhcp = Dhcp::request(DhcpMessageType::Discover, 99, CLIENT);
        dhcp.end();
        let pdu = Ipv4::new(Ipv4Addr::BROADCAST, Ipv4Addr::UNSPECIFIED)
            / Udp::new(67, 68)
            / dhcp.clone();
        let bytes = pdu.serialize().unwrap();
        let reparsed = Pdu::parse::<Ipv4>(&bytes).unwrap();
        let raw = reparsed.find::<RawPdu>().unwrap();
        assert_eq!(Ok(dhcp), raw.to::<Dhcp>());
    }
}
