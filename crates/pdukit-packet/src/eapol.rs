use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::fmt_payload;
use crate::pdu::{Decoded, Layer, PduKind, Protocol};
use bitflags::bitflags;
use std::fmt::{Debug, Formatter};

const VERSION_OFFSET: usize = 0;
const PACKET_TYPE_OFFSET: usize = 1;
const LENGTH_OFFSET: usize = 2;
const HEADER_SIZE: usize = 4;

const DESCRIPTOR_TYPE_OFFSET: usize = 4;
const KEY_INFO_OFFSET: usize = 5;
const KEY_LENGTH_OFFSET: usize = 7;
const REPLAY_COUNTER_OFFSET: usize = 9;
const NONCE_OFFSET: usize = 17;
const KEY_IV_OFFSET: usize = 49;
const RSC_OFFSET: usize = 65;
const ID_OFFSET: usize = 73;
const MIC_OFFSET: usize = 81;
const KEY_DATA_LENGTH_OFFSET: usize = 97;
const RSN_KEY_SIZE: usize = 99;

const RC4_KEY_LENGTH_OFFSET: usize = 5;
const RC4_REPLAY_COUNTER_OFFSET: usize = 7;
const RC4_KEY_IV_OFFSET: usize = 15;
const RC4_KEY_INDEX_OFFSET: usize = 31;
const RC4_KEY_SIGN_OFFSET: usize = 32;
const RC4_KEY_SIZE: usize = 48;

pub const PACKET_TYPE_EAP: u8 = 0;
pub const PACKET_TYPE_START: u8 = 1;
pub const PACKET_TYPE_LOGOFF: u8 = 2;
pub const PACKET_TYPE_KEY: u8 = 3;

pub const DESCRIPTOR_RC4: u8 = 1;
pub const DESCRIPTOR_RSN: u8 = 2;
pub const DESCRIPTOR_WPA: u8 = 254;

pub const EAP_REQUEST: u8 = 1;
pub const EAP_RESPONSE: u8 = 2;
pub const EAP_SUCCESS: u8 = 3;
pub const EAP_FAILURE: u8 = 4;

/// The size of a key nonce.
pub const NONCE_SIZE: usize = 32;

/// The size of a key `MIC`.
pub const MIC_SIZE: usize = 16;

/// The default `EAPOL` protocol version.
pub const DEFAULT_VERSION: u8 = 1;

bitflags! {
    /// The single bit fields of the key information field.
    ///
    /// The descriptor version (bits 0-2) and key index (bits 4-5) are kept as unnamed bits.
    #[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
    pub struct KeyInformation: u16 {
        const PAIRWISE = 0x0008;
        const INSTALL = 0x0040;
        const KEY_ACK = 0x0080;
        const KEY_MIC = 0x0100;
        const SECURE = 0x0200;
        const ERROR = 0x0400;
        const REQUEST = 0x0800;
        const ENCRYPTED = 0x1000;
    }
}

impl KeyInformation {
    /// `HMAC-MD5` and `RC4`, used with `TKIP`.
    pub const VERSION_HMAC_MD5: u16 = 1;

    /// `HMAC-SHA1` and `AES` key wrap, used with `CCMP`.
    pub const VERSION_HMAC_SHA1: u16 = 2;

    #[must_use]
    pub const fn descriptor_version(self) -> u16 {
        self.bits() & 0x0007
    }

    #[must_use]
    pub const fn key_index(self) -> u8 {
        ((self.bits() >> 4) & 0x03) as u8
    }

    #[must_use]
    pub const fn with_descriptor_version(self, version: u16) -> Self {
        Self::from_bits_retain((self.bits() & !0x0007) | (version & 0x0007))
    }
}

/// Represents the header shared by every `EAPOL` frame.
pub struct EapolPacket<'a> {
    buf: Buffer<'a>,
}

impl<'a> EapolPacket<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        let buf = Buffer::mutable("EapolPacket", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        let buf = Buffer::view("EapolPacket", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        HEADER_SIZE
    }

    #[must_use]
    pub fn get_version(&self) -> u8 {
        self.buf.read(VERSION_OFFSET)
    }

    #[must_use]
    pub fn get_packet_type(&self) -> u8 {
        self.buf.read(PACKET_TYPE_OFFSET)
    }

    #[must_use]
    pub fn get_length(&self) -> u16 {
        self.buf.read_u16(LENGTH_OFFSET)
    }

    pub fn set_version(&mut self, val: u8) {
        *self.buf.write(VERSION_OFFSET) = val;
    }

    pub fn set_packet_type(&mut self, val: u8) {
        *self.buf.write(PACKET_TYPE_OFFSET) = val;
    }

    pub fn set_length(&mut self, val: u16) {
        self.buf.write_u16(LENGTH_OFFSET, val);
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.buf.as_slice()[HEADER_SIZE..]
    }
}

impl Debug for EapolPacket<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EapolPacket")
            .field("version", &self.get_version())
            .field("packet_type", &self.get_packet_type())
            .field("length", &self.get_length())
            .field("payload", &fmt_payload(self.payload()))
            .finish()
    }
}

/// Represents an `RSN` (or `WPA`) key frame, including its `EAPOL` header.
pub struct RsnKeyPacket<'a> {
    buf: Buffer<'a>,
}

impl<'a> RsnKeyPacket<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        let buf = Buffer::mutable("RsnKeyPacket", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        let buf = Buffer::view("RsnKeyPacket", packet, Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        RSN_KEY_SIZE
    }

    #[must_use]
    pub fn get_descriptor_type(&self) -> u8 {
        self.buf.read(DESCRIPTOR_TYPE_OFFSET)
    }

    #[must_use]
    pub fn get_key_info(&self) -> KeyInformation {
        KeyInformation::from_bits_retain(self.buf.read_u16(KEY_INFO_OFFSET))
    }

    #[must_use]
    pub fn get_key_length(&self) -> u16 {
        self.buf.read_u16(KEY_LENGTH_OFFSET)
    }

    #[must_use]
    pub fn get_replay_counter(&self) -> u64 {
        u64::from_be_bytes(self.buf.get_bytes(REPLAY_COUNTER_OFFSET))
    }

    #[must_use]
    pub fn get_nonce(&self) -> [u8; NONCE_SIZE] {
        self.buf.get_bytes(NONCE_OFFSET)
    }

    #[must_use]
    pub fn get_key_iv(&self) -> [u8; 16] {
        self.buf.get_bytes(KEY_IV_OFFSET)
    }

    #[must_use]
    pub fn get_rsc(&self) -> [u8; 8] {
        self.buf.get_bytes(RSC_OFFSET)
    }

    #[must_use]
    pub fn get_id(&self) -> [u8; 8] {
        self.buf.get_bytes(ID_OFFSET)
    }

    #[must_use]
    pub fn get_mic(&self) -> [u8; MIC_SIZE] {
        self.buf.get_bytes(MIC_OFFSET)
    }

    #[must_use]
    pub fn get_key_data_length(&self) -> u16 {
        self.buf.read_u16(KEY_DATA_LENGTH_OFFSET)
    }

    pub fn set_descriptor_type(&mut self, val: u8) {
        *self.buf.write(DESCRIPTOR_TYPE_OFFSET) = val;
    }

    pub fn set_key_info(&mut self, val: KeyInformation) {
        self.buf.set_bytes(KEY_INFO_OFFSET, val.bits().to_be_bytes());
    }

    pub fn set_key_length(&mut self, val: u16) {
        self.buf.write_u16(KEY_LENGTH_OFFSET, val);
    }

    pub fn set_replay_counter(&mut self, val: u64) {
        self.buf.set_bytes(REPLAY_COUNTER_OFFSET, val.to_be_bytes());
    }

    pub fn set_nonce(&mut self, val: [u8; NONCE_SIZE]) {
        self.buf.set_bytes(NONCE_OFFSET, val);
    }

    pub fn set_key_iv(&mut self, val: [u8; 16]) {
        self.buf.set_bytes(KEY_IV_OFFSET, val);
    }

    pub fn set_rsc(&mut self, val: [u8; 8]) {
        self.buf.set_bytes(RSC_OFFSET, val);
    }

    pub fn set_id(&mut self, val: [u8; 8]) {
        self.buf.set_bytes(ID_OFFSET, val);
    }

    pub fn set_mic(&mut self, val: [u8; MIC_SIZE]) {
        self.buf.set_bytes(MIC_OFFSET, val);
    }

    pub fn set_key_data_length(&mut self, val: u16) {
        self.buf.write_u16(KEY_DATA_LENGTH_OFFSET, val);
    }

    /// The key data and anything after it.
    #[must_use]
    pub fn key_data(&self) -> &[u8] {
        &self.buf.as_slice()[RSN_KEY_SIZE..]
    }
}

impl Debug for RsnKeyPacket<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsnKeyPacket")
            .field("descriptor_type", &self.get_descriptor_type())
            .field("key_info", &self.get_key_info())
            .field("key_length", &self.get_key_length())
            .field("replay_counter", &self.get_replay_counter())
            .field("nonce", &fmt_payload(&self.get_nonce()))
            .field("mic", &fmt_payload(&self.get_mic()))
            .field("key_data_length", &self.get_key_data_length())
            .finish()
    }
}

/// An `EAP` header carried in an `EAPOL` frame.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct Eap {
    pub code: u8,
    pub id: u8,
    /// The method type, only present in requests and responses.
    pub eap_type: Option<u8>,
}

impl Eap {
    fn size(&self) -> usize {
        4 + usize::from(self.eap_type.is_some())
    }
}

/// A legacy `RC4` key descriptor.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Rc4Key {
    pub key_length: u16,
    pub replay_counter: u64,
    pub key_iv: [u8; 16],
    pub key_index: u8,
    /// Set for a unicast key.
    pub key_flag: bool,
    pub key_sign: [u8; 16],
    pub key: Vec<u8>,
}

/// An `RSN` or `WPA` key descriptor, as exchanged during the 4-way handshake.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RsnKey {
    /// Either [`DESCRIPTOR_RSN`] or [`DESCRIPTOR_WPA`].
    pub descriptor_type: u8,
    pub key_info: KeyInformation,
    pub key_length: u16,
    pub replay_counter: u64,
    pub nonce: [u8; NONCE_SIZE],
    pub key_iv: [u8; 16],
    pub rsc: [u8; 8],
    pub id: [u8; 8],
    pub mic: [u8; MIC_SIZE],
    pub key_data: Vec<u8>,
}

impl Default for RsnKey {
    fn default() -> Self {
        Self {
            descriptor_type: DESCRIPTOR_RSN,
            key_info: KeyInformation::empty(),
            key_length: 0,
            replay_counter: 0,
            nonce: [0; NONCE_SIZE],
            key_iv: [0; 16],
            rsc: [0; 8],
            id: [0; 8],
            mic: [0; MIC_SIZE],
            key_data: Vec::new(),
        }
    }
}

/// The body of an `EAPOL` frame.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum EapolBody {
    Start,
    Logoff,
    Eap(Eap),
    Rc4Key(Rc4Key),
    RsnKey(RsnKey),
    /// A frame whose packet type or key descriptor is not decoded.
    Other(u8),
}

impl EapolBody {
    #[must_use]
    pub const fn packet_type(&self) -> u8 {
        match self {
            Self::Start => PACKET_TYPE_START,
            Self::Logoff => PACKET_TYPE_LOGOFF,
            Self::Eap(_) => PACKET_TYPE_EAP,
            Self::Rc4Key(_) | Self::RsnKey(_) => PACKET_TYPE_KEY,
            Self::Other(packet_type) => *packet_type,
        }
    }

    fn size(&self) -> usize {
        match self {
            Self::Start | Self::Logoff | Self::Other(_) => 0,
            Self::Eap(eap) => eap.size(),
            Self::Rc4Key(key) => RC4_KEY_SIZE - HEADER_SIZE + key.key.len(),
            Self::RsnKey(key) => RSN_KEY_SIZE - HEADER_SIZE + key.key_data.len(),
        }
    }
}

/// An `EAPOL` layer.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Eapol {
    pub version: u8,
    pub body: EapolBody,
}

impl Eapol {
    #[must_use]
    pub const fn new(body: EapolBody) -> Self {
        Self {
            version: DEFAULT_VERSION,
            body,
        }
    }

    #[must_use]
    pub const fn rsn_key(&self) -> Option<&RsnKey> {
        match &self.body {
            EapolBody::RsnKey(key) => Some(key),
            _ => None,
        }
    }

    pub fn rsn_key_mut(&mut self) -> Option<&mut RsnKey> {
        match &mut self.body {
            EapolBody::RsnKey(key) => Some(key),
            _ => None,
        }
    }

    fn write_rsn_key(key: &RsnKey, frame: &mut [u8]) -> Result<()> {
        let key_data_length = u16::try_from(key.key_data.len())
            .map_err(|_| Error::MalformedPacket(String::from("EAPOL key data too long")))?;
        let mut packet = RsnKeyPacket::new(frame)?;
        packet.set_descriptor_type(key.descriptor_type);
        packet.set_key_info(key.key_info);
        packet.set_key_length(key.key_length);
        packet.set_replay_counter(key.replay_counter);
        packet.set_nonce(key.nonce);
        packet.set_key_iv(key.key_iv);
        packet.set_rsc(key.rsc);
        packet.set_id(key.id);
        packet.set_mic(key.mic);
        packet.set_key_data_length(key_data_length);
        frame[RSN_KEY_SIZE..RSN_KEY_SIZE + key.key_data.len()].copy_from_slice(&key.key_data);
        Ok(())
    }

    fn write_rc4_key(key: &Rc4Key, frame: &mut [u8]) {
        frame[DESCRIPTOR_TYPE_OFFSET] = DESCRIPTOR_RC4;
        let key_length = if key.key.is_empty() {
            key.key_length
        } else {
            key.key.len() as u16
        };
        frame[RC4_KEY_LENGTH_OFFSET..RC4_KEY_LENGTH_OFFSET + 2]
            .copy_from_slice(&key_length.to_be_bytes());
        frame[RC4_REPLAY_COUNTER_OFFSET..RC4_REPLAY_COUNTER_OFFSET + 8]
            .copy_from_slice(&key.replay_counter.to_be_bytes());
        frame[RC4_KEY_IV_OFFSET..RC4_KEY_IV_OFFSET + 16].copy_from_slice(&key.key_iv);
        frame[RC4_KEY_INDEX_OFFSET] = (key.key_index & 0x7f) | (u8::from(key.key_flag) << 7);
        frame[RC4_KEY_SIGN_OFFSET..RC4_KEY_SIGN_OFFSET + 16].copy_from_slice(&key.key_sign);
        frame[RC4_KEY_SIZE..RC4_KEY_SIZE + key.key.len()].copy_from_slice(&key.key);
    }

    fn decode_rsn_key(bytes: &[u8]) -> Result<(RsnKey, usize)> {
        let packet = RsnKeyPacket::new_view(bytes)?;
        let key_data_length = usize::from(packet.get_key_data_length());
        let key_data = packet.key_data().get(..key_data_length).ok_or_else(|| {
            Error::MalformedPacket(format!(
                "EAPOL key data of {key_data_length} bytes with {} available",
                packet.key_data().len()
            ))
        })?;
        let key = RsnKey {
            descriptor_type: packet.get_descriptor_type(),
            key_info: packet.get_key_info(),
            key_length: packet.get_key_length(),
            replay_counter: packet.get_replay_counter(),
            nonce: packet.get_nonce(),
            key_iv: packet.get_key_iv(),
            rsc: packet.get_rsc(),
            id: packet.get_id(),
            mic: packet.get_mic(),
            key_data: key_data.to_vec(),
        };
        Ok((key, RSN_KEY_SIZE + key_data_length))
    }

    fn decode_rc4_key(bytes: &[u8]) -> Result<(Rc4Key, usize)> {
        if bytes.len() < RC4_KEY_SIZE {
            return Err(Error::InsufficientPacketBuffer(
                String::from("Rc4Key"),
                RC4_KEY_SIZE,
                bytes.len(),
            ));
        }
        let array = |offset: usize| -> [u8; 16] {
            core::array::from_fn(|i| bytes[offset + i])
        };
        let key_length = u16::from_be_bytes([
            bytes[RC4_KEY_LENGTH_OFFSET],
            bytes[RC4_KEY_LENGTH_OFFSET + 1],
        ]);
        let key = bytes[RC4_KEY_SIZE..]
            .get(..usize::from(key_length))
            .map(<[u8]>::to_vec)
            .unwrap_or_default();
        let consumed = RC4_KEY_SIZE + key.len();
        let key = Rc4Key {
            key_length,
            replay_counter: u64::from_be_bytes(core::array::from_fn(|i| {
                bytes[RC4_REPLAY_COUNTER_OFFSET + i]
            })),
            key_iv: array(RC4_KEY_IV_OFFSET),
            key_index: bytes[RC4_KEY_INDEX_OFFSET] & 0x7f,
            key_flag: bytes[RC4_KEY_INDEX_OFFSET] & 0x80 != 0,
            key_sign: array(RC4_KEY_SIGN_OFFSET),
            key,
        };
        Ok((key, consumed))
    }
}

impl Protocol for Eapol {
    const KIND: PduKind = PduKind::Eapol;

    fn header_size(&self) -> u32 {
        (HEADER_SIZE + self.body.size()) as u32
    }

    fn write(&self, frame: &mut [u8], _: Option<PduKind>, _: Option<&Layer>) -> Result<()> {
        let length = u16::try_from(frame.len() - HEADER_SIZE)
            .map_err(|_| Error::MalformedPacket(String::from("EAPOL frame too long")))?;
        let mut packet = EapolPacket::new(frame)?;
        packet.set_version(self.version);
        packet.set_packet_type(self.body.packet_type());
        packet.set_length(length);
        match &self.body {
            EapolBody::Eap(eap) => {
                frame[HEADER_SIZE] = eap.code;
                frame[HEADER_SIZE + 1] = eap.id;
                frame[HEADER_SIZE + 2..HEADER_SIZE + 4].copy_from_slice(&length.to_be_bytes());
                if let Some(eap_type) = eap.eap_type {
                    frame[HEADER_SIZE + 4] = eap_type;
                }
            }
            EapolBody::Rc4Key(key) => Self::write_rc4_key(key, frame),
            EapolBody::RsnKey(key) => Self::write_rsn_key(key, frame)?,
            EapolBody::Start | EapolBody::Logoff | EapolBody::Other(_) => {}
        }
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Decoded<'_, Self>> {
        let packet = EapolPacket::new_view(bytes)?;
        let end = (usize::from(packet.get_length()) + HEADER_SIZE).min(bytes.len());
        let bytes = &bytes[..end];
        let (body, consumed) = match packet.get_packet_type() {
            PACKET_TYPE_START => (EapolBody::Start, HEADER_SIZE),
            PACKET_TYPE_LOGOFF => (EapolBody::Logoff, HEADER_SIZE),
            PACKET_TYPE_EAP => {
                let eap = bytes.get(HEADER_SIZE..HEADER_SIZE + 4).ok_or_else(|| {
                    Error::InsufficientPacketBuffer(String::from("Eap"), HEADER_SIZE + 4, end)
                })?;
                let eap_type = match eap[0] {
                    EAP_REQUEST | EAP_RESPONSE => bytes.get(HEADER_SIZE + 4).copied(),
                    _ => None,
                };
                let eap = Eap {
                    code: eap[0],
                    id: eap[1],
                    eap_type,
                };
                (EapolBody::Eap(eap), HEADER_SIZE + eap.size())
            }
            PACKET_TYPE_KEY => match bytes.get(DESCRIPTOR_TYPE_OFFSET).copied() {
                Some(DESCRIPTOR_RSN | DESCRIPTOR_WPA) => {
                    let (key, consumed) = Self::decode_rsn_key(bytes)?;
                    (EapolBody::RsnKey(key), consumed)
                }
                Some(DESCRIPTOR_RC4) => {
                    let (key, consumed) = Self::decode_rc4_key(bytes)?;
                    (EapolBody::Rc4Key(key), consumed)
                }
                Some(_) => (EapolBody::Other(PACKET_TYPE_KEY), HEADER_SIZE),
                None => {
                    return Err(Error::MalformedPacket(String::from(
                        "EAPOL key frame without a descriptor type",
                    )))
                }
            },
            packet_type => (EapolBody::Other(packet_type), HEADER_SIZE),
        };
        let eapol = Self {
            version: packet.get_version(),
            body,
        };
        Ok(Decoded::new(eapol, &bytes[consumed..], None))
    }

    fn from_layer(layer: &Layer) -> Option<&Self> {
        match layer {
            Layer::Eapol(eapol) => Some(eapol),
            _ => None,
        }
    }

    fn from_layer_mut(layer: &mut Layer) -> Option<&mut Self> {
        match layer {
            Layer::Eapol(eapol) => Some(eapol),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethernet::EthernetII;
    use crate::raw::RawPdu;
    use crate::snap::Snap;
    use crate::{HwAddress, Pdu};
    use hex_literal::hex;

    fn message_1() -> RsnKey {
        RsnKey {
            key_info: (KeyInformation::PAIRWISE | KeyInformation::KEY_ACK)
                .with_descriptor_version(KeyInformation::VERSION_HMAC_SHA1),
            key_length: 16,
            replay_counter: 1,
            nonce: [0x3e; NONCE_SIZE],
            ..RsnKey::default()
        }
    }

    #[test]
    fn test_key_information() {
        let info = KeyInformation::from_bits_retain(0x008a);
        assert_eq!(2, info.descriptor_version());
        assert_eq!(0, info.key_index());
        assert!(info.contains(KeyInformation::PAIRWISE | KeyInformation::KEY_ACK));
        assert!(!info.contains(KeyInformation::KEY_MIC));
        let info = (KeyInformation::PAIRWISE | KeyInformation::KEY_MIC).with_descriptor_version(2);
        assert_eq!(0x010a, info.bits());
    }

    #[test]
    fn test_rsn_key_layout() {
        let bytes = Pdu::new(Eapol::new(EapolBody::RsnKey(message_1())))
            .serialize()
            .unwrap();
        assert_eq!(99, bytes.len());
        assert_eq!(hex!("01 03 00 5f 02 00 8a 00 10"), bytes[..9]);
        assert_eq!(hex!("00 00 00 00 00 00 00 01 3e"), bytes[9..18]);
        let packet = RsnKeyPacket::new_view(&bytes).unwrap();
        assert_eq!([0x3e; NONCE_SIZE], packet.get_nonce());
        assert_eq!(0, packet.get_key_data_length());
    }

    #[test]
    fn test_rsn_key_round_trip() {
        let mut key = message_1();
        key.key_info |= KeyInformation::KEY_MIC | KeyInformation::INSTALL;
        key.mic = [0xaa; MIC_SIZE];
        key.key_data = vec![0xdd; 22];
        let pdu = Snap::default() / Eapol::new(EapolBody::RsnKey(key.clone()));
        let bytes = pdu.serialize().unwrap();
        assert_eq!(hex!("88 8e"), bytes[6..8]);
        let reparsed = Pdu::parse::<Snap>(&bytes).unwrap();
        let eapol = reparsed.find::<Eapol>().unwrap();
        assert_eq!(Some(&key), eapol.rsn_key());
        assert!(reparsed.find::<RawPdu>().is_none());
    }

    #[test]
    fn test_length_bounds_payload() {
        let mut bytes = Pdu::new(Eapol::new(EapolBody::RsnKey(message_1())))
            .serialize()
            .unwrap();
        bytes.extend_from_slice(&[0; 6]);
        let pdu = Pdu::parse::<Eapol>(&bytes).unwrap();
        assert_eq!(1, pdu.iter().count());
    }

    #[test]
    fn test_truncated_key_data() {
        let mut key = message_1();
        key.key_data = vec![1; 10];
        let bytes = Pdu::new(Eapol::new(EapolBody::RsnKey(key)))
            .serialize()
            .unwrap();
        assert!(matches!(
            Pdu::parse::<Eapol>(&bytes[..104]),
            Err(Error::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_start_over_ethernet() {
        let pdu = EthernetII::new(HwAddress::BROADCAST, HwAddress::default())
            / Eapol::new(EapolBody::Start);
        let bytes = pdu.serialize().unwrap();
        assert_eq!(hex!("88 8e 01 01 00 00"), bytes[12..18]);
        let reparsed = Pdu::parse::<EthernetII>(&bytes).unwrap();
        assert_eq!(
            Some(&EapolBody::Start),
            reparsed.find::<Eapol>().map(|eapol| &eapol.body)
        );
    }

    #[test]
    fn test_eap_response() {
        let eap = Eap {
            code: EAP_RESPONSE,
            id: 7,
            eap_type: Some(1),
        };
        let pdu = Eapol::new(EapolBody::Eap(eap)) / RawPdu::new(b"user".to_vec());
        let bytes = pdu.serialize().unwrap();
        assert_eq!(hex!("01 00 00 09 02 07 00 09 01 75 73 65 72").to_vec(), bytes);
        let reparsed = Pdu::parse::<Eapol>(&bytes).unwrap();
        assert_eq!(
            Some(&EapolBody::Eap(eap)),
            reparsed.find::<Eapol>().map(|eapol| &eapol.body)
        );
        assert_eq!(Some(&b"user"[..]), reparsed.find::<RawPdu>().map(RawPdu::payload));
    }

    #[test]
    fn test_eap_success_has_no_type() {
        let bytes = hex!("01 00 00 04 03 07 00 04");
        let pdu = Pdu::parse::<Eapol>(&bytes).unwrap();
        let eapol = pdu.find::<Eapol>().unwrap();
        assert_eq!(
            EapolBody::Eap(Eap {
                code: EAP_SUCCESS,
                id: 7,
                eap_type: None
            }),
            eapol.body
        );
    }

    #[test]
    fn test_rc4_key_round_trip() {
        let key = Rc4Key {
            key_length: 13,
            replay_counter: 0x0102,
            key_iv: [9; 16],
            key_index: 1,
            key_flag: true,
            key_sign: [7; 16],
            key: vec![0x55; 13],
        };
        let bytes = Pdu::new(Eapol::new(EapolBody::Rc4Key(key.clone())))
            .serialize()
            .unwrap();
        assert_eq!(48 + 13, bytes.len());
        assert_eq!(0x81, bytes[31]);
        let pdu = Pdu::parse::<Eapol>(&bytes).unwrap();
        assert_eq!(
            Some(&EapolBody::Rc4Key(key)),
            pdu.find::<Eapol>().map(|eapol| &eapol.body)
        );
    }

    #[test]
    fn test_key_frame_without_descriptor() {
        assert!(matches!(
            Pdu::parse::<Eapol>(&hex!("01 03 00 00")),
            Err(Error::MalformedPacket(_))
        ));
    }
}
