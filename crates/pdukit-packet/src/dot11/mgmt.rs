use crate::dot11::rsn::RsnInformation;
use crate::dot11::{FrameFlags, SequenceHeader};
use crate::error::{Error, Result};
use crate::options::{HasTaggedOptions, OptionFormat, OptionList, TaggedOption};
use crate::HwAddress;
use bitflags::bitflags;

pub const SUBTYPE_ASSOC_REQUEST: u8 = 0;
pub const SUBTYPE_ASSOC_RESPONSE: u8 = 1;
pub const SUBTYPE_REASSOC_REQUEST: u8 = 2;
pub const SUBTYPE_REASSOC_RESPONSE: u8 = 3;
pub const SUBTYPE_PROBE_REQUEST: u8 = 4;
pub const SUBTYPE_PROBE_RESPONSE: u8 = 5;
pub const SUBTYPE_BEACON: u8 = 8;
pub const SUBTYPE_ATIM: u8 = 9;
pub const SUBTYPE_DISASSOC: u8 = 10;
pub const SUBTYPE_AUTH: u8 = 11;
pub const SUBTYPE_DEAUTH: u8 = 12;

/// Tagged option identifiers of management frames.
pub mod option_id {
    pub const SSID: u8 = 0;
    pub const SUPPORTED_RATES: u8 = 1;
    pub const DS_SET: u8 = 3;
    pub const TIM: u8 = 5;
    pub const COUNTRY: u8 = 7;
    pub const BSS_LOAD: u8 = 11;
    pub const CHALLENGE_TEXT: u8 = 16;
    pub const POWER_CAPABILITY: u8 = 33;
    pub const CHANNEL_SWITCH: u8 = 37;
    pub const ERP_INFORMATION: u8 = 42;
    pub const QOS_CAPABILITY: u8 = 46;
    pub const RSN: u8 = 48;
    pub const EXTENDED_SUPPORTED_RATES: u8 = 50;
    pub const VENDOR_SPECIFIC: u8 = 221;
}

bitflags! {
    /// The capability information field.
    #[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
    pub struct Capabilities: u16 {
        const ESS = 0x0001;
        const IBSS = 0x0002;
        const CF_POLLABLE = 0x0004;
        const CF_POLL_REQUEST = 0x0008;
        const PRIVACY = 0x0010;
        const SHORT_PREAMBLE = 0x0020;
        const PBCC = 0x0040;
        const CHANNEL_AGILITY = 0x0080;
        const SPECTRUM_MGMT = 0x0100;
        const QOS = 0x0200;
        const SHORT_SLOT_TIME = 0x0400;
        const APSD = 0x0800;
        const RADIO_MEASUREMENT = 0x1000;
        const DSSS_OFDM = 0x2000;
        const DELAYED_BLOCK_ACK = 0x4000;
        const IMMEDIATE_BLOCK_ACK = 0x8000;
    }
}

/// The fixed fields which precede the tagged options of a management frame.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ManagementFixed {
    Beacon {
        timestamp: u64,
        interval: u16,
        capabilities: Capabilities,
    },
    ProbeRequest,
    ProbeResponse {
        timestamp: u64,
        interval: u16,
        capabilities: Capabilities,
    },
    AssocRequest {
        capabilities: Capabilities,
        listen_interval: u16,
    },
    AssocResponse {
        capabilities: Capabilities,
        status_code: u16,
        aid: u16,
    },
    ReassocRequest {
        capabilities: Capabilities,
        listen_interval: u16,
        current_ap: HwAddress,
    },
    ReassocResponse {
        capabilities: Capabilities,
        status_code: u16,
        aid: u16,
    },
    Disassoc {
        reason_code: u16,
    },
    Auth {
        algorithm: u16,
        seq: u16,
        status_code: u16,
    },
    Deauth {
        reason_code: u16,
    },
    Atim,
    /// A subtype whose body is not decoded.
    Other(u8),
}

impl ManagementFixed {
    /// A beacon with the default interval of 100 time units.
    #[must_use]
    pub const fn beacon(capabilities: Capabilities) -> Self {
        Self::Beacon {
            timestamp: 0,
            interval: 100,
            capabilities,
        }
    }

    #[must_use]
    pub const fn subtype(&self) -> u8 {
        match self {
            Self::AssocRequest { .. } => SUBTYPE_ASSOC_REQUEST,
            Self::AssocResponse { .. } => SUBTYPE_ASSOC_RESPONSE,
            Self::ReassocRequest { .. } => SUBTYPE_REASSOC_REQUEST,
            Self::ReassocResponse { .. } => SUBTYPE_REASSOC_RESPONSE,
            Self::ProbeRequest => SUBTYPE_PROBE_REQUEST,
            Self::ProbeResponse { .. } => SUBTYPE_PROBE_RESPONSE,
            Self::Beacon { .. } => SUBTYPE_BEACON,
            Self::Atim => SUBTYPE_ATIM,
            Self::Disassoc { .. } => SUBTYPE_DISASSOC,
            Self::Auth { .. } => SUBTYPE_AUTH,
            Self::Deauth { .. } => SUBTYPE_DEAUTH,
            Self::Other(subtype) => *subtype,
        }
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        match self {
            Self::Beacon { .. } | Self::ProbeResponse { .. } => 12,
            Self::AssocRequest { .. } => 4,
            Self::AssocResponse { .. } | Self::ReassocResponse { .. } | Self::Auth { .. } => 6,
            Self::ReassocRequest { .. } => 10,
            Self::Disassoc { .. } | Self::Deauth { .. } => 2,
            Self::ProbeRequest | Self::Atim | Self::Other(_) => 0,
        }
    }

    /// Whether a tagged option list follows the fixed fields.
    #[must_use]
    pub const fn has_options(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    fn parse(subtype: u8, bytes: &[u8]) -> Result<Self> {
        let mut reader = FieldReader { bytes };
        let fixed = match subtype {
            SUBTYPE_BEACON | SUBTYPE_PROBE_RESPONSE => {
                let timestamp = u64::from_le_bytes(reader.take()?);
                let interval = reader.u16()?;
                let capabilities = reader.capabilities()?;
                if subtype == SUBTYPE_BEACON {
                    Self::Beacon {
                        timestamp,
                        interval,
                        capabilities,
                    }
                } else {
                    Self::ProbeResponse {
                        timestamp,
                        interval,
                        capabilities,
                    }
                }
            }
            SUBTYPE_PROBE_REQUEST => Self::ProbeRequest,
            SUBTYPE_ASSOC_REQUEST => Self::AssocRequest {
                capabilities: reader.capabilities()?,
                listen_interval: reader.u16()?,
            },
            SUBTYPE_ASSOC_RESPONSE => Self::AssocResponse {
                capabilities: reader.capabilities()?,
                status_code: reader.u16()?,
                aid: reader.u16()?,
            },
            SUBTYPE_REASSOC_REQUEST => Self::ReassocRequest {
                capabilities: reader.capabilities()?,
                listen_interval: reader.u16()?,
                current_ap: HwAddress(reader.take()?),
            },
            SUBTYPE_REASSOC_RESPONSE => Self::ReassocResponse {
                capabilities: reader.capabilities()?,
                status_code: reader.u16()?,
                aid: reader.u16()?,
            },
            SUBTYPE_DISASSOC => Self::Disassoc {
                reason_code: reader.u16()?,
            },
            SUBTYPE_AUTH => Self::Auth {
                algorithm: reader.u16()?,
                seq: reader.u16()?,
                status_code: reader.u16()?,
            },
            SUBTYPE_DEAUTH => Self::Deauth {
                reason_code: reader.u16()?,
            },
            SUBTYPE_ATIM => Self::Atim,
            subtype => Self::Other(subtype),
        };
        Ok(fixed)
    }

    fn write(&self, buf: &mut [u8]) {
        match self {
            Self::Beacon {
                timestamp,
                interval,
                capabilities,
            }
            | Self::ProbeResponse {
                timestamp,
                interval,
                capabilities,
            } => {
                buf[0..8].copy_from_slice(&timestamp.to_le_bytes());
                buf[8..10].copy_from_slice(&interval.to_le_bytes());
                buf[10..12].copy_from_slice(&capabilities.bits().to_le_bytes());
            }
            Self::AssocRequest {
                capabilities,
                listen_interval,
            } => {
                buf[0..2].copy_from_slice(&capabilities.bits().to_le_bytes());
                buf[2..4].copy_from_slice(&listen_interval.to_le_bytes());
            }
            Self::AssocResponse {
                capabilities,
                status_code,
                aid,
            }
            | Self::ReassocResponse {
                capabilities,
                status_code,
                aid,
            } => {
                buf[0..2].copy_from_slice(&capabilities.bits().to_le_bytes());
                buf[2..4].copy_from_slice(&status_code.to_le_bytes());
                buf[4..6].copy_from_slice(&aid.to_le_bytes());
            }
            Self::ReassocRequest {
                capabilities,
                listen_interval,
                current_ap,
            } => {
                buf[0..2].copy_from_slice(&capabilities.bits().to_le_bytes());
                buf[2..4].copy_from_slice(&listen_interval.to_le_bytes());
                buf[4..10].copy_from_slice(&current_ap.octets());
            }
            Self::Disassoc { reason_code } | Self::Deauth { reason_code } => {
                buf[0..2].copy_from_slice(&reason_code.to_le_bytes());
            }
            Self::Auth {
                algorithm,
                seq,
                status_code,
            } => {
                buf[0..2].copy_from_slice(&algorithm.to_le_bytes());
                buf[2..4].copy_from_slice(&seq.to_le_bytes());
                buf[4..6].copy_from_slice(&status_code.to_le_bytes());
            }
            Self::ProbeRequest | Self::Atim | Self::Other(_) => {}
        }
    }
}

struct FieldReader<'a> {
    bytes: &'a [u8],
}

impl FieldReader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let value = self
            .bytes
            .get(..N)
            .and_then(|bytes| <[u8; N]>::try_from(bytes).ok())
            .ok_or_else(|| {
                Error::InsufficientPacketBuffer(
                    String::from("ManagementFixed"),
                    N,
                    self.bytes.len(),
                )
            })?;
        self.bytes = &self.bytes[N..];
        Ok(value)
    }

    fn u16(&mut self) -> Result<u16> {
        self.take().map(u16::from_le_bytes)
    }

    fn capabilities(&mut self) -> Result<Capabilities> {
        self.u16().map(Capabilities::from_bits_retain)
    }
}

/// The body of a management frame.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Dot11Management {
    pub header: SequenceHeader,
    pub fixed: ManagementFixed,
    pub options: OptionList,
}

impl Dot11Management {
    #[must_use]
    pub fn new(fixed: ManagementFixed) -> Self {
        Self {
            header: SequenceHeader::default(),
            fixed,
            options: OptionList::new(),
        }
    }

    /// The transmitter address.
    #[must_use]
    pub const fn addr2(&self) -> HwAddress {
        self.header.addr2
    }

    #[must_use]
    pub const fn addr3(&self) -> HwAddress {
        self.header.addr3
    }

    pub(crate) fn size(&self, flags: FrameFlags) -> usize {
        SequenceHeader::size(flags)
            + self.fixed.size()
            + self.options.wire_size(OptionFormat::Dot11)
    }

    pub(crate) fn write(&self, buf: &mut [u8], flags: FrameFlags) -> Result<()> {
        self.header.write(buf, flags);
        let offset = SequenceHeader::size(flags);
        self.fixed.write(&mut buf[offset..]);
        let offset = offset + self.fixed.size();
        self.options.write(&mut buf[offset..], OptionFormat::Dot11)?;
        Ok(())
    }

    /// Decode a management body, returning it together with the number of bytes consumed.
    ///
    /// The options of a known subtype consume the rest of the frame, the body of an unknown
    /// subtype is not consumed.
    pub(crate) fn parse(subtype: u8, bytes: &[u8], flags: FrameFlags) -> Result<(Self, usize)> {
        let header = SequenceHeader::parse(bytes, flags)?;
        let offset = SequenceHeader::size(flags);
        let fixed = ManagementFixed::parse(subtype, &bytes[offset..])?;
        let offset = offset + fixed.size();
        let (options, consumed) = if fixed.has_options() {
            (
                OptionList::parse(&bytes[offset..], OptionFormat::Dot11),
                bytes.len(),
            )
        } else {
            (OptionList::new(), offset)
        };
        Ok((
            Self {
                header,
                fixed,
                options,
            },
            consumed,
        ))
    }
}

impl HasTaggedOptions for Dot11Management {
    fn options(&self) -> &OptionList {
        &self.options
    }

    fn options_mut(&mut self) -> &mut OptionList {
        &mut self.options
    }
}

/// The traffic indication map.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Tim {
    pub dtim_count: u8,
    pub dtim_period: u8,
    pub bitmap_control: u8,
    pub partial_virtual_bitmap: Vec<u8>,
}

/// A regulatory triplet of a country option.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct CountryTriplet {
    pub first_channel: u8,
    pub number_channels: u8,
    pub max_transmit_power: u8,
}

/// The country option.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Country {
    /// The country string, two letters followed by an environment byte.
    pub country: [u8; 3],
    pub triplets: Vec<CountryTriplet>,
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct ChannelSwitch {
    pub switch_mode: u8,
    pub new_channel: u8,
    pub switch_count: u8,
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct BssLoad {
    pub station_count: u16,
    pub channel_utilization: u8,
    pub available_capacity: u16,
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct VendorSpecific {
    pub oui: [u8; 3],
    pub data: Vec<u8>,
}

/// Rates are carried in units of 500 kbps, the basic rates of 802.11b are flagged as basic.
fn encode_rates(rates: &[f32]) -> Vec<u8> {
    rates
        .iter()
        .map(|rate| {
            let unit = (rate * 2.0) as u8;
            match unit {
                2 | 4 | 11 | 22 => unit | 0x80,
                unit => unit,
            }
        })
        .collect()
}

fn decode_rates(bytes: &[u8]) -> Vec<f32> {
    bytes
        .iter()
        .map(|rate| f32::from(rate & 0x7f) / 2.0)
        .collect()
}

/// Typed access to the tagged options of a management frame.
pub trait Dot11Options: HasTaggedOptions {
    fn ssid(&self) -> Result<String> {
        let opt = self.options().get(option_id::SSID)?;
        // a zero length or all null SSID denotes a hidden network
        if opt.value.iter().all(|b| *b == 0) {
            return Ok(String::new());
        }
        opt.to_string_value()
    }

    fn set_ssid(&mut self, ssid: &str) {
        self.options_mut()
            .set(TaggedOption::new(option_id::SSID, ssid.as_bytes().to_vec()));
    }

    /// The supported rates in Mbps.
    fn supported_rates(&self) -> Result<Vec<f32>> {
        let opt = self.options().get(option_id::SUPPORTED_RATES)?;
        Ok(decode_rates(&opt.value))
    }

    fn set_supported_rates(&mut self, rates: &[f32]) {
        self.options_mut().set(TaggedOption::new(
            option_id::SUPPORTED_RATES,
            encode_rates(rates),
        ));
    }

    fn extended_supported_rates(&self) -> Result<Vec<f32>> {
        let opt = self.options().get(option_id::EXTENDED_SUPPORTED_RATES)?;
        Ok(decode_rates(&opt.value))
    }

    fn set_extended_supported_rates(&mut self, rates: &[f32]) {
        self.options_mut().set(TaggedOption::new(
            option_id::EXTENDED_SUPPORTED_RATES,
            encode_rates(rates),
        ));
    }

    /// The current channel.
    fn ds_parameter_set(&self) -> Result<u8> {
        self.options().get(option_id::DS_SET)?.to_u8()
    }

    fn set_ds_parameter_set(&mut self, channel: u8) {
        self.options_mut()
            .set(TaggedOption::new(option_id::DS_SET, vec![channel]));
    }

    fn tim(&self) -> Result<Tim> {
        let opt = self.options().get(option_id::TIM)?;
        match opt.value.as_slice() {
            [dtim_count, dtim_period, bitmap_control, bitmap @ ..] if !bitmap.is_empty() => {
                Ok(Tim {
                    dtim_count: *dtim_count,
                    dtim_period: *dtim_period,
                    bitmap_control: *bitmap_control,
                    partial_virtual_bitmap: bitmap.to_vec(),
                })
            }
            _ => Err(Error::MalformedOption(option_id::TIM)),
        }
    }

    fn set_tim(&mut self, tim: &Tim) {
        let mut value = vec![tim.dtim_count, tim.dtim_period, tim.bitmap_control];
        value.extend_from_slice(&tim.partial_virtual_bitmap);
        self.options_mut()
            .set(TaggedOption::new(option_id::TIM, value));
    }

    fn country(&self) -> Result<Country> {
        let opt = self.options().get(option_id::COUNTRY)?;
        if opt.value.len() < 6 {
            return Err(Error::MalformedOption(option_id::COUNTRY));
        }
        let (country, rest) = opt.value.split_at(3);
        let triplets = rest.chunks_exact(3);
        if !matches!(triplets.remainder(), [] | [0]) {
            return Err(Error::MalformedOption(option_id::COUNTRY));
        }
        Ok(Country {
            country: [country[0], country[1], country[2]],
            triplets: triplets
                .map(|triplet| CountryTriplet {
                    first_channel: triplet[0],
                    number_channels: triplet[1],
                    max_transmit_power: triplet[2],
                })
                .collect(),
        })
    }

    /// Set the country option, padded to an even length.
    fn set_country(&mut self, country: &Country) {
        let mut value = country.country.to_vec();
        for triplet in &country.triplets {
            value.extend_from_slice(&[
                triplet.first_channel,
                triplet.number_channels,
                triplet.max_transmit_power,
            ]);
        }
        if value.len() % 2 == 1 {
            value.push(0);
        }
        self.options_mut()
            .set(TaggedOption::new(option_id::COUNTRY, value));
    }

    fn bss_load(&self) -> Result<BssLoad> {
        let opt = self.options().get(option_id::BSS_LOAD)?;
        let value = opt.to_array::<5>()?;
        Ok(BssLoad {
            station_count: u16::from_le_bytes([value[0], value[1]]),
            channel_utilization: value[2],
            available_capacity: u16::from_le_bytes([value[3], value[4]]),
        })
    }

    fn set_bss_load(&mut self, load: &BssLoad) {
        let mut value = load.station_count.to_le_bytes().to_vec();
        value.push(load.channel_utilization);
        value.extend_from_slice(&load.available_capacity.to_le_bytes());
        self.options_mut()
            .set(TaggedOption::new(option_id::BSS_LOAD, value));
    }

    fn challenge_text(&self) -> Result<String> {
        self.options()
            .get(option_id::CHALLENGE_TEXT)?
            .to_string_value()
    }

    fn set_challenge_text(&mut self, text: &str) {
        self.options_mut().set(TaggedOption::new(
            option_id::CHALLENGE_TEXT,
            text.as_bytes().to_vec(),
        ));
    }

    /// The minimum and maximum transmit power.
    fn power_capability(&self) -> Result<(u8, u8)> {
        let [min, max] = self.options().get(option_id::POWER_CAPABILITY)?.to_array()?;
        Ok((min, max))
    }

    fn set_power_capability(&mut self, min: u8, max: u8) {
        self.options_mut()
            .set(TaggedOption::new(option_id::POWER_CAPABILITY, vec![min, max]));
    }

    fn channel_switch(&self) -> Result<ChannelSwitch> {
        let [switch_mode, new_channel, switch_count] =
            self.options().get(option_id::CHANNEL_SWITCH)?.to_array()?;
        Ok(ChannelSwitch {
            switch_mode,
            new_channel,
            switch_count,
        })
    }

    fn set_channel_switch(&mut self, switch: &ChannelSwitch) {
        self.options_mut().set(TaggedOption::new(
            option_id::CHANNEL_SWITCH,
            vec![switch.switch_mode, switch.new_channel, switch.switch_count],
        ));
    }

    fn erp_information(&self) -> Result<u8> {
        self.options().get(option_id::ERP_INFORMATION)?.to_u8()
    }

    fn set_erp_information(&mut self, value: u8) {
        self.options_mut()
            .set(TaggedOption::new(option_id::ERP_INFORMATION, vec![value]));
    }

    fn qos_capability(&self) -> Result<u8> {
        self.options().get(option_id::QOS_CAPABILITY)?.to_u8()
    }

    fn set_qos_capability(&mut self, value: u8) {
        self.options_mut()
            .set(TaggedOption::new(option_id::QOS_CAPABILITY, vec![value]));
    }

    fn rsn_information(&self) -> Result<RsnInformation> {
        let opt = self.options().get(option_id::RSN)?;
        RsnInformation::parse(opt.tag, &opt.value)
    }

    fn set_rsn_information(&mut self, rsn: &RsnInformation) {
        self.options_mut()
            .set(TaggedOption::new(option_id::RSN, rsn.to_bytes()));
    }

    /// The first vendor specific option.
    fn vendor_specific(&self) -> Result<VendorSpecific> {
        let opt = self.options().get(option_id::VENDOR_SPECIFIC)?;
        match opt.value.as_slice() {
            [a, b, c, data @ ..] => Ok(VendorSpecific {
                oui: [*a, *b, *c],
                data: data.to_vec(),
            }),
            _ => Err(Error::MalformedOption(option_id::VENDOR_SPECIFIC)),
        }
    }

    /// Append a vendor specific option, several may be present.
    fn add_vendor_specific(&mut self, vendor: &VendorSpecific) {
        let mut value = vendor.oui.to_vec();
        value.extend_from_slice(&vendor.data);
        self.options_mut()
            .add(TaggedOption::new(option_id::VENDOR_SPECIFIC, value));
    }
}

impl Dot11Options for Dot11Management {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dot11::{Dot11, Dot11Frame, HasAddressFields};
    use crate::pdu::Protocol;
    use crate::raw::RawPdu;
    use crate::Pdu;
    use hex_literal::hex;
    use test_case::test_case;

    const AP: HwAddress = HwAddress([0x00, 0x0c, 0x41, 0x82, 0xb2, 0x55]);

    const BEACON: [u8; 50] = hex!(
        "80 00 00 00 ff ff ff ff ff ff 00 0c 41 82 b2 55"
        "00 0c 41 82 b2 55 80 f8 01 02 03 04 05 06 07 08"
        "64 00 11 04 00 05 74 65 73 74 31 01 02 82 84 03"
        "01 06"
    );

    fn beacon() -> Dot11 {
        let mut mgmt = Dot11Management::new(ManagementFixed::beacon(
            Capabilities::ESS | Capabilities::PRIVACY,
        ));
        mgmt.header.addr2 = AP;
        mgmt.header.addr3 = AP;
        Dot11::new(HwAddress::BROADCAST, Dot11Frame::Management(mgmt))
    }

    #[test]
    fn test_decode_beacon() {
        let pdu = Pdu::parse::<Dot11>(&BEACON).unwrap();
        assert_eq!(1, pdu.iter().count());
        let dot11 = pdu.find::<Dot11>().unwrap();
        assert_eq!(Some(AP), dot11.bssid());
        let mgmt = dot11.management().unwrap();
        assert_eq!(3976, mgmt.header.seq_num);
        assert_eq!(0, mgmt.header.frag_num);
        assert_eq!(
            ManagementFixed::Beacon {
                timestamp: 0x0807_0605_0403_0201,
                interval: 100,
                capabilities: Capabilities::ESS
                    | Capabilities::PRIVACY
                    | Capabilities::SHORT_SLOT_TIME,
            },
            mgmt.fixed
        );
        assert_eq!(Ok(String::from("test1")), mgmt.ssid());
        assert_eq!(Ok(vec![1.0, 2.0]), mgmt.supported_rates());
        assert_eq!(Ok(6), mgmt.ds_parameter_set());
        assert_eq!(Err(Error::OptionNotFound(option_id::RSN)), mgmt.rsn_information().map(|_| ()));
    }

    #[test]
    fn test_build_beacon() {
        let mut dot11 = beacon();
        let mgmt = dot11.management_mut().unwrap();
        mgmt.header.seq_num = 3976;
        mgmt.fixed = ManagementFixed::Beacon {
            timestamp: 0x0807_0605_0403_0201,
            interval: 100,
            capabilities: Capabilities::from_bits_retain(0x0411),
        };
        mgmt.set_ssid("test1");
        mgmt.set_supported_rates(&[1.0, 2.0]);
        mgmt.set_ds_parameter_set(6);
        assert_eq!(BEACON.len() as u32, dot11.header_size());
        assert_eq!(BEACON.to_vec(), Pdu::new(dot11).serialize().unwrap());
    }

    #[test]
    fn test_rates_encoding() {
        let mut mgmt = Dot11Management::new(ManagementFixed::ProbeRequest);
        mgmt.set_supported_rates(&[1.0, 5.5, 6.0, 11.0, 54.0]);
        assert_eq!(
            vec![0x82, 0x8b, 0x0c, 0x96, 0x6c],
            mgmt.search_option(option_id::SUPPORTED_RATES).unwrap().value
        );
        assert_eq!(Ok(vec![1.0, 5.5, 6.0, 11.0, 54.0]), mgmt.supported_rates());
    }

    #[test]
    fn test_hidden_ssid() {
        let mut mgmt = Dot11Management::new(ManagementFixed::ProbeRequest);
        mgmt.add_option(TaggedOption::new(option_id::SSID, vec![0, 0, 0]));
        assert_eq!(Ok(String::new()), mgmt.ssid());
    }

    #[test]
    fn test_tim() {
        let mut mgmt = Dot11Management::new(ManagementFixed::ProbeRequest);
        let tim = Tim {
            dtim_count: 0,
            dtim_period: 1,
            bitmap_control: 0,
            partial_virtual_bitmap: vec![0],
        };
        mgmt.set_tim(&tim);
        assert_eq!(Ok(tim), mgmt.tim());
        mgmt.options_mut()
            .set(TaggedOption::new(option_id::TIM, vec![0, 1, 0]));
        assert_eq!(Err(Error::MalformedOption(option_id::TIM)), mgmt.tim());
    }

    #[test_case(&hex!("55 53 20 01 0b 1e"), Ok(1); "single triplet")]
    #[test_case(&hex!("55 53 20 01 0b 1e 24 04 17 00"), Ok(2); "padded")]
    #[test_case(&hex!("55 53 20 01 0b"), Err(Error::MalformedOption(option_id::COUNTRY)); "short")]
    #[test_case(&hex!("55 53 20 01 0b 1e 24 04"), Err(Error::MalformedOption(option_id::COUNTRY)); "partial triplet")]
    fn test_country(value: &[u8], expected: Result<usize>) {
        let mut mgmt = Dot11Management::new(ManagementFixed::ProbeRequest);
        mgmt.add_option(TaggedOption::new(option_id::COUNTRY, value.to_vec()));
        assert_eq!(expected, mgmt.country().map(|country| country.triplets.len()));
    }

    #[test]
    fn test_set_country_pads() {
        let mut mgmt = Dot11Management::new(ManagementFixed::ProbeRequest);
        let country = Country {
            country: *b"US ",
            triplets: vec![
                CountryTriplet {
                    first_channel: 1,
                    number_channels: 11,
                    max_transmit_power: 30,
                },
                CountryTriplet {
                    first_channel: 36,
                    number_channels: 4,
                    max_transmit_power: 23,
                },
            ],
        };
        mgmt.set_country(&country);
        assert_eq!(10, mgmt.search_option(option_id::COUNTRY).unwrap().value.len());
        assert_eq!(Ok(country), mgmt.country());
    }

    #[test]
    fn test_bss_load() {
        let mut mgmt = Dot11Management::new(ManagementFixed::ProbeRequest);
        let load = BssLoad {
            station_count: 0x0102,
            channel_utilization: 0x30,
            available_capacity: 0x0405,
        };
        mgmt.set_bss_load(&load);
        assert_eq!(
            hex!("02 01 30 05 04").to_vec(),
            mgmt.search_option(option_id::BSS_LOAD).unwrap().value
        );
        assert_eq!(Ok(load), mgmt.bss_load());
    }

    #[test]
    fn test_channel_switch_and_power() {
        let mut mgmt = Dot11Management::new(ManagementFixed::ProbeRequest);
        let switch = ChannelSwitch {
            switch_mode: 1,
            new_channel: 11,
            switch_count: 3,
        };
        mgmt.set_channel_switch(&switch);
        mgmt.set_power_capability(5, 20);
        assert_eq!(Ok(switch), mgmt.channel_switch());
        assert_eq!(Ok((5, 20)), mgmt.power_capability());
        mgmt.options_mut()
            .set(TaggedOption::new(option_id::CHANNEL_SWITCH, vec![1, 2]));
        assert_eq!(
            Err(Error::MalformedOption(option_id::CHANNEL_SWITCH)),
            mgmt.channel_switch()
        );
    }

    #[test]
    fn test_vendor_specific() {
        let mut mgmt = Dot11Management::new(ManagementFixed::ProbeRequest);
        let vendor = VendorSpecific {
            oui: [0x00, 0x50, 0xf2],
            data: vec![0x02, 0x01],
        };
        mgmt.add_vendor_specific(&vendor);
        assert_eq!(Ok(vendor), mgmt.vendor_specific());
        mgmt.options_mut()
            .set(TaggedOption::new(option_id::VENDOR_SPECIFIC, vec![0x00, 0x50]));
        assert_eq!(
            Err(Error::MalformedOption(option_id::VENDOR_SPECIFIC)),
            mgmt.vendor_specific()
        );
    }

    #[test]
    fn test_rsn_round_trip() {
        let mut dot11 = beacon();
        dot11
            .management_mut()
            .unwrap()
            .set_rsn_information(&RsnInformation::wpa2_psk());
        let bytes = Pdu::new(dot11).serialize().unwrap();
        let pdu = Pdu::parse::<Dot11>(&bytes).unwrap();
        let mgmt = pdu.find::<Dot11>().and_then(Dot11::management).unwrap();
        assert_eq!(Ok(RsnInformation::wpa2_psk()), mgmt.rsn_information());
    }

    #[test_case(ManagementFixed::Auth { algorithm: 0, seq: 1, status_code: 0 }; "auth")]
    #[test_case(ManagementFixed::Deauth { reason_code: 7 }; "deauth")]
    #[test_case(ManagementFixed::ReassocRequest { capabilities: Capabilities::ESS, listen_interval: 10, current_ap: AP }; "reassoc request")]
    #[test_case(ManagementFixed::AssocResponse { capabilities: Capabilities::ESS, status_code: 0, aid: 0xc001 }; "assoc response")]
    fn test_fixed_fields_round_trip(fixed: ManagementFixed) {
        let mut mgmt = Dot11Management::new(fixed.clone());
        mgmt.set_ssid("net");
        let bytes = Pdu::new(Dot11::new(AP, Dot11Frame::Management(mgmt)))
            .serialize()
            .unwrap();
        let pdu = Pdu::parse::<Dot11>(&bytes).unwrap();
        let mgmt = pdu.find::<Dot11>().and_then(Dot11::management).unwrap();
        assert_eq!(fixed, mgmt.fixed);
        assert_eq!(Ok(String::from("net")), mgmt.ssid());
    }

    #[test]
    fn test_unknown_subtype_body_is_raw() {
        let mut buf = BEACON;
        buf[0] = 0xd0;
        let pdu = Pdu::parse::<Dot11>(&buf).unwrap();
        let mgmt = pdu.find::<Dot11>().and_then(Dot11::management).unwrap();
        assert_eq!(ManagementFixed::Other(13), mgmt.fixed);
        assert!(mgmt.options.is_empty());
        assert_eq!(26, pdu.find::<RawPdu>().unwrap().payload().len());
    }

    #[test]
    fn test_truncated_fixed_fields() {
        assert!(matches!(
            Pdu::parse::<Dot11>(&BEACON[..30]),
            Err(Error::MalformedPacket(_))
        ));
    }
}
