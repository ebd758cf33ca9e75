use crate::error::{Error, Result};
use crate::fmt_payload;
use std::fmt::{Debug, Formatter};
use std::net::Ipv4Addr;

/// The wire format of a tagged option list.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OptionFormat {
    /// Every option is tag, length, value.
    Dot11,
    /// As [`OptionFormat::Dot11`], except that `PAD` (0) and `END` (255) are a single tag byte.
    Dhcp,
}

impl OptionFormat {
    const fn has_length(self, tag: u8) -> bool {
        match self {
            Self::Dot11 => true,
            Self::Dhcp => !matches!(tag, DHCP_PAD | DHCP_END),
        }
    }

    const fn is_end(self, tag: u8) -> bool {
        matches!(self, Self::Dhcp) && tag == DHCP_END
    }
}

/// The `DHCP` pad option.
pub const DHCP_PAD: u8 = 0;

/// The `DHCP` end option.
pub const DHCP_END: u8 = 255;

/// A single (tag, length, value) option.
#[derive(Clone, Eq, PartialEq)]
pub struct TaggedOption {
    pub tag: u8,
    pub value: Vec<u8>,
}

impl TaggedOption {
    #[must_use]
    pub const fn new(tag: u8, value: Vec<u8>) -> Self {
        Self { tag, value }
    }

    /// The value as a single byte.
    pub fn to_u8(&self) -> Result<u8> {
        match self.value.as_slice() {
            [val] => Ok(*val),
            _ => Err(Error::MalformedOption(self.tag)),
        }
    }

    /// The value as a big-endian `u16`.
    pub fn to_u16(&self) -> Result<u16> {
        self.to_array().map(u16::from_be_bytes)
    }

    /// The value as a big-endian `u32`.
    pub fn to_u32(&self) -> Result<u32> {
        self.to_array().map(u32::from_be_bytes)
    }

    /// The value as an `IPv4` address.
    pub fn to_ipv4(&self) -> Result<Ipv4Addr> {
        self.to_array::<4>().map(Ipv4Addr::from)
    }

    /// The value as a list of `IPv4` addresses.
    pub fn to_ipv4_list(&self) -> Result<Vec<Ipv4Addr>> {
        if self.value.len() % 4 != 0 {
            return Err(Error::MalformedOption(self.tag));
        }
        Ok(self
            .value
            .chunks_exact(4)
            .map(|addr| Ipv4Addr::new(addr[0], addr[1], addr[2], addr[3]))
            .collect())
    }

    /// The value as an UTF-8 string.
    pub fn to_string_value(&self) -> Result<String> {
        String::from_utf8(self.value.clone()).map_err(|_| Error::MalformedOption(self.tag))
    }

    /// The value as a fixed size array.
    pub fn to_array<const N: usize>(&self) -> Result<[u8; N]> {
        <[u8; N]>::try_from(self.value.as_slice()).map_err(|_| Error::MalformedOption(self.tag))
    }

    fn wire_size(&self, format: OptionFormat) -> usize {
        if format.has_length(self.tag) {
            2 + self.value.len()
        } else {
            1
        }
    }
}

impl Debug for TaggedOption {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaggedOption")
            .field("tag", &self.tag)
            .field("value", &fmt_payload(&self.value))
            .finish()
    }
}

/// An ordered list of tagged options.
///
/// Options are written in insertion order. Duplicate tags are allowed, lookups return the first
/// match.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct OptionList {
    options: Vec<TaggedOption>,
}

impl OptionList {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            options: Vec::new(),
        }
    }

    /// Decode every option from `bytes`.
    ///
    /// Decoding stops at the first option whose declared length runs beyond the end of the
    /// buffer, every option before it is kept. In the `DHCP` format decoding also stops after
    /// `END`, anything which follows it is ignored.
    #[must_use]
    pub fn parse(mut bytes: &[u8], format: OptionFormat) -> Self {
        let mut options = Vec::new();
        while let [tag, rest @ ..] = bytes {
            if !format.has_length(*tag) {
                options.push(TaggedOption::new(*tag, Vec::new()));
                if format.is_end(*tag) {
                    break;
                }
                bytes = rest;
                continue;
            }
            let Some((len, rest)) = rest.split_first() else {
                tracing::trace!(tag, "truncated option length");
                break;
            };
            let len = usize::from(*len);
            if len > rest.len() {
                tracing::trace!(tag, len, available = rest.len(), "truncated option value");
                break;
            }
            options.push(TaggedOption::new(*tag, rest[..len].to_vec()));
            bytes = &rest[len..];
        }
        Self { options }
    }

    /// Append an option.
    pub fn add(&mut self, option: TaggedOption) {
        self.options.push(option);
    }

    /// Replace the first option with the same tag, or append it if there is none.
    pub fn set(&mut self, option: TaggedOption) {
        match self.options.iter_mut().find(|opt| opt.tag == option.tag) {
            Some(existing) => *existing = option,
            None => self.options.push(option),
        }
    }

    /// Remove the first option with the given tag, returning whether one was found.
    pub fn remove(&mut self, tag: u8) -> bool {
        match self.options.iter().position(|opt| opt.tag == tag) {
            Some(index) => {
                self.options.remove(index);
                true
            }
            None => false,
        }
    }

    /// Find the first option with the given tag.
    #[must_use]
    pub fn search(&self, tag: u8) -> Option<&TaggedOption> {
        self.options.iter().find(|opt| opt.tag == tag)
    }

    /// Find the first option with the given tag, failing with [`Error::OptionNotFound`].
    pub fn get(&self, tag: u8) -> Result<&TaggedOption> {
        self.search(tag).ok_or(Error::OptionNotFound(tag))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaggedOption> {
        self.options.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.options.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// The number of bytes needed to write every option.
    #[must_use]
    pub fn wire_size(&self, format: OptionFormat) -> usize {
        self.options.iter().map(|opt| opt.wire_size(format)).sum()
    }

    /// Write every option to the front of `buf`, returning the number of bytes written.
    pub fn write(&self, buf: &mut [u8], format: OptionFormat) -> Result<usize> {
        let size = self.wire_size(format);
        if buf.len() < size {
            return Err(Error::InsufficientPacketBuffer(
                String::from("OptionList"),
                size,
                buf.len(),
            ));
        }
        let mut offset = 0;
        for opt in &self.options {
            buf[offset] = opt.tag;
            offset += 1;
            if format.has_length(opt.tag) {
                let len = u8::try_from(opt.value.len())
                    .map_err(|_| Error::MalformedOption(opt.tag))?;
                buf[offset] = len;
                buf[offset + 1..offset + 1 + opt.value.len()].copy_from_slice(&opt.value);
                offset += 1 + opt.value.len();
            }
        }
        Ok(offset)
    }

    /// Write every option to a new buffer.
    pub fn to_bytes(&self, format: OptionFormat) -> Result<Vec<u8>> {
        let mut buf = vec![0; self.wire_size(format)];
        self.write(&mut buf, format)?;
        Ok(buf)
    }
}

/// A layer which carries a tagged option list.
pub trait HasTaggedOptions {
    fn options(&self) -> &OptionList;

    fn options_mut(&mut self) -> &mut OptionList;

    /// Find the first option with the given tag.
    fn search_option(&self, tag: u8) -> Option<&TaggedOption> {
        self.options().search(tag)
    }

    fn add_option(&mut self, option: TaggedOption) {
        self.options_mut().add(option);
    }

    fn remove_option(&mut self, tag: u8) -> bool {
        self.options_mut().remove(tag)
    }
}

impl FromIterator<TaggedOption> for OptionList {
    fn from_iter<T: IntoIterator<Item = TaggedOption>>(iter: T) -> Self {
        Self {
            options: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a OptionList {
    type Item = &'a TaggedOption;
    type IntoIter = std::slice::Iter<'a, TaggedOption>;

    fn into_iter(self) -> Self::IntoIter {
        self.options.iter()
    }
}
