//! The capture boundary of the pdukit packet model.
//!
//! Frames enter through a [`FrameSource`] and leave through a [`FrameSink`]. Live interfaces are
//! left to the host, this crate provides the traits together with a pcap file backend:
//!
//! - [`PcapFileSource`] - read frames from a legacy pcap file.
//! - [`PcapWriter`] - write frames to a legacy pcap file, it is also a [`FrameSink`].
//!
//! [`sniff_loop`] decodes the frames of a source and hands each packet to a callback, while a
//! [`PacketSender`] serializes packets into a sink.
//!
//! # Example
//!
//! The following example copies the `ARP` packets of a capture file to another file:
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use pdukit_capture::{sniff_loop, PacketSender, PcapConfig, PcapFileSource, PcapWriter};
//! use pdukit_capture::FrameSource;
//! use pdukit_packet::arp::Arp;
//!
//! let config = PcapConfig::default();
//! let mut source = PcapFileSource::open("in.pcap", &config)?;
//! let writer = PcapWriter::create("arp.pcap", source.link_type(), &config)?;
//! let mut sender = PacketSender::new(writer);
//! sniff_loop(&mut source, |pdu| {
//!     pdu.find::<Arp>().is_none() || sender.send(&pdu).is_ok()
//! })?;
//! sender.into_inner().flush()?;
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

mod config;
mod error;
mod frame;
mod pcap;
mod sniff;

pub use config::{defaults, PcapConfig, TimestampPrecision};
pub use error::{Error, Result};
pub use frame::{Frame, FrameSink, FrameSource, Pdus};
pub use pcap::{PcapFileSource, PcapWriter};
pub use sniff::{sniff_loop, PacketSender};
