//! `TCP` stream reassembly.
//!
//! A [`StreamFollower`] tracks every `TCP` stream seen in a sequence of packets, from the
//! client's `SYN` until both sides have sent a `FIN` (or either sent a `RST`). Each direction
//! of a [`Stream`] reassembles its payload in sequence order, buffering segments which arrive
//! ahead of the expected sequence number.
//!
//! Fragmented `IPv4` datagrams can be rebuilt with an [`Ipv4Reassembler`] before the packets are
//! handed to the follower.
//!
//! # Example
//!
//! The following example follows the streams of a capture and prints the data sent by each
//! client:
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use pdukit_packet::Pdu;
//! use pdukit_stream::{Builder, Stream};
//!
//! # let packets: Vec<Pdu> = vec![];
//! let mut follower = Builder::new().max_streams(1024).build()?;
//! let mut handler = (
//!     |stream: &mut Stream| {
//!         println!("{}: {:?}", stream.id(), stream.client_payload());
//!         stream.clear_client_payload();
//!     },
//!     |stream: Stream| println!("{} finished", stream.id()),
//! );
//! follower.follow_streams(packets, &mut handler);
//! # Ok(())
//! # }
//! ```
//!
//! # See Also
//!
//! - [`Builder`] - Build a [`StreamFollower`].
//! - [`StreamHandler`] - Receive stream events.
//! - [`Ipv4Reassembler`] - Rebuild fragmented `IPv4` datagrams.
#![forbid(unsafe_code)]

mod builder;
mod config;
mod defragment;
mod error;
mod flow;
mod follower;
mod stream;

pub use builder::Builder;
pub use config::{defaults, PayloadTracking, StreamConfig};
pub use defragment::{FragmentStatus, Ipv4Reassembler};
pub use error::{Error, Result};
pub use flow::{compare_sequence, Flow};
pub use follower::{StreamFollower, StreamHandler};
pub use stream::{Stream, StreamId, StreamState};
