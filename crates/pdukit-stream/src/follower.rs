use crate::config::StreamConfig;
use crate::error::Result;
use crate::stream::{Stream, StreamId};
use indexmap::IndexMap;
use pdukit_packet::raw::RawPdu;
use pdukit_packet::tcp::{Tcp, TcpFlags};
use pdukit_packet::{LinkType, Pdu, PduKind, Protocol};
use std::net::SocketAddr;
use tracing::{debug, instrument, trace, warn};

/// Receives the events of followed streams.
#[cfg_attr(test, mockall::automock)]
pub trait StreamHandler {
    /// New in-order payload is available in the stream.
    fn on_data(&mut self, stream: &mut Stream);

    /// The stream has finished and is no longer tracked.
    fn on_finished(&mut self, stream: Stream);
}

impl<D, E> StreamHandler for (D, E)
where
    D: FnMut(&mut Stream),
    E: FnMut(Stream),
{
    fn on_data(&mut self, stream: &mut Stream) {
        (self.0)(stream);
    }

    fn on_finished(&mut self, stream: Stream) {
        (self.1)(stream);
    }
}

/// The (client, server) endpoints of a stream.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
struct StreamKey {
    client: SocketAddr,
    server: SocketAddr,
}

/// Follows the `TCP` streams found in a sequence of packets.
///
/// Streams are tracked from the client's `SYN` and dropped once finished.
#[derive(Debug, Default)]
pub struct StreamFollower {
    config: StreamConfig,
    streams: IndexMap<StreamKey, Stream>,
    next_id: u64,
}

impl StreamFollower {
    #[must_use]
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            streams: IndexMap::new(),
            next_id: 0,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// The number of streams being tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// The tracked streams, in the order they were first seen.
    pub fn streams(&self) -> impl Iterator<Item = &Stream> {
        self.streams.values()
    }

    /// Find the stream between two endpoints, in either orientation.
    #[must_use]
    pub fn find(&self, lhs: SocketAddr, rhs: SocketAddr) -> Option<&Stream> {
        self.streams
            .get(&StreamKey {
                client: lhs,
                server: rhs,
            })
            .or_else(|| {
                self.streams.get(&StreamKey {
                    client: rhs,
                    server: lhs,
                })
            })
    }

    /// Process every packet of a sequence.
    pub fn follow_streams<I, H>(&mut self, packets: I, handler: &mut H)
    where
        I: IntoIterator<Item = Pdu>,
        H: StreamHandler,
    {
        for pdu in packets {
            self.process(&pdu, handler);
        }
    }

    /// Decode a captured frame and process it.
    pub fn process_frame<H: StreamHandler>(
        &mut self,
        link_type: LinkType,
        bytes: &[u8],
        handler: &mut H,
    ) -> Result<bool> {
        let pdu = Pdu::from_link_bytes(link_type, bytes)?;
        Ok(self.process(&pdu, handler))
    }

    /// Process a single packet.
    ///
    /// Returns false if the packet does not carry `TCP` over `IPv4` or `IPv6`.
    #[instrument(skip_all, level = "trace")]
    pub fn process<H: StreamHandler>(&mut self, pdu: &Pdu, handler: &mut H) -> bool {
        let Some((src_ip, dst_ip)) = pdu.iter().find_map(|node| node.layer().ip_addresses())
        else {
            trace!("not an IP packet");
            return false;
        };
        let Some(node) = pdu.find_pdu(PduKind::Tcp) else {
            trace!("not a TCP segment");
            return false;
        };
        let Some(tcp) = Tcp::from_layer(node.layer()) else {
            return false;
        };
        let payload = node
            .inner()
            .and_then(|inner| RawPdu::from_layer(inner.layer()))
            .map_or(&[][..], RawPdu::payload);
        let src = SocketAddr::new(src_ip, tcp.sport);
        let dst = SocketAddr::new(dst_ip, tcp.dport);
        let key = if self.streams.contains_key(&StreamKey {
            client: src,
            server: dst,
        }) {
            StreamKey {
                client: src,
                server: dst,
            }
        } else if self.streams.contains_key(&StreamKey {
            client: dst,
            server: src,
        }) {
            StreamKey {
                client: dst,
                server: src,
            }
        } else {
            self.open(src, dst, tcp);
            return true;
        };
        let Some(stream) = self.streams.get_mut(&key) else {
            return true;
        };
        if stream.update(src, tcp, payload) {
            handler.on_data(stream);
        }
        if stream.is_finished() {
            if let Some(stream) = self.streams.shift_remove(&key) {
                debug!(id = %stream.id(), "stream removed");
                handler.on_finished(stream);
            }
        }
        true
    }

    /// Start tracking a stream if the segment is a client `SYN`.
    fn open(&mut self, client: SocketAddr, server: SocketAddr, tcp: &Tcp) {
        if !tcp.has_flags(TcpFlags::SYN) || tcp.has_flags(TcpFlags::ACK) {
            trace!(%client, %server, "segment of untracked stream");
            return;
        }
        if self.streams.len() >= self.config.max_streams {
            warn!(
                %client,
                %server,
                max_streams = self.config.max_streams,
                "ignoring stream, too many streams"
            );
            return;
        }
        let id = StreamId(self.next_id);
        self.next_id += 1;
        debug!(%id, %client, %server, "new stream");
        self.streams.insert(
            StreamKey { client, server },
            Stream::new(id, client, server, tcp, self.config),
        );
    }
}
