use crate::config::StreamConfig;
use crate::flow::Flow;
use derive_more::Display;
use pdukit_packet::tcp::{Tcp, TcpFlags};
use std::net::SocketAddr;
use tracing::{debug, instrument};

/// A monotonically increasing stream identifier.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Display)]
pub struct StreamId(pub u64);

/// The state of a stream.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
pub enum StreamState {
    /// The client has sent a `SYN`, the server has not yet answered.
    #[display("syn-sent")]
    SynSent,
    /// The server has answered with a `SYN/ACK`.
    #[display("established")]
    Established,
    /// Both sides have sent a `FIN`, or either sent a `RST`.
    #[display("finished")]
    Finished,
}

/// A bidirectional `TCP` stream.
///
/// The client is the side which sent the initial `SYN`.
#[derive(Debug, Clone)]
pub struct Stream {
    id: StreamId,
    client: SocketAddr,
    server: SocketAddr,
    state: StreamState,
    client_flow: Flow,
    server_flow: Flow,
    config: StreamConfig,
}

impl Stream {
    /// Create a stream from the client's `SYN`.
    pub(crate) fn new(
        id: StreamId,
        client: SocketAddr,
        server: SocketAddr,
        syn: &Tcp,
        config: StreamConfig,
    ) -> Self {
        let mut client_flow = Flow::default();
        client_flow.initialise(syn.seq.wrapping_add(1));
        Self {
            id,
            client,
            server,
            state: StreamState::SynSent,
            client_flow,
            server_flow: Flow::default(),
            config,
        }
    }

    #[must_use]
    pub const fn id(&self) -> StreamId {
        self.id
    }

    #[must_use]
    pub const fn client(&self) -> SocketAddr {
        self.client
    }

    #[must_use]
    pub const fn server(&self) -> SocketAddr {
        self.server
    }

    #[must_use]
    pub const fn state(&self) -> StreamState {
        self.state
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state == StreamState::Finished
    }

    /// The data sent by the client.
    #[must_use]
    pub const fn client_flow(&self) -> &Flow {
        &self.client_flow
    }

    /// The data sent by the server.
    #[must_use]
    pub const fn server_flow(&self) -> &Flow {
        &self.server_flow
    }

    #[must_use]
    pub fn client_payload(&self) -> &[u8] {
        self.client_flow.payload()
    }

    #[must_use]
    pub fn server_payload(&self) -> &[u8] {
        self.server_flow.payload()
    }

    pub fn clear_client_payload(&mut self) {
        self.client_flow.clear_payload();
    }

    pub fn clear_server_payload(&mut self) {
        self.server_flow.clear_payload();
    }

    /// Update the stream with a segment sent from `src`.
    ///
    /// Returns true if new in-order payload was reassembled in either direction.
    #[instrument(
        skip(self, tcp, payload),
        fields(id = %self.id, state = %self.state),
        level = "trace"
    )]
    pub fn update(&mut self, src: SocketAddr, tcp: &Tcp, payload: &[u8]) -> bool {
        let from_client = src == self.client;
        if tcp.has_flags(TcpFlags::RST) {
            debug!(id = %self.id, %src, "stream reset");
            self.state = StreamState::Finished;
            return false;
        }
        match self.state {
            StreamState::Finished => return false,
            StreamState::SynSent if !from_client => {
                if tcp.has_flags(TcpFlags::SYN | TcpFlags::ACK) {
                    debug!(
                        id = %self.id,
                        client = %self.client,
                        server = %self.server,
                        "stream established"
                    );
                    self.server_flow.initialise(tcp.seq.wrapping_add(1));
                    self.state = StreamState::Established;
                }
                return false;
            }
            StreamState::SynSent | StreamState::Established => {}
        }
        let max_buffered = self.config.max_buffered_bytes;
        let retain = self.config.track_payload.is_enabled();
        let flow = if from_client {
            &mut self.client_flow
        } else {
            &mut self.server_flow
        };
        let added = flow.process(tcp.seq, payload, max_buffered, retain);
        if tcp.has_flags(TcpFlags::FIN) {
            flow.record_fin(tcp.seq, payload.len());
        }
        if self.client_flow.is_fin_seen() && self.server_flow.is_fin_seen() {
            debug!(id = %self.id, "stream finished");
            self.state = StreamState::Finished;
        }
        added
    }
}
