use std::fmt::{Display, Formatter};

/// Default values for configuration.
pub mod defaults {
    use crate::config::PayloadTracking;

    /// The default value for `max-buffered-bytes`.
    pub const DEFAULT_MAX_BUFFERED_BYTES: usize = 1024 * 1024;

    /// The default number of incomplete `IPv4` datagrams held by a reassembler.
    pub const DEFAULT_MAX_DATAGRAMS: usize = 1024;

    /// The default value for `max-streams`.
    pub const DEFAULT_MAX_STREAMS: usize = 4096;

    /// The default value for `track-payload`.
    pub const DEFAULT_TRACK_PAYLOAD: PayloadTracking = PayloadTracking::Enabled;
}

/// Whether reassembled payload is retained by a stream.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PayloadTracking {
    /// Reassembled bytes are discarded once the sequence numbers have advanced.
    Disabled,
    /// Reassembled bytes are accumulated until cleared.
    Enabled,
}

impl PayloadTracking {
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        match self {
            Self::Disabled => false,
            Self::Enabled => true,
        }
    }
}

impl Display for PayloadTracking {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Enabled => write!(f, "enabled"),
        }
    }
}

/// Stream follower configuration.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct StreamConfig {
    /// The maximum number of out-of-order bytes held per direction of a stream.
    pub max_buffered_bytes: usize,
    /// The maximum number of streams tracked at once.
    pub max_streams: usize,
    pub track_payload: PayloadTracking,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_buffered_bytes: defaults::DEFAULT_MAX_BUFFERED_BYTES,
            max_streams: defaults::DEFAULT_MAX_STREAMS,
            track_payload: defaults::DEFAULT_TRACK_PAYLOAD,
        }
    }
}
