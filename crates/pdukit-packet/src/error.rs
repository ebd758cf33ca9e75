use thiserror::Error;

/// A packet error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A packet error.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum Error {
    /// Attempting to create a packet with an insufficient buffer size.
    #[error("insufficient buffer for {0} packet, minimum={1}, provided={2}")]
    InsufficientPacketBuffer(String, usize, usize),
    /// The bytes do not form a valid packet of the expected protocol.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),
    /// A typed option accessor found no option with the given tag.
    #[error("option {0} not found")]
    OptionNotFound(u8),
    /// An option was found but its value could not be decoded.
    #[error("malformed option {0}")]
    MalformedOption(u8),
    /// A textual address could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}
