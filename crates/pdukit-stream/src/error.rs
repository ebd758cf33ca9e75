use thiserror::Error;

/// A stream reassembly error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A stream reassembly error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid packet: {0}")]
    PacketError(#[from] pdukit_packet::error::Error),
    #[error("invalid config: {0}")]
    BadConfig(String),
}
