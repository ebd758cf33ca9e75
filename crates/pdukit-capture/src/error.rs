use thiserror::Error;

/// A capture error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A capture error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("pcap error: {0}")]
    Pcap(String),
    #[error("invalid packet: {0}")]
    PacketError(#[from] pdukit_packet::error::Error),
    #[error("invalid config: {0}")]
    BadConfig(String),
}
