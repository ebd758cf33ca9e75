use thiserror::Error;

/// A crypto error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A crypto error.
///
/// A frame which fails to decrypt is not an error, decrypters report it as `false`.
#[derive(Error, Debug)]
pub enum Error {
    /// The key material derived from a handshake does not verify its `MIC`.
    #[error("invalid handshake: {0}")]
    InvalidHandshake(String),
    /// A key or passphrase could not be used.
    #[error("invalid key: {0}")]
    InvalidKey(String),
    /// No network was registered for an `SSID`.
    #[error("unknown ssid: {0}")]
    UnknownSsid(String),
    #[error("packet error: {0}")]
    PacketError(#[from] pdukit_packet::error::Error),
}
