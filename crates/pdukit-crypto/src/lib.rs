//! Decryption of protected IEEE 802.11 data frames.
//!
//! Two decrypters are provided, both operating in place on a decoded [`Pdu`] chain whose
//! outermost (or any) layer is a [`Dot11`] data frame with an encrypted payload:
//!
//! - [`WepDecrypter`] - `WEP`, with a password per access point.
//! - [`Wpa2Decrypter`] - `WPA2` personal, with a passphrase per network. Session keys are
//!   derived from the 4-way handshakes observed in the traffic.
//!
//! A decrypted frame has its encrypted payload replaced by the decoded plaintext and its protected
//! flag cleared. A frame which cannot be decrypted is left untouched.
//!
//! # Example
//!
//! The following example decrypts the traffic of a `WPA2` network in a sequence of frames:
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use pdukit_crypto::Wpa2Decrypter;
//! use pdukit_packet::Pdu;
//!
//! # let frames: Vec<Pdu> = vec![];
//! let mut decrypter = Wpa2Decrypter::new();
//! decrypter.add_ap_data("passphrase", "my network")?;
//! for mut pdu in frames {
//!     if decrypter.decrypt(&mut pdu) {
//!         println!("{pdu:?}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`Pdu`]: pdukit_packet::Pdu
//! [`Dot11`]: pdukit_packet::dot11::Dot11
#![forbid(unsafe_code)]

mod error;
mod frame;
mod proxy;
mod rc4;
mod wep;
mod wpa2;

pub use error::{Error, Result};
pub use frame::AddressPair;
pub use proxy::{Decrypter, DecrypterProxy};
pub use rc4::{rc4, Rc4};
pub use wep::WepDecrypter;
pub use wpa2::{
    ApFoundCallback, Cipher, EapolHandshake, HandshakeCapturedCallback, HandshakeCapturer,
    SessionKeys, SupplicantData, Wpa2Decrypter, HANDSHAKE_MESSAGES, PMK_SIZE, PTK_SIZE,
};
