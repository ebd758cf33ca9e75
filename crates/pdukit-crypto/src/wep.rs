use crate::frame::{attach_plaintext, icv, protected_payload};
use crate::proxy::Decrypter;
use crate::rc4::rc4;
use indexmap::IndexMap;
use pdukit_packet::dot11::HasAddressFields;
use pdukit_packet::{HwAddress, Pdu};
use tracing::{debug, instrument, trace};

/// The size of the `IV` and key index which precede the ciphertext.
const IV_SIZE: usize = 4;

/// The size of the integrity check value which follows the plaintext.
const ICV_SIZE: usize = 4;

/// Decrypt `WEP` protected data frames.
///
/// Each access point, identified by its `BSSID`, has its own password.
#[derive(Debug, Default, Clone)]
pub struct WepDecrypter {
    passwords: IndexMap<HwAddress, Vec<u8>>,
}

impl WepDecrypter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the password of the access point `bssid`.
    pub fn add_password(&mut self, bssid: HwAddress, password: impl Into<Vec<u8>>) {
        self.passwords.insert(bssid, password.into());
    }

    pub fn remove_password(&mut self, bssid: HwAddress) {
        self.passwords.shift_remove(&bssid);
    }

    /// Decrypt a frame if it is a protected data frame of an access point with a known password.
    ///
    /// Returns false, leaving the frame untouched, if it is not or if its integrity check fails.
    #[instrument(skip_all, level = "trace")]
    pub fn decrypt(&mut self, pdu: &mut Pdu) -> bool {
        let plaintext = {
            let Some((dot11, payload)) = protected_payload(pdu) else {
                return false;
            };
            let Some(bssid) = dot11.bssid() else {
                return false;
            };
            let Some(password) = self.passwords.get(&bssid) else {
                trace!(%bssid, "no password");
                return false;
            };
            decrypt_payload(password, payload)
        };
        match plaintext {
            Some(plaintext) => attach_plaintext(pdu, &plaintext),
            None => {
                debug!("frame failed its integrity check");
                false
            }
        }
    }
}

impl Decrypter for WepDecrypter {
    fn decrypt(&mut self, pdu: &mut Pdu) -> bool {
        WepDecrypter::decrypt(self, pdu)
    }
}

/// Decrypt a `WEP` payload, returning the plaintext without its integrity check value.
fn decrypt_payload(password: &[u8], payload: &[u8]) -> Option<Vec<u8>> {
    if payload.len() <= IV_SIZE + ICV_SIZE {
        return None;
    }
    let mut key = payload[..3].to_vec();
    key.extend_from_slice(password);
    let mut plaintext = rc4(&key, &payload[IV_SIZE..]);
    let received = plaintext.split_off(plaintext.len() - ICV_SIZE);
    (icv(&plaintext) == received.as_slice()).then_some(plaintext)
}
