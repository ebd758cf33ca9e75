use crate::error::{Error, Result};
use crate::frame::AddressPair;
use crate::wpa2::handshake::EapolHandshake;
use crate::wpa2::{ccmp, tkip};
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use md5::Md5;
use pdukit_packet::dot11::{Dot11, HasAddressFields};
use pdukit_packet::eapol::{Eapol, KeyInformation, MIC_SIZE, NONCE_SIZE};
use pdukit_packet::Pdu;
use sha1::Sha1;
use std::cmp::{max, min};
use std::fmt::{Debug, Formatter};
use tracing::debug;

/// The size of a pairwise master key.
pub const PMK_SIZE: usize = 32;

/// The size of the derived pairwise transient key material.
pub const PTK_SIZE: usize = 80;

const PMK_ITERATIONS: u32 = 4096;
const PAIRWISE_KEY_EXPANSION: &[u8] = b"Pairwise key expansion\0";
const KCK_RANGE: std::ops::Range<usize> = 0..16;
const TK_OFFSET: usize = 32;

/// The cipher protecting unicast frames.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Cipher {
    Ccmp,
    Tkip,
}

impl std::fmt::Display for Cipher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ccmp => write!(f, "ccmp"),
            Self::Tkip => write!(f, "tkip"),
        }
    }
}

/// The pairwise master key of a network, derived from its passphrase and `SSID`.
#[derive(Clone, Eq, PartialEq)]
pub struct SupplicantData {
    pmk: [u8; PMK_SIZE],
}

impl SupplicantData {
    pub fn new(psk: &str, ssid: &str) -> Result<Self> {
        let mut pmk = [0_u8; PMK_SIZE];
        pbkdf2::pbkdf2::<Hmac<Sha1>>(psk.as_bytes(), ssid.as_bytes(), PMK_ITERATIONS, &mut pmk)
            .map_err(|err| Error::InvalidKey(err.to_string()))?;
        Ok(Self { pmk })
    }

    #[must_use]
    pub const fn pmk(&self) -> &[u8; PMK_SIZE] {
        &self.pmk
    }
}

impl Debug for SupplicantData {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupplicantData").finish_non_exhaustive()
    }
}

/// The keys protecting the unicast traffic between a client and an access point.
#[derive(Clone, Eq, PartialEq)]
pub struct SessionKeys {
    ptk: [u8; PTK_SIZE],
    cipher: Cipher,
}

impl SessionKeys {
    /// Keys from previously derived key material.
    #[must_use]
    pub const fn new(ptk: [u8; PTK_SIZE], cipher: Cipher) -> Self {
        Self { ptk, cipher }
    }

    /// Derive the keys of a captured handshake.
    ///
    /// The derived key confirmation key must reproduce the `MIC` of the fourth message, otherwise
    /// the handshake is rejected with [`Error::InvalidHandshake`].
    pub fn from_handshake(handshake: &EapolHandshake, pmk: &[u8; PMK_SIZE]) -> Result<Self> {
        let message2 = handshake.key(1)?;
        let message3 = handshake.key(2)?;
        let ptk = derive_ptk(
            pmk,
            handshake.addresses(),
            &message2.nonce,
            &message3.nonce,
        )?;
        let message4 = handshake.message(3);
        let key = handshake.key(3)?;
        let mic = compute_mic(&ptk[KCK_RANGE], message4)?;
        if mic != key.mic {
            return Err(Error::InvalidHandshake(format!(
                "MIC mismatch for {} and {}",
                handshake.addresses().0,
                handshake.addresses().1
            )));
        }
        let cipher = if key.key_info.descriptor_version() == KeyInformation::VERSION_HMAC_SHA1 {
            Cipher::Ccmp
        } else {
            Cipher::Tkip
        };
        let AddressPair(lower, upper) = handshake.addresses();
        debug!(%cipher, %lower, %upper, "derived session keys");
        Ok(Self { ptk, cipher })
    }

    #[must_use]
    pub const fn ptk(&self) -> &[u8; PTK_SIZE] {
        &self.ptk
    }

    #[must_use]
    pub const fn cipher(&self) -> Cipher {
        self.cipher
    }

    /// The temporal key.
    #[must_use]
    pub fn tk(&self) -> [u8; 16] {
        core::array::from_fn(|i| self.ptk[TK_OFFSET + i])
    }

    /// Decrypt the payload of a protected unicast data frame.
    ///
    /// Returns `None` if the payload fails its integrity check.
    #[must_use]
    pub fn decrypt_unicast(&self, dot11: &Dot11, payload: &[u8]) -> Option<Vec<u8>> {
        match self.cipher {
            Cipher::Ccmp => ccmp::decrypt(&self.tk(), dot11, payload),
            Cipher::Tkip => tkip::decrypt(&self.tk(), dot11.addr2()?, payload),
        }
    }
}

impl Debug for SessionKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("cipher", &self.cipher)
            .finish_non_exhaustive()
    }
}

/// Expand a pairwise master key with the addresses and nonces of a handshake.
pub(crate) fn derive_ptk(
    pmk: &[u8; PMK_SIZE],
    addresses: AddressPair,
    nonce1: &[u8; NONCE_SIZE],
    nonce2: &[u8; NONCE_SIZE],
) -> Result<[u8; PTK_SIZE]> {
    let mut data = Vec::with_capacity(12 + 2 * NONCE_SIZE);
    data.extend_from_slice(&addresses.0.octets());
    data.extend_from_slice(&addresses.1.octets());
    data.extend_from_slice(min(nonce1, nonce2));
    data.extend_from_slice(max(nonce1, nonce2));
    let mut ptk = [0_u8; PTK_SIZE];
    prf(pmk, PAIRWISE_KEY_EXPANSION, &data, &mut ptk)?;
    Ok(ptk)
}

/// The `HMAC-SHA1` based pseudo random function, filling `output` from `key`, `label` and `data`.
///
/// `label` carries its terminating zero byte.
fn prf(key: &[u8], label: &[u8], data: &[u8], output: &mut [u8]) -> Result<()> {
    let mut input = Vec::with_capacity(label.len() + data.len() + 1);
    input.extend_from_slice(label);
    input.extend_from_slice(data);
    input.push(0);
    for (i, chunk) in output.chunks_mut(20).enumerate() {
        if let Some(counter) = input.last_mut() {
            *counter = i as u8;
        }
        let digest = mac_digest::<Hmac<Sha1>>(key, &input)?;
        chunk.copy_from_slice(&digest[..chunk.len()]);
    }
    Ok(())
}

/// The `MIC` of an `EAPOL` key frame, computed with its `MIC` field zeroed.
pub(crate) fn compute_mic(kck: &[u8], eapol: &Eapol) -> Result<[u8; MIC_SIZE]> {
    let mut unsigned = eapol.clone();
    let version = match unsigned.rsn_key_mut() {
        Some(key) => {
            key.mic = [0; MIC_SIZE];
            key.key_info.descriptor_version()
        }
        None => {
            return Err(Error::InvalidHandshake(String::from(
                "EAPOL frame is not a key frame",
            )))
        }
    };
    let bytes = Pdu::new(unsigned).serialize()?;
    let digest = if version == KeyInformation::VERSION_HMAC_SHA1 {
        mac_digest::<Hmac<Sha1>>(kck, &bytes)?
    } else {
        mac_digest::<Hmac<Md5>>(kck, &bytes)?
    };
    Ok(core::array::from_fn(|i| digest[i]))
}

fn mac_digest<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac =
        <M as Mac>::new_from_slice(key).map_err(|err| Error::InvalidKey(err.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use pdukit_packet::eapol::{EapolBody, RsnKey};
    use pdukit_packet::HwAddress;

    const AP: HwAddress = HwAddress([0x00, 0x0c, 0x41, 0x82, 0xb2, 0x55]);
    const STA: HwAddress = HwAddress([0x00, 0x0d, 0x93, 0x82, 0x36, 0x3a]);

    #[test]
    fn test_pmk_known_answer() {
        let data = SupplicantData::new("password", "IEEE").unwrap();
        assert_eq!(
            &hex!(
                "f4 2c 6f c5 2d f0 eb ef 9e bb 4b 90 b3 8a 5f 90"
                "2e 83 fe 1b 13 5a 70 e2 3a ed 76 2e 97 10 a1 2e"
            ),
            data.pmk()
        );
    }

    #[test]
    fn test_prf_known_answer() {
        let mut output = [0_u8; 64];
        prf(&[0x0b; 20], b"prefix\0", b"Hi There", &mut output).unwrap();
        assert_eq!(
            hex!(
                "bc d4 c6 50 b3 0b 96 84 95 18 29 e0 d7 5f 9d 54 b8 62 17 5e d9 f0 06 06"
                "e1 7d 8d a3 54 02 ff ee 75 df 78 c3 d3 1e 0f 88 9f 01 21 20 c0 86 2b eb"
                "67 75 3e 74 39 ae 24 2e db 83 73 69 83 56 cf 5a"
            ),
            output
        );
    }

    #[test]
    fn test_ptk_known_answer() {
        let pmk = *SupplicantData::new("password", "IEEE").unwrap().pmk();
        let ptk = derive_ptk(
            &pmk,
            AddressPair::new(AP, STA),
            &[0xaa; NONCE_SIZE],
            &[0x55; NONCE_SIZE],
        )
        .unwrap();
        assert_eq!(
            hex!(
                "92 2f 23 95 dd 19 4a 16 4f f7 d3 78 d3 b4 ff bc b6 6d a4 47 d1 08 9a 80"
                "bd 90 49 a3 48 e3 8a c6 c3 18 2f a8 f1 0d 01 42 82 19 85 2d 24 16 3b 93"
                "13 07 8a 60 bc 6c 90 ab 12 7d 4e 66 7a ac ad a5 4e 5d c4 d8 98 b7 6f 51"
                "d2 55 22 99 cf 23 07 22"
            ),
            ptk
        );
    }

    #[test]
    fn test_ptk_ignores_order_of_addresses_and_nonces() {
        let pmk = [0x11; PMK_SIZE];
        let anonce = [0xaa; NONCE_SIZE];
        let snonce = [0x55; NONCE_SIZE];
        let ptk1 = derive_ptk(&pmk, AddressPair::new(AP, STA), &snonce, &anonce).unwrap();
        let ptk2 = derive_ptk(&pmk, AddressPair::new(STA, AP), &anonce, &snonce).unwrap();
        assert_eq!(ptk1, ptk2);
        let ptk3 = derive_ptk(&[0x12; PMK_SIZE], AddressPair::new(AP, STA), &snonce, &anonce);
        assert_ne!(ptk1, ptk3.unwrap());
    }

    #[test]
    fn test_mic_ignores_existing_mic() {
        let mut key = RsnKey {
            key_info: KeyInformation::PAIRWISE
                .union(KeyInformation::KEY_MIC)
                .with_descriptor_version(KeyInformation::VERSION_HMAC_SHA1),
            ..RsnKey::default()
        };
        let unsigned = Eapol::new(EapolBody::RsnKey(key.clone()));
        key.mic = [0xff; MIC_SIZE];
        let signed = Eapol::new(EapolBody::RsnKey(key));
        let kck = [0x42; 16];
        assert_eq!(
            compute_mic(&kck, &unsigned).unwrap(),
            compute_mic(&kck, &signed).unwrap()
        );
    }

    #[test]
    fn test_mic_depends_on_descriptor_version() {
        let eapol = |version| {
            Eapol::new(EapolBody::RsnKey(RsnKey {
                key_info: KeyInformation::PAIRWISE.with_descriptor_version(version),
                ..RsnKey::default()
            }))
        };
        let kck = [0x42; 16];
        let sha1 = compute_mic(&kck, &eapol(KeyInformation::VERSION_HMAC_SHA1)).unwrap();
        let md5 = compute_mic(&kck, &eapol(KeyInformation::VERSION_HMAC_MD5)).unwrap();
        assert_ne!(sha1, md5);
    }

    #[test]
    fn test_mic_requires_key_frame() {
        let err = compute_mic(&[0; 16], &Eapol::new(EapolBody::Start)).unwrap_err();
        assert!(matches!(err, Error::InvalidHandshake(_)));
    }

    #[test]
    fn test_tk() {
        let ptk: [u8; PTK_SIZE] = core::array::from_fn(|i| i as u8);
        let keys = SessionKeys::new(ptk, Cipher::Ccmp);
        assert_eq!(core::array::from_fn::<u8, 16, _>(|i| (32 + i) as u8), keys.tk());
        assert_eq!(Cipher::Ccmp, keys.cipher());
    }
}
