//! `WPA2` personal decryption.
//!
//! A [`Wpa2Decrypter`] is given the passphrase and `SSID` of each network of interest. It learns
//! the `BSSID` of those networks from their beacons, captures the 4-way handshake of each client
//! which joins them and derives the client's [`SessionKeys`], which are then used to decrypt the
//! unicast traffic between the client and the access point.

mod ccmp;
mod handshake;
mod keys;
mod tkip;

pub use handshake::{EapolHandshake, HandshakeCapturer, HANDSHAKE_MESSAGES};
pub use keys::{Cipher, SessionKeys, SupplicantData, PMK_SIZE, PTK_SIZE};

use crate::error::{Error, Result};
use crate::frame::{attach_plaintext, protected_payload, AddressPair};
use crate::proxy::Decrypter;
use indexmap::IndexMap;
use pdukit_packet::dot11::mgmt::{SUBTYPE_BEACON, SUBTYPE_PROBE_RESPONSE};
use pdukit_packet::dot11::{Dot11, Dot11Options, FrameFlags, HasAddressFields};
use pdukit_packet::{HwAddress, Pdu};
use std::fmt::{Debug, Formatter};
use tracing::{debug, instrument, trace, warn};

/// Called with the `SSID`, `BSSID` and client address of each handshake which yields keys.
pub type HandshakeCapturedCallback = Box<dyn FnMut(&str, HwAddress, HwAddress)>;

/// Called with the `SSID` and `BSSID` of each access point found.
pub type ApFoundCallback = Box<dyn FnMut(&str, HwAddress)>;

/// Decrypt `WPA2` personal (`CCMP` or `TKIP`) unicast traffic.
#[derive(Default)]
pub struct Wpa2Decrypter {
    capturer: HandshakeCapturer,
    networks: IndexMap<String, SupplicantData>,
    access_points: IndexMap<HwAddress, String>,
    keys: IndexMap<AddressPair, SessionKeys>,
    handshake_captured: Option<HandshakeCapturedCallback>,
    ap_found: Option<ApFoundCallback>,
}

impl Wpa2Decrypter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a network.
    ///
    /// Access points advertising `ssid` are recognised from their beacons and probe responses.
    pub fn add_ap_data(&mut self, psk: &str, ssid: &str) -> Result<()> {
        let data = SupplicantData::new(psk, ssid)?;
        debug!(ssid, "network added");
        self.networks.insert(ssid.to_string(), data);
        Ok(())
    }

    /// Register a network together with the `BSSID` of one of its access points.
    pub fn add_ap_data_with_addr(&mut self, psk: &str, ssid: &str, bssid: HwAddress) -> Result<()> {
        self.add_ap_data(psk, ssid)?;
        self.add_access_point(ssid, bssid)
    }

    /// Bind an access point to a registered network.
    pub fn add_access_point(&mut self, ssid: &str, bssid: HwAddress) -> Result<()> {
        if !self.networks.contains_key(ssid) {
            return Err(Error::UnknownSsid(ssid.to_string()));
        }
        debug!(ssid, %bssid, "access point added");
        self.access_points.insert(bssid, ssid.to_string());
        if let Some(callback) = self.ap_found.as_mut() {
            callback(ssid, bssid);
        }
        Ok(())
    }

    /// Use previously derived keys for the traffic between a pair of stations.
    pub fn add_decryption_keys(&mut self, addresses: AddressPair, keys: SessionKeys) {
        self.keys.insert(addresses, keys);
    }

    /// The keys derived or added so far, by station address pair.
    #[must_use]
    pub const fn get_keys(&self) -> &IndexMap<AddressPair, SessionKeys> {
        &self.keys
    }

    /// The `SSID` of each known access point, by `BSSID`.
    #[must_use]
    pub const fn access_points(&self) -> &IndexMap<HwAddress, String> {
        &self.access_points
    }

    #[must_use]
    pub const fn capturer(&self) -> &HandshakeCapturer {
        &self.capturer
    }

    /// Set the callback invoked when a captured handshake yields keys.
    pub fn on_handshake_captured(
        &mut self,
        callback: impl FnMut(&str, HwAddress, HwAddress) + 'static,
    ) {
        self.handshake_captured = Some(Box::new(callback));
    }

    /// Set the callback invoked when an access point of a registered network is found.
    pub fn on_ap_found(&mut self, callback: impl FnMut(&str, HwAddress) + 'static) {
        self.ap_found = Some(Box::new(callback));
    }

    /// Process a frame, decrypting it if it is protected unicast data with known keys.
    ///
    /// Handshake messages, beacons and probe responses update the state of the decrypter.
    /// Returns true only if the frame was decrypted, in which case its encrypted payload is
    /// replaced by the decoded plaintext and its protected flag is cleared.
    #[instrument(skip_all, level = "trace")]
    pub fn decrypt(&mut self, pdu: &mut Pdu) -> bool {
        if self.capturer.process_packet(pdu) {
            let handshakes = self.capturer.take_handshakes();
            if let Some(dot11) = pdu.find::<Dot11>() {
                for handshake in &handshakes {
                    self.try_add_keys(dot11, handshake);
                }
            }
            return false;
        }
        if let Some(dot11) = pdu.find::<Dot11>() {
            if let Some(mgmt) = dot11.management() {
                if matches!(mgmt.fixed.subtype(), SUBTYPE_BEACON | SUBTYPE_PROBE_RESPONSE) {
                    self.discover(mgmt.addr3(), mgmt.ssid().ok());
                }
                return false;
            }
        }
        let plaintext = {
            let Some((dot11, payload)) = protected_payload(pdu) else {
                return false;
            };
            let Some(keys) = session_pairs(dot11)
                .into_iter()
                .flatten()
                .find_map(|addresses| self.keys.get(&addresses))
            else {
                trace!("no keys for frame");
                return false;
            };
            keys.decrypt_unicast(dot11, payload)
        };
        match plaintext {
            Some(plaintext) => attach_plaintext(pdu, &plaintext),
            None => {
                debug!("frame failed its integrity check");
                false
            }
        }
    }

    /// Bind an advertising access point to its network, if registered.
    fn discover(&mut self, bssid: HwAddress, ssid: Option<String>) {
        if self.access_points.contains_key(&bssid) {
            return;
        }
        if let Some(ssid) = ssid.filter(|ssid| self.networks.contains_key(ssid)) {
            if let Err(err) = self.add_access_point(&ssid, bssid) {
                warn!(%err, "failed to add access point");
            }
        }
    }

    /// Derive and store the keys of a handshake whose last message is `dot11`.
    fn try_add_keys(&mut self, dot11: &Dot11, handshake: &EapolHandshake) {
        let Some(bssid) = dot11.bssid() else {
            return;
        };
        let Some((ssid, data)) = self
            .access_points
            .get(&bssid)
            .and_then(|ssid| self.networks.get_key_value(ssid))
        else {
            debug!(%bssid, "handshake with an unknown access point");
            return;
        };
        match SessionKeys::from_handshake(handshake, data.pmk()) {
            Ok(keys) => {
                let addresses = handshake.addresses();
                let client = if addresses.0 == bssid {
                    addresses.1
                } else {
                    addresses.0
                };
                if let Some(callback) = self.handshake_captured.as_mut() {
                    callback(ssid, bssid, client);
                }
                self.keys.insert(addresses, keys);
            }
            Err(err) => warn!(%err, %bssid, "discarding handshake"),
        }
    }
}

impl Decrypter for Wpa2Decrypter {
    fn decrypt(&mut self, pdu: &mut Pdu) -> bool {
        Wpa2Decrypter::decrypt(self, pdu)
    }
}

impl Debug for Wpa2Decrypter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wpa2Decrypter")
            .field("capturer", &self.capturer)
            .field("networks", &self.networks.keys().collect::<Vec<_>>())
            .field("access_points", &self.access_points)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

/// The station pairs whose keys may protect a data frame, by source then by destination.
fn session_pairs(dot11: &Dot11) -> [Option<AddressPair>; 2] {
    let to_ds = dot11.flags.contains(FrameFlags::TO_DS);
    let from_ds = dot11.flags.contains(FrameFlags::FROM_DS);
    let addr1 = Some(dot11.addr1);
    let (addr2, addr3) = (dot11.addr2(), dot11.addr3());
    let pair = |lhs: Option<HwAddress>, rhs: Option<HwAddress>| Some(AddressPair::new(lhs?, rhs?));
    match (to_ds, from_ds) {
        (true, false) => [pair(addr1, addr2), pair(addr1, addr3)],
        (false, true) => [pair(addr2, addr3), pair(addr1, addr2)],
        _ => [pair(addr2, addr3), pair(addr1, addr3)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wpa2::handshake::tests::{frame, message, AP, STA};
    use crate::wpa2::keys::{compute_mic, derive_ptk};
    use pdukit_packet::dot11::data::{Dot11Data, SUBTYPE_DATA};
    use pdukit_packet::dot11::mgmt::{Capabilities, Dot11Management, ManagementFixed};
    use pdukit_packet::dot11::{Dot11Frame, SequenceHeader};
    use pdukit_packet::eapol::Eapol;
    use pdukit_packet::raw::RawPdu;
    use pdukit_packet::snap::Snap;
    use std::cell::RefCell;
    use std::rc::Rc;

    const PSK: &str = "password";
    const SSID: &str = "IEEE";

    fn beacon(ssid: &str) -> Pdu {
        let mut mgmt = Dot11Management::new(ManagementFixed::beacon(Capabilities::ESS));
        mgmt.header.addr2 = AP;
        mgmt.header.addr3 = AP;
        mgmt.set_ssid(ssid);
        Pdu::new(Dot11::new(HwAddress::BROADCAST, Dot11Frame::Management(mgmt)))
    }

    /// The four messages of a handshake, the last one signed with the keys of `psk`.
    fn handshake(psk: &str) -> Vec<Pdu> {
        let pmk = SupplicantData::new(psk, SSID).unwrap();
        let mut messages: Vec<Eapol> = (1..=4).map(message).collect();
        let nonce2 = messages[1].rsn_key().unwrap().nonce;
        let nonce3 = messages[2].rsn_key().unwrap().nonce;
        let ptk = derive_ptk(pmk.pmk(), AddressPair::new(AP, STA), &nonce2, &nonce3).unwrap();
        let mic = compute_mic(&ptk[..16], &messages[3]).unwrap();
        messages[3].rsn_key_mut().unwrap().mic = mic;
        messages
            .into_iter()
            .enumerate()
            .map(|(i, eapol)| frame(i + 1, eapol))
            .collect()
    }

    /// A protected data frame from the client to the access point.
    fn protected(payload: Vec<u8>) -> Pdu {
        let data = Dot11Data::new(
            SUBTYPE_DATA,
            SequenceHeader {
                addr2: STA,
                addr3: HwAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
                ..SequenceHeader::default()
            },
        );
        Dot11 {
            flags: FrameFlags::TO_DS | FrameFlags::PROTECTED,
            ..Dot11::new(AP, Dot11Frame::Data(data))
        } / RawPdu::new(payload)
    }

    fn plaintext() -> Vec<u8> {
        let snap = Snap {
            eth_type: 0x88b5,
            ..Snap::default()
        };
        (Pdu::new(snap) / RawPdu::new(b"secret".to_vec()))
            .serialize()
            .unwrap()
    }

    fn encrypted(keys: &SessionKeys) -> Pdu {
        let pdu = protected(Vec::new());
        let dot11 = pdu.find::<Dot11>().unwrap();
        let payload = ccmp::encrypt(&keys.tk(), dot11, 1, 0, &plaintext());
        protected(payload)
    }

    fn decrypter() -> Wpa2Decrypter {
        let mut decrypter = Wpa2Decrypter::new();
        decrypter.add_ap_data(PSK, SSID).unwrap();
        decrypter
    }

    #[test]
    fn test_beacon_binds_access_point() {
        let mut decrypter = decrypter();
        let found = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&found);
        decrypter.on_ap_found(move |ssid, bssid| sink.borrow_mut().push((ssid.to_string(), bssid)));
        assert!(!decrypter.decrypt(&mut beacon("other")));
        assert!(decrypter.access_points().is_empty());
        assert!(!decrypter.decrypt(&mut beacon(SSID)));
        assert!(!decrypter.decrypt(&mut beacon(SSID)));
        assert_eq!(Some(&String::from(SSID)), decrypter.access_points().get(&AP));
        assert_eq!(vec![(String::from(SSID), AP)], *found.borrow());
    }

    #[test]
    fn test_add_access_point_requires_network() {
        let mut decrypter = Wpa2Decrypter::new();
        let err = decrypter.add_access_point(SSID, AP).unwrap_err();
        assert_eq!("unknown ssid: IEEE", err.to_string());
    }

    #[test]
    fn test_handshake_then_decrypt() {
        let mut decrypter = decrypter();
        let captured = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&captured);
        decrypter.on_handshake_captured(move |ssid, bssid, client| {
            sink.borrow_mut().push((ssid.to_string(), bssid, client));
        });
        assert!(!decrypter.decrypt(&mut beacon(SSID)));
        for mut pdu in handshake(PSK) {
            assert!(!decrypter.decrypt(&mut pdu));
        }
        assert_eq!(vec![(String::from(SSID), AP, STA)], *captured.borrow());
        let keys = decrypter.get_keys().get(&AddressPair::new(AP, STA)).unwrap().clone();
        assert_eq!(Cipher::Ccmp, keys.cipher());

        let mut pdu = encrypted(&keys);
        assert!(decrypter.decrypt(&mut pdu));
        assert!(!pdu.find::<Dot11>().unwrap().is_protected());
        assert_eq!(0x88b5, pdu.find::<Snap>().unwrap().eth_type);
        assert_eq!(Some(&b"secret"[..]), pdu.find::<RawPdu>().map(RawPdu::payload));
    }

    #[test]
    fn test_wrong_passphrase_yields_no_keys() {
        let mut decrypter = decrypter();
        assert!(!decrypter.decrypt(&mut beacon(SSID)));
        for mut pdu in handshake("not the password") {
            assert!(!decrypter.decrypt(&mut pdu));
        }
        assert!(decrypter.get_keys().is_empty());
    }

    #[test]
    fn test_handshake_with_unknown_access_point() {
        let mut decrypter = decrypter();
        for mut pdu in handshake(PSK) {
            assert!(!decrypter.decrypt(&mut pdu));
        }
        assert!(decrypter.get_keys().is_empty());
    }

    #[test]
    fn test_added_keys() {
        let mut decrypter = Wpa2Decrypter::new();
        let keys = SessionKeys::new([0x33; PTK_SIZE], Cipher::Ccmp);
        decrypter.add_decryption_keys(AddressPair::new(STA, AP), keys.clone());
        let mut pdu = encrypted(&keys);
        assert!(decrypter.decrypt(&mut pdu));
        assert!(pdu.find::<Snap>().is_some());
    }

    #[test]
    fn test_corrupted_frame_left_intact() {
        let mut decrypter = Wpa2Decrypter::new();
        let keys = SessionKeys::new([0x33; PTK_SIZE], Cipher::Ccmp);
        decrypter.add_decryption_keys(AddressPair::new(STA, AP), keys.clone());
        let mut pdu = encrypted(&keys);
        if let Some(raw) = pdu.find_mut::<RawPdu>() {
            raw.payload_mut()[10] ^= 0xff;
        }
        let original = pdu.clone();
        assert!(!decrypter.decrypt(&mut pdu));
        assert_eq!(original, pdu);
    }

    #[test]
    fn test_no_keys() {
        let keys = SessionKeys::new([0x33; PTK_SIZE], Cipher::Ccmp);
        let mut pdu = encrypted(&keys);
        assert!(!Wpa2Decrypter::new().decrypt(&mut pdu));
        assert!(pdu.find::<Dot11>().unwrap().is_protected());
    }

    #[test]
    fn test_session_pairs() {
        let pdu = protected(Vec::new());
        let dot11 = pdu.find::<Dot11>().unwrap();
        let [by_source, _] = session_pairs(dot11);
        assert_eq!(Some(AddressPair::new(AP, STA)), by_source);
    }
}
