use pdukit_packet::dot11::{Dot11, FrameFlags};
use pdukit_packet::raw::RawPdu;
use pdukit_packet::snap::Snap;
use pdukit_packet::{HwAddress, Pdu, PduKind, Protocol};
use std::cmp::{max, min};
use tracing::debug;

/// An unordered pair of station addresses, held lowest first.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct AddressPair(pub HwAddress, pub HwAddress);

impl AddressPair {
    #[must_use]
    pub fn new(lhs: HwAddress, rhs: HwAddress) -> Self {
        Self(min(lhs, rhs), max(lhs, rhs))
    }
}

/// The protected data frame of a chain and its encrypted payload.
pub(crate) fn protected_payload(pdu: &Pdu) -> Option<(&Dot11, &[u8])> {
    let node = pdu.find_pdu(PduKind::Dot11)?;
    let dot11 = Dot11::from_layer(node.layer())?;
    if !dot11.is_protected() || dot11.data().is_none() {
        return None;
    }
    let raw = node
        .inner()
        .and_then(|inner| RawPdu::from_layer(inner.layer()))?;
    Some((dot11, raw.payload()))
}

/// Replace the encrypted payload of the data frame with the decoded plaintext.
///
/// The protected flag is cleared. Returns false, leaving the chain untouched, if the plaintext
/// does not decode.
pub(crate) fn attach_plaintext(pdu: &mut Pdu, plaintext: &[u8]) -> bool {
    let snap = match Pdu::parse::<Snap>(plaintext) {
        Ok(snap) => snap,
        Err(err) => {
            debug!(%err, "decrypted payload does not decode");
            return false;
        }
    };
    let Some(node) = pdu.find_pdu_mut(PduKind::Dot11) else {
        return false;
    };
    node.set_inner(snap);
    if let Some(dot11) = Dot11::from_layer_mut(node.layer_mut()) {
        dot11.flags.remove(FrameFlags::PROTECTED);
    }
    true
}

/// The little-endian `CRC32` integrity check value used by `WEP` and `TKIP`.
pub(crate) fn icv(data: &[u8]) -> [u8; 4] {
    crc32fast::hash(data).to_le_bytes()
}
