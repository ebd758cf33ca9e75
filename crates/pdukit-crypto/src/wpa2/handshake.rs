use crate::error::{Error, Result};
use crate::frame::AddressPair;
use indexmap::IndexMap;
use pdukit_packet::dot11::{Dot11, HasAddressFields};
use pdukit_packet::eapol::{Eapol, KeyInformation, RsnKey};
use pdukit_packet::Pdu;
use tracing::{debug, instrument, trace};

/// The number of messages of the 4-way handshake.
pub const HANDSHAKE_MESSAGES: usize = 4;

/// A complete 4-way handshake between a client and an access point.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct EapolHandshake {
    addresses: AddressPair,
    messages: Vec<Eapol>,
}

impl EapolHandshake {
    /// The addresses of the client and the access point.
    #[must_use]
    pub const fn addresses(&self) -> AddressPair {
        self.addresses
    }

    /// The four key frames, in handshake order.
    #[must_use]
    pub fn messages(&self) -> &[Eapol] {
        &self.messages
    }

    /// The `EAPOL` frame of the message at `index` (zero based).
    ///
    /// # Panics
    ///
    /// If `index` is not below [`HANDSHAKE_MESSAGES`].
    #[must_use]
    pub fn message(&self, index: usize) -> &Eapol {
        &self.messages[index]
    }

    /// The key descriptor of the message at `index` (zero based).
    pub fn key(&self, index: usize) -> Result<&RsnKey> {
        self.messages
            .get(index)
            .and_then(Eapol::rsn_key)
            .ok_or_else(|| Error::InvalidHandshake(format!("message {} has no key", index + 1)))
    }
}

/// The position of a key frame in the 4-way handshake, identified by its key information bits.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Message {
    One,
    Two,
    Three,
    Four,
}

impl Message {
    fn classify(info: KeyInformation) -> Option<Self> {
        if !info.contains(KeyInformation::PAIRWISE) {
            return None;
        }
        let ack = info.contains(KeyInformation::KEY_ACK);
        let mic = info.contains(KeyInformation::KEY_MIC);
        let install = info.contains(KeyInformation::INSTALL);
        let secure = info.contains(KeyInformation::SECURE);
        match (ack, mic, install) {
            (true, false, false) => Some(Self::One),
            (false, true, false) if secure => Some(Self::Four),
            (false, true, false) => Some(Self::Two),
            (true, true, true) => Some(Self::Three),
            _ => None,
        }
    }

    /// The number of messages which precede this one.
    const fn preceding(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
            Self::Three => 2,
            Self::Four => 3,
        }
    }
}

/// Capture 4-way handshakes from a sequence of frames.
///
/// Handshakes are tracked per unordered pair of station addresses. Each message must follow the
/// previous one, an out of order message discards the handshake in progress while a
/// retransmission of the previous message is ignored. Handshakes in progress never expire.
#[derive(Debug, Default)]
pub struct HandshakeCapturer {
    pending: IndexMap<AddressPair, Vec<Eapol>>,
    completed: Vec<EapolHandshake>,
}

impl HandshakeCapturer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a frame.
    ///
    /// Returns true if the frame completed a handshake.
    #[instrument(skip_all, level = "trace")]
    pub fn process_packet(&mut self, pdu: &Pdu) -> bool {
        let Some(eapol) = pdu.find::<Eapol>() else {
            return false;
        };
        let Some(key) = eapol.rsn_key() else {
            return false;
        };
        let Some(dot11) = pdu.find::<Dot11>().filter(|dot11| dot11.data().is_some()) else {
            return false;
        };
        let (Some(src), Some(dst)) = (dot11.src_addr(), dot11.dst_addr()) else {
            return false;
        };
        let addresses = AddressPair::new(src, dst);
        let Some(message) = Message::classify(key.key_info) else {
            trace!(%src, %dst, "not a handshake message");
            return false;
        };
        trace!(%src, %dst, ?message, "handshake message");
        match message {
            Message::One => {
                self.pending.insert(addresses, vec![eapol.clone()]);
                false
            }
            Message::Two | Message::Three => {
                self.insert(addresses, eapol, message.preceding());
                false
            }
            Message::Four => {
                if !self.insert(addresses, eapol, message.preceding()) {
                    return false;
                }
                if let Some(messages) = self.pending.shift_remove(&addresses) {
                    debug!(lower = %addresses.0, upper = %addresses.1, "handshake captured");
                    self.completed.push(EapolHandshake {
                        addresses,
                        messages,
                    });
                }
                true
            }
        }
    }

    /// The handshakes captured so far.
    #[must_use]
    pub fn handshakes(&self) -> &[EapolHandshake] {
        &self.completed
    }

    pub fn clear_handshakes(&mut self) {
        self.completed.clear();
    }

    /// Remove and return the handshakes captured so far.
    pub fn take_handshakes(&mut self) -> Vec<EapolHandshake> {
        std::mem::take(&mut self.completed)
    }

    /// The number of handshakes in progress.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Append a message to the handshake in progress if exactly `expected` messages precede it.
    fn insert(&mut self, addresses: AddressPair, eapol: &Eapol, expected: usize) -> bool {
        let Some(messages) = self.pending.get_mut(&addresses) else {
            return false;
        };
        if messages.len() == expected {
            messages.push(eapol.clone());
            true
        } else {
            if messages.len() != expected + 1 {
                debug!(
                    lower = %addresses.0,
                    upper = %addresses.1,
                    expected,
                    captured = messages.len(),
                    "out of order handshake message"
                );
                messages.clear();
            }
            false
        }
    }
}
