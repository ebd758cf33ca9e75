use crate::config::defaults;
use indexmap::IndexMap;
use pdukit_packet::ipv4::Ipv4;
use pdukit_packet::raw::RawPdu;
use pdukit_packet::{Pdu, PduKind, Protocol};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use tracing::{debug, trace};

/// The outcome of feeding a packet to an [`Ipv4Reassembler`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display)]
pub enum FragmentStatus {
    /// The packet does not carry a fragmented `IPv4` datagram and was left untouched.
    #[display("not-fragmented")]
    NotFragmented,
    /// The packet is a fragment which cannot be reassembled yet.
    #[display("fragmented")]
    Fragmented,
    /// The packet completed a datagram and now carries its whole payload.
    #[display("reassembled")]
    Reassembled,
}

/// The fragments of a datagram are matched on the identification and the unordered address pair.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
struct DatagramKey {
    id: u16,
    lower: Ipv4Addr,
    upper: Ipv4Addr,
}

impl DatagramKey {
    fn new(id: u16, lhs: Ipv4Addr, rhs: Ipv4Addr) -> Self {
        Self {
            id,
            lower: lhs.min(rhs),
            upper: lhs.max(rhs),
        }
    }
}

/// The fragments received so far for one datagram, keyed by byte offset.
#[derive(Debug, Default)]
struct Datagram {
    fragments: BTreeMap<usize, Vec<u8>>,
    received: usize,
    total: Option<usize>,
}

impl Datagram {
    /// Store a fragment, a second fragment at the same offset is ignored.
    fn add(&mut self, offset: usize, last: bool, payload: &[u8]) {
        if self.fragments.contains_key(&offset) {
            trace!(offset, "duplicate fragment");
            return;
        }
        self.received += payload.len();
        if last {
            self.total = Some(offset + payload.len());
        }
        self.fragments.insert(offset, payload.to_vec());
    }

    fn is_complete(&self) -> bool {
        self.total == Some(self.received)
    }

    /// Join the fragments, or `None` if they leave a gap or overlap.
    fn assemble(self) -> Option<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.received);
        for (offset, payload) in self.fragments {
            if offset != buf.len() {
                return None;
            }
            buf.extend(payload);
        }
        Some(buf)
    }
}

/// Reassembles fragmented `IPv4` datagrams.
///
/// Each fragment is stored until the datagram it belongs to is complete, at which point the
/// packet carrying the final fragment is rewritten to hold the whole datagram. Fragments at an
/// already seen offset are dropped, a complete datagram whose fragments overlap or leave a gap is
/// discarded.
#[derive(Debug)]
pub struct Ipv4Reassembler {
    datagrams: IndexMap<DatagramKey, Datagram>,
    max_datagrams: usize,
}

impl Default for Ipv4Reassembler {
    fn default() -> Self {
        Self::new(defaults::DEFAULT_MAX_DATAGRAMS)
    }
}

impl Ipv4Reassembler {
    /// A reassembler holding at most `max_datagrams` incomplete datagrams.
    ///
    /// The oldest incomplete datagram is dropped to make room for a new one.
    #[must_use]
    pub fn new(max_datagrams: usize) -> Self {
        Self {
            datagrams: IndexMap::new(),
            max_datagrams: max_datagrams.max(1),
        }
    }

    /// The number of incomplete datagrams.
    #[must_use]
    pub fn len(&self) -> usize {
        self.datagrams.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.datagrams.is_empty()
    }

    /// Process a packet, rewriting it in place once it completes a datagram.
    ///
    /// A reassembled packet has its fragment flags and offset cleared and its payload decoded
    /// according to the `IPv4` protocol field.
    pub fn process(&mut self, pdu: &mut Pdu) -> FragmentStatus {
        let Some(node) = pdu.find_pdu_mut(PduKind::Ipv4) else {
            return FragmentStatus::NotFragmented;
        };
        let Some(ip) = Ipv4::from_layer(node.layer()) else {
            return FragmentStatus::NotFragmented;
        };
        if !ip.is_fragmented() {
            return FragmentStatus::NotFragmented;
        }
        let Some(payload) = node
            .inner()
            .and_then(|inner| RawPdu::from_layer(inner.layer()))
            .map(RawPdu::payload)
            .filter(|payload| !payload.is_empty())
        else {
            return FragmentStatus::NotFragmented;
        };
        let key = DatagramKey::new(ip.identification, ip.src, ip.dst);
        let offset = usize::from(ip.fragment_offset()) * 8;
        let last = !ip.more_fragments();
        let protocol = ip.protocol;
        trace!(id = key.id, offset, len = payload.len(), last, "fragment");
        if !self.datagrams.contains_key(&key) && self.datagrams.len() >= self.max_datagrams {
            if let Some((evicted, _)) = self.datagrams.shift_remove_index(0) {
                debug!(
                    id = evicted.id,
                    max_datagrams = self.max_datagrams,
                    "dropping incomplete datagram, too many datagrams"
                );
            }
        }
        let datagram = self.datagrams.entry(key).or_default();
        datagram.add(offset, last, payload);
        if !datagram.is_complete() {
            return FragmentStatus::Fragmented;
        }
        let Some(bytes) = self
            .datagrams
            .shift_remove(&key)
            .and_then(Datagram::assemble)
        else {
            debug!(id = key.id, "discarding datagram with overlapping fragments");
            return FragmentStatus::Fragmented;
        };
        let inner = match protocol.kind() {
            Some(kind) => match Pdu::parse_kind(kind, &bytes) {
                Ok(inner) => inner,
                Err(err) => {
                    debug!(id = key.id, %err, "discarding malformed datagram");
                    return FragmentStatus::Fragmented;
                }
            },
            None => Pdu::new(RawPdu::new(bytes)),
        };
        if let Some(ip) = Ipv4::from_layer_mut(node.layer_mut()) {
            ip.flags_and_fragment_offset = 0;
        }
        node.set_inner(inner);
        debug!(id = key.id, "datagram reassembled");
        FragmentStatus::Reassembled
    }

    /// Drop the fragments of a datagram between two hosts, in either orientation.
    pub fn remove_datagram(&mut self, id: u16, lhs: Ipv4Addr, rhs: Ipv4Addr) {
        self.datagrams.shift_remove(&DatagramKey::new(id, lhs, rhs));
    }

    /// Drop every incomplete datagram.
    pub fn clear(&mut self) {
        self.datagrams.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdukit_packet::ipv4::FLAG_MORE_FRAGMENTS;
    use pdukit_packet::udp::Udp;
    use pdukit_packet::IpProtocol;
    use test_case::test_case;

    const CLIENT: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 1);
    const SERVER: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 100);
    const MESSAGE: &[u8] = b"a datagram split over three fragments";

    /// The `UDP` datagram which is split into fragments.
    fn datagram() -> Vec<u8> {
        let pdu = Ipv4::new(SERVER, CLIENT) / Udp::new(5000, 4000) / RawPdu::new(MESSAGE.to_vec());
        pdu.serialize().unwrap()[Ipv4::new(SERVER, CLIENT).header_size() as usize..].to_vec()
    }

    fn fragment(id: u16, bytes: &[u8], offset: usize, len: usize, more: bool) -> Pdu {
        let mut ip = Ipv4::new(SERVER, CLIENT);
        ip.identification = id;
        ip.protocol = IpProtocol::Udp;
        ip.flags_and_fragment_offset = (offset / 8) as u16;
        if more {
            ip.flags_and_fragment_offset |= FLAG_MORE_FRAGMENTS;
        }
        let end = (offset + len).min(bytes.len());
        ip / RawPdu::new(bytes[offset..end].to_vec())
    }

    /// Split the datagram into 16 byte fragments.
    fn fragments(id: u16) -> Vec<Pdu> {
        let bytes = datagram();
        (0..bytes.len())
            .step_by(16)
            .map(|offset| fragment(id, &bytes, offset, 16, offset + 16 < bytes.len()))
            .collect()
    }

    fn assert_reassembled(pdu: &Pdu) {
        let ip = pdu.find::<Ipv4>().unwrap();
        assert!(!ip.is_fragmented());
        assert_eq!(Some(5000), pdu.find::<Udp>().map(|udp| udp.dport));
        assert_eq!(Some(MESSAGE), pdu.find::<RawPdu>().map(RawPdu::payload));
    }

    #[test_case(&[0, 1, 2]; "in order")]
    #[test_case(&[2, 0, 1]; "last first")]
    #[test_case(&[1, 2, 0]; "first last")]
    fn test_reassemble(order: &[usize]) {
        let mut fragments = fragments(7);
        assert_eq!(3, fragments.len());
        let mut reassembler = Ipv4Reassembler::default();
        let (last, rest) = order.split_last().unwrap();
        for &index in rest {
            assert_eq!(
                FragmentStatus::Fragmented,
                reassembler.process(&mut fragments[index])
            );
        }
        assert_eq!(1, reassembler.len());
        let pdu = &mut fragments[*last];
        assert_eq!(FragmentStatus::Reassembled, reassembler.process(pdu));
        assert_reassembled(pdu);
        assert!(reassembler.is_empty());
    }

    #[test]
    fn test_not_fragmented() {
        let mut pdu = Ipv4::new(SERVER, CLIENT) / Udp::new(5000, 4000) / RawPdu::new(vec![1]);
        let before = pdu.clone();
        let mut reassembler = Ipv4Reassembler::default();
        assert_eq!(FragmentStatus::NotFragmented, reassembler.process(&mut pdu));
        assert_eq!(before, pdu);
        let mut pdu = Pdu::new(RawPdu::new(vec![0x45]));
        assert_eq!(FragmentStatus::NotFragmented, reassembler.process(&mut pdu));
    }

    #[test]
    fn test_duplicate_fragment_is_ignored() {
        let mut fragments = fragments(7);
        let mut duplicate = fragments[0].clone();
        let mut reassembler = Ipv4Reassembler::default();
        assert_eq!(FragmentStatus::Fragmented, reassembler.process(&mut fragments[0]));
        assert_eq!(FragmentStatus::Fragmented, reassembler.process(&mut duplicate));
        assert_eq!(FragmentStatus::Fragmented, reassembler.process(&mut fragments[1]));
        assert_eq!(FragmentStatus::Reassembled, reassembler.process(&mut fragments[2]));
        assert_reassembled(&fragments[2]);
    }

    #[test]
    fn test_overlapping_fragments_are_discarded() {
        let bytes = datagram();
        let mut reassembler = Ipv4Reassembler::default();
        // 16 + 8 + 8 bytes add up to a 32 byte datagram but overlap at offset 8
        let mut first = fragment(7, &bytes[..32], 0, 16, true);
        let mut overlap = fragment(7, &bytes[..32], 8, 8, true);
        let mut last = fragment(7, &bytes[..32], 24, 8, false);
        assert_eq!(FragmentStatus::Fragmented, reassembler.process(&mut first));
        assert_eq!(FragmentStatus::Fragmented, reassembler.process(&mut overlap));
        assert_eq!(FragmentStatus::Fragmented, reassembler.process(&mut last));
        assert!(reassembler.is_empty());
        assert!(last.find::<Ipv4>().unwrap().is_fragmented());
    }

    #[test]
    fn test_datagrams_are_keyed_by_id() {
        let mut first = fragments(1);
        let mut second = fragments(2);
        let mut reassembler = Ipv4Reassembler::default();
        reassembler.process(&mut first[0]);
        reassembler.process(&mut second[0]);
        reassembler.process(&mut first[1]);
        assert_eq!(2, reassembler.len());
        assert_eq!(FragmentStatus::Reassembled, reassembler.process(&mut first[2]));
        assert_eq!(1, reassembler.len());
        reassembler.remove_datagram(2, CLIENT, SERVER);
        assert!(reassembler.is_empty());
    }

    #[test]
    fn test_oldest_datagram_is_dropped() {
        let mut first = fragments(1);
        let mut second = fragments(2);
        let mut reassembler = Ipv4Reassembler::new(1);
        reassembler.process(&mut first[0]);
        reassembler.process(&mut second[0]);
        assert_eq!(1, reassembler.len());
        reassembler.process(&mut first[1]);
        assert_eq!(FragmentStatus::Fragmented, reassembler.process(&mut first[2]));
        reassembler.clear();
        assert!(reassembler.is_empty());
    }

    #[test]
    fn test_reassemble_decoded_fragments() {
        let mut reassembler = Ipv4Reassembler::default();
        let mut statuses = vec![];
        let mut last = None;
        for fragment in fragments(9) {
            let bytes = fragment.serialize().unwrap();
            let mut pdu = Pdu::parse::<Ipv4>(&bytes).unwrap();
            assert!(pdu.find::<Udp>().is_none());
            statuses.push(reassembler.process(&mut pdu));
            last = Some(pdu);
        }
        assert_eq!(
            vec![
                FragmentStatus::Fragmented,
                FragmentStatus::Fragmented,
                FragmentStatus::Reassembled
            ],
            statuses
        );
        assert_reassembled(&last.unwrap());
    }
}
