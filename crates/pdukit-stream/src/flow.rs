use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{trace, warn};

/// Compare two `TCP` sequence numbers using serial number arithmetic (RFC 1982).
///
/// A sequence number is less than another if it precedes it by fewer than 2^31.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn compare_sequence(lhs: u32, rhs: u32) -> Ordering {
    if lhs == rhs {
        Ordering::Equal
    } else if (lhs.wrapping_sub(rhs) as i32) > 0 {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

/// One direction of a `TCP` stream.
#[derive(Debug, Clone, Default)]
pub struct Flow {
    next_seq: Option<u32>,
    payload: Vec<u8>,
    fragments: BTreeMap<u32, Vec<u8>>,
    buffered: usize,
    delivered: u64,
    fin_seq: Option<u32>,
}

impl Flow {
    /// The next expected sequence number, if the direction has been initialised.
    #[must_use]
    pub const fn next_seq(&self) -> Option<u32> {
        self.next_seq
    }

    /// The reassembled in-order bytes which have not been cleared.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn clear_payload(&mut self) {
        self.payload.clear();
        self.payload.shrink_to_fit();
    }

    /// The total number of in-order bytes reassembled, including cleared ones.
    #[must_use]
    pub const fn delivered_bytes(&self) -> u64 {
        self.delivered
    }

    /// The number of out-of-order bytes held.
    #[must_use]
    pub const fn buffered_bytes(&self) -> usize {
        self.buffered
    }

    /// The number of out-of-order fragments held.
    #[must_use]
    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Whether a `FIN` was received and every byte before it has been reassembled.
    #[must_use]
    pub fn is_fin_seen(&self) -> bool {
        match (self.fin_seq, self.next_seq) {
            (Some(fin), Some(next)) => compare_sequence(next, fin) != Ordering::Less,
            _ => false,
        }
    }

    pub(crate) fn initialise(&mut self, next_seq: u32) {
        self.next_seq = Some(next_seq);
    }

    /// Record a `FIN` sent after the segment which starts at `seq` and carries `len` bytes.
    pub(crate) fn record_fin(&mut self, seq: u32, len: usize) {
        self.fin_seq = Some(seq.wrapping_add(len as u32));
    }

    /// Process the payload of a segment, returning true if in-order bytes were appended.
    pub(crate) fn process(
        &mut self,
        seq: u32,
        data: &[u8],
        max_buffered: usize,
        retain: bool,
    ) -> bool {
        let Some(expected) = self.next_seq else {
            trace!(seq, len = data.len(), "segment before direction initialised");
            return false;
        };
        if data.is_empty() {
            return false;
        }
        let end = seq.wrapping_add(data.len() as u32);
        if compare_sequence(end, expected) != Ordering::Greater {
            trace!(seq, len = data.len(), expected, "discarding retransmitted segment");
            return false;
        }
        let (seq, data) = if compare_sequence(seq, expected) == Ordering::Less {
            let overlap = expected.wrapping_sub(seq) as usize;
            (expected, &data[overlap..])
        } else {
            (seq, data)
        };
        if seq == expected {
            self.append(data, retain);
            self.drain(retain);
            true
        } else {
            self.buffer(seq, data, max_buffered);
            false
        }
    }

    fn append(&mut self, data: &[u8], retain: bool) {
        if retain {
            self.payload.extend_from_slice(data);
        }
        self.delivered += data.len() as u64;
        self.next_seq = self
            .next_seq
            .map(|next| next.wrapping_add(data.len() as u32));
    }

    /// Keep the larger of two fragments starting at the same sequence number.
    fn buffer(&mut self, seq: u32, data: &[u8], max_buffered: usize) {
        let existing = self.fragments.get(&seq).map_or(0, Vec::len);
        if existing >= data.len() {
            return;
        }
        let buffered = self.buffered - existing + data.len();
        if buffered > max_buffered {
            warn!(
                seq,
                len = data.len(),
                buffered = self.buffered,
                max_buffered,
                "dropping out-of-order segment"
            );
            return;
        }
        self.buffered = buffered;
        self.fragments.insert(seq, data.to_vec());
    }

    /// Append every buffered fragment which has become contiguous.
    fn drain(&mut self, retain: bool) {
        while let Some(next) = self.next_seq {
            let Some(start) = self
                .fragments
                .keys()
                .copied()
                .find(|start| compare_sequence(*start, next) != Ordering::Greater)
            else {
                break;
            };
            let Some(fragment) = self.fragments.remove(&start) else {
                break;
            };
            self.buffered -= fragment.len();
            let end = start.wrapping_add(fragment.len() as u32);
            if compare_sequence(end, next) == Ordering::Greater {
                let overlap = next.wrapping_sub(start) as usize;
                self.append(&fragment[overlap..], retain);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const MAX: usize = 1024;

    fn flow(next_seq: u32) -> Flow {
        let mut flow = Flow::default();
        flow.initialise(next_seq);
        flow
    }

    #[test_case(1, 1, Ordering::Equal)]
    #[test_case(1, 2, Ordering::Less)]
    #[test_case(2, 1, Ordering::Greater)]
    #[test_case(u32::MAX, 0, Ordering::Less; "wrapped is greater")]
    #[test_case(5, u32::MAX - 5, Ordering::Greater; "wrapped is less")]
    fn test_compare_sequence(lhs: u32, rhs: u32, expected: Ordering) {
        assert_eq!(expected, compare_sequence(lhs, rhs));
    }

    #[test]
    fn test_in_order() {
        let mut flow = flow(100);
        assert!(flow.process(100, b"hello ", MAX, true));
        assert!(flow.process(106, b"world", MAX, true));
        assert_eq!(b"hello world", flow.payload());
        assert_eq!(Some(111), flow.next_seq());
        assert_eq!(11, flow.delivered_bytes());
    }

    #[test]
    fn test_out_of_order_drained() {
        let mut flow = flow(100);
        assert!(!flow.process(106, b"world", MAX, true));
        assert!(!flow.process(111, b"!", MAX, true));
        assert_eq!(2, flow.fragment_count());
        assert_eq!(6, flow.buffered_bytes());
        assert!(flow.process(100, b"hello ", MAX, true));
        assert_eq!(b"hello world!", flow.payload());
        assert_eq!(0, flow.fragment_count());
        assert_eq!(0, flow.buffered_bytes());
    }

    #[test]
    fn test_retransmission_discarded() {
        let mut flow = flow(100);
        assert!(flow.process(100, b"abc", MAX, true));
        assert!(!flow.process(100, b"abc", MAX, true));
        assert_eq!(b"abc", flow.payload());
    }

    #[test]
    fn test_overlap_trimmed() {
        let mut flow = flow(100);
        assert!(flow.process(100, b"abc", MAX, true));
        assert!(flow.process(101, b"bcdef", MAX, true));
        assert_eq!(b"abcdef", flow.payload());
    }

    #[test]
    fn test_overlapping_fragment_trimmed_on_drain() {
        let mut flow = flow(100);
        assert!(!flow.process(102, b"cdef", MAX, true));
        assert!(flow.process(100, b"abcd", MAX, true));
        assert_eq!(b"abcdef", flow.payload());
    }

    #[test]
    fn test_larger_fragment_kept() {
        let mut flow = flow(100);
        assert!(!flow.process(103, b"de", MAX, true));
        assert!(!flow.process(103, b"defg", MAX, true));
        assert!(!flow.process(103, b"d", MAX, true));
        assert_eq!(4, flow.buffered_bytes());
        assert!(flow.process(100, b"abc", MAX, true));
        assert_eq!(b"abcdefg", flow.payload());
    }

    #[test]
    fn test_buffer_cap() {
        let mut flow = flow(100);
        assert!(!flow.process(110, b"0123456789", 12, true));
        assert!(!flow.process(130, b"0123456789", 12, true));
        assert_eq!(1, flow.fragment_count());
        assert_eq!(10, flow.buffered_bytes());
    }

    #[test]
    fn test_wrap_around() {
        let mut flow = flow(u32::MAX - 1);
        assert!(!flow.process(1, b"cd", MAX, true));
        assert!(flow.process(u32::MAX - 1, b"ab\x00", MAX, true));
        assert_eq!(b"ab\x00cd", flow.payload());
        assert_eq!(Some(3), flow.next_seq());
    }

    #[test]
    fn test_uninitialised_ignored() {
        let mut flow = Flow::default();
        assert!(!flow.process(1, b"abc", MAX, true));
        assert!(flow.payload().is_empty());
    }

    #[test]
    fn test_payload_not_retained() {
        let mut flow = flow(0);
        assert!(flow.process(0, b"abc", MAX, false));
        assert!(flow.payload().is_empty());
        assert_eq!(3, flow.delivered_bytes());
        assert_eq!(Some(3), flow.next_seq());
    }

    #[test]
    fn test_fin_waits_for_gap() {
        let mut flow = flow(100);
        assert!(!flow.process(103, b"de", MAX, true));
        flow.record_fin(103, 2);
        assert!(!flow.is_fin_seen());
        assert!(flow.process(100, b"abc", MAX, true));
        assert!(flow.is_fin_seen());
        assert_eq!(b"abcde", flow.payload());
    }

    #[test]
    fn test_clear_payload() {
        let mut flow = flow(0);
        assert!(flow.process(0, b"abc", MAX, true));
        flow.clear_payload();
        assert!(flow.payload().is_empty());
        assert!(flow.process(3, b"d", MAX, true));
        assert_eq!(b"d", flow.payload());
    }
}
