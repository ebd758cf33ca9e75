use crate::error::Result;
use pdukit_packet::{HwAddress, LinkType, Pdu};
use std::time::SystemTime;
use tracing::{debug, warn};

/// A captured link layer frame.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Frame {
    pub bytes: Vec<u8>,
    pub link_type: LinkType,
    pub timestamp: SystemTime,
}

impl Frame {
    #[must_use]
    pub const fn new(bytes: Vec<u8>, link_type: LinkType, timestamp: SystemTime) -> Self {
        Self {
            bytes,
            link_type,
            timestamp,
        }
    }

    /// Decode the frame according to its link type.
    pub fn pdu(&self) -> Result<Pdu> {
        Ok(Pdu::from_link_bytes(self.link_type, &self.bytes)?)
    }
}

/// A source of captured frames, such as a live interface or a capture file.
#[cfg_attr(test, mockall::automock)]
pub trait FrameSource {
    /// The next frame.
    ///
    /// Blocks until a frame is available, returns `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// The link type of the frames of this source.
    fn link_type(&self) -> LinkType;
}

/// A destination for raw frames, such as a live interface or a capture file.
#[cfg_attr(test, mockall::automock)]
pub trait FrameSink {
    /// Transmit a link layer frame.
    ///
    /// The destination hardware address is only used by sinks which need it to route the frame.
    fn transmit(&mut self, bytes: &[u8], dst: Option<HwAddress>) -> Result<()>;
}

/// The decoded frames of a source.
///
/// Frames which do not decode are skipped, iteration ends when the source is exhausted or fails.
#[derive(Debug)]
pub struct Pdus<S> {
    source: S,
}

impl<S: FrameSource> Pdus<S> {
    pub const fn new(source: S) -> Self {
        Self { source }
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: FrameSource> Iterator for Pdus<S> {
    type Item = Pdu;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.source.next_frame() {
                Ok(Some(frame)) => match frame.pdu() {
                    Ok(pdu) => return Some(pdu),
                    Err(err) => debug!(%err, "skipping malformed frame"),
                },
                Ok(None) => return None,
                Err(err) => {
                    warn!(%err, "frame source failed");
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use hex_literal::hex;
    use pdukit_packet::PduKind;

    const ETHERNET_ARP: [u8; 42] = hex!(
        "ff ff ff ff ff ff 00 0c 41 82 b2 55 08 06 00 01"
        "08 00 06 04 00 01 00 0c 41 82 b2 55 c0 a8 01 01"
        "00 00 00 00 00 00 c0 a8 01 02"
    );

    fn frame(bytes: &[u8]) -> Frame {
        Frame::new(bytes.to_vec(), LinkType::Ethernet, SystemTime::UNIX_EPOCH)
    }

    #[test]
    fn test_frame_pdu() {
        let pdu = frame(&ETHERNET_ARP).pdu().unwrap();
        assert_eq!(
            vec![PduKind::EthernetII, PduKind::Arp],
            pdu.iter().map(Pdu::kind).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_pdus_skips_malformed_frames() {
        let mut source = MockFrameSource::new();
        let mut seq = mockall::Sequence::new();
        source
            .expect_next_frame()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(Some(frame(&ETHERNET_ARP[..4]))));
        source
            .expect_next_frame()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(Some(frame(&ETHERNET_ARP))));
        source
            .expect_next_frame()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(None));
        let pdus: Vec<_> = Pdus::new(source).collect();
        assert_eq!(1, pdus.len());
        assert_eq!(PduKind::EthernetII, pdus[0].kind());
    }

    #[test]
    fn test_pdus_stops_on_error() {
        let mut source = MockFrameSource::new();
        source
            .expect_next_frame()
            .times(1)
            .returning(|| Err(Error::Pcap(String::from("truncated"))));
        assert_eq!(0, Pdus::new(source).count());
    }
}
