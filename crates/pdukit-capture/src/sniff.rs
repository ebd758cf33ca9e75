use crate::error::Result;
use crate::frame::{FrameSink, FrameSource};
use pdukit_packet::dot11::{Dot11, HasAddressFields};
use pdukit_packet::ethernet::EthernetII;
use pdukit_packet::{HwAddress, Pdu};
use tracing::{debug, instrument};

/// Decode the frames of a source and pass each to `callback`.
///
/// Frames which do not decode are skipped. The loop ends when the source is exhausted or when
/// `callback` returns false. Returns the number of packets passed to `callback`.
#[instrument(skip_all, level = "trace")]
pub fn sniff_loop<S, F>(source: &mut S, mut callback: F) -> Result<usize>
where
    S: FrameSource + ?Sized,
    F: FnMut(Pdu) -> bool,
{
    let mut delivered = 0;
    while let Some(frame) = source.next_frame()? {
        let pdu = match frame.pdu() {
            Ok(pdu) => pdu,
            Err(err) => {
                debug!(%err, "skipping malformed frame");
                continue;
            }
        };
        delivered += 1;
        if !callback(pdu) {
            debug!(delivered, "sniff loop stopped");
            break;
        }
    }
    Ok(delivered)
}

/// Serialize packets and transmit them through a sink.
#[derive(Debug)]
pub struct PacketSender<K> {
    sink: K,
}

impl<K: FrameSink> PacketSender<K> {
    pub const fn new(sink: K) -> Self {
        Self { sink }
    }

    /// Serialize and transmit a packet.
    ///
    /// The destination hardware address is taken from the outermost link layer, if any.
    pub fn send(&mut self, pdu: &Pdu) -> Result<()> {
        let bytes = pdu.serialize()?;
        self.sink.transmit(&bytes, destination(pdu))
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    pub fn into_inner(self) -> K {
        self.sink
    }
}

fn destination(pdu: &Pdu) -> Option<HwAddress> {
    if let Some(ethernet) = pdu.find::<EthernetII>() {
        Some(ethernet.dst)
    } else {
        pdu.find::<Dot11>().and_then(HasAddressFields::dst_addr)
    }
}
