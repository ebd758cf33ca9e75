use crate::config::{PcapConfig, TimestampPrecision};
use crate::error::{Error, Result};
use crate::frame::{Frame, FrameSink, FrameSource};
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{LegacyPcapReader, PcapBlockOwned, PcapError};
use pdukit_packet::{HwAddress, LinkType, Pdu};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, instrument, trace};

const VERSION_MAJOR: u16 = 2;
const VERSION_MINOR: u16 = 4;

/// Read frames from a legacy (not pcapng) pcap file.
pub struct PcapFileSource<R: Read> {
    reader: LegacyPcapReader<R>,
    link_type: LinkType,
    precision: TimestampPrecision,
    frames: u64,
}

/// A block of a pcap file.
enum Block {
    Header(LinkType, TimestampPrecision),
    Record(Frame),
}

impl PcapFileSource<File> {
    /// Open a pcap file.
    pub fn open(path: impl AsRef<Path>, config: &PcapConfig) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened capture file");
        Self::from_reader(file, config)
    }
}

impl<R: Read> PcapFileSource<R> {
    /// Read a pcap file from `reader`, starting with its global header.
    #[instrument(skip_all, level = "trace")]
    pub fn from_reader(reader: R, config: &PcapConfig) -> Result<Self> {
        config.validate()?;
        let reader = LegacyPcapReader::new(config.buffer_capacity, reader)
            .map_err(|err| Error::Pcap(format!("{err:?}")))?;
        let mut source = Self {
            reader,
            link_type: LinkType::Other(0),
            precision: TimestampPrecision::Micro,
            frames: 0,
        };
        match source.next_block()? {
            Some(Block::Header(link_type, precision)) => {
                debug!(%link_type, %precision, "read pcap header");
                source.link_type = link_type;
                source.precision = precision;
                Ok(source)
            }
            _ => Err(Error::Pcap(String::from("missing pcap header"))),
        }
    }

    /// The number of frames read so far.
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    fn next_block(&mut self) -> Result<Option<Block>> {
        loop {
            match self.reader.next() {
                Ok((offset, block)) => {
                    let block = match block {
                        PcapBlockOwned::LegacyHeader(header) => {
                            let link_type = u32::try_from(header.network.0)
                                .map(LinkType::from)
                                .map_err(|_| {
                                    Error::Pcap(format!("invalid link type {}", header.network.0))
                                })?;
                            let precision =
                                if matches!(header.magic_number, 0xa1b2_3c4d | 0x4d3c_b2a1) {
                                    TimestampPrecision::Nano
                                } else {
                                    TimestampPrecision::Micro
                                };
                            Block::Header(link_type, precision)
                        }
                        PcapBlockOwned::Legacy(record) => {
                            let since_epoch = Duration::new(
                                u64::from(record.ts_sec),
                                record.ts_usec.saturating_mul(self.precision.unit_nanos()),
                            );
                            Block::Record(Frame::new(
                                record.data.to_vec(),
                                self.link_type,
                                SystemTime::UNIX_EPOCH + since_epoch,
                            ))
                        }
                        PcapBlockOwned::NG(_) => {
                            return Err(Error::Pcap(String::from("pcapng is not supported")));
                        }
                    };
                    self.reader.consume(offset);
                    return Ok(Some(block));
                }
                Err(PcapError::Eof) => return Ok(None),
                Err(PcapError::Incomplete(_)) => {
                    self.reader
                        .refill()
                        .map_err(|err| Error::Pcap(format!("{err:?}")))?;
                }
                Err(err) => return Err(Error::Pcap(format!("{err:?}"))),
            }
        }
    }
}

impl<R: Read> FrameSource for PcapFileSource<R> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.next_block()? {
                Some(Block::Record(frame)) => {
                    self.frames += 1;
                    trace!(frame = self.frames, len = frame.bytes.len());
                    return Ok(Some(frame));
                }
                Some(Block::Header(link_type, precision)) => {
                    self.link_type = link_type;
                    self.precision = precision;
                }
                None => return Ok(None),
            }
        }
    }

    fn link_type(&self) -> LinkType {
        self.link_type
    }
}

impl<R: Read> std::fmt::Debug for PcapFileSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcapFileSource")
            .field("link_type", &self.link_type)
            .field("precision", &self.precision)
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

/// Write frames to a legacy pcap file.
#[derive(Debug)]
pub struct PcapWriter<W: Write> {
    writer: W,
    snaplen: u32,
    precision: TimestampPrecision,
}

impl PcapWriter<BufWriter<File>> {
    /// Create (or truncate) a pcap file.
    pub fn create(
        path: impl AsRef<Path>,
        link_type: LinkType,
        config: &PcapConfig,
    ) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        debug!(path = %path.as_ref().display(), %link_type, "created capture file");
        Self::new(BufWriter::new(file), link_type, config)
    }
}

impl<W: Write> PcapWriter<W> {
    /// Write the global header of a pcap file to `writer`.
    pub fn new(mut writer: W, link_type: LinkType, config: &PcapConfig) -> Result<Self> {
        config.validate()?;
        writer.write_all(&config.precision.magic().to_le_bytes())?;
        writer.write_all(&VERSION_MAJOR.to_le_bytes())?;
        writer.write_all(&VERSION_MINOR.to_le_bytes())?;
        writer.write_all(&0_i32.to_le_bytes())?;
        writer.write_all(&0_u32.to_le_bytes())?;
        writer.write_all(&config.snaplen.to_le_bytes())?;
        writer.write_all(&link_type.id().to_le_bytes())?;
        Ok(Self {
            writer,
            snaplen: config.snaplen,
            precision: config.precision,
        })
    }

    /// Write a record, truncating `bytes` to the snapshot length.
    pub fn write(&mut self, bytes: &[u8], timestamp: SystemTime) -> Result<()> {
        let since_epoch = timestamp
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();
        let ts_sec = u32::try_from(since_epoch.as_secs())
            .map_err(|_| Error::Pcap(format!("timestamp {since_epoch:?} out of range")))?;
        let ts_frac = since_epoch.subsec_nanos() / self.precision.unit_nanos();
        let origlen = u32::try_from(bytes.len())
            .map_err(|_| Error::Pcap(format!("frame of {} bytes too large", bytes.len())))?;
        let caplen = origlen.min(self.snaplen);
        self.writer.write_all(&ts_sec.to_le_bytes())?;
        self.writer.write_all(&ts_frac.to_le_bytes())?;
        self.writer.write_all(&caplen.to_le_bytes())?;
        self.writer.write_all(&origlen.to_le_bytes())?;
        self.writer.write_all(&bytes[..caplen as usize])?;
        Ok(())
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.write(&frame.bytes, frame.timestamp)
    }

    /// Serialize a packet and write it with the current time.
    pub fn write_pdu(&mut self, pdu: &Pdu) -> Result<()> {
        self.write(&pdu.serialize()?, SystemTime::now())
    }

    pub fn flush(&mut self) -> Result<()> {
        Ok(self.writer.flush()?)
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> FrameSink for PcapWriter<W> {
    fn transmit(&mut self, bytes: &[u8], _dst: Option<HwAddress>) -> Result<()> {
        self.write(bytes, SystemTime::now())
    }
}
