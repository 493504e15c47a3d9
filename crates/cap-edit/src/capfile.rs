//! Capture file access: a pull `Source` and a rolling-capable `Sink`
//! over the pcap and pcapng containers.
//!
//! The input format is sniffed from the magic number; the output is
//! whatever the caller asks for. Writers buffer through `BufWriter` and
//! are flushed on close so write failures surface instead of vanishing
//! in a drop.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Duration;

use pcap_file::pcap::{PcapHeader, PcapPacket, PcapReader, PcapWriter};
use pcap_file::pcapng::blocks::enhanced_packet::{EnhancedPacketBlock, EnhancedPacketOption};
use pcap_file::pcapng::blocks::interface_description::{
    InterfaceDescriptionBlock, InterfaceDescriptionOption,
};
use pcap_file::pcapng::blocks::Block;
use pcap_file::pcapng::{PcapNgReader, PcapNgWriter};
use pcap_file::{DataLink, Endianness, TsResolution};
use tracing::{debug, warn};

use crate::error::CapError;
use crate::record::{Encap, Record};
use crate::time::TimeSpec;

// ─── File types and encapsulation names ──────────────────────────────────────

/// Capture containers the editor can read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Pcap,
    PcapNg,
}

impl FileType {
    pub fn name(self) -> &'static str {
        match self {
            FileType::Pcap => "pcap",
            FileType::PcapNg => "pcapng",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            FileType::Pcap => "Wireshark/tcpdump - pcap",
            FileType::PcapNg => "Wireshark - pcapng",
        }
    }

    pub fn from_name(name: &str) -> Option<FileType> {
        FileType::all().into_iter().find(|ft| ft.name() == name)
    }

    pub fn all() -> [FileType; 2] {
        [FileType::Pcap, FileType::PcapNg]
    }
}

/// Encapsulation names accepted by `-T`, with their pcap linktypes.
pub const ENCAP_NAMES: &[(&str, DataLink)] = &[
    ("ether", DataLink::ETHERNET),
    ("rawip", DataLink::RAW),
    ("null", DataLink::NULL),
    ("linux-sll", DataLink::LINUX_SLL),
    ("ieee-802-11", DataLink::IEEE802_11),
    ("ieee-802-11-radiotap", DataLink::IEEE802_11_RADIOTAP),
];

pub fn encap_from_name(name: &str) -> Option<DataLink> {
    ENCAP_NAMES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|&(_, dl)| dl)
}

// ─── Source ──────────────────────────────────────────────────────────────────

const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];
const PCAP_MAGICS: [[u8; 4]; 4] = [
    [0xa1, 0xb2, 0xc3, 0xd4], // big-endian, microseconds
    [0xd4, 0xc3, 0xb2, 0xa1], // little-endian, microseconds
    [0xa1, 0xb2, 0x3c, 0x4d], // big-endian, nanoseconds
    [0x4d, 0x3c, 0xb2, 0xa1], // little-endian, nanoseconds
];

enum SourceInner {
    Pcap(PcapReader<BufReader<File>>),
    PcapNg(PcapNgReader<BufReader<File>>),
}

/// A capture file being read, one record at a time.
pub struct Source {
    path: String,
    inner: SourceInner,
    /// Link types of the interfaces seen so far (pcapng); index 0 for
    /// pcap.
    interfaces: Vec<DataLink>,
    snaplen: u32,
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("path", &self.path)
            .field("interfaces", &self.interfaces)
            .field("snaplen", &self.snaplen)
            .finish()
    }
}

/// Open a capture for reading, sniffing the container from its magic
/// number.
pub fn open_source(path: &Path) -> Result<Source, CapError> {
    let display = path.display().to_string();
    let io_err = |source| CapError::InputOpen {
        path: display.clone(),
        source,
    };

    let mut file = File::open(path).map_err(io_err)?;
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic).map_err(io_err)?;
    file.seek(SeekFrom::Start(0)).map_err(io_err)?;
    let reader = BufReader::new(file);

    if magic == PCAPNG_MAGIC {
        let inner = PcapNgReader::new(reader).map_err(|source| CapError::InputFormat {
            path: display.clone(),
            source,
        })?;
        Ok(Source {
            path: display,
            inner: SourceInner::PcapNg(inner),
            interfaces: Vec::new(),
            snaplen: 0,
        })
    } else if PCAP_MAGICS.contains(&magic) {
        let inner = PcapReader::new(reader).map_err(|source| CapError::InputFormat {
            path: display.clone(),
            source,
        })?;
        let header = inner.header();
        Ok(Source {
            path: display,
            inner: SourceInner::Pcap(inner),
            interfaces: vec![header.datalink],
            snaplen: header.snaplen,
        })
    } else {
        Err(CapError::UnknownFormat { path: display })
    }
}

impl Source {
    pub fn file_type(&self) -> FileType {
        match self.inner {
            SourceInner::Pcap(_) => FileType::Pcap,
            SourceInner::PcapNg(_) => FileType::PcapNg,
        }
    }

    /// Link type of the capture (its first interface). Meaningful once
    /// the first record has been pulled.
    pub fn datalink(&self) -> DataLink {
        self.interfaces.first().copied().unwrap_or(DataLink::ETHERNET)
    }

    /// Snapshot length advertised by the capture; 0 if it never said.
    pub fn snaplen(&self) -> u32 {
        self.snaplen
    }

    /// Pull the next record. `Ok(None)` at end of file.
    pub fn pull(&mut self) -> Result<Option<Record>, CapError> {
        match &mut self.inner {
            SourceInner::Pcap(reader) => match reader.next_packet() {
                None => Ok(None),
                Some(Err(source)) => Err(CapError::Read {
                    path: self.path.clone(),
                    source,
                }),
                Some(Ok(pkt)) => {
                    let encap = self
                        .interfaces
                        .first()
                        .copied()
                        .map_or(Encap::Other(0), |dl| Encap::from_linktype(u32::from(dl)));
                    let ts = TimeSpec::from_duration(pkt.timestamp);
                    let len = pkt.orig_len;
                    let payload = pkt.data.into_owned();
                    Ok(Some(Record::packet(Some(ts), encap, payload, len)))
                }
            },
            SourceInner::PcapNg(reader) => loop {
                match reader.next_block() {
                    None => return Ok(None),
                    Some(Err(source)) => {
                        return Err(CapError::Read {
                            path: self.path.clone(),
                            source,
                        })
                    }
                    Some(Ok(Block::SectionHeader(_))) => continue,
                    Some(Ok(Block::InterfaceDescription(idb))) => {
                        if self.interfaces.is_empty() {
                            self.snaplen = idb.snaplen;
                        }
                        self.interfaces.push(idb.linktype);
                        continue;
                    }
                    Some(Ok(Block::EnhancedPacket(epb))) => {
                        let datalink = self
                            .interfaces
                            .get(epb.interface_id as usize)
                            .copied()
                            .unwrap_or(DataLink::ETHERNET);
                        let comment = epb.options.iter().find_map(|opt| match opt {
                            EnhancedPacketOption::Comment(text) => Some(text.to_string()),
                            _ => None,
                        });
                        let ts = TimeSpec::from_duration(epb.timestamp);
                        let len = epb.original_len;
                        let payload = epb.data.into_owned();
                        let mut rec = Record::packet(
                            Some(ts),
                            Encap::from_linktype(u32::from(datalink)),
                            payload,
                            len,
                        );
                        rec.comment = comment;
                        return Ok(Some(rec));
                    }
                    Some(Ok(Block::SimplePacket(spb))) => {
                        let datalink = self
                            .interfaces
                            .first()
                            .copied()
                            .unwrap_or(DataLink::ETHERNET);
                        let len = spb.original_len;
                        let payload = spb.data.into_owned();
                        return Ok(Some(Record::packet(
                            None,
                            Encap::from_linktype(u32::from(datalink)),
                            payload,
                            len,
                        )));
                    }
                    Some(Ok(_)) => {
                        debug!("skipping a non-packet pcapng block");
                        continue;
                    }
                }
            },
        }
    }
}

// ─── Sink ────────────────────────────────────────────────────────────────────

/// Everything needed to open (and re-open, when splitting) an output.
#[derive(Debug, Clone, Copy)]
pub struct SinkParams {
    pub file_type: FileType,
    pub datalink: DataLink,
    pub snaplen: u32,
}

enum SinkInner {
    Pcap(PcapWriter<BufWriter<Box<dyn Write>>>),
    PcapNg(PcapNgWriter<BufWriter<Box<dyn Write>>>),
}

/// A capture file being written.
pub struct Sink {
    path: String,
    inner: SinkInner,
}

/// Open an output capture. `"-"` writes to standard output.
pub fn open_sink(path: &str, params: &SinkParams) -> Result<Sink, CapError> {
    let out: Box<dyn Write> = if path == "-" {
        Box::new(std::io::stdout())
    } else {
        Box::new(File::create(path).map_err(|source| CapError::OutputOpen {
            path: path.to_string(),
            source,
        })?)
    };
    let writer = BufWriter::new(out);
    let write_err = |source| CapError::Write {
        path: path.to_string(),
        source,
    };

    let inner = match params.file_type {
        FileType::Pcap => {
            let header = PcapHeader {
                version_major: 2,
                version_minor: 4,
                ts_correction: 0,
                ts_accuracy: 0,
                snaplen: params.snaplen,
                datalink: params.datalink,
                ts_resolution: TsResolution::NanoSecond,
                endianness: Endianness::native(),
            };
            SinkInner::Pcap(PcapWriter::with_header(writer, header).map_err(write_err)?)
        }
        FileType::PcapNg => {
            let mut ng = PcapNgWriter::new(writer).map_err(write_err)?;
            let idb = InterfaceDescriptionBlock {
                linktype: params.datalink,
                snaplen: params.snaplen,
                options: vec![InterfaceDescriptionOption::IfTsResol(9)],
            };
            ng.write_pcapng_block(idb).map_err(write_err)?;
            SinkInner::PcapNg(ng)
        }
    };

    Ok(Sink {
        path: path.to_string(),
        inner,
    })
}

impl Sink {
    /// Append one record.
    pub fn write(&mut self, rec: &Record) -> Result<(), CapError> {
        let ts = rec.ts.map(TimeSpec::to_duration).unwrap_or(Duration::ZERO);
        match &mut self.inner {
            SinkInner::Pcap(writer) => {
                if rec.comment_changed && rec.comment.is_some() {
                    warn!("pcap can't carry record comments; writing {} without it", self.path);
                }
                let pkt = PcapPacket::new(ts, rec.len, &rec.payload);
                writer.write_packet(&pkt).map_err(|source| CapError::Write {
                    path: self.path.clone(),
                    source,
                })?;
            }
            SinkInner::PcapNg(writer) => {
                let mut options = Vec::new();
                if let Some(comment) = rec.comment.as_deref() {
                    options.push(EnhancedPacketOption::Comment(Cow::Borrowed(comment)));
                }
                let epb = EnhancedPacketBlock {
                    interface_id: 0,
                    timestamp: ts,
                    original_len: rec.len,
                    data: Cow::Borrowed(&rec.payload),
                    options,
                };
                writer.write_pcapng_block(epb).map_err(|source| CapError::Write {
                    path: self.path.clone(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    /// Flush and close the underlying file.
    pub fn close(self) -> Result<(), CapError> {
        let mut writer = match self.inner {
            SinkInner::Pcap(w) => w.into_writer(),
            SinkInner::PcapNg(w) => w.into_inner(),
        };
        writer.flush().map_err(|source| CapError::Close {
            path: self.path,
            source,
        })
    }
}
