//! The record model threaded through the editing pipeline.

use crate::time::TimeSpec;

/// What a record represents. Only `Packet` payloads get their bytes
/// edited; other kinds ride through the pipeline untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Packet,
    FtSpecificEvent,
    FtSpecificReport,
    Syscall,
    Other,
}

pub const LINKTYPE_ETHERNET: u32 = 1;
pub const LINKTYPE_IEEE802_11_RADIOTAP: u32 = 127;

/// Link-layer encapsulation tag.
///
/// Opaque to most stages; the named variants are the ones some stage
/// inspects (VLAN stripping, radiotap hashing, the DCT2000 preamble
/// skip). Everything else keeps its raw pcap linktype value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encap {
    Ethernet,
    Ieee80211Radiotap,
    CatapultDct2000,
    Other(u32),
}

impl Encap {
    pub fn from_linktype(raw: u32) -> Encap {
        match raw {
            LINKTYPE_ETHERNET => Encap::Ethernet,
            LINKTYPE_IEEE802_11_RADIOTAP => Encap::Ieee80211Radiotap,
            other => Encap::Other(other),
        }
    }
}

/// One record pulled from a capture file.
#[derive(Debug, Clone)]
pub struct Record {
    pub kind: RecordKind,
    /// Capture timestamp; `None` for records the container stores
    /// without one.
    pub ts: Option<TimeSpec>,
    /// Bytes stored for this record; always equals `payload.len()`.
    pub caplen: u32,
    /// Bytes the record claims were on the wire.
    pub len: u32,
    pub encap: Encap,
    pub payload: Vec<u8>,
    pub comment: Option<String>,
    /// Set when this run added or cleared the comment, so the sink
    /// knows to persist the change.
    pub comment_changed: bool,
}

impl Record {
    /// A plain data packet.
    pub fn packet(ts: Option<TimeSpec>, encap: Encap, payload: Vec<u8>, len: u32) -> Record {
        Record {
            kind: RecordKind::Packet,
            ts,
            caplen: payload.len() as u32,
            len,
            encap,
            payload,
            comment: None,
            comment_changed: false,
        }
    }
}
