//! Bounded-window duplicate detection keyed on payload MD5 digests.
//!
//! One digest ring serves both operating modes. Count mode sweeps the
//! whole active window; time mode walks backward from the newest entry
//! and bails out as soon as it steps past the age limit, so a large
//! cache stays cheap on chronological input.

use md5::{Digest, Md5};

use crate::frame;
use crate::record::{Encap, Record};
use crate::time::TimeSpec;

/// Capacity of the digest ring. Allocated up front when dedup is enabled
/// and never resized; the active window is a prefix of it.
pub const MAX_DUP_DEPTH: usize = 1_000_000;

/// Window used by the plain `-d` flag.
pub const DEFAULT_DUP_DEPTH: usize = 5;

#[derive(Debug, Clone, Default)]
struct DupSlot {
    digest: [u8; 16],
    len: u32,
    ts: Option<TimeSpec>,
}

pub struct DedupCache {
    slots: Box<[DupSlot]>,
    cursor: usize,
    window: usize,
}

impl DedupCache {
    /// `window` is clamped to [`MAX_DUP_DEPTH`]. A window of zero still
    /// inserts every record (so digests can be dumped in verbose runs)
    /// but never reports a duplicate.
    pub fn new(window: usize) -> DedupCache {
        DedupCache {
            slots: vec![DupSlot::default(); MAX_DUP_DEPTH].into_boxed_slice(),
            cursor: 0,
            window: window.min(MAX_DUP_DEPTH),
        }
    }

    pub fn digest_of(payload: &[u8]) -> [u8; 16] {
        Md5::digest(payload).into()
    }

    fn advance(&mut self) {
        self.cursor += 1;
        if self.cursor >= self.window {
            self.cursor = 0;
        }
    }

    /// Count-mode check: insert the record, then compare against every
    /// other slot in the window. Equal lengths and equal digests mean
    /// duplicate.
    pub fn is_duplicate(&mut self, digest: [u8; 16], len: u32) -> bool {
        self.advance();
        self.slots[self.cursor] = DupSlot {
            digest,
            len,
            ts: None,
        };
        for i in 0..self.window {
            if i == self.cursor {
                continue;
            }
            let slot = &self.slots[i];
            if slot.len == len && slot.digest == digest {
                return true;
            }
        }
        false
    }

    /// Time-mode check: insert the record, then walk backward from the
    /// newest slot. The sweep ends at a full wrap, at an uninitialized
    /// slot, or at the first slot older than `rel_window` (input is
    /// assumed roughly chronological). Mildly reordered slots (the
    /// current record being the older one) are skipped, not treated as
    /// terminators.
    pub fn is_duplicate_by_time(
        &mut self,
        digest: [u8; 16],
        len: u32,
        ts: TimeSpec,
        rel_window: TimeSpec,
    ) -> bool {
        self.advance();
        self.slots[self.cursor] = DupSlot {
            digest,
            len,
            ts: Some(ts),
        };
        let mut i = self.cursor;
        loop {
            i = if i == 0 { self.window - 1 } else { i - 1 };
            if i == self.cursor {
                return false;
            }
            let slot = &self.slots[i];
            let Some(slot_ts) = slot.ts else {
                return false;
            };
            match ts.delta_since(slot_ts) {
                None => continue,
                Some(delta) => {
                    if delta > rel_window {
                        return false;
                    }
                    if slot.len == len && slot.digest == digest {
                        return true;
                    }
                }
            }
        }
    }

    /// Digest of the most recently inserted record (the slot at the
    /// cursor), for the verbose hash dump.
    pub fn last_digest(&self) -> &[u8; 16] {
        &self.slots[self.cursor].digest
    }
}

/// Lowercase hex rendering of a digest.
pub fn fmt_digest(digest: &[u8; 16]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Where hashing starts for a record: the configured prefix skip, or the
/// radiotap header length when radiotap frames are being hashed past it.
/// Falls back to zero when the skip would swallow the whole capture.
pub fn hash_offset(rec: &Record, ignore_bytes: u32, skip_radiotap: bool) -> usize {
    let caplen = rec.caplen as usize;
    let mut offset = ignore_bytes as usize;
    if skip_radiotap && rec.encap == Encap::Ieee80211Radiotap {
        if let Some(header_len) = frame::radiotap_header_len(&rec.payload) {
            offset = header_len;
        }
    }
    if offset >= caplen {
        offset = 0;
    }
    offset
}
