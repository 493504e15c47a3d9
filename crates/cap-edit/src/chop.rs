//! Two-region chop: remove one head-anchored and one tail-anchored byte
//! range from a packet, with optional wire-length adjustment.

use crate::error::CapError;
use crate::record::{Record, RecordKind};

/// Accumulated `-C [offset:]length` arguments.
///
/// `len_begin` / `off_begin_*` describe the head cut, `len_end` (kept
/// non-positive) / `off_end_*` the tail cut. Offsets keep the sign they
/// were written with until [`ChopSpec::normalized`] folds each onto its
/// natural anchor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChopSpec {
    pub len_begin: i32,
    pub off_begin_pos: i32,
    pub off_begin_neg: i32,
    pub len_end: i32,
    pub off_end_pos: i32,
    pub off_end_neg: i32,
}

impl ChopSpec {
    pub fn is_active(&self) -> bool {
        self.len_begin != 0 || self.len_end != 0
    }

    /// Fold one `[offset:]length` argument into the spec. A positive
    /// length cuts from the front, a negative one from the end.
    pub fn add_arg(&mut self, arg: &str) -> Result<(), CapError> {
        let bad = || CapError::Config(format!("\"{arg}\" isn't a valid chop ([offset:]length)"));

        let (off_str, len_str) = match arg.split_once(':') {
            Some((off, len)) => (Some(off), len),
            None => (None, arg),
        };
        let len: i32 = len_str.trim().parse().map_err(|_| bad())?;
        if len == 0 {
            return Err(CapError::Config("the chop length can't be zero".into()));
        }
        let off: i32 = match off_str {
            Some(s) => s.trim().parse().map_err(|_| bad())?,
            None => 0,
        };

        if len > 0 {
            self.len_begin = self.len_begin.saturating_add(len);
            if off > 0 {
                self.off_begin_pos = self.off_begin_pos.saturating_add(off);
            } else {
                self.off_begin_neg = self.off_begin_neg.saturating_add(off);
            }
        } else {
            self.len_end = self.len_end.saturating_add(len);
            if off > 0 {
                self.off_end_pos = self.off_end_pos.saturating_add(off);
            } else {
                self.off_end_neg = self.off_end_neg.saturating_add(off);
            }
        }
        Ok(())
    }

    /// Canonical form for a packet of `caplen` bytes: every offset folded
    /// onto its natural anchor, crossed regions swapped, cuts clamped to
    /// the bytes that exist. Collapses the eight equivalent user
    /// spellings of each cut into one.
    pub fn normalized(&self, caplen: u32) -> ChopSpec {
        let caplen = i64::from(caplen);
        let mut len_begin = i64::from(self.len_begin);
        let mut off_begin_pos = i64::from(self.off_begin_pos);
        let mut off_begin_neg = i64::from(self.off_begin_neg);
        let mut len_end = i64::from(self.len_end);
        let mut off_end_pos = i64::from(self.off_end_pos);
        let mut off_end_neg = i64::from(self.off_end_neg);

        // An unused cut contributes no offsets.
        if len_begin == 0 {
            off_begin_pos = 0;
            off_begin_neg = 0;
        }
        if len_end == 0 {
            off_end_pos = 0;
            off_end_neg = 0;
        }

        // Anchor the head cut at the start and the tail cut at the end.
        if off_begin_neg < 0 {
            off_begin_pos += caplen + off_begin_neg;
            off_begin_neg = 0;
        }
        if off_end_pos > 0 {
            off_end_neg += off_end_pos - caplen;
            off_end_pos = 0;
        }

        // A head region starting past the tail region means the cuts were
        // spelled in the other order; each becomes the other's mirror.
        let end_start = caplen + off_end_neg + len_end;
        if len_begin > 0 && len_end < 0 && off_begin_pos > end_start {
            let swapped_len_begin = -len_end;
            let swapped_off_begin = end_start;
            let swapped_len_end = -len_begin;
            let swapped_off_end = off_begin_pos + len_begin - caplen;
            len_begin = swapped_len_begin;
            off_begin_pos = swapped_off_begin;
            len_end = swapped_len_end;
            off_end_neg = swapped_off_end;
        }

        // Offsets that fall outside the packet disable both cuts.
        if off_begin_pos < 0 || off_begin_pos > caplen || off_end_neg > 0 || -off_end_neg > caplen
        {
            len_begin = 0;
            off_begin_pos = 0;
            off_begin_neg = 0;
            len_end = 0;
            off_end_pos = 0;
            off_end_neg = 0;
        }

        // More chop than payload: the head cut takes everything between
        // the two offsets and the tail cut vanishes.
        let avail = caplen - off_begin_pos + off_end_neg;
        if len_begin - len_end > avail {
            len_begin = avail.max(0);
            len_end = 0;
            off_end_pos = 0;
            off_end_neg = 0;
        }

        ChopSpec {
            len_begin: len_begin as i32,
            off_begin_pos: off_begin_pos as i32,
            off_begin_neg: off_begin_neg as i32,
            len_end: len_end as i32,
            off_end_pos: off_end_pos as i32,
            off_end_neg: off_end_neg as i32,
        }
    }
}

/// Apply the chops to a record in place. `adjust_len` makes the reported
/// wire length track the removed bytes, flooring at zero.
pub fn apply(spec: &ChopSpec, rec: &mut Record, adjust_len: bool) {
    if !spec.is_active() || rec.kind != RecordKind::Packet {
        return;
    }
    let c = spec.normalized(rec.caplen);

    if c.len_begin > 0 {
        let start = c.off_begin_pos as usize;
        let cut = c.len_begin as usize;
        rec.payload.drain(start..start + cut);
        rec.caplen -= c.len_begin as u32;
        if adjust_len {
            rec.len = rec.len.saturating_sub(c.len_begin as u32);
        }
    }

    if c.len_end < 0 {
        let cut = (-c.len_end) as usize;
        // The preserved tail is `|off_end_neg|` bytes at the (new) end.
        let tail = (-c.off_end_neg) as usize;
        let cut_end = rec.caplen as usize - tail;
        rec.payload.drain(cut_end - cut..cut_end);
        rec.caplen -= (-c.len_end) as u32;
        if adjust_len {
            rec.len = rec.len.saturating_sub((-c.len_end) as u32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Encap;

    fn make_packet(payload: &[u8]) -> Record {
        Record::packet(None, Encap::Ethernet, payload.to_vec(), payload.len() as u32)
    }

    fn spec(args: &[&str]) -> ChopSpec {
        let mut s = ChopSpec::default();
        for arg in args {
            s.add_arg(arg).expect("valid chop arg");
        }
        s
    }

    #[test]
    fn test_arg_accumulation() {
        let s = spec(&["4", "-3"]);
        assert_eq!(s.len_begin, 4);
        assert_eq!(s.len_end, -3);
        let s = spec(&["10:4", "-5:-3"]);
        assert_eq!(s.off_begin_pos, 10);
        assert_eq!(s.off_end_neg, -5);
    }

    #[test]
    fn test_arg_rejects_zero_and_garbage() {
        let mut s = ChopSpec::default();
        assert!(s.add_arg("0").is_err());
        assert!(s.add_arg("abc").is_err());
        assert!(s.add_arg("1:2:3").is_err());
    }

    #[test]
    fn test_inactive_spec_is_identity() {
        let mut rec = make_packet(b"ABCDEFGHIJ");
        apply(&ChopSpec::default(), &mut rec, true);
        assert_eq!(rec.payload, b"ABCDEFGHIJ");
        assert_eq!(rec.caplen, 10);
        assert_eq!(rec.len, 10);
    }

    #[test]
    fn test_head_and_tail_cut() {
        // -C 4 -C -3 -L on ABCDEFGHIJ leaves EFG.
        let mut rec = make_packet(b"ABCDEFGHIJ");
        apply(&spec(&["4", "-3"]), &mut rec, true);
        assert_eq!(rec.payload, b"EFG");
        assert_eq!(rec.caplen, 3);
        assert_eq!(rec.len, 3);
    }

    #[test]
    fn test_len_untouched_without_adjust() {
        let mut rec = make_packet(b"ABCDEFGHIJ");
        apply(&spec(&["4"]), &mut rec, false);
        assert_eq!(rec.caplen, 6);
        assert_eq!(rec.len, 10);
    }

    #[test]
    fn test_offset_head_cut_preserves_prefix() {
        let mut rec = make_packet(b"ABCDEFGHIJ");
        apply(&spec(&["2:3"]), &mut rec, false);
        assert_eq!(rec.payload, b"ABFGHIJ");
        assert_eq!(rec.caplen, 7);
    }

    #[test]
    fn test_negative_head_offset_is_end_relative() {
        // Cut 3 bytes starting 4 from the end: ABCDEFGHIJ -> ABCDEFJ.
        let mut rec = make_packet(b"ABCDEFGHIJ");
        apply(&spec(&["-4:3"]), &mut rec, false);
        assert_eq!(rec.payload, b"ABCDEFJ");
    }

    #[test]
    fn test_positive_end_offset_is_start_relative() {
        // Tail cut of 3 whose region is anchored 6 from the start:
        // bytes DEF go, the tail past them stays.
        let mut rec = make_packet(b"ABCDEFGHIJ");
        apply(&spec(&["6:-3"]), &mut rec, false);
        assert_eq!(rec.payload, b"ABCGHIJ");
    }

    #[test]
    fn test_tail_cut_with_preserved_suffix() {
        let mut rec = make_packet(b"ABCDEFGHIJ");
        apply(&spec(&["-2:-3"]), &mut rec, false);
        assert_eq!(rec.payload, b"ABCDEIJ");
    }

    #[test]
    fn test_crossed_regions_swap() {
        // Head cut spelled past the tail cut; the mirror swap makes the
        // result identical to the natural spelling.
        let mut natural = make_packet(b"ABCDEFGHIJ");
        apply(&spec(&["2:2", "-2:-2"]), &mut natural, false);

        let mut crossed = make_packet(b"ABCDEFGHIJ");
        apply(&spec(&["6:2", "-6:-2"]), &mut crossed, false);

        assert_eq!(crossed.payload, natural.payload);
    }

    #[test]
    fn test_overlong_chop_empties_packet() {
        let mut rec = make_packet(b"ABCDE");
        apply(&spec(&["4", "-3"]), &mut rec, true);
        assert_eq!(rec.caplen, 0);
        assert!(rec.payload.is_empty());
        assert_eq!(rec.len, 0);
    }

    #[test]
    fn test_overlong_chop_without_adjust_keeps_len() {
        let mut rec = make_packet(b"ABCDE");
        apply(&spec(&["4", "-3"]), &mut rec, false);
        assert_eq!(rec.caplen, 0);
        assert_eq!(rec.len, 5);
    }

    #[test]
    fn test_offset_beyond_packet_disables_cuts() {
        let mut rec = make_packet(b"ABCDE");
        apply(&spec(&["100:2"]), &mut rec, true);
        assert_eq!(rec.payload, b"ABCDE");
        assert_eq!(rec.caplen, 5);
        assert_eq!(rec.len, 5);
    }

    #[test]
    fn test_empty_packet_is_noop() {
        let mut rec = make_packet(b"");
        apply(&spec(&["4", "-3"]), &mut rec, true);
        assert_eq!(rec.caplen, 0);
        assert_eq!(rec.len, 0);
    }

    #[test]
    fn test_non_packet_records_pass_through() {
        let mut rec = make_packet(b"ABCDEF");
        rec.kind = RecordKind::FtSpecificReport;
        apply(&spec(&["4"]), &mut rec, true);
        assert_eq!(rec.payload, b"ABCDEF");
    }
}
