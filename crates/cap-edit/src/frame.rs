//! Link-layer helpers the pipeline hooks into: 802.1Q tag removal,
//! radiotap header sizing and the DCT2000 preamble scan.

use crate::record::{Encap, Record, RecordKind};

// Ethernet header: dst(6) + src(6) + ethertype(2). An 802.1Q tag sits
// between the source address and the ethertype.
const ETH_TYPE_OFF: usize = 12;
const VLAN_TAG_LEN: usize = 4;
const VLAN_TPID: [u8; 2] = [0x81, 0x00];

/// Remove one 802.1Q tag from an Ethernet frame, if present. Returns
/// `true` when a tag was stripped.
pub fn strip_vlan(rec: &mut Record) -> bool {
    if rec.kind != RecordKind::Packet || rec.encap != Encap::Ethernet {
        return false;
    }
    if (rec.caplen as usize) < ETH_TYPE_OFF + VLAN_TAG_LEN
        || rec.payload[ETH_TYPE_OFF..ETH_TYPE_OFF + 2] != VLAN_TPID
    {
        return false;
    }
    rec.payload.drain(ETH_TYPE_OFF..ETH_TYPE_OFF + VLAN_TAG_LEN);
    rec.caplen -= VLAN_TAG_LEN as u32;
    rec.len = rec.len.saturating_sub(VLAN_TAG_LEN as u32);
    true
}

// Radiotap fixed header: version(1) + pad(1) + length(2 LE) + present(4).
const RADIOTAP_HDR_MIN: usize = 8;
const RADIOTAP_LEN_OFF: usize = 2;

/// Total radiotap header length at the front of `payload`, read from its
/// little-endian length field. `None` when the fixed header is truncated.
pub fn radiotap_header_len(payload: &[u8]) -> Option<usize> {
    if payload.len() < RADIOTAP_HDR_MIN {
        return None;
    }
    Some(u16::from_le_bytes([
        payload[RADIOTAP_LEN_OFF],
        payload[RADIOTAP_LEN_OFF + 1],
    ]) as usize)
}

// DCT2000 records carry an ASCII preamble: six NUL-terminated fields
// (context, port, timestamp, protocol, variant, outhdr) followed by the
// direction and encapsulation bytes.
const DCT2000_NUL_FIELDS: usize = 6;
const DCT2000_TRAILER: usize = 2;

/// Offset of the real payload in a DCT2000 record. A truncated preamble
/// yields the full length, leaving nothing to edit.
pub fn dct2000_payload_start(payload: &[u8]) -> usize {
    let mut n = 0;
    for _ in 0..DCT2000_NUL_FIELDS {
        while n < payload.len() && payload[n] != 0 {
            n += 1;
        }
        if n >= payload.len() {
            return payload.len();
        }
        n += 1;
    }
    (n + DCT2000_TRAILER).min(payload.len())
}
