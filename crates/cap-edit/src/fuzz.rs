//! Weighted random payload corruption with a reproducible stream.

use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// The five corruption classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Corruption {
    FlipBit,
    RandomByte,
    RandomAlnum,
    FormatString,
    FillAa,
}

/// Inverse-CDF table over the class weights
/// `{bit 5, byte 5, alnum 5, fmt 2, aa 1}`.
const CORRUPTION_CDF: [(u32, Corruption); 5] = [
    (5, Corruption::FlipBit),
    (10, Corruption::RandomByte),
    (15, Corruption::RandomAlnum),
    (17, Corruption::FormatString),
    (18, Corruption::FillAa),
];
const CDF_TOTAL: u32 = 18;

const ALNUM: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub struct Fuzzer {
    probability: f64,
    rng: ChaCha20Rng,
    seed: u64,
}

impl Fuzzer {
    pub fn new(probability: f64, seed: Option<u64>) -> Fuzzer {
        let seed = seed.unwrap_or_else(default_seed);
        Fuzzer {
            probability,
            rng: ChaCha20Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// The seed in use; logging it lets a run be reproduced.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Corrupt `payload[start..]` in place. Each byte is hit with the
    /// configured probability; an `0xAA` fill ends the packet's loop.
    pub fn corrupt(&mut self, payload: &mut [u8], start: usize) {
        let caplen = payload.len();
        let mut i = start;
        while i < caplen {
            if self.rng.random::<f64>() < self.probability {
                match self.pick() {
                    Corruption::FlipBit => {
                        payload[i] ^= 1 << self.rng.random_range(0..8);
                    }
                    Corruption::RandomByte => {
                        payload[i] = self.rng.random();
                    }
                    Corruption::RandomAlnum => {
                        payload[i] = ALNUM[self.rng.random_range(0..ALNUM.len())];
                    }
                    Corruption::FormatString => {
                        if i + 2 <= caplen {
                            payload[i..i + 2].copy_from_slice(b"%s");
                        }
                    }
                    Corruption::FillAa => {
                        for b in &mut payload[i..] {
                            *b = 0xAA;
                        }
                        break;
                    }
                }
            }
            i += 1;
        }
    }

    fn pick(&mut self) -> Corruption {
        let draw = self.rng.random_range(0..CDF_TOTAL);
        for (bound, class) in CORRUPTION_CDF {
            if draw < bound {
                return class;
            }
        }
        Corruption::FillAa
    }
}

/// Seed for runs that don't pass `--seed`: wall clock XOR pid.
fn default_seed() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    now ^ u64::from(process::id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = Fuzzer::new(0.5, Some(1234));
        let mut b = Fuzzer::new(0.5, Some(1234));
        let mut payload_a = vec![0x42u8; 256];
        let mut payload_b = payload_a.clone();
        a.corrupt(&mut payload_a, 0);
        b.corrupt(&mut payload_b, 0);
        assert_eq!(payload_a, payload_b);
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = Fuzzer::new(1.0, Some(1));
        let mut b = Fuzzer::new(1.0, Some(2));
        let mut payload_a = vec![0x42u8; 256];
        let mut payload_b = payload_a.clone();
        a.corrupt(&mut payload_a, 0);
        b.corrupt(&mut payload_b, 0);
        assert_ne!(payload_a, payload_b);
    }

    #[test]
    fn test_prefix_before_start_untouched() {
        let mut fuzzer = Fuzzer::new(1.0, Some(7));
        let mut payload = vec![0x42u8; 64];
        fuzzer.corrupt(&mut payload, 16);
        assert!(payload[..16].iter().all(|&b| b == 0x42));
    }

    #[test]
    fn test_length_is_preserved() {
        let mut fuzzer = Fuzzer::new(1.0, Some(7));
        let mut payload = vec![0x42u8; 64];
        fuzzer.corrupt(&mut payload, 0);
        assert_eq!(payload.len(), 64);
    }

    #[test]
    fn test_zero_probability_is_identity() {
        let mut fuzzer = Fuzzer::new(0.0, Some(7));
        let mut payload = vec![0x42u8; 64];
        fuzzer.corrupt(&mut payload, 0);
        assert!(payload.iter().all(|&b| b == 0x42));
    }

    #[test]
    fn test_start_past_end_is_noop() {
        let mut fuzzer = Fuzzer::new(1.0, Some(7));
        let mut payload = vec![0x42u8; 8];
        fuzzer.corrupt(&mut payload, 100);
        assert!(payload.iter().all(|&b| b == 0x42));
    }

    #[test]
    fn test_aa_fill_reaches_end_eventually() {
        // With p = 1.0 every byte draws a class, so a long payload is
        // overwhelmingly likely to hit the 1/18 fill class and end in a
        // run of 0xAA.
        let mut fuzzer = Fuzzer::new(1.0, Some(99));
        let mut payload = vec![0x42u8; 4096];
        fuzzer.corrupt(&mut payload, 0);
        assert_eq!(*payload.last().unwrap(), 0xAA);
    }

    #[test]
    fn test_explicit_seed_reported() {
        let fuzzer = Fuzzer::new(0.1, Some(31337));
        assert_eq!(fuzzer.seed(), 31337);
    }
}
