//! Payload generation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `len` bytes whose content depends on `seq`, so reordered or mixed-up
/// payloads of equal length still compare unequal.
pub fn patterned(seq: u64, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (seq as usize).wrapping_mul(31).wrapping_add(i) as u8)
        .collect()
}

/// Seeded generator of random-size, random-content payloads.
pub struct PayloadGenerator {
    rng: StdRng,
    min_len: usize,
    max_len: usize,
}

impl PayloadGenerator {
    pub fn new(seed: u64, min_len: usize, max_len: usize) -> Self {
        assert!(min_len <= max_len, "min_len must be <= max_len");
        Self {
            rng: StdRng::seed_from_u64(seed),
            min_len,
            max_len,
        }
    }

    pub fn next_len(&mut self) -> usize {
        self.rng.gen_range(self.min_len..=self.max_len)
    }

    pub fn next_payload(&mut self) -> Vec<u8> {
        let len = self.next_len();
        let mut payload = vec![0u8; len];
        self.rng.fill(&mut payload[..]);
        payload
    }

    /// `count` payloads.
    pub fn batch(&mut self, count: usize) -> Vec<Vec<u8>> {
        (0..count).map(|_| self.next_payload()).collect()
    }
}
