//! Deterministic, value-typed random number generator.
//!
//! `RngState` never mutates in place: every draw returns the value together
//! with the successor state. The stream is ChaCha20 keyed from the game seed,
//! and the state is just the key plus the number of 32-bit words consumed, so
//! it serializes with the rest of the game and resumes exactly.

use hmac::digest::Key;
use hmac::{Hmac, Mac};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::numbers::{u32_to_usize, u64_to_u32, usize_to_u32};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    key: [u8; 32],
    draws: u64,
}

impl RngState {
    /// Derive a generator from a user seed and a domain tag.
    #[must_use]
    pub fn from_seed(seed: u64, domain_tag: &[u8]) -> Self {
        Self {
            key: derive_stream_key(seed, domain_tag),
            draws: 0,
        }
    }

    /// Number of 32-bit words consumed so far.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }

    /// Draw one uniformly distributed `u32`.
    #[must_use]
    pub fn next(&self) -> (u32, Self) {
        let mut stream = ChaCha20Rng::from_seed(self.key);
        stream.set_word_pos(u128::from(self.draws));
        let value = stream.next_u32();
        (
            value,
            Self {
                key: self.key,
                draws: self.draws + 1,
            },
        )
    }

    /// Draw an integer uniformly from the inclusive range `[min, max]`.
    ///
    /// Uses rejection sampling so no residue class is favoured. A degenerate
    /// range returns `min` without consuming a draw.
    #[must_use]
    pub fn rand_int(&self, min: u32, max: u32) -> (u32, Self) {
        if max <= min {
            return (min, self.clone());
        }
        let span = u64::from(max - min) + 1;
        let zone = (1_u64 << 32) / span * span;
        let mut cursor = self.clone();
        loop {
            let (raw, next) = cursor.next();
            cursor = next;
            let raw = u64::from(raw);
            if raw < zone {
                return (min + u64_to_u32(raw % span), cursor);
            }
        }
    }

    /// Roll one die with the given number of sides (1-based).
    #[must_use]
    pub fn roll_die(&self, sides: u32) -> (u32, Self) {
        self.rand_int(1, sides.max(1))
    }

    /// Pick a uniform index into a collection of `len` items.
    #[must_use]
    pub fn pick_index(&self, len: usize) -> (usize, Self) {
        let upper = usize_to_u32(len.saturating_sub(1));
        let (value, next) = self.rand_int(0, upper);
        (u32_to_usize(value), next)
    }

    /// Fisher–Yates shuffle.
    #[must_use]
    pub fn shuffle<T>(&self, mut items: Vec<T>) -> (Vec<T>, Self) {
        let mut cursor = self.clone();
        for i in (1..items.len()).rev() {
            let (j, next) = cursor.rand_int(0, usize_to_u32(i));
            cursor = next;
            items.swap(i, u32_to_usize(j));
        }
        (items, cursor)
    }
}

type StreamMac = Hmac<Sha256>;

/// HMAC-SHA256 keyed by the little-endian seed, zero-padded to the block size.
fn derive_stream_key(seed: u64, domain_tag: &[u8]) -> [u8; 32] {
    let mut block = Key::<StreamMac>::default();
    block[..8].copy_from_slice(&seed.to_le_bytes());
    let mut mac = <StreamMac as Mac>::new(&block);
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut key = [0_u8; 32];
    key.copy_from_slice(&digest[..32]);
    key
}
