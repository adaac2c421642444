//! SimHash fingerprints for near-duplicate detection
//!
//! A SimHash packs a document's token-weight vector into a compact bit
//! signature; hamming distance between signatures approximates cosine
//! distance between the underlying vectors.

use ahash::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};

use crate::text::split_words;

/// Maximum (and default) signature width in bits
pub const MAX_SIMHASH_BITS: usize = 64;

/// SimHash signature of up to 64 bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimHashSignature {
    bits: u64,
    width: usize,
}

impl SimHashSignature {
    pub fn value(&self) -> u64 {
        self.bits
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of differing bit positions. Signatures of different
    /// widths are maximally distant.
    pub fn hamming_distance(&self, other: &SimHashSignature) -> usize {
        if self.width != other.width {
            return self.width.max(other.width);
        }
        (self.bits ^ other.bits).count_ones() as usize
    }

    /// `1 − hamming/width`; symmetric, and 1.0 for identical signatures.
    pub fn similarity(&self, other: &SimHashSignature) -> f64 {
        if self.width == 0 {
            return 0.0;
        }
        1.0 - self.hamming_distance(other) as f64 / self.width.max(other.width) as f64
    }
}

/// SimHash generator with a fixed-seed token hasher.
pub struct SimHasher {
    width: usize,
    hash_builder: RandomState,
}

impl SimHasher {
    /// # Panics
    /// Panics when `width` is 0 or exceeds [`MAX_SIMHASH_BITS`].
    pub fn new(width: usize) -> Self {
        assert!(
            width > 0 && width <= MAX_SIMHASH_BITS,
            "simhash width must be in 1..={MAX_SIMHASH_BITS}"
        );
        Self {
            width,
            hash_builder: RandomState::with_seeds(
                0x6c62272e07bb0142,
                0x62b821756295c58d,
                0x100000001b3dead,
                0xcbf29ce484222325,
            ),
        }
    }

    fn token_hash(&self, token: &str) -> u64 {
        let mut hasher = self.hash_builder.build_hasher();
        token.hash(&mut hasher);
        hasher.finish()
    }

    /// Compute the signature of `text`.
    ///
    /// Each token contributes +1/−1 per bit position; repeated tokens
    /// contribute once per occurrence, which weights them implicitly.
    pub fn compute(&self, text: &str) -> SimHashSignature {
        self.compute_tokens(split_words(text).into_iter())
    }

    /// Compute a signature from pre-tokenized input.
    pub fn compute_tokens<'a>(&self, tokens: impl Iterator<Item = &'a str>) -> SimHashSignature {
        let mut accumulator = vec![0i64; self.width];

        for token in tokens {
            let hash = self.token_hash(token);
            for (i, acc) in accumulator.iter_mut().enumerate() {
                if (hash >> i) & 1 == 1 {
                    *acc += 1;
                } else {
                    *acc -= 1;
                }
            }
        }

        let mut bits = 0u64;
        for (i, &acc) in accumulator.iter().enumerate() {
            if acc > 0 {
                bits |= 1 << i;
            }
        }

        SimHashSignature {
            bits,
            width: self.width,
        }
    }

    /// Hamming radius corresponding to a similarity threshold:
    /// `⌊(1 − threshold)·width⌋`.
    pub fn distance_for_threshold(&self, threshold: f64) -> usize {
        ((1.0 - threshold) * self.width as f64).floor() as usize
    }
}

impl Default for SimHasher {
    fn default() -> Self {
        Self::new(MAX_SIMHASH_BITS)
    }
}
