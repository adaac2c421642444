//! MinHash signatures and LSH banding for near-duplicate detection
//!
//! Signatures estimate Jaccard similarity between shingle sets; the LSH
//! index buckets signatures band-by-band so that similar documents land
//! in a shared bucket with high probability.
//!
//! Band keys are pre-hashed down to a single `u64` via ahash before
//! being used as HashMap keys, and all internal HashMaps are
//! ahash-backed (keys are not adversarially controlled).

use ahash::RandomState;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::collections::HashSet;
use std::hash::{BuildHasher, Hash, Hasher};
use tracing::{debug, info};

use crate::text::{generate_ngrams, NgramKind};

/// ahash-backed HashMap for internal use
type AHashMap<K, V> = std::collections::HashMap<K, V, RandomState>;

/// Fixed seeds so shingle hashes are identical across runs.
/// `RandomState::default()` is randomly seeded per process, which made
/// duplicate counts non-deterministic between runs.
fn shingle_hash_builder() -> RandomState {
    RandomState::with_seeds(
        0x517cc1b727220a95,
        0x8d8f5f3b12c4a6e1,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
    )
}

/// MinHash signature for a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinHashSignature {
    /// One minimum per permutation, initialized to `u64::MAX`
    pub values: Vec<u64>,
}

impl MinHashSignature {
    pub fn empty(num_permutations: usize) -> Self {
        Self {
            values: vec![u64::MAX; num_permutations],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Estimated Jaccard similarity: the fraction of equal positions.
    /// Signatures of different lengths compare as dissimilar.
    pub fn jaccard_similarity(&self, other: &MinHashSignature) -> f64 {
        if self.values.len() != other.values.len() || self.values.is_empty() {
            return 0.0;
        }
        let matches = self
            .values
            .iter()
            .zip(other.values.iter())
            .filter(|(a, b)| a == b)
            .count();
        matches as f64 / self.values.len() as f64
    }
}

/// MinHash signature generator.
///
/// Permutations are the classic `a·h(x) + b` family with odd `a`; the
/// coefficients come from a seedable RNG so runs can be reproducible
/// (see [`MinHasher::with_seed`]).
pub struct MinHasher {
    num_permutations: usize,
    shingle_size: usize,
    coefficients: Vec<(u64, u64)>,
    hash_builder: RandomState,
}

impl MinHasher {
    /// Deterministic hasher seeded with `seed`.
    pub fn with_seed(num_permutations: usize, shingle_size: usize, seed: u64) -> Self {
        Self::from_rng(num_permutations, shingle_size, StdRng::seed_from_u64(seed))
    }

    /// Hasher with permutation constants drawn from OS entropy.
    pub fn from_entropy(num_permutations: usize, shingle_size: usize) -> Self {
        Self::from_rng(num_permutations, shingle_size, StdRng::from_entropy())
    }

    fn from_rng(num_permutations: usize, shingle_size: usize, mut rng: StdRng) -> Self {
        let coefficients = (0..num_permutations)
            .map(|_| {
                let a = rng.next_u64() | 1; // odd multiplier
                let b = rng.next_u64();
                (a, b)
            })
            .collect();

        info!(
            "Created MinHasher with {} permutations, char shingle size {}",
            num_permutations, shingle_size
        );

        Self {
            num_permutations,
            shingle_size,
            coefficients,
            hash_builder: shingle_hash_builder(),
        }
    }

    pub fn num_permutations(&self) -> usize {
        self.num_permutations
    }

    fn hash_shingle(&self, shingle: &str) -> u64 {
        let mut hasher = self.hash_builder.build_hasher();
        shingle.hash(&mut hasher);
        hasher.finish()
    }

    /// Compute the signature of `text` over character shingles.
    ///
    /// Text shorter than the shingle size is hashed as a single shingle;
    /// empty text yields the empty (all-MAX) signature.
    pub fn compute_signature(&self, text: &str) -> MinHashSignature {
        let mut signature = MinHashSignature::empty(self.num_permutations);
        if text.is_empty() {
            return signature;
        }

        let shingles = generate_ngrams(text, self.shingle_size, NgramKind::Char);
        let mut shingle_hashes: HashSet<u64> = HashSet::with_capacity(shingles.len());
        if shingles.is_empty() {
            shingle_hashes.insert(self.hash_shingle(text));
        } else {
            for shingle in &shingles {
                shingle_hashes.insert(self.hash_shingle(shingle));
            }
        }

        for &element in &shingle_hashes {
            self.update(&mut signature, element);
        }

        debug!("Computed signature from {} unique shingles", shingle_hashes.len());
        signature
    }

    /// Fold one element hash into a signature.
    pub fn update(&self, signature: &mut MinHashSignature, element_hash: u64) {
        for (i, &(a, b)) in self.coefficients.iter().enumerate() {
            let permuted = a.wrapping_mul(element_hash).wrapping_add(b);
            if permuted < signature.values[i] {
                signature.values[i] = permuted;
            }
        }
    }

    /// Convenience: estimated Jaccard similarity between two texts.
    pub fn jaccard_similarity(&self, text1: &str, text2: &str) -> f64 {
        self.compute_signature(text1)
            .jaccard_similarity(&self.compute_signature(text2))
    }
}

/// Hash a band slice down to a single u64 bucket key.
fn hash_band_key(slice: &[u64], hash_builder: &RandomState) -> u64 {
    let mut hasher = hash_builder.build_hasher();
    slice.hash(&mut hasher);
    hasher.finish()
}

/// LSH index over MinHash signatures.
///
/// `num_bands · rows_per_band` must equal the signature length; with the
/// defaults (16 bands × 8 rows = 128) similarities above ~0.8 collide in
/// at least one band with high probability.
pub struct LSHIndex {
    num_bands: usize,
    rows_per_band: usize,
    bands: Vec<AHashMap<u64, Vec<u32>>>,
    band_hash_builder: RandomState,
    doc_count: usize,
}

impl LSHIndex {
    pub fn new(num_bands: usize, rows_per_band: usize) -> Self {
        info!(
            "Creating LSH index with {} bands x {} rows",
            num_bands, rows_per_band
        );
        let hash_builder = RandomState::with_seeds(
            0xa1b2c3d4e5f60718,
            0x9182736455463728,
            0xdeadbeefcafebabe,
            0x0123456789abcdef,
        );
        let bands = (0..num_bands)
            .map(|_| AHashMap::with_hasher(hash_builder.clone()))
            .collect();
        Self {
            num_bands,
            rows_per_band,
            bands,
            band_hash_builder: hash_builder,
            doc_count: 0,
        }
    }

    /// Expected signature length for this banding.
    pub fn signature_len(&self) -> usize {
        self.num_bands * self.rows_per_band
    }

    /// Insert a signature under a document id.
    ///
    /// # Panics
    /// Panics when the signature length does not divide into the
    /// configured bands.
    pub fn insert(&mut self, id: usize, signature: &MinHashSignature) {
        assert_eq!(
            signature.len(),
            self.signature_len(),
            "signature length {} does not match {} bands x {} rows",
            signature.len(),
            self.num_bands,
            self.rows_per_band
        );

        let id32 = id as u32;
        for band_idx in 0..self.num_bands {
            let start = band_idx * self.rows_per_band;
            let end = start + self.rows_per_band;
            let key = hash_band_key(&signature.values[start..end], &self.band_hash_builder);
            self.bands[band_idx].entry(key).or_default().push(id32);
        }
        self.doc_count += 1;
    }

    /// Candidate document ids sharing at least one band bucket with the
    /// query signature. Candidates must still be verified with
    /// [`MinHashSignature::jaccard_similarity`].
    pub fn query(&self, signature: &MinHashSignature) -> Vec<usize> {
        if signature.len() != self.signature_len() {
            debug!(
                "Query signature length {} does not match index ({})",
                signature.len(),
                self.signature_len()
            );
            return Vec::new();
        }

        let mut candidates = HashSet::new();
        for band_idx in 0..self.num_bands {
            let start = band_idx * self.rows_per_band;
            let end = start + self.rows_per_band;
            let key = hash_band_key(&signature.values[start..end], &self.band_hash_builder);
            if let Some(ids) = self.bands[band_idx].get(&key) {
                candidates.extend(ids.iter().map(|&id| id as usize));
            }
        }

        let mut result: Vec<usize> = candidates.into_iter().collect();
        result.sort_unstable();
        result
    }

    pub fn len(&self) -> usize {
        self.doc_count
    }

    pub fn is_empty(&self) -> bool {
        self.doc_count == 0
    }

    pub fn clear(&mut self) {
        for band in &mut self.bands {
            band.clear();
        }
        self.doc_count = 0;
    }
}
