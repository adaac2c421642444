//! Near-duplicate detection via MinHash/LSH or SimHash
//!
//! Identifies documents that are similar but not byte-identical and
//! collapses each similarity group to its first occurrence.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use crate::document::{DedupResult, Document};
use crate::minhash::{LSHIndex, MinHasher};
use crate::simhash::SimHasher;
use crate::text::TextNormalizer;
use crate::{Error, Result};

/// Progress callback: (current, total, stage)
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize, &str) + Sync);

/// Near-duplicate detection method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NearDedupMethod {
    #[default]
    MinHash,
    SimHash,
}

/// Configuration for near-duplicate detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearDedupConfig {
    pub method: NearDedupMethod,
    /// Similarity at or above which two documents collapse
    pub threshold: f64,
    /// MinHash signature length
    pub num_permutations: usize,
    /// Character shingle size fed to MinHash
    pub ngram_size: usize,
    pub num_bands: usize,
    pub rows_per_band: usize,
    /// SimHash signature width in bits
    pub simhash_bits: usize,
    /// Seed for the MinHash permutation constants; `None` draws from OS
    /// entropy at the cost of run-to-run reproducibility
    pub deterministic_seed: Option<u64>,
}

impl Default for NearDedupConfig {
    fn default() -> Self {
        Self {
            method: NearDedupMethod::MinHash,
            threshold: 0.8,
            num_permutations: 128,
            ngram_size: 5,
            num_bands: 16,
            rows_per_band: 8,
            simhash_bits: 64,
            deterministic_seed: Some(42),
        }
    }
}

impl NearDedupConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(Error::InvalidConfig(format!(
                "similarity threshold {} outside [0, 1]",
                self.threshold
            )));
        }
        if self.num_bands * self.rows_per_band != self.num_permutations {
            return Err(Error::InvalidConfig(format!(
                "{} bands x {} rows does not equal signature length {}",
                self.num_bands, self.rows_per_band, self.num_permutations
            )));
        }
        if self.ngram_size == 0 {
            return Err(Error::InvalidConfig("ngram size must be positive".into()));
        }
        Ok(())
    }
}

/// Near-duplicate deduplicator.
///
/// Documents are processed in input order; a `processed` bitmap ensures
/// each document joins at most one similarity group, and the first
/// member of every group is the survivor.
pub struct NearDeduplicator {
    config: NearDedupConfig,
    normalizer: TextNormalizer,
}

impl NearDeduplicator {
    pub fn new(config: NearDedupConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "Created NearDeduplicator: method {:?}, threshold {}",
            config.method, config.threshold
        );
        Ok(Self {
            config,
            normalizer: TextNormalizer::balanced(),
        })
    }

    pub fn with_normalizer(mut self, normalizer: TextNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Deduplicate a batch, preserving input order in the output.
    pub fn deduplicate(
        &self,
        documents: &[Document],
        progress: Option<ProgressFn<'_>>,
    ) -> DedupResult {
        let start = Instant::now();
        let groups = match self.config.method {
            NearDedupMethod::MinHash => self.group_minhash(documents, progress),
            NearDedupMethod::SimHash => self.group_simhash(documents, progress),
        };

        let mut kept: Vec<usize> = groups.iter().map(|g| g[0]).collect();
        kept.sort_unstable();

        let duplicate_groups: Vec<Vec<usize>> =
            groups.into_iter().filter(|g| g.len() > 1).collect();

        let result = DedupResult {
            unique_documents: kept.iter().map(|&i| documents[i].clone()).collect(),
            original_indices: kept,
            duplicate_groups,
            original_count: documents.len(),
            processing_time: start.elapsed(),
        };

        info!(
            "Near dedup ({:?}): {} -> {} documents ({:.1}% reduction)",
            self.config.method,
            result.original_count,
            result.unique_count(),
            result.reduction_percentage()
        );
        result
    }

    /// Similarity groups under MinHash + LSH, one group per surviving
    /// document (singletons included), ordered by first member.
    fn group_minhash(
        &self,
        documents: &[Document],
        progress: Option<ProgressFn<'_>>,
    ) -> Vec<Vec<usize>> {
        let hasher = match self.config.deterministic_seed {
            Some(seed) => MinHasher::with_seed(self.config.num_permutations, self.config.ngram_size, seed),
            None => MinHasher::from_entropy(self.config.num_permutations, self.config.ngram_size),
        };

        let signatures: Vec<_> = documents
            .par_iter()
            .map(|doc| hasher.compute_signature(&self.normalizer.normalize(&doc.text)))
            .collect();

        if let Some(cb) = progress {
            cb(documents.len(), documents.len(), "signatures");
        }

        let mut index = LSHIndex::new(self.config.num_bands, self.config.rows_per_band);
        for (i, sig) in signatures.iter().enumerate() {
            index.insert(i, sig);
        }

        let mut processed = vec![false; documents.len()];
        let mut groups = Vec::new();

        for i in 0..documents.len() {
            if processed[i] {
                continue;
            }
            processed[i] = true;
            let mut group = vec![i];

            for j in index.query(&signatures[i]) {
                if j == i || processed[j] {
                    continue;
                }
                let sim = signatures[i].jaccard_similarity(&signatures[j]);
                if sim >= self.config.threshold {
                    debug!("Documents {} and {} similar ({:.3})", i, j, sim);
                    processed[j] = true;
                    group.push(j);
                }
            }

            groups.push(group);
            if let Some(cb) = progress {
                cb(i + 1, documents.len(), "grouping");
            }
        }

        groups
    }

    /// Similarity groups under SimHash hamming distance.
    fn group_simhash(
        &self,
        documents: &[Document],
        progress: Option<ProgressFn<'_>>,
    ) -> Vec<Vec<usize>> {
        let hasher = SimHasher::new(self.config.simhash_bits);
        let max_distance = hasher.distance_for_threshold(self.config.threshold);

        let signatures: Vec<_> = documents
            .par_iter()
            .map(|doc| hasher.compute(&self.normalizer.normalize(&doc.text)))
            .collect();

        if let Some(cb) = progress {
            cb(documents.len(), documents.len(), "signatures");
        }

        let mut processed = vec![false; documents.len()];
        let mut groups = Vec::new();

        for i in 0..documents.len() {
            if processed[i] {
                continue;
            }
            processed[i] = true;
            let mut group = vec![i];

            for j in (i + 1)..documents.len() {
                if processed[j] {
                    continue;
                }
                if signatures[i].hamming_distance(&signatures[j]) <= max_distance {
                    processed[j] = true;
                    group.push(j);
                }
            }

            groups.push(group);
            if let Some(cb) = progress {
                cb(i + 1, documents.len(), "grouping");
            }
        }

        groups
    }

    /// Similar pairs above the threshold, without removing anything.
    pub fn find_similar_pairs(&self, documents: &[Document]) -> Vec<(usize, usize, f64)> {
        match self.config.method {
            NearDedupMethod::MinHash => {
                let hasher = match self.config.deterministic_seed {
                    Some(seed) => {
                        MinHasher::with_seed(self.config.num_permutations, self.config.ngram_size, seed)
                    }
                    None => MinHasher::from_entropy(self.config.num_permutations, self.config.ngram_size),
                };
                let signatures: Vec<_> = documents
                    .par_iter()
                    .map(|doc| hasher.compute_signature(&self.normalizer.normalize(&doc.text)))
                    .collect();

                let mut index = LSHIndex::new(self.config.num_bands, self.config.rows_per_band);
                for (i, sig) in signatures.iter().enumerate() {
                    index.insert(i, sig);
                }

                let mut pairs = Vec::new();
                for i in 0..documents.len() {
                    for j in index.query(&signatures[i]) {
                        if j <= i {
                            continue;
                        }
                        let sim = signatures[i].jaccard_similarity(&signatures[j]);
                        if sim >= self.config.threshold {
                            pairs.push((i, j, sim));
                        }
                    }
                }
                pairs
            }
            NearDedupMethod::SimHash => {
                let hasher = SimHasher::new(self.config.simhash_bits);
                let signatures: Vec<_> = documents
                    .par_iter()
                    .map(|doc| hasher.compute(&self.normalizer.normalize(&doc.text)))
                    .collect();

                let mut pairs = Vec::new();
                for i in 0..documents.len() {
                    for j in (i + 1)..documents.len() {
                        let sim = signatures[i].similarity(&signatures[j]);
                        if sim >= self.config.threshold {
                            pairs.push((i, j, sim));
                        }
                    }
                }
                pairs
            }
        }
    }
}
