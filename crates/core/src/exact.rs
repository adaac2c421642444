//! Exact deduplication using content hashing
//!
//! Groups documents by a 64-bit content hash and keeps one
//! representative per group. A streaming variant with a bloom-filter
//! fast path supports line-by-line processing of corpora that do not
//! fit in memory.

use ahash::AHashSet;
use bloomfilter::Bloom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};

use crate::document::{DedupResult, Document};
use crate::hashing::HashAlgorithm;

/// Which occurrence of a duplicate group survives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepPolicy {
    #[default]
    First,
    Last,
}

/// Configuration for exact deduplication
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExactDedupConfig {
    pub algorithm: HashAlgorithm,
    pub keep: KeepPolicy,
    /// Hash documents on the rayon pool
    pub parallel: bool,
}

impl Default for ExactDedupConfig {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::default(),
            keep: KeepPolicy::default(),
            parallel: true,
        }
    }
}

/// Exact deduplicator over in-memory batches
pub struct ExactDeduplicator {
    config: ExactDedupConfig,
}

impl ExactDeduplicator {
    pub fn new(config: ExactDedupConfig) -> Self {
        info!(
            "Created ExactDeduplicator with algorithm {:?}, keep {:?}",
            config.algorithm, config.keep
        );
        Self { config }
    }

    /// Deduplicate a batch, preserving input order in the unique output.
    ///
    /// Kept indices are sorted ascending under both keep policies, so the
    /// survivors always appear in their original relative order.
    pub fn deduplicate(&self, documents: &[Document]) -> DedupResult {
        let start = Instant::now();
        let algorithm = self.config.algorithm;

        let hashes: Vec<u64> = if self.config.parallel {
            documents.par_iter().map(|d| algorithm.hash(&d.text)).collect()
        } else {
            documents.iter().map(|d| algorithm.hash(&d.text)).collect()
        };

        // Group input indices by hash, in first-seen order
        let mut groups: HashMap<u64, Vec<usize>> = HashMap::with_capacity(documents.len());
        let mut group_order: Vec<u64> = Vec::new();
        for (idx, &hash) in hashes.iter().enumerate() {
            let entry = groups.entry(hash).or_default();
            if entry.is_empty() {
                group_order.push(hash);
            }
            entry.push(idx);
        }

        let mut kept: Vec<usize> = group_order
            .iter()
            .map(|hash| {
                let members = &groups[hash];
                match self.config.keep {
                    KeepPolicy::First => members[0],
                    KeepPolicy::Last => *members.last().expect("non-empty group"),
                }
            })
            .collect();
        kept.sort_unstable();

        let duplicate_groups: Vec<Vec<usize>> = group_order
            .iter()
            .filter_map(|hash| {
                let members = &groups[hash];
                (members.len() > 1).then(|| members.clone())
            })
            .collect();

        let result = DedupResult {
            unique_documents: kept.iter().map(|&i| documents[i].clone()).collect(),
            original_indices: kept,
            duplicate_groups,
            original_count: documents.len(),
            processing_time: start.elapsed(),
        };

        info!(
            "Exact dedup: {} -> {} documents ({:.1}% reduction)",
            result.original_count,
            result.unique_count(),
            result.reduction_percentage()
        );
        result
    }
}

/// Statistics for streaming deduplication
#[derive(Debug, Clone, Default)]
pub struct StreamingStats {
    pub total_seen: usize,
    pub duplicates_found: usize,
    pub unique_count: usize,
    /// Bloom-filter positives (hash set consulted)
    pub bloom_hits: usize,
    /// Bloom-filter negatives (definitely unique, set skipped)
    pub bloom_misses: usize,
}

impl StreamingStats {
    pub fn dedup_rate(&self) -> f64 {
        if self.total_seen == 0 {
            0.0
        } else {
            (self.duplicates_found as f64 / self.total_seen as f64) * 100.0
        }
    }
}

/// Streaming exact deduplicator with a bloom-filter fast path.
///
/// The bloom filter answers "definitely not seen" without touching the
/// hash set; only bloom positives fall through to the exact check.
pub struct StreamingDeduplicator {
    algorithm: HashAlgorithm,
    seen: AHashSet<u64>,
    bloom: Bloom<u64>,
    stats: StreamingStats,
}

impl StreamingDeduplicator {
    /// `capacity` sizes both the hash set and the bloom filter
    /// (~1% false positive rate).
    pub fn with_capacity(algorithm: HashAlgorithm, capacity: usize) -> Self {
        debug!("Creating StreamingDeduplicator with capacity {}", capacity);
        Self {
            algorithm,
            seen: AHashSet::with_capacity(capacity),
            bloom: Bloom::new_for_fp_rate(capacity.max(1), 0.01),
            stats: StreamingStats::default(),
        }
    }

    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self::with_capacity(algorithm, 1_000_000)
    }

    /// Returns true when `text` duplicates earlier input; unique texts
    /// are recorded as seen.
    pub fn is_duplicate(&mut self, text: &str) -> bool {
        self.stats.total_seen += 1;
        let hash = self.algorithm.hash(text);

        if !self.bloom.check(&hash) {
            self.bloom.set(&hash);
            self.seen.insert(hash);
            self.stats.bloom_misses += 1;
            self.stats.unique_count += 1;
            return false;
        }

        self.stats.bloom_hits += 1;
        if self.seen.contains(&hash) {
            self.stats.duplicates_found += 1;
            true
        } else {
            // bloom false positive
            self.seen.insert(hash);
            self.stats.unique_count += 1;
            false
        }
    }

    pub fn stats(&self) -> &StreamingStats {
        &self.stats
    }

    pub fn unique_count(&self) -> usize {
        self.seen.len()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.bloom.clear();
        self.stats = StreamingStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(texts: &[&str]) -> Vec<Document> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Document::new(format!("doc-{i}"), *t))
            .collect()
    }

    #[test]
    fn test_keep_first_order() {
        let dedup = ExactDeduplicator::new(ExactDedupConfig::default());
        let input = docs(&["A", "B", "A", "C", "B", "A"]);
        let result = dedup.deduplicate(&input);

        let texts: Vec<&str> = result.unique_documents.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B", "C"]);
        assert_eq!(result.original_indices, vec![0, 1, 3]);
        assert_eq!(result.duplicates_removed(), 3);
        assert_eq!(result.reduction_percentage(), 50.0);

        let mut sizes: Vec<usize> = result.duplicate_groups.iter().map(|g| g.len()).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![2, 3]);
    }

    #[test]
    fn test_keep_last_stays_in_input_order() {
        let dedup = ExactDeduplicator::new(ExactDedupConfig {
            keep: KeepPolicy::Last,
            ..Default::default()
        });
        let input = docs(&["A", "B", "A", "C"]);
        let result = dedup.deduplicate(&input);

        // Last "A" is at index 2; survivors re-sorted ascending
        assert_eq!(result.original_indices, vec![1, 2, 3]);
        let texts: Vec<&str> = result.unique_documents.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_idempotent() {
        let dedup = ExactDeduplicator::new(ExactDedupConfig::default());
        let input = docs(&["A", "B", "A", "C", "B"]);

        let first = dedup.deduplicate(&input);
        let second = dedup.deduplicate(&first.unique_documents);

        assert_eq!(second.unique_count(), first.unique_count());
        assert_eq!(second.duplicates_removed(), 0);
        assert!(second.duplicate_groups.is_empty());
        let a: Vec<&str> = first.unique_documents.iter().map(|d| d.text.as_str()).collect();
        let b: Vec<&str> = second.unique_documents.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unique_input_unchanged() {
        let dedup = ExactDeduplicator::new(ExactDedupConfig::default());
        let input = docs(&["x", "y", "z"]);
        let result = dedup.deduplicate(&input);
        assert_eq!(result.unique_count(), 3);
        assert_eq!(result.original_indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_batch() {
        let dedup = ExactDeduplicator::new(ExactDedupConfig::default());
        let result = dedup.deduplicate(&[]);
        assert_eq!(result.unique_count(), 0);
        assert_eq!(result.reduction_percentage(), 0.0);
    }

    #[test]
    fn test_all_algorithms_agree_on_groups() {
        for algorithm in [
            HashAlgorithm::Md5,
            HashAlgorithm::Sha1,
            HashAlgorithm::Sha256,
            HashAlgorithm::XxHash64,
        ] {
            let dedup = ExactDeduplicator::new(ExactDedupConfig {
                algorithm,
                ..Default::default()
            });
            let result = dedup.deduplicate(&docs(&["a", "a", "b"]));
            assert_eq!(result.unique_count(), 2, "algorithm {algorithm:?}");
        }
    }

    #[test]
    fn test_streaming_dedup() {
        let mut dedup = StreamingDeduplicator::with_capacity(HashAlgorithm::XxHash64, 100);

        assert!(!dedup.is_duplicate("hello"));
        assert!(dedup.is_duplicate("hello"));
        assert!(!dedup.is_duplicate("world"));

        let stats = dedup.stats();
        assert_eq!(stats.total_seen, 3);
        assert_eq!(stats.unique_count, 2);
        assert_eq!(stats.duplicates_found, 1);
    }

    #[test]
    fn test_streaming_bloom_mostly_misses_on_unique_input() {
        let mut dedup = StreamingDeduplicator::with_capacity(HashAlgorithm::XxHash64, 1000);
        for i in 0..100 {
            dedup.is_duplicate(&format!("unique line {i}"));
        }
        let stats = dedup.stats();
        assert_eq!(stats.unique_count, 100);
        assert!(stats.bloom_misses > 90);
    }

    #[test]
    fn test_streaming_clear() {
        let mut dedup = StreamingDeduplicator::new(HashAlgorithm::XxHash64);
        dedup.is_duplicate("a");
        assert_eq!(dedup.unique_count(), 1);
        dedup.clear();
        assert_eq!(dedup.unique_count(), 0);
        assert!(!dedup.is_duplicate("a"));
    }
}
