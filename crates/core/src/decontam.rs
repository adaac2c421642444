//! Benchmark decontamination via n-gram overlap
//!
//! Detects training documents that overlap evaluation benchmarks by
//! matching word n-grams against an ingested benchmark set. A bloom
//! filter sits in front of the exact set so that the common case (no
//! overlap) never touches the hash map.

use ahash::{AHashMap, AHashSet};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use xxhash_rust::xxh64::xxh64;

use crate::document::Document;
use crate::text::{generate_ngrams, NgramKind, TextNormalizer};
use crate::{Error, Result};

pub const DEFAULT_NGRAM_SIZE: usize = 13;
pub const MIN_NGRAM_SIZE: usize = 8;
pub const MAX_NGRAM_SIZE: usize = 50;

/// Maximum number of bloom hash functions
const MAX_BLOOM_HASHES: usize = 8;

/// Bloom filter over n-gram strings.
///
/// Sized for a target false-positive rate: `m = −n·ln p / (ln 2)²` bits
/// and `k = (m/n)·ln 2` hash functions (capped at 8). Guarantees no
/// false negatives.
pub struct NGramBloom {
    bits: Vec<u64>,
    num_bits: usize,
    seeds: [u64; MAX_BLOOM_HASHES],
    num_hashes: usize,
}

impl NGramBloom {
    /// Filter sized for `expected_items` at `fp_rate`.
    pub fn new(expected_items: usize, fp_rate: f64) -> Self {
        Self::with_seed(expected_items, fp_rate, 0x9e3779b97f4a7c15)
    }

    /// Filter with hash seeds drawn from a PRNG seeded with `seed`.
    pub fn with_seed(expected_items: usize, fp_rate: f64, seed: u64) -> Self {
        let n = expected_items.max(1) as f64;
        let p = fp_rate.clamp(1e-9, 0.5);

        let ln2 = std::f64::consts::LN_2;
        let num_bits = ((-n * p.ln()) / (ln2 * ln2)).ceil().max(64.0) as usize;
        let num_hashes = (((num_bits as f64 / n) * ln2).round() as usize).clamp(1, MAX_BLOOM_HASHES);

        let mut rng = StdRng::seed_from_u64(seed);
        let mut seeds = [0u64; MAX_BLOOM_HASHES];
        for s in &mut seeds {
            *s = rng.next_u64();
        }

        debug!(
            "NGramBloom: {} bits, {} hash functions for {} expected items",
            num_bits, num_hashes, expected_items
        );

        Self {
            bits: vec![0u64; (num_bits + 63) / 64],
            num_bits,
            seeds,
            num_hashes,
        }
    }

    fn positions<'a>(&'a self, item: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.seeds[..self.num_hashes]
            .iter()
            .map(move |&seed| (xxh64(item.as_bytes(), seed) % self.num_bits as u64) as usize)
    }

    pub fn add(&mut self, item: &str) {
        let positions: Vec<usize> = self.positions(item).collect();
        for pos in positions {
            self.bits[pos / 64] |= 1 << (pos % 64);
        }
    }

    /// True when `item` may have been added; false means definitely not.
    pub fn might_contain(&self, item: &str) -> bool {
        self.positions(item)
            .all(|pos| self.bits[pos / 64] >> (pos % 64) & 1 == 1)
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    pub fn clear(&mut self) {
        self.bits.fill(0);
    }
}

/// One benchmark n-gram found in a document
#[derive(Debug, Clone, PartialEq)]
pub struct ContaminationMatch {
    pub ngram: String,
    pub source_dataset: String,
    /// Index of the n-gram within the document's n-gram sequence
    pub position_in_document: usize,
    pub match_confidence: f64,
}

/// Per-document contamination assessment
#[derive(Debug, Clone, Default)]
pub struct ContaminationAssessment {
    pub is_contaminated: bool,
    pub matches: Vec<ContaminationMatch>,
    /// matched n-grams / n-grams checked
    pub contamination_score: f64,
    pub total_ngrams_checked: usize,
    /// Dataset with the most matches; ties broken by dataset name
    pub most_likely_source: Option<String>,
}

/// Configuration for benchmark decontamination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecontaminationConfig {
    /// Word n-gram size, clamped to [8, 50]
    pub ngram_size: usize,
    /// Fraction of contaminated n-grams at which a document is flagged
    pub contamination_threshold: f64,
    /// Minimum absolute match count required to flag (0 disables)
    pub min_matches_to_reject: usize,
    /// Stop scanning a document once this many matches are recorded
    pub max_matches_per_document: usize,
    pub lowercase: bool,
    pub strip_punctuation: bool,
    pub use_bloom_filter: bool,
    pub bloom_fp_rate: f64,
    /// Skip n-grams found in the common-phrase exclusion set
    pub exclude_common_phrases: bool,
    pub benchmark_files: Vec<String>,
    pub benchmark_directories: Vec<String>,
}

impl Default for DecontaminationConfig {
    fn default() -> Self {
        Self {
            ngram_size: DEFAULT_NGRAM_SIZE,
            contamination_threshold: 0.1,
            min_matches_to_reject: 1,
            max_matches_per_document: 100,
            lowercase: true,
            strip_punctuation: true,
            use_bloom_filter: true,
            bloom_fp_rate: 0.01,
            exclude_common_phrases: true,
            benchmark_files: Vec::new(),
            benchmark_directories: Vec::new(),
        }
    }
}

impl DecontaminationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.contamination_threshold) {
            return Err(Error::InvalidConfig(format!(
                "contamination threshold {} outside [0, 1]",
                self.contamination_threshold
            )));
        }
        if !(MIN_NGRAM_SIZE..=MAX_NGRAM_SIZE).contains(&self.ngram_size) {
            return Err(Error::InvalidConfig(format!(
                "ngram size {} outside [{MIN_NGRAM_SIZE}, {MAX_NGRAM_SIZE}]",
                self.ngram_size
            )));
        }
        Ok(())
    }

    fn normalizer(&self) -> TextNormalizer {
        TextNormalizer {
            lowercase: self.lowercase,
            strip_punctuation: self.strip_punctuation,
            collapse_whitespace: true,
            unicode_normalize: false,
        }
    }
}

/// Running statistics for a decontamination pass
#[derive(Debug, Clone, Default)]
pub struct DecontaminationStats {
    pub documents_processed: usize,
    pub contaminated_documents: usize,
    pub total_ngrams_checked: usize,
    pub matches_found: usize,
    pub contamination_by_dataset: HashMap<String, usize>,
    /// Benchmark files that could not be read (filter is degraded)
    pub missing_resources: usize,
}

impl DecontaminationStats {
    pub fn contamination_rate(&self) -> f64 {
        if self.documents_processed == 0 {
            0.0
        } else {
            self.contaminated_documents as f64 / self.documents_processed as f64
        }
    }
}

/// Benchmark decontamination filter.
///
/// Benchmark n-grams and the bloom filter are built during ingestion and
/// read-only afterwards; workers share the filter without synchronization
/// apart from the memo cache and stats.
pub struct DecontaminationFilter {
    config: DecontaminationConfig,
    normalizer: TextNormalizer,
    benchmark_ngrams: AHashSet<String>,
    ngram_to_dataset: AHashMap<String, String>,
    bloom: Option<NGramBloom>,
    common_phrases: AHashSet<String>,
    /// Per-document memo keyed by document id
    cache: RwLock<HashMap<String, ContaminationAssessment>>,
    stats: Mutex<DecontaminationStats>,
}

impl DecontaminationFilter {
    pub fn new(config: DecontaminationConfig) -> Result<Self> {
        config.validate()?;
        let normalizer = config.normalizer();
        let mut filter = Self {
            config,
            normalizer,
            benchmark_ngrams: AHashSet::new(),
            ngram_to_dataset: AHashMap::new(),
            bloom: None,
            common_phrases: AHashSet::new(),
            cache: RwLock::new(HashMap::new()),
            stats: Mutex::new(DecontaminationStats::default()),
        };
        filter.load_configured_benchmarks();
        Ok(filter)
    }

    fn load_configured_benchmarks(&mut self) {
        let files = self.config.benchmark_files.clone();
        let dirs = self.config.benchmark_directories.clone();
        for file in files {
            self.load_benchmark_file(Path::new(&file), None);
        }
        for dir in dirs {
            self.load_benchmark_directory(Path::new(&dir));
        }
        self.rebuild_bloom();
    }

    /// Ingest one benchmark file, one reference string per line.
    ///
    /// A missing or unreadable file logs a warning and marks the filter
    /// degraded instead of failing the run.
    pub fn load_benchmark_file(&mut self, path: &Path, dataset_name: Option<&str>) {
        let name = dataset_name
            .map(str::to_string)
            .unwrap_or_else(|| dataset_basename(path));

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                warn!("Skipping benchmark file {}: {}", path.display(), err);
                self.stats.lock().unwrap().missing_resources += 1;
                return;
            }
        };

        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let mut added = 0usize;
        for line in &lines {
            added += self.add_reference_line(line, &name);
        }
        info!(
            "Loaded benchmark '{}': {} lines, {} new n-grams",
            name,
            lines.len(),
            added
        );
    }

    /// Ingest every `.txt`, `.json`, or `.csv` file in a directory,
    /// keyed by file basename as dataset name.
    pub fn load_benchmark_directory(&mut self, dir: &Path) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Skipping benchmark directory {}: {}", dir.display(), err);
                self.stats.lock().unwrap().missing_resources += 1;
                return;
            }
        };

        let mut paths: Vec<_> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("txt") | Some("json") | Some("csv")
                )
            })
            .collect();
        paths.sort();

        for path in paths {
            self.load_benchmark_file(&path, None);
        }
    }

    /// Add benchmark n-grams generated from a single reference line.
    /// Returns the number of n-grams newly inserted.
    fn add_reference_line(&mut self, line: &str, dataset: &str) -> usize {
        let normalized = self.normalizer.normalize(line);
        let ngrams = generate_ngrams(&normalized, self.config.ngram_size, NgramKind::Word);
        let mut added = 0usize;
        for ngram in ngrams {
            if self.benchmark_ngrams.insert(ngram.clone()) {
                added += 1;
            }
            // first dataset to register an n-gram owns it
            self.ngram_to_dataset.entry(ngram).or_insert_with(|| dataset.to_string());
        }
        added
    }

    /// Add pre-built n-grams under a dataset name (used by tests and
    /// callers that ingest benchmarks themselves). Call
    /// [`Self::rebuild_bloom`] afterwards.
    pub fn add_benchmark_ngrams(&mut self, ngrams: &[String], dataset: &str) {
        for ngram in ngrams {
            self.benchmark_ngrams.insert(ngram.clone());
            self.ngram_to_dataset
                .entry(ngram.clone())
                .or_insert_with(|| dataset.to_string());
        }
    }

    /// Rebuild the bloom pre-filter over the current benchmark set.
    pub fn rebuild_bloom(&mut self) {
        if !self.config.use_bloom_filter || self.benchmark_ngrams.is_empty() {
            self.bloom = None;
            return;
        }
        let mut bloom = NGramBloom::new(self.benchmark_ngrams.len(), self.config.bloom_fp_rate);
        for ngram in &self.benchmark_ngrams {
            bloom.add(ngram);
        }
        self.bloom = Some(bloom);
    }

    /// Install the common-phrase exclusion set (normalized like the
    /// benchmark n-grams).
    pub fn set_common_phrases(&mut self, phrases: impl IntoIterator<Item = String>) {
        self.common_phrases = phrases
            .into_iter()
            .map(|p| self.normalizer.normalize(&p))
            .collect();
    }

    pub fn benchmark_ngram_count(&self) -> usize {
        self.benchmark_ngrams.len()
    }

    pub fn is_loaded(&self) -> bool {
        !self.benchmark_ngrams.is_empty()
    }

    /// Dataset names seen during ingestion, sorted.
    pub fn benchmark_datasets(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .ngram_to_dataset
            .values()
            .cloned()
            .collect::<AHashSet<_>>()
            .into_iter()
            .collect();
        names.sort();
        names
    }

    /// Assess one document. Results are memoized by document id.
    pub fn assess_document(&self, doc: &Document) -> ContaminationAssessment {
        if let Some(cached) = self.cache.read().unwrap().get(&doc.id) {
            return cached.clone();
        }

        let assessment = self.assess_text(&doc.text);

        {
            let mut stats = self.stats.lock().unwrap();
            stats.documents_processed += 1;
            stats.total_ngrams_checked += assessment.total_ngrams_checked;
            stats.matches_found += assessment.matches.len();
            if assessment.is_contaminated {
                stats.contaminated_documents += 1;
            }
            for m in &assessment.matches {
                *stats
                    .contamination_by_dataset
                    .entry(m.source_dataset.clone())
                    .or_insert(0) += 1;
            }
        }

        self.cache
            .write()
            .unwrap()
            .insert(doc.id.clone(), assessment.clone());
        assessment
    }

    /// Assess raw text without caching or stats updates.
    pub fn assess_text(&self, text: &str) -> ContaminationAssessment {
        let mut assessment = ContaminationAssessment::default();
        if self.benchmark_ngrams.is_empty() {
            return assessment;
        }

        let normalized = self.normalizer.normalize(text);
        let candidates = generate_ngrams(&normalized, self.config.ngram_size, NgramKind::Word);

        for (position, ngram) in candidates.iter().enumerate() {
            if assessment.matches.len() >= self.config.max_matches_per_document {
                break;
            }
            assessment.total_ngrams_checked += 1;

            if self.config.exclude_common_phrases && self.common_phrases.contains(ngram) {
                continue;
            }
            if let Some(bloom) = &self.bloom {
                if !bloom.might_contain(ngram) {
                    continue;
                }
            }
            if !self.benchmark_ngrams.contains(ngram) {
                continue; // bloom false positive
            }

            let dataset = self
                .ngram_to_dataset
                .get(ngram)
                .cloned()
                .unwrap_or_default();
            assessment.matches.push(ContaminationMatch {
                ngram: ngram.clone(),
                source_dataset: dataset,
                position_in_document: position,
                match_confidence: 1.0,
            });
        }

        if assessment.total_ngrams_checked > 0 {
            assessment.contamination_score =
                assessment.matches.len() as f64 / assessment.total_ngrams_checked as f64;
        }

        let enough_matches = self.config.min_matches_to_reject == 0
            || assessment.matches.len() >= self.config.min_matches_to_reject;
        assessment.is_contaminated = !assessment.matches.is_empty()
            && enough_matches
            && assessment.contamination_score >= self.config.contamination_threshold;

        assessment.most_likely_source = self.most_likely_source(&assessment.matches);
        assessment
    }

    /// Dataset with the most matches; ties resolved by dataset name so
    /// the answer is deterministic.
    fn most_likely_source(&self, matches: &[ContaminationMatch]) -> Option<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for m in matches {
            *counts.entry(m.source_dataset.as_str()).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(name, _)| name.to_string())
    }

    pub fn stats(&self) -> DecontaminationStats {
        self.stats.lock().unwrap().clone()
    }

    pub fn reset_stats(&self) {
        *self.stats.lock().unwrap() = DecontaminationStats::default();
        self.cache.write().unwrap().clear();
    }

    pub fn config(&self) -> &DecontaminationConfig {
        &self.config
    }
}

fn dataset_basename(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}
