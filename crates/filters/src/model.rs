//! Model-based quality filtering
//!
//! A `QualityModel` is a pluggable scoring backend with an explicit
//! load/unload lifecycle. Built-in statistical stand-ins cover runs
//! where no external model file is wired up; models that are not ready
//! refuse to run and the filter reports a neutral decision.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::config::CurationConfig;
use crate::decision::{FilterDecision, RejectReason};
use crate::{Filter, Result};
use rapidsift_core::hashing::fingerprint;
use rapidsift_core::text::{character_entropy, split_words};
use rapidsift_core::Document;

/// Number of cache shards; keyed by `text_hash mod N`
const CACHE_SHARDS: usize = 16;

/// Prediction from one quality model
#[derive(Debug, Clone)]
pub struct QualityPrediction {
    /// 0.0 (junk) to 1.0 (high quality)
    pub quality_score: f64,
    pub confidence: f64,
    pub perplexity: Option<f64>,
    pub model_name: String,
    pub feature_scores: HashMap<String, f64>,
}

/// Scoring backend contract
pub trait QualityModel: Send + Sync {
    fn predict(&self, text: &str) -> QualityPrediction;
    fn name(&self) -> &str;
    /// Models refuse to run until loaded
    fn is_ready(&self) -> bool;
    fn load(&self) -> Result<()>;
    fn unload(&self);
}

/// Perplexity-style language model.
///
/// The built-in scorer derives a pseudo-perplexity from the per-word
/// entropy of the text; an external model file can be named, and a
/// missing file leaves the model unloaded.
pub struct PerplexityLm {
    model_path: Option<PathBuf>,
    max_perplexity: f64,
    ready: AtomicBool,
}

impl PerplexityLm {
    pub fn new(model_path: Option<PathBuf>, max_perplexity: f64) -> Self {
        Self {
            model_path,
            max_perplexity,
            ready: AtomicBool::new(false),
        }
    }
}

impl QualityModel for PerplexityLm {
    fn name(&self) -> &str {
        "perplexity_lm"
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    fn load(&self) -> Result<()> {
        if let Some(path) = &self.model_path {
            if !path.exists() {
                warn!("Perplexity model file {} not found", path.display());
                return Err(crate::Error::MissingResource(format!(
                    "perplexity model {}",
                    path.display()
                )));
            }
        }
        self.ready.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn unload(&self) {
        self.ready.store(false, Ordering::Relaxed);
    }

    fn predict(&self, text: &str) -> QualityPrediction {
        // pseudo-perplexity: exponential of the byte entropy, damped by
        // mean word length so prose lands in a plausible 10-60 band
        let entropy = character_entropy(text);
        let words = split_words(text);
        let avg_word_len = if words.is_empty() {
            0.0
        } else {
            words.iter().map(|w| w.len()).sum::<usize>() as f64 / words.len() as f64
        };
        let perplexity = (entropy * 1.4).exp2() / (1.0 + avg_word_len / 10.0);
        let quality = (1.0 - perplexity / self.max_perplexity).clamp(0.0, 1.0);

        let mut feature_scores = HashMap::new();
        feature_scores.insert("entropy".to_string(), entropy);
        feature_scores.insert("avg_word_len".to_string(), avg_word_len);

        QualityPrediction {
            quality_score: quality,
            confidence: 0.7,
            perplexity: Some(perplexity),
            model_name: self.name().to_string(),
            feature_scores,
        }
    }
}

/// FastText-style linear classifier stand-in
pub struct FastTextQuality {
    ready: AtomicBool,
}

impl FastTextQuality {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
        }
    }
}

impl Default for FastTextQuality {
    fn default() -> Self {
        Self::new()
    }
}

impl QualityModel for FastTextQuality {
    fn name(&self) -> &str {
        "fasttext_quality"
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    fn load(&self) -> Result<()> {
        self.ready.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn unload(&self) {
        self.ready.store(false, Ordering::Relaxed);
    }

    fn predict(&self, text: &str) -> QualityPrediction {
        let words = split_words(text);
        let unique: std::collections::HashSet<String> =
            words.iter().map(|w| w.to_lowercase()).collect();
        let diversity = if words.is_empty() {
            0.0
        } else {
            unique.len() as f64 / words.len() as f64
        };
        let length_score = (words.len() as f64 / 100.0).min(1.0);
        let quality = (0.6 * diversity + 0.4 * length_score).clamp(0.0, 1.0);

        let mut feature_scores = HashMap::new();
        feature_scores.insert("diversity".to_string(), diversity);
        feature_scores.insert("length_score".to_string(), length_score);

        QualityPrediction {
            quality_score: quality,
            confidence: 0.6,
            perplexity: None,
            model_name: self.name().to_string(),
            feature_scores,
        }
    }
}

/// Transformer-classifier stand-in with sentence-structure features
pub struct BertQuality {
    ready: AtomicBool,
}

impl BertQuality {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
        }
    }
}

impl Default for BertQuality {
    fn default() -> Self {
        Self::new()
    }
}

impl QualityModel for BertQuality {
    fn name(&self) -> &str {
        "bert_quality"
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    fn load(&self) -> Result<()> {
        self.ready.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn unload(&self) {
        self.ready.store(false, Ordering::Relaxed);
    }

    fn predict(&self, text: &str) -> QualityPrediction {
        let sentences = text
            .split(['.', '!', '?'])
            .filter(|s| !s.trim().is_empty())
            .count();
        let words = split_words(text).len();
        let words_per_sentence = if sentences == 0 {
            0.0
        } else {
            words as f64 / sentences as f64
        };
        // prose typically runs 10-30 words per sentence
        let structure = if (5.0..=40.0).contains(&words_per_sentence) {
            1.0 - (words_per_sentence - 17.5).abs() / 35.0
        } else {
            0.2
        };
        let quality = structure.clamp(0.0, 1.0);

        let mut feature_scores = HashMap::new();
        feature_scores.insert("words_per_sentence".to_string(), words_per_sentence);

        QualityPrediction {
            quality_score: quality,
            confidence: 0.8,
            perplexity: None,
            model_name: self.name().to_string(),
            feature_scores,
        }
    }
}

/// How multiple models combine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFilterMode {
    /// Weighted average of every model's score
    #[default]
    Ensemble,
    /// Run models in order with per-stage rejection thresholds
    MultiStage,
}

/// Configuration for the model-quality filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFilterConfig {
    pub mode: ModelFilterMode,
    /// Minimum fused score to keep (ensemble mode)
    pub quality_threshold: f64,
    /// Per-stage rejection thresholds (multi-stage mode, in model order)
    pub stage_thresholds: Vec<f64>,
    pub short_circuit: bool,
    /// Per-model weights by model name
    pub model_weights: HashMap<String, f64>,
    /// Inputs are truncated to this many characters
    pub max_sequence_length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perplexity_model_path: Option<PathBuf>,
    pub max_perplexity: f64,
}

impl Default for ModelFilterConfig {
    fn default() -> Self {
        let mut model_weights = HashMap::new();
        model_weights.insert("perplexity_lm".to_string(), 1.0);
        model_weights.insert("fasttext_quality".to_string(), 1.5);
        model_weights.insert("bert_quality".to_string(), 2.0);
        Self {
            mode: ModelFilterMode::Ensemble,
            quality_threshold: 0.3,
            stage_thresholds: vec![0.3, 0.7],
            short_circuit: true,
            model_weights,
            max_sequence_length: 512,
            perplexity_model_path: None,
            max_perplexity: 50.0,
        }
    }
}

type CacheShard = Mutex<HashMap<(u64, String), QualityPrediction>>;

/// Composes quality models in ensemble or multi-stage mode
pub struct ModelQualityFilter {
    config: ModelFilterConfig,
    models: Vec<Box<dyn QualityModel>>,
    /// `(text_hash, model_name)` memo, sharded by `text_hash mod N`
    cache: Vec<CacheShard>,
}

impl ModelQualityFilter {
    pub fn new(config: ModelFilterConfig) -> Self {
        let models: Vec<Box<dyn QualityModel>> = vec![
            Box::new(PerplexityLm::new(
                config.perplexity_model_path.clone(),
                config.max_perplexity,
            )),
            Box::new(FastTextQuality::new()),
            Box::new(BertQuality::new()),
        ];
        let cache = (0..CACHE_SHARDS).map(|_| Mutex::new(HashMap::new())).collect();
        Self {
            config,
            models,
            cache,
        }
    }

    /// Replace the model roster (used to wire real external backends).
    pub fn with_models(mut self, models: Vec<Box<dyn QualityModel>>) -> Self {
        self.models = models;
        self
    }

    /// Load every model; failures leave that model unloaded and the
    /// filter degraded rather than failing the run.
    pub fn load_models(&self) -> usize {
        let mut loaded = 0usize;
        for model in &self.models {
            match model.load() {
                Ok(()) => loaded += 1,
                Err(err) => warn!("Model {} failed to load: {}", model.name(), err),
            }
        }
        loaded
    }

    pub fn unload_models(&self) {
        for model in &self.models {
            model.unload();
        }
    }

    fn cached_predict(&self, model: &dyn QualityModel, text: &str) -> QualityPrediction {
        let hash = fingerprint(text);
        let shard = &self.cache[(hash as usize) % CACHE_SHARDS];
        let key = (hash, model.name().to_string());

        if let Some(hit) = shard.lock().unwrap().get(&key) {
            debug!("Prediction cache hit for model {}", model.name());
            return hit.clone();
        }
        let prediction = model.predict(text);
        shard.lock().unwrap().insert(key, prediction.clone());
        prediction
    }

    fn weight_for(&self, model_name: &str) -> f64 {
        self.config.model_weights.get(model_name).copied().unwrap_or(1.0)
    }
}

impl Filter for ModelQualityFilter {
    fn name(&self) -> &str {
        "model_quality"
    }

    fn configure(&mut self, config: &CurationConfig) -> Result<()> {
        *self = Self::new(config.model.clone());
        self.load_models();
        Ok(())
    }

    fn evaluate(&self, doc: &Document) -> FilterDecision {
        let ready: Vec<&Box<dyn QualityModel>> =
            self.models.iter().filter(|m| m.is_ready()).collect();
        if ready.is_empty() {
            return FilterDecision::unknown("no quality model is loaded");
        }

        let text: String = doc.text.chars().take(self.config.max_sequence_length).collect();

        match self.config.mode {
            ModelFilterMode::MultiStage => {
                let mut last = None;
                for (stage, model) in ready.iter().enumerate() {
                    let prediction = self.cached_predict(model.as_ref(), &text);
                    let threshold = self
                        .config
                        .stage_thresholds
                        .get(stage)
                        .copied()
                        .unwrap_or(self.config.quality_threshold);

                    if self.config.short_circuit && prediction.quality_score < threshold {
                        return FilterDecision::reject(
                            RejectReason::Custom,
                            prediction.confidence,
                            format!(
                                "stage {} ({}) score {:.2} below {:.2}",
                                stage,
                                prediction.model_name,
                                prediction.quality_score,
                                threshold
                            ),
                        )
                        .with_metric("model_score", prediction.quality_score);
                    }
                    last = Some(prediction);
                }
                let prediction = last.expect("at least one ready model ran");
                FilterDecision::keep(
                    prediction.quality_score,
                    format!("all stages passed ({})", prediction.model_name),
                )
                .with_metric("model_score", prediction.quality_score)
            }
            ModelFilterMode::Ensemble => {
                let mut weighted_sum = 0.0;
                let mut weight_total = 0.0;
                let mut decision_metrics: Vec<(String, f64)> = Vec::new();
                let mut perplexity = None;

                for model in &ready {
                    let prediction = self.cached_predict(model.as_ref(), &text);
                    let weight = self.weight_for(&prediction.model_name) * prediction.confidence;
                    weighted_sum += weight * prediction.quality_score;
                    weight_total += weight;
                    decision_metrics.push((
                        format!("score_{}", prediction.model_name),
                        prediction.quality_score,
                    ));
                    if prediction.perplexity.is_some() {
                        perplexity = prediction.perplexity;
                    }
                }

                let fused = if weight_total > 0.0 {
                    weighted_sum / weight_total
                } else {
                    0.0
                };

                let mut decision = if fused < self.config.quality_threshold {
                    FilterDecision::reject(
                        RejectReason::Custom,
                        1.0 - fused,
                        format!(
                            "ensemble score {fused:.2} below {:.2}",
                            self.config.quality_threshold
                        ),
                    )
                } else {
                    FilterDecision::keep(fused, format!("ensemble score {fused:.2}"))
                };

                for (name, value) in decision_metrics {
                    decision.metrics.insert(name, value);
                }
                decision.metrics.insert("model_score".to_string(), fused);
                if let Some(p) = perplexity {
                    decision.metrics.insert("perplexity".to_string(), p);
                }
                decision
            }
        }
    }
}
