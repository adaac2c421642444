//! Pattern-based toxicity scoring
//!
//! Each category carries a compiled pattern list; category scores use
//! match-count smoothing and a context modifier for medical,
//! educational, news, and legal text. Toxicity violations reject
//! outright; sanitization is not attempted.

use regex::Regex;
use rustrict::CensorStr;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::CurationConfig;
use crate::decision::{FilterDecision, RejectReason, ToxicityCategory};
use crate::{Filter, Result};
use rapidsift_core::Document;

/// Smoothing constant: score = matches / (matches + K)
const SMOOTHING_K: f64 = 1.0;

/// Configuration for the toxicity filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToxicityFilterConfig {
    pub toxicity_threshold: f64,
    pub hate_speech_threshold: f64,
    pub nsfw_threshold: f64,
    pub violence_threshold: f64,
    pub harassment_threshold: f64,
    /// Halve category scores in recognized professional contexts
    pub context_aware: bool,
    /// Use the profanity lexicon as an additional signal
    pub use_profanity_lexicon: bool,
    /// Extra patterns per category, merged with the built-ins at
    /// configure time
    pub extra_patterns: HashMap<String, Vec<String>>,
}

impl Default for ToxicityFilterConfig {
    fn default() -> Self {
        Self {
            toxicity_threshold: 0.7,
            hate_speech_threshold: 0.8,
            nsfw_threshold: 0.8,
            violence_threshold: 0.7,
            harassment_threshold: 0.6,
            context_aware: true,
            use_profanity_lexicon: true,
            extra_patterns: HashMap::new(),
        }
    }
}

impl ToxicityFilterConfig {
    fn threshold_for(&self, category: ToxicityCategory) -> f64 {
        match category {
            ToxicityCategory::HateSpeech => self.hate_speech_threshold,
            ToxicityCategory::Harassment => self.harassment_threshold,
            ToxicityCategory::NsfwSexual | ToxicityCategory::NsfwGore => self.nsfw_threshold,
            ToxicityCategory::Violence | ToxicityCategory::Threat => self.violence_threshold,
            ToxicityCategory::Profanity | ToxicityCategory::Spam => self.toxicity_threshold,
        }
    }
}

const CONTEXT_MARKERS: &[&str] = &[
    // medical
    "diagnosis", "patient", "clinical", "symptom", "treatment",
    // educational
    "curriculum", "textbook", "lecture", "research shows", "study found",
    // news
    "according to police", "reported that", "press release", "spokesperson",
    // legal
    "pursuant to", "plaintiff", "defendant", "statute",
];

fn builtin_patterns() -> Vec<(ToxicityCategory, Vec<&'static str>)> {
    vec![
        (
            ToxicityCategory::HateSpeech,
            vec![
                r"(?i)\ball \w+ (?:people|folks) (?:are|should) (?:be )?(?:banned|removed|eliminated)",
                r"(?i)\bgo back to (?:your|their) country\b",
                r"(?i)\b(?:sub|in)human (?:scum|filth)\b",
            ],
        ),
        (
            ToxicityCategory::Harassment,
            vec![
                r"(?i)\byou(?:'re| are) (?:worthless|pathetic|disgusting|an idiot)\b",
                r"(?i)\bnobody (?:likes|wants) you\b",
                r"(?i)\bkill yourself\b",
            ],
        ),
        (
            ToxicityCategory::Violence,
            vec![
                r"(?i)\b(?:beat|stab|shoot|strangle)(?:ing|ed)? (?:him|her|them|you)\b",
                r"(?i)\bdeserves? to (?:die|suffer)\b",
            ],
        ),
        (
            ToxicityCategory::Threat,
            vec![
                r"(?i)\bi(?:'ll| will) (?:kill|hurt|find|destroy) you\b",
                r"(?i)\bwatch your back\b",
                r"(?i)\byou(?:'ll| will) (?:regret|pay for) (?:this|it)\b",
            ],
        ),
        (
            ToxicityCategory::NsfwSexual,
            vec![
                r"(?i)\bexplicit (?:sexual|adult) content\b",
                r"(?i)\b(?:hardcore|amateur) porn\b",
                r"(?i)\bxxx videos?\b",
            ],
        ),
        (
            ToxicityCategory::NsfwGore,
            vec![
                r"(?i)\b(?:graphic|gory) (?:violence|footage)\b",
                r"(?i)\bdismember(?:ed|ment)\b",
            ],
        ),
        (
            ToxicityCategory::Spam,
            vec![
                r"(?i)\bbuy now\b.{0,40}\blimited (?:time )?offer\b",
                r"(?i)\bclick here to claim\b",
                r"(?i)\bcongratulations,? you(?:'ve| have) won\b",
            ],
        ),
    ]
}

/// Rejects documents whose category scores exceed the configured
/// thresholds
pub struct ToxicityFilter {
    config: ToxicityFilterConfig,
    patterns: Vec<(ToxicityCategory, Vec<Regex>)>,
}

impl ToxicityFilter {
    pub fn new(config: ToxicityFilterConfig) -> Result<Self> {
        let mut patterns: Vec<(ToxicityCategory, Vec<Regex>)> = Vec::new();
        for (category, raw) in builtin_patterns() {
            let mut compiled: Vec<Regex> = raw
                .iter()
                .map(|p| Ok(Regex::new(p)?))
                .collect::<Result<Vec<_>>>()?;
            if let Some(extra) = config.extra_patterns.get(category.as_str()) {
                for p in extra {
                    compiled.push(Regex::new(p)?);
                }
            }
            patterns.push((category, compiled));
        }
        Ok(Self { config, patterns })
    }

    fn in_professional_context(text: &str) -> bool {
        let lower = text.to_lowercase();
        CONTEXT_MARKERS.iter().any(|m| lower.contains(m))
    }

    /// Per-category scores in [0, 1)
    fn category_scores(&self, text: &str) -> HashMap<ToxicityCategory, f64> {
        let context_modifier = if self.config.context_aware && Self::in_professional_context(text) {
            0.5
        } else {
            1.0
        };

        let mut scores = HashMap::new();
        for (category, patterns) in &self.patterns {
            let matches: usize = patterns.iter().map(|p| p.find_iter(text).count()).sum();
            if matches > 0 {
                let score = matches as f64 / (matches as f64 + SMOOTHING_K) * context_modifier;
                scores.insert(*category, score);
            }
        }

        if self.config.use_profanity_lexicon && text.is_inappropriate() {
            let entry = scores.entry(ToxicityCategory::Profanity).or_insert(0.0);
            // lexicon hit counts as two pattern matches
            let boosted = 2.0 / (2.0 + SMOOTHING_K) * context_modifier;
            *entry = entry.max(boosted);
        }

        scores
    }
}

impl Default for ToxicityFilter {
    fn default() -> Self {
        Self::new(ToxicityFilterConfig::default()).expect("builtin patterns compile")
    }
}

impl Filter for ToxicityFilter {
    fn name(&self) -> &str {
        "toxicity"
    }

    fn configure(&mut self, config: &CurationConfig) -> Result<()> {
        *self = Self::new(config.toxicity.clone())?;
        Ok(())
    }

    fn evaluate(&self, doc: &Document) -> FilterDecision {
        let scores = self.category_scores(&doc.text);
        let overall = scores.values().copied().fold(0.0f64, f64::max);

        let mut violating: Vec<ToxicityCategory> = scores
            .iter()
            .filter(|(category, score)| **score >= self.config.threshold_for(**category))
            .map(|(category, _)| *category)
            .collect();
        violating.sort_by_key(|c| c.as_str());

        let mut decision = if violating.is_empty() {
            FilterDecision::keep(1.0 - overall, format!("max category score {overall:.2}"))
        } else {
            let reason = match violating[0] {
                ToxicityCategory::HateSpeech => RejectReason::HateSpeech,
                ToxicityCategory::NsfwSexual | ToxicityCategory::NsfwGore => {
                    RejectReason::NsfwContent
                }
                _ => RejectReason::ToxicityHigh,
            };
            let names: Vec<&str> = violating.iter().map(|c| c.as_str()).collect();
            let mut d = FilterDecision::reject(
                reason,
                overall,
                format!("category thresholds exceeded: {}", names.join(", ")),
            );
            d.toxicity_categories = violating;
            d
        };

        for (category, score) in &scores {
            decision
                .metrics
                .insert(format!("toxicity_{}", category.as_str()), *score);
        }
        decision.metrics.insert("toxicity_overall".to_string(), overall);
        decision
    }
}
