//! Language identification and filtering
//!
//! The detector interface is pluggable: a statistical backend
//! (whatlang) plays the learned-classifier role, with a stopword-ratio
//! detector as the rule-based fallback when a requested model asset is
//! missing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;
use whatlang::detect;

use crate::config::CurationConfig;
use crate::decision::{FilterDecision, RejectReason};
use crate::{Filter, Result};
use rapidsift_core::text::split_words;
use rapidsift_core::Document;

/// Detection outcome: ISO 639-3 code plus confidence in [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageDetection {
    pub language: String,
    pub confidence: f64,
}

impl LanguageDetection {
    pub fn unknown() -> Self {
        Self {
            language: "und".to_string(),
            confidence: 0.0,
        }
    }
}

/// Pluggable language-identification backend
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> LanguageDetection;

    fn detect_batch(&self, texts: &[&str]) -> Vec<LanguageDetection> {
        texts.iter().map(|t| self.detect(t)).collect()
    }

    fn supported_languages(&self) -> Vec<String>;

    fn is_ready(&self) -> bool;
}

/// Statistical detector backed by whatlang
#[derive(Debug, Default)]
pub struct WhatlangDetector;

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> LanguageDetection {
        match detect(text) {
            Some(info) => LanguageDetection {
                language: info.lang().code().to_string(),
                confidence: info.confidence(),
            },
            None => LanguageDetection::unknown(),
        }
    }

    fn supported_languages(&self) -> Vec<String> {
        whatlang::Lang::all().iter().map(|l| l.code().to_string()).collect()
    }

    fn is_ready(&self) -> bool {
        true
    }
}

/// Stopword lists for the rule-based detector
fn stopword_table() -> Vec<(&'static str, &'static [&'static str])> {
    vec![
        ("eng", &["the", "and", "is", "of", "to", "in", "that", "it", "was", "for", "with", "are", "this", "have"] as &[&str]),
        ("spa", &["el", "la", "de", "que", "y", "en", "los", "del", "las", "por", "con", "una", "para", "es"]),
        ("fra", &["le", "la", "de", "et", "les", "des", "en", "un", "une", "du", "que", "est", "pour", "dans"]),
        ("deu", &["der", "die", "und", "in", "den", "von", "zu", "das", "mit", "sich", "des", "auf", "ist", "nicht"]),
        ("por", &["de", "a", "o", "que", "e", "do", "da", "em", "um", "para", "com", "uma", "os", "no"]),
        ("ita", &["di", "che", "la", "il", "un", "per", "in", "una", "sono", "con", "non", "le", "della", "questo"]),
        ("nld", &["de", "van", "het", "een", "en", "in", "is", "dat", "op", "te", "zijn", "voor", "met", "niet"]),
    ]
}

/// Rule-based detector scoring per-language stopword hit ratios.
///
/// Confidence is `min(1, 2·ratio)`: a text where half the tokens are
/// stopwords of one language is as confident as this detector gets.
pub struct StopwordDetector {
    stopwords: Vec<(&'static str, &'static [&'static str])>,
}

impl StopwordDetector {
    pub fn new() -> Self {
        Self {
            stopwords: stopword_table(),
        }
    }
}

impl Default for StopwordDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageDetector for StopwordDetector {
    fn detect(&self, text: &str) -> LanguageDetection {
        let words: Vec<String> = split_words(text).iter().map(|w| w.to_lowercase()).collect();
        if words.is_empty() {
            return LanguageDetection::unknown();
        }

        let mut best = LanguageDetection::unknown();
        for (language, stopwords) in &self.stopwords {
            let hits = words.iter().filter(|w| stopwords.contains(&w.as_str())).count();
            let ratio = hits as f64 / words.len() as f64;
            let confidence = (2.0 * ratio).min(1.0);
            if confidence > best.confidence {
                best = LanguageDetection {
                    language: language.to_string(),
                    confidence,
                };
            }
        }
        best
    }

    fn supported_languages(&self) -> Vec<String> {
        self.stopwords.iter().map(|(l, _)| l.to_string()).collect()
    }

    fn is_ready(&self) -> bool {
        true
    }
}

/// Build the configured detector, falling back silently to the
/// rule-based one when a requested model asset is missing.
pub fn load_detector(model_path: Option<&Path>) -> Box<dyn LanguageDetector> {
    match model_path {
        Some(path) if !path.exists() => {
            warn!(
                "Language model {} not found, using rule-based detector",
                path.display()
            );
            Box::new(StopwordDetector::new())
        }
        _ => Box::new(WhatlangDetector),
    }
}

/// Configuration for the language filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageFilterConfig {
    /// ISO 639-1 or 639-3 codes of languages to keep
    pub target_languages: Vec<String>,
    pub min_confidence: f64,
    pub min_text_length: usize,
    pub reject_mixed_scripts: bool,
    /// Optional external model asset for the learned detector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
}

impl Default for LanguageFilterConfig {
    fn default() -> Self {
        Self {
            target_languages: vec!["eng".to_string()],
            min_confidence: 0.65,
            min_text_length: 10,
            reject_mixed_scripts: true,
            model_path: None,
        }
    }
}

/// Normalize 639-1 codes to the 639-3 codes the detectors emit
fn normalize_language_code(code: &str) -> String {
    match code.to_lowercase().as_str() {
        "en" => "eng".into(),
        "es" => "spa".into(),
        "fr" => "fra".into(),
        "de" => "deu".into(),
        "pt" => "por".into(),
        "it" => "ita".into(),
        "nl" => "nld".into(),
        "ru" => "rus".into(),
        "ja" => "jpn".into(),
        "zh" => "cmn".into(),
        "ar" => "ara".into(),
        "hi" => "hin".into(),
        other => other.into(),
    }
}

/// Rough script classes for mixed-script detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Script {
    Latin,
    Cyrillic,
    Greek,
    Arabic,
    Han,
    Other,
}

fn script_of(c: char) -> Option<Script> {
    if !c.is_alphabetic() {
        return None;
    }
    let script = match c as u32 {
        0x0041..=0x024F => Script::Latin,
        0x0370..=0x03FF => Script::Greek,
        0x0400..=0x04FF => Script::Cyrillic,
        0x0600..=0x06FF => Script::Arabic,
        0x4E00..=0x9FFF | 0x3040..=0x30FF => Script::Han,
        _ => Script::Other,
    };
    Some(script)
}

/// True when at least two scripts each cover more than 20% of the
/// alphabetic characters.
pub fn has_mixed_scripts(text: &str) -> bool {
    let mut counts: HashMap<Script, usize> = HashMap::new();
    let mut total = 0usize;
    for c in text.chars() {
        if let Some(script) = script_of(c) {
            *counts.entry(script).or_insert(0) += 1;
            total += 1;
        }
    }
    if total == 0 {
        return false;
    }
    counts
        .values()
        .filter(|&&count| count as f64 / total as f64 > 0.2)
        .count()
        >= 2
}

/// Rejects documents outside the target language set
pub struct LanguageFilter {
    config: LanguageFilterConfig,
    targets: Vec<String>,
    detector: Box<dyn LanguageDetector>,
}

impl LanguageFilter {
    pub fn new(config: LanguageFilterConfig) -> Result<Self> {
        if config.target_languages.is_empty() {
            return Err(crate::Error::InvalidConfig(
                "at least one target language is required".into(),
            ));
        }
        if !(0.0..=1.0).contains(&config.min_confidence) {
            return Err(crate::Error::InvalidConfig(format!(
                "min_confidence {} outside [0, 1]",
                config.min_confidence
            )));
        }
        let targets = config
            .target_languages
            .iter()
            .map(|c| normalize_language_code(c))
            .collect();
        let detector = load_detector(config.model_path.as_deref().map(Path::new));
        Ok(Self {
            config,
            targets,
            detector,
        })
    }

    pub fn with_detector(mut self, detector: Box<dyn LanguageDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Detection with the length-adjusted confidence used for filtering
    pub fn detect_adjusted(&self, text: &str) -> LanguageDetection {
        let mut detection = self.detector.detect(text);
        let chars = text.chars().count();
        detection.confidence *= if chars < 20 {
            0.5
        } else if chars < 50 {
            0.7
        } else if chars < 100 {
            0.9
        } else {
            1.0
        };
        detection
    }
}

impl Filter for LanguageFilter {
    fn name(&self) -> &str {
        "language"
    }

    fn configure(&mut self, config: &CurationConfig) -> Result<()> {
        *self = Self::new(config.language.clone())?;
        Ok(())
    }

    fn evaluate(&self, doc: &Document) -> FilterDecision {
        if !self.detector.is_ready() {
            return FilterDecision::unknown("language detector not ready");
        }

        if doc.text.chars().count() < self.config.min_text_length {
            return FilterDecision::reject(
                RejectReason::Custom,
                0.8,
                format!(
                    "text below {} chars, too short for language detection",
                    self.config.min_text_length
                ),
            );
        }

        if self.config.reject_mixed_scripts && has_mixed_scripts(&doc.text) {
            return FilterDecision::reject(RejectReason::Custom, 0.7, "mixed scripts");
        }

        let detection = self.detect_adjusted(&doc.text);
        let decision = if !self.targets.contains(&detection.language) {
            FilterDecision::reject(
                RejectReason::Custom,
                detection.confidence.max(0.5),
                format!("language {} not targeted", detection.language),
            )
        } else if detection.confidence < self.config.min_confidence {
            FilterDecision::reject(
                RejectReason::Custom,
                1.0 - detection.confidence,
                format!(
                    "confidence {:.2} below {:.2} for {}",
                    detection.confidence, self.config.min_confidence, detection.language
                ),
            )
        } else {
            FilterDecision::keep(
                detection.confidence,
                format!("language {} ({:.2})", detection.language, detection.confidence),
            )
        };

        decision.with_metric("language_confidence", detection.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::FilterResult;

    const ENGLISH: &str = "The committee met on Tuesday to discuss the annual budget, and \
                           most of the members agreed that the proposal was reasonable.";
    const SPANISH: &str = "El comité se reunió el martes para discutir el presupuesto anual, \
                           y la mayoría de los miembros estuvo de acuerdo con la propuesta.";

    #[test]
    fn test_whatlang_detects_english() {
        let detector = WhatlangDetector;
        let detection = detector.detect(ENGLISH);
        assert_eq!(detection.language, "eng");
        assert!(detection.confidence > 0.5);
    }

    #[test]
    fn test_stopword_detector() {
        let detector = StopwordDetector::new();
        assert_eq!(detector.detect(ENGLISH).language, "eng");
        assert_eq!(detector.detect(SPANISH).language, "spa");
        assert_eq!(detector.detect("").language, "und");
    }

    #[test]
    fn test_stopword_confidence_formula() {
        let detector = StopwordDetector::new();
        // 4 of 8 tokens are English stopwords: ratio 0.5, confidence 1.0
        let detection = detector.detect("the cat and the dog is in trouble");
        assert_eq!(detection.language, "eng");
        assert!(detection.confidence > 0.9);
    }

    #[test]
    fn test_missing_model_falls_back() {
        let detector = load_detector(Some(Path::new("/nonexistent/lid.bin")));
        // the fallback detector still works
        assert_eq!(detector.detect(ENGLISH).language, "eng");
    }

    #[test]
    fn test_english_kept_spanish_rejected() {
        let filter = LanguageFilter::new(LanguageFilterConfig::default()).unwrap();

        assert_eq!(
            filter.evaluate(&Document::new("a", ENGLISH)).result,
            FilterResult::Keep
        );
        assert_eq!(
            filter.evaluate(&Document::new("b", SPANISH)).result,
            FilterResult::Reject
        );
    }

    #[test]
    fn test_two_letter_codes_accepted() {
        let filter = LanguageFilter::new(LanguageFilterConfig {
            target_languages: vec!["en".to_string()],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            filter.evaluate(&Document::new("a", ENGLISH)).result,
            FilterResult::Keep
        );
    }

    #[test]
    fn test_short_text_rejected() {
        let filter = LanguageFilter::new(LanguageFilterConfig::default()).unwrap();
        let decision = filter.evaluate(&Document::new("a", "Hi"));
        assert_eq!(decision.result, FilterResult::Reject);
        assert!(decision.details.contains("too short"));
    }

    #[test]
    fn test_length_adjustment() {
        let filter = LanguageFilter::new(LanguageFilterConfig::default()).unwrap();
        // 30-ish chars: raw confidence is scaled by 0.7
        let short = filter.detect_adjusted("The cat sat on the warm mat.");
        let long = filter.detect_adjusted(ENGLISH);
        assert!(short.confidence < long.confidence);
    }

    #[test]
    fn test_mixed_scripts() {
        assert!(has_mixed_scripts("hello world привет мир hello мир"));
        assert!(!has_mixed_scripts("hello world entirely latin text"));
        assert!(!has_mixed_scripts("12345 67890"));

        let filter = LanguageFilter::new(LanguageFilterConfig::default()).unwrap();
        let decision =
            filter.evaluate(&Document::new("a", "hello world привет мир hello мир again"));
        assert_eq!(decision.result, FilterResult::Reject);
        assert!(decision.details.contains("mixed scripts"));
    }

    #[test]
    fn test_mixed_scripts_allowed_when_configured() {
        let filter = LanguageFilter::new(LanguageFilterConfig {
            reject_mixed_scripts: false,
            min_confidence: 0.0,
            ..Default::default()
        })
        .unwrap();
        let decision =
            filter.evaluate(&Document::new("a", "hello world привет мир hello мир again"));
        // evaluated on language alone
        assert_ne!(decision.details, "mixed scripts");
    }

    #[test]
    fn test_empty_targets_rejected() {
        assert!(LanguageFilter::new(LanguageFilterConfig {
            target_languages: vec![],
            ..Default::default()
        })
        .is_err());
    }
}
