//! Aggregate configuration for the filter pipeline

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::format::FormatFilterConfig;
use crate::gibberish::GibberishFilterConfig;
use crate::language::LanguageFilterConfig;
use crate::length::LengthFilterConfig;
use crate::license::LicenseFilterConfig;
use crate::metadata::MetadataFilterConfig;
use crate::model::ModelFilterConfig;
use crate::pii::PiiFilterConfig;
use crate::repetition::RepetitionFilterConfig;
use crate::toxicity::ToxicityFilterConfig;
use crate::{Error, Result};

/// Orchestration policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// First rejection terminates evaluation
    Strict,
    /// Sanitized text is forwarded; rejection still short-circuits
    Sanitize,
    /// Every filter runs; the final decision fuses their outputs
    #[default]
    Balanced,
}

/// Global configuration consumed by every filter's `configure`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurationConfig {
    pub length: LengthFilterConfig,
    pub gibberish: GibberishFilterConfig,
    pub repetition: RepetitionFilterConfig,
    pub format: FormatFilterConfig,
    pub metadata: MetadataFilterConfig,
    pub toxicity: ToxicityFilterConfig,
    pub pii: PiiFilterConfig,
    pub license: LicenseFilterConfig,
    pub model: ModelFilterConfig,
    pub language: LanguageFilterConfig,

    /// Per-filter fusion weights by filter name
    pub weights: HashMap<String, f64>,
    /// Danger level at which balanced mode rejects
    pub rejection_threshold: f64,
    /// A single rejection at or above this confidence always rejects
    pub critical_confidence: f64,
    /// Reject on any violation
    pub strict_mode: bool,
    /// Prefer sanitizing over rejecting
    pub sanitize_mode: bool,
    /// Disable a filter after this many consecutive neutral failures
    pub max_consecutive_filter_errors: usize,

    /// Documents per processing chunk
    pub chunk_size: usize,
    /// Worker threads; 0 uses available parallelism
    pub num_threads: usize,
}

impl Default for CurationConfig {
    fn default() -> Self {
        let weights = [
            ("length", 1.0),
            ("gibberish", 2.0),
            ("repetition", 1.5),
            ("format", 1.0),
            ("metadata", 1.2),
            ("toxicity", 3.0),
            ("pii", 1.5),
            ("license", 2.0),
            ("model_quality", 1.5),
            ("language", 1.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            length: LengthFilterConfig::default(),
            gibberish: GibberishFilterConfig::default(),
            repetition: RepetitionFilterConfig::default(),
            format: FormatFilterConfig::default(),
            metadata: MetadataFilterConfig::default(),
            toxicity: ToxicityFilterConfig::default(),
            pii: PiiFilterConfig::default(),
            license: LicenseFilterConfig::default(),
            model: ModelFilterConfig::default(),
            language: LanguageFilterConfig::default(),
            weights,
            rejection_threshold: 0.5,
            critical_confidence: 0.9,
            strict_mode: false,
            sanitize_mode: true,
            max_consecutive_filter_errors: 10,
            chunk_size: 1000,
            num_threads: 0,
        }
    }
}

impl CurationConfig {
    /// Demanding preset for high-quality corpora
    pub fn strict() -> Self {
        let mut config = Self::default();
        config.strict_mode = true;
        config.sanitize_mode = false;
        config.length.min_words = 20;
        config.length.min_chars = 100;
        config.gibberish.min_entropy = 2.5;
        config.repetition.max_line_repetition_ratio = 0.2;
        config.repetition.min_unique_word_ratio = 0.4;
        config.toxicity.toxicity_threshold = 0.5;
        config.license.strict_mode = true;
        config
    }

    /// Permissive preset for noisy crawls
    pub fn lenient() -> Self {
        let mut config = Self::default();
        config.length.min_words = 3;
        config.length.min_chars = 10;
        config.gibberish.min_entropy = 1.5;
        config.gibberish.max_symbol_ratio = 0.4;
        config.repetition.max_line_repetition_ratio = 0.5;
        config.repetition.min_unique_word_ratio = 0.2;
        config.rejection_threshold = 0.7;
        config
    }

    /// The orchestration policy implied by the mode flags
    pub fn mode(&self) -> PipelineMode {
        if self.strict_mode {
            PipelineMode::Strict
        } else if self.sanitize_mode {
            PipelineMode::Sanitize
        } else {
            PipelineMode::Balanced
        }
    }

    pub fn weight_for(&self, filter_name: &str) -> f64 {
        self.weights.get(filter_name).copied().unwrap_or(1.0)
    }

    /// Fail fast on configuration that cannot be run
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("rejection_threshold", self.rejection_threshold),
            ("critical_confidence", self.critical_confidence),
            ("toxicity_threshold", self.toxicity.toxicity_threshold),
            ("language.min_confidence", self.language.min_confidence),
            ("license.confidence_threshold", self.license.confidence_threshold),
            ("model.quality_threshold", self.model.quality_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!("{name} {value} outside [0, 1]")));
            }
        }
        if let Some((name, weight)) = self.weights.iter().find(|(_, w)| **w < 0.0) {
            return Err(Error::InvalidConfig(format!(
                "negative weight {weight} for filter {name}"
            )));
        }
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be positive".into()));
        }
        if self.length.min_words > self.length.max_words {
            return Err(Error::InvalidConfig(
                "length.min_words exceeds length.max_words".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validates() {
        assert!(CurationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_presets_validate() {
        assert!(CurationConfig::strict().validate().is_ok());
        assert!(CurationConfig::lenient().validate().is_ok());
        assert_eq!(CurationConfig::strict().mode(), PipelineMode::Strict);
    }

    #[test]
    fn test_mode_flags() {
        let mut config = CurationConfig::default();
        assert_eq!(config.mode(), PipelineMode::Sanitize);
        config.sanitize_mode = false;
        assert_eq!(config.mode(), PipelineMode::Balanced);
        config.strict_mode = true;
        assert_eq!(config.mode(), PipelineMode::Strict);
    }

    #[test]
    fn test_bad_threshold_fails_fast() {
        let config = CurationConfig {
            rejection_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_weight_fails() {
        let mut config = CurationConfig::default();
        config.weights.insert("length".to_string(), -1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_length_limits_fail() {
        let mut config = CurationConfig::default();
        config.length.min_words = 100;
        config.length.max_words = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_filter_weight_defaults_to_one() {
        let config = CurationConfig::default();
        assert_eq!(config.weight_for("nonexistent"), 1.0);
        assert_eq!(config.weight_for("toxicity"), 3.0);
    }
}
