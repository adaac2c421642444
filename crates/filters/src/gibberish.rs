//! Gibberish detection
//!
//! Statistical heuristics over character distributions: ratios, entropy,
//! character runs, vowel balance, and word-shape sanity checks.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::CurationConfig;
use crate::decision::{FilterDecision, RejectReason};
use crate::{Filter, Result};
use rapidsift_core::text::{
    alpha_ratio, character_entropy, char_frequencies, digit_ratio, longest_char_run, split_words,
    symbol_ratio,
};
use rapidsift_core::Document;

/// Configuration for the gibberish filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GibberishFilterConfig {
    pub max_non_alpha_ratio: f64,
    pub max_digit_ratio: f64,
    pub max_symbol_ratio: f64,
    /// Maximum frequency of the single most common character
    pub max_repetition_ratio: f64,
    /// Longest tolerated run of one repeated character. Raise for
    /// languages with long compounds.
    pub max_consecutive_chars: usize,
    pub min_entropy: f64,
    /// Extra rejection patterns, compiled at configure time. The
    /// default set flags unbroken letter strings and keyboard mashing;
    /// override the list to relax either.
    pub gibberish_patterns: Vec<String>,
}

impl Default for GibberishFilterConfig {
    fn default() -> Self {
        Self {
            max_non_alpha_ratio: 0.3,
            max_digit_ratio: 0.5,
            max_symbol_ratio: 0.2,
            max_repetition_ratio: 0.3,
            max_consecutive_chars: 50,
            min_entropy: 2.0,
            gibberish_patterns: vec![
                "[A-Za-z]{50,}".to_string(),
                "(?i)(qwerty|asdfgh|zxcvbn)".to_string(),
            ],
        }
    }
}

/// Rejects text whose character statistics do not look like language
pub struct GibberishFilter {
    config: GibberishFilterConfig,
    patterns: Vec<Regex>,
}

impl GibberishFilter {
    pub fn new(config: GibberishFilterConfig) -> Result<Self> {
        let patterns = compile_patterns(&config.gibberish_patterns)?;
        Ok(Self { config, patterns })
    }
}

impl Default for GibberishFilter {
    fn default() -> Self {
        Self::new(GibberishFilterConfig::default()).expect("default patterns compile")
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns.iter().map(|p| Ok(Regex::new(p)?)).collect()
}

impl Filter for GibberishFilter {
    fn name(&self) -> &str {
        "gibberish"
    }

    fn configure(&mut self, config: &CurationConfig) -> Result<()> {
        self.config = config.gibberish.clone();
        self.patterns = compile_patterns(&self.config.gibberish_patterns)?;
        Ok(())
    }

    fn evaluate(&self, doc: &Document) -> FilterDecision {
        let text = &doc.text;
        let mut violations: Vec<String> = Vec::new();

        let alpha = alpha_ratio(text);
        let digit = digit_ratio(text);
        let symbol = symbol_ratio(text);
        let entropy = character_entropy(text);
        let longest_run = longest_char_run(text);

        let repetition = if text.is_empty() {
            0.0
        } else {
            let max_freq = char_frequencies(text).into_values().max().unwrap_or(0);
            max_freq as f64 / text.chars().count() as f64
        };

        if !text.is_empty() && alpha < 1.0 - self.config.max_non_alpha_ratio {
            violations.push(format!("low alphabetic ratio ({alpha:.2})"));
        }
        if digit > self.config.max_digit_ratio {
            violations.push(format!("high digit ratio ({digit:.2})"));
        }
        if symbol > self.config.max_symbol_ratio {
            violations.push(format!("high symbol ratio ({symbol:.2})"));
        }
        if repetition > self.config.max_repetition_ratio {
            violations.push("excessive character repetition".to_string());
        }
        if longest_run > self.config.max_consecutive_chars {
            violations.push("long consecutive character runs".to_string());
        }
        if !text.is_empty() && entropy < self.config.min_entropy {
            violations.push(format!("low entropy ({entropy:.2} bits)"));
        }
        for pattern in &self.patterns {
            if pattern.is_match(text) {
                violations.push(format!("matched gibberish pattern {}", pattern.as_str()));
                break;
            }
        }

        // vowel/consonant balance
        let (vowels, consonants) = vowel_consonant_counts(text);
        if vowels + consonants > 0 {
            let ratio = if consonants == 0 {
                f64::INFINITY
            } else {
                vowels as f64 / consonants as f64
            };
            if !(0.1..=2.0).contains(&ratio) {
                violations.push(format!("vowel/consonant ratio out of range ({ratio:.2})"));
            }
        }

        // word-shape sanity
        let words = split_words(text);
        if !words.is_empty() {
            let avg_len =
                words.iter().map(|w| w.chars().count()).sum::<usize>() as f64 / words.len() as f64;
            if !(2.0..=15.0).contains(&avg_len) {
                violations.push(format!("average word length out of range ({avg_len:.1})"));
            }
            let long_fraction = words.iter().filter(|w| w.chars().count() > 20).count() as f64
                / words.len() as f64;
            if long_fraction > 0.1 {
                violations.push(format!("too many very long words ({long_fraction:.2})"));
            }
        }

        let decision = if violations.is_empty() {
            FilterDecision::keep(0.9, "character statistics look natural")
        } else {
            let confidence = (0.5 + 0.1 * violations.len() as f64).min(0.95);
            FilterDecision::reject(RejectReason::Gibberish, confidence, violations.join("; "))
        };

        decision
            .with_metric("alpha_ratio", alpha)
            .with_metric("digit_ratio", digit)
            .with_metric("symbol_ratio", symbol)
            .with_metric("entropy", entropy)
            .with_metric("repetition_ratio", repetition)
            .with_metric("longest_run", longest_run as f64)
    }
}

fn vowel_consonant_counts(text: &str) -> (usize, usize) {
    let mut vowels = 0usize;
    let mut consonants = 0usize;
    for b in text.bytes() {
        if b.is_ascii_alphabetic() {
            if matches!(b.to_ascii_lowercase(), b'a' | b'e' | b'i' | b'o' | b'u') {
                vowels += 1;
            } else {
                consonants += 1;
            }
        }
    }
    (vowels, consonants)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::FilterResult;

    #[test]
    fn test_repeated_character_rejected() {
        let filter = GibberishFilter::default();
        let decision = filter.evaluate(&Document::new(
            "x",
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
        ));

        assert_eq!(decision.result, FilterResult::Reject);
        assert_eq!(decision.reason, Some(RejectReason::Gibberish));
        assert!(decision.details.contains("excessive character repetition"));
        assert!(decision.details.contains("long consecutive character runs"));
        assert!(decision.confidence >= 0.9);
    }

    #[test]
    fn test_natural_text_kept() {
        let filter = GibberishFilter::default();
        let decision = filter.evaluate(&Document::new(
            "x",
            "The quick brown fox jumps over the lazy dog while the sun sets behind rolling hills.",
        ));
        assert_eq!(decision.result, FilterResult::Keep, "{}", decision.details);
    }

    #[test]
    fn test_symbol_soup_rejected() {
        let filter = GibberishFilter::default();
        let decision = filter.evaluate(&Document::new("x", "!@#$%^&*()_+{}|:<>?!@#$%^&*()"));
        assert_eq!(decision.result, FilterResult::Reject);
        assert!(decision.details.contains("symbol"));
    }

    #[test]
    fn test_digit_soup_rejected() {
        let filter = GibberishFilter::default();
        let decision = filter.evaluate(&Document::new(
            "x",
            "8234 9182 3948 1029 3847 5610 2938 4756 1029 3847",
        ));
        assert_eq!(decision.result, FilterResult::Reject);
        assert!(decision.details.contains("digit"));
    }

    #[test]
    fn test_consonant_mash_rejected() {
        let filter = GibberishFilter::default();
        let decision = filter.evaluate(&Document::new(
            "x",
            "xkcd vwls mssng frm txt cnnt prnnc wrds hr pls rjct",
        ));
        assert_eq!(decision.result, FilterResult::Reject);
        assert!(decision.details.contains("vowel"));
    }

    #[test]
    fn test_long_letter_run_configurable() {
        let text = format!("prefix {} suffix", "a".repeat(60));

        let strict = GibberishFilter::default();
        assert_eq!(strict.evaluate(&Document::new("x", text.clone())).result, FilterResult::Reject);

        // compound-friendly settings: raise the run cap and drop the
        // letter-string pattern
        let lenient = GibberishFilter::new(GibberishFilterConfig {
            max_consecutive_chars: 100,
            max_repetition_ratio: 0.95,
            min_entropy: 0.0,
            gibberish_patterns: vec![],
            ..Default::default()
        })
        .unwrap();
        let decision = lenient.evaluate(&Document::new("x", text));
        // still tripped by word shape, but not by the run limit
        assert!(!decision.details.contains("long consecutive character runs"));
    }

    #[test]
    fn test_confidence_scales_with_violations() {
        let filter = GibberishFilter::default();
        let mild = filter.evaluate(&Document::new("x", "1111 2222 3333 4444 5555 6666 7777"));
        let severe = filter.evaluate(&Document::new(
            "x",
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
        ));
        assert!(severe.confidence >= mild.confidence);
    }

    #[test]
    fn test_empty_text_kept() {
        // emptiness is the length filter's concern
        let filter = GibberishFilter::default();
        let decision = filter.evaluate(&Document::new("x", ""));
        assert_eq!(decision.result, FilterResult::Keep);
    }

    #[test]
    fn test_bad_pattern_rejected_at_construction() {
        let config = GibberishFilterConfig {
            gibberish_patterns: vec!["[unclosed".to_string()],
            ..Default::default()
        };
        assert!(GibberishFilter::new(config).is_err());
    }
}
