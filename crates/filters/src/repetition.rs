//! Repetition and boilerplate detection
//!
//! Catches documents dominated by repeated lines, repeated n-grams, low
//! vocabulary diversity, or template-shaped text.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::CurationConfig;
use crate::decision::{FilterDecision, RejectReason};
use crate::{Filter, Result};
use rapidsift_core::text::{generate_ngrams, split_lines, split_words, NgramKind};
use rapidsift_core::Document;

/// Configuration for the repetition filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepetitionFilterConfig {
    pub max_line_repetition_ratio: f64,
    pub max_ngram_repetition_ratio: f64,
    pub ngram_size: usize,
    pub min_unique_word_ratio: f64,
    /// Documents with fewer words than this skip the diversity checks
    pub min_words_for_diversity: usize,
    pub max_boilerplate_ratio: f64,
    /// Boilerplate phrases, compiled at configure time
    pub boilerplate_patterns: Vec<String>,
}

impl Default for RepetitionFilterConfig {
    fn default() -> Self {
        Self {
            max_line_repetition_ratio: 0.3,
            max_ngram_repetition_ratio: 0.5,
            ngram_size: 3,
            min_unique_word_ratio: 0.3,
            min_words_for_diversity: 10,
            max_boilerplate_ratio: 0.7,
            boilerplate_patterns: vec![
                "(?i)click here".to_string(),
                "(?i)subscribe (?:now|today|to our)".to_string(),
                "(?i)all rights reserved".to_string(),
                "(?i)terms of (?:service|use)".to_string(),
                "(?i)privacy policy".to_string(),
            ],
        }
    }
}

/// Rejects repetitive and template-like documents
pub struct RepetitionFilter {
    config: RepetitionFilterConfig,
    patterns: Vec<Regex>,
}

impl RepetitionFilter {
    pub fn new(config: RepetitionFilterConfig) -> Result<Self> {
        let patterns = config
            .boilerplate_patterns
            .iter()
            .map(|p| Ok(Regex::new(p)?))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { config, patterns })
    }
}

impl Default for RepetitionFilter {
    fn default() -> Self {
        Self::new(RepetitionFilterConfig::default()).expect("default patterns compile")
    }
}

impl Filter for RepetitionFilter {
    fn name(&self) -> &str {
        "repetition"
    }

    fn configure(&mut self, config: &CurationConfig) -> Result<()> {
        *self = Self::new(config.repetition.clone())?;
        Ok(())
    }

    fn evaluate(&self, doc: &Document) -> FilterDecision {
        let text = &doc.text;
        let lines = split_lines(text);
        let words = split_words(text);

        let line_repetition = line_repetition_ratio(&lines);
        let ngram_repetition = ngram_repetition_ratio(text, self.config.ngram_size);
        let unique_word_ratio = if words.is_empty() {
            1.0
        } else {
            let unique: std::collections::HashSet<String> =
                words.iter().map(|w| w.to_lowercase()).collect();
            unique.len() as f64 / words.len() as f64
        };
        let template_like = is_template_like(&lines);

        let mut boilerplate_score = 0.4 * line_repetition;
        if self.patterns.iter().any(|p| p.is_match(text)) {
            boilerplate_score += 0.3;
        }
        if template_like {
            boilerplate_score += 0.2;
        }
        if unique_word_ratio < 0.3 && words.len() >= self.config.min_words_for_diversity {
            boilerplate_score += 0.2;
        }
        let boilerplate_score = boilerplate_score.min(1.0);

        let mut violations: Vec<String> = Vec::new();
        if line_repetition > self.config.max_line_repetition_ratio {
            violations.push(format!("repeated lines ({line_repetition:.2})"));
        }
        if ngram_repetition > self.config.max_ngram_repetition_ratio {
            violations.push(format!(
                "repeated {}-grams ({ngram_repetition:.2})",
                self.config.ngram_size
            ));
        }
        if words.len() >= self.config.min_words_for_diversity
            && unique_word_ratio < self.config.min_unique_word_ratio
        {
            violations.push(format!("low vocabulary diversity ({unique_word_ratio:.2})"));
        }

        let decision = if !violations.is_empty() {
            let confidence = (0.5 + 0.15 * violations.len() as f64).min(0.95);
            FilterDecision::reject(RejectReason::HighRepetition, confidence, violations.join("; "))
        } else if boilerplate_score > self.config.max_boilerplate_ratio {
            FilterDecision::reject(
                RejectReason::Boilerplate,
                (0.5 + boilerplate_score / 2.0).min(0.95),
                format!("boilerplate score {boilerplate_score:.2}"),
            )
        } else {
            FilterDecision::keep(0.9, "repetition within bounds")
        };

        decision
            .with_metric("line_repetition_ratio", line_repetition)
            .with_metric("ngram_repetition_ratio", ngram_repetition)
            .with_metric("unique_word_ratio", unique_word_ratio)
            .with_metric("boilerplate_score", boilerplate_score)
            .with_metric("template_like", if template_like { 1.0 } else { 0.0 })
    }
}

/// Fraction of lines that belong to a repeated line group.
fn line_repetition_ratio(lines: &[&str]) -> f64 {
    if lines.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for line in lines {
        *counts.entry(line).or_insert(0) += 1;
    }
    let repeated: usize = counts.values().filter(|&&c| c > 1).sum();
    repeated as f64 / lines.len() as f64
}

/// Fraction of word n-grams that are repeats of an earlier n-gram.
fn ngram_repetition_ratio(text: &str, n: usize) -> f64 {
    let ngrams = generate_ngrams(text, n, NgramKind::Word);
    if ngrams.is_empty() {
        return 0.0;
    }
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut repeats = 0usize;
    for ngram in &ngrams {
        let count = seen.entry(ngram.to_lowercase()).or_insert(0);
        *count += 1;
        if *count > 1 {
            repeats += 1;
        }
    }
    repeats as f64 / ngrams.len() as f64
}

/// Map each line to a shape string ("A" letters, "9" digits, " "
/// whitespace, "X" other; whitespace runs collapsed) and report whether
/// one shape covers more than 30% of the lines.
fn is_template_like(lines: &[&str]) -> bool {
    if lines.len() < 4 {
        return false;
    }
    let mut shape_counts: HashMap<String, usize> = HashMap::new();
    for line in lines {
        *shape_counts.entry(line_shape(line)).or_insert(0) += 1;
    }
    let max_count = shape_counts.values().copied().max().unwrap_or(0);
    max_count as f64 / lines.len() as f64 > 0.3
}

fn line_shape(line: &str) -> String {
    let mut shape = String::with_capacity(line.len());
    let mut last_space = false;
    for c in line.chars() {
        let symbol = if c.is_alphabetic() {
            'A'
        } else if c.is_ascii_digit() {
            '9'
        } else if c.is_whitespace() {
            ' '
        } else {
            'X'
        };
        if symbol == ' ' {
            if last_space {
                continue;
            }
            last_space = true;
        } else {
            last_space = false;
        }
        shape.push(symbol);
    }
    shape
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::FilterResult;

    #[test]
    fn test_repeated_sentence_rejected() {
        let filter = RepetitionFilter::default();
        let text = "The quick brown fox jumps over the lazy dog.\n\
                    The quick brown fox jumps over the lazy dog.\n\
                    The quick brown fox jumps over the lazy dog.";
        let decision = filter.evaluate(&Document::new("x", text));

        assert_eq!(decision.result, FilterResult::Reject);
        assert!(decision.metrics["line_repetition_ratio"] > 0.66);
        assert!(decision.metrics["unique_word_ratio"] < 0.5);
    }

    #[test]
    fn test_varied_text_kept() {
        let filter = RepetitionFilter::default();
        let text = "Rust guarantees memory safety without garbage collection.\n\
                    Ownership rules are checked at compile time by the borrow checker.\n\
                    Concurrency bugs like data races become type errors instead.";
        let decision = filter.evaluate(&Document::new("x", text));
        assert_eq!(decision.result, FilterResult::Keep, "{}", decision.details);
    }

    #[test]
    fn test_ngram_loop_rejected() {
        let filter = RepetitionFilter::default();
        let text = "buy cheap pills now ".repeat(15);
        let decision = filter.evaluate(&Document::new("x", text));
        assert_eq!(decision.result, FilterResult::Reject);
        assert!(decision.metrics["ngram_repetition_ratio"] > 0.5);
    }

    #[test]
    fn test_low_diversity_rejected() {
        let filter = RepetitionFilter::default();
        let text = "word word word word word word word word word word \
                    word word word word word word word word word word";
        let decision = filter.evaluate(&Document::new("x", text));
        assert_eq!(decision.result, FilterResult::Reject);
        assert!(decision.metrics["unique_word_ratio"] < 0.1);
    }

    #[test]
    fn test_template_shape_detection() {
        let lines = vec![
            "Item 001: widget",
            "Item 002: gadget",
            "Item 003: sprocket",
            "Item 004: flange",
        ];
        assert!(is_template_like(&lines));

        let varied = vec![
            "A sentence of ordinary prose.",
            "Numbers like 42 appear sometimes; punctuation varies!",
            "Short one.",
            "And a fourth line, different again (with parentheses).",
        ];
        assert!(!is_template_like(&varied));
    }

    #[test]
    fn test_boilerplate_phrases_raise_score() {
        let filter = RepetitionFilter::default();
        let text = "Click here to subscribe now! All rights reserved.\n\
                    Click here to subscribe now! All rights reserved.\n\
                    Click here to subscribe now! All rights reserved.\n\
                    Click here to subscribe now! All rights reserved.";
        let decision = filter.evaluate(&Document::new("x", text));
        assert_eq!(decision.result, FilterResult::Reject);
        // repeated lines (0.4) + phrase match (0.3) + template (0.2) ...
        assert!(decision.metrics["boilerplate_score"] > 0.7);
    }

    #[test]
    fn test_short_text_skips_diversity() {
        let filter = RepetitionFilter::default();
        // 4 words, 2 unique: below min_words_for_diversity
        let decision = filter.evaluate(&Document::new("x", "yes no yes no"));
        assert_eq!(decision.result, FilterResult::Keep);
    }

    #[test]
    fn test_empty_text_kept() {
        let filter = RepetitionFilter::default();
        let decision = filter.evaluate(&Document::new("x", ""));
        assert_eq!(decision.result, FilterResult::Keep);
    }

    #[test]
    fn test_line_shape() {
        assert_eq!(line_shape("Item 001: widget"), "AAAA 999X AAAAAA");
        assert_eq!(line_shape("a  b"), "A A");
    }
}
