//! Length-based filtering

use serde::{Deserialize, Serialize};

use crate::config::CurationConfig;
use crate::decision::{FilterDecision, RejectReason};
use crate::{Filter, Result};
use rapidsift_core::text::split_words;
use rapidsift_core::Document;

/// Configuration for the length filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LengthFilterConfig {
    pub min_words: usize,
    pub max_words: usize,
    pub min_chars: usize,
    pub max_chars: usize,
    /// When true, reject only if both the word and character limits are
    /// breached; when false (default) either breach rejects.
    pub require_both_limits: bool,
}

impl Default for LengthFilterConfig {
    fn default() -> Self {
        Self {
            min_words: 5,
            max_words: 1_000_000,
            min_chars: 20,
            max_chars: 10_000_000,
            require_both_limits: false,
        }
    }
}

/// Rejects documents that are too short or too long
#[derive(Debug, Default)]
pub struct LengthFilter {
    config: LengthFilterConfig,
}

impl LengthFilter {
    pub fn new(config: LengthFilterConfig) -> Self {
        Self { config }
    }
}

impl Filter for LengthFilter {
    fn name(&self) -> &str {
        "length"
    }

    fn configure(&mut self, config: &CurationConfig) -> Result<()> {
        self.config = config.length.clone();
        Ok(())
    }

    fn evaluate(&self, doc: &Document) -> FilterDecision {
        let words = split_words(&doc.text).len();
        let chars = doc.text.bytes().filter(|b| !b.is_ascii_whitespace()).count();

        let too_short_words = words < self.config.min_words;
        let too_short_chars = chars < self.config.min_chars;
        let too_short = if self.config.require_both_limits {
            too_short_words && too_short_chars
        } else {
            too_short_words || too_short_chars
        };

        let too_long_words = words > self.config.max_words;
        let too_long_chars = chars > self.config.max_chars;
        let too_long = if self.config.require_both_limits {
            too_long_words && too_long_chars
        } else {
            too_long_words || too_long_chars
        };

        let decision = if too_short {
            FilterDecision::reject(
                RejectReason::TooShort,
                0.95,
                format!(
                    "{words} words / {chars} chars below minimum ({} words / {} chars)",
                    self.config.min_words, self.config.min_chars
                ),
            )
        } else if too_long {
            FilterDecision::reject(
                RejectReason::TooLong,
                0.95,
                format!(
                    "{words} words / {chars} chars above maximum ({} words / {} chars)",
                    self.config.max_words, self.config.max_chars
                ),
            )
        } else {
            // mild penalty near the boundaries
            let mut confidence = 1.0;
            if words < 20 {
                confidence *= 0.8;
            }
            if words > 10_000 {
                confidence *= 0.9;
            }
            FilterDecision::keep(confidence, format!("{words} words, {chars} chars"))
        };

        decision
            .with_metric("word_count", words as f64)
            .with_metric("char_count", chars as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::FilterResult;

    #[test]
    fn test_too_short_rejected() {
        let filter = LengthFilter::new(LengthFilterConfig {
            min_words: 5,
            ..Default::default()
        });
        let decision = filter.evaluate(&Document::new("x", "Hi"));

        assert_eq!(decision.result, FilterResult::Reject);
        assert_eq!(decision.reason, Some(RejectReason::TooShort));
        assert!(decision.confidence >= 0.9);
        assert_eq!(decision.metrics["word_count"], 1.0);
    }

    #[test]
    fn test_too_long_rejected() {
        let filter = LengthFilter::new(LengthFilterConfig {
            max_words: 10,
            ..Default::default()
        });
        let text = "word ".repeat(30);
        let decision = filter.evaluate(&Document::new("x", text));
        assert_eq!(decision.reason, Some(RejectReason::TooLong));
    }

    #[test]
    fn test_normal_text_kept() {
        let filter = LengthFilter::default();
        let text = "This document has a perfectly ordinary number of words in it, \
                    spread across a couple of clauses for good measure.";
        let decision = filter.evaluate(&Document::new("x", text));
        assert_eq!(decision.result, FilterResult::Keep);
        assert!(decision.confidence > 0.9);
    }

    #[test]
    fn test_short_but_kept_gets_penalty() {
        let filter = LengthFilter::new(LengthFilterConfig {
            min_words: 3,
            min_chars: 10,
            ..Default::default()
        });
        // 5 words: above minimum, below the 20-word comfort zone
        let decision = filter.evaluate(&Document::new("x", "five words are just enough"));
        assert_eq!(decision.result, FilterResult::Keep);
        assert!((decision.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_require_both_limits() {
        // 2 words but 24 chars: word limit breached, char limit fine
        let doc = Document::new("x", "supercalifragilistic expialidocious");
        let either = LengthFilter::new(LengthFilterConfig {
            min_words: 5,
            min_chars: 20,
            require_both_limits: false,
            ..Default::default()
        });
        assert_eq!(either.evaluate(&doc).result, FilterResult::Reject);

        let both = LengthFilter::new(LengthFilterConfig {
            min_words: 5,
            min_chars: 20,
            require_both_limits: true,
            ..Default::default()
        });
        assert_eq!(both.evaluate(&doc).result, FilterResult::Keep);
    }

    #[test]
    fn test_empty_document() {
        let filter = LengthFilter::default();
        let decision = filter.evaluate(&Document::new("x", ""));
        assert_eq!(decision.reason, Some(RejectReason::TooShort));
        assert_eq!(decision.metrics["word_count"], 0.0);
    }
}
