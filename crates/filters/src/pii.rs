//! PII detection and sanitization
//!
//! Finds emails, phone numbers, national identifiers, card numbers,
//! addresses, and names; either replaces them in a sanitized copy or
//! rejects the document. Replacement runs right-to-left so earlier
//! offsets stay valid while the text is edited.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::config::CurationConfig;
use crate::decision::{FilterDecision, PiiType, RejectReason};
use crate::{Filter, Result};
use rapidsift_core::Document;

/// Width of the context window inspected around each match
const CONTEXT_WINDOW: usize = 50;

/// Context phrases that mark a match as illustrative rather than real
const SUPPRESSION_PHRASES: &[&str] =
    &["example", "for example", "e.g.", "such as", "test", "demo", "sample"];

/// Email domains treated as placeholders
const SAFE_EMAIL_DOMAINS: &[&str] =
    &["example.com", "example.org", "example.net", "test.com", "localhost"];

/// One PII detection
#[derive(Debug, Clone)]
pub struct PiiMatch {
    pub pii_type: PiiType,
    pub original: String,
    pub replacement: String,
    pub start: usize,
    pub end: usize,
    pub confidence: f64,
    /// ±50 chars around the match
    pub context: String,
}

/// Configuration for the PII filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiiFilterConfig {
    pub remove_emails: bool,
    pub remove_phones: bool,
    pub remove_ssn: bool,
    pub remove_credit_cards: bool,
    pub remove_ip_addresses: bool,
    pub remove_addresses: bool,
    /// Capitalized-bigram person names; noisy, off by default
    pub remove_names: bool,
    /// Replace with `[EMAIL]`-style placeholders; when false, generated
    /// anonymous values are used instead
    pub use_placeholders: bool,
    /// Produce a sanitized copy instead of rejecting
    pub sanitize: bool,
    /// Extra detection patterns, compiled at configure time
    pub custom_patterns: Vec<String>,
    /// Additional safe email domains
    pub safe_domains: Vec<String>,
}

impl Default for PiiFilterConfig {
    fn default() -> Self {
        Self {
            remove_emails: true,
            remove_phones: true,
            remove_ssn: true,
            remove_credit_cards: true,
            remove_ip_addresses: true,
            remove_addresses: true,
            remove_names: false,
            use_placeholders: true,
            sanitize: true,
            custom_patterns: Vec::new(),
            safe_domains: Vec::new(),
        }
    }
}

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
static PHONE_RE: OnceLock<Regex> = OnceLock::new();
static SSN_RE: OnceLock<Regex> = OnceLock::new();
static CARD_RE: OnceLock<Regex> = OnceLock::new();
static IPV4_RE: OnceLock<Regex> = OnceLock::new();
static ADDRESS_RE: OnceLock<Regex> = OnceLock::new();
static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn email_re() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email regex")
    })
}

fn phone_re() -> &'static Regex {
    PHONE_RE.get_or_init(|| {
        Regex::new(r"(?:\+?1[-. ])?(?:\(\d{3}\)\s*|\b\d{3}[-. ])\d{3}[-. ]\d{4}\b")
            .expect("phone regex")
    })
}

fn ssn_re() -> &'static Regex {
    SSN_RE.get_or_init(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b|\b\d{9}\b").expect("ssn regex"))
}

fn card_re() -> &'static Regex {
    CARD_RE.get_or_init(|| {
        // Visa, MasterCard, AmEx, Discover prefixes; separators optional
        Regex::new(
            r"\b(?:4\d{3}|5[1-5]\d{2}|6011|65\d{2})[-. ]?\d{4}[-. ]?\d{4}[-. ]?\d{4}\b|\b3[47]\d{2}[-. ]?\d{6}[-. ]?\d{5}\b",
        )
        .expect("card regex")
    })
}

fn ipv4_re() -> &'static Regex {
    IPV4_RE.get_or_init(|| {
        Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("ipv4 regex")
    })
}

fn address_re() -> &'static Regex {
    ADDRESS_RE.get_or_init(|| {
        Regex::new(
            r"\b\d{1,5}\s+[A-Za-z][A-Za-z ]{1,30}\s(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Court|Ct|Place|Pl)\b\.?",
        )
        .expect("address regex")
    })
}

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| {
        Regex::new(r"\b[A-Z][a-z]{1,15}\s[A-Z][a-z]{1,15}\b").expect("name regex")
    })
}

/// Luhn checksum over the digits of a candidate card number
fn luhn_valid(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 13 {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

/// Detects and optionally sanitizes PII
pub struct PiiFilter {
    config: PiiFilterConfig,
    custom: Vec<Regex>,
    safe_domains: HashSet<String>,
}

impl PiiFilter {
    pub fn new(config: PiiFilterConfig) -> Result<Self> {
        let custom = config
            .custom_patterns
            .iter()
            .map(|p| Ok(Regex::new(p)?))
            .collect::<Result<Vec<_>>>()?;
        let safe_domains = SAFE_EMAIL_DOMAINS
            .iter()
            .map(|d| d.to_string())
            .chain(config.safe_domains.iter().cloned())
            .collect();
        Ok(Self {
            config,
            custom,
            safe_domains,
        })
    }

    /// All surviving matches, sorted by start offset with overlaps
    /// resolved in favor of the earliest start.
    pub fn find_matches(&self, text: &str) -> Vec<PiiMatch> {
        let mut matches: Vec<PiiMatch> = Vec::new();

        if self.config.remove_emails {
            self.collect(text, email_re(), PiiType::Email, 0.95, &mut matches);
        }
        if self.config.remove_phones {
            self.collect(text, phone_re(), PiiType::Phone, 0.85, &mut matches);
        }
        if self.config.remove_ssn {
            self.collect(text, ssn_re(), PiiType::Ssn, 0.9, &mut matches);
        }
        if self.config.remove_credit_cards {
            self.collect(text, card_re(), PiiType::CreditCard, 0.95, &mut matches);
        }
        if self.config.remove_ip_addresses {
            self.collect(text, ipv4_re(), PiiType::IpAddress, 0.8, &mut matches);
        }
        if self.config.remove_addresses {
            self.collect(text, address_re(), PiiType::PhysicalAddress, 0.7, &mut matches);
        }
        if self.config.remove_names {
            self.collect(text, name_re(), PiiType::PersonName, 0.5, &mut matches);
        }
        for pattern in &self.custom {
            self.collect(text, pattern, PiiType::Custom, 0.8, &mut matches);
        }

        // earliest start wins; detection order breaks exact ties
        matches.sort_by_key(|m| m.start);
        let mut resolved: Vec<PiiMatch> = Vec::new();
        for m in matches {
            if resolved.last().map(|prev| m.start >= prev.end).unwrap_or(true) {
                resolved.push(m);
            }
        }
        resolved
    }

    fn collect(
        &self,
        text: &str,
        pattern: &Regex,
        pii_type: PiiType,
        confidence: f64,
        out: &mut Vec<PiiMatch>,
    ) {
        for found in pattern.find_iter(text) {
            let original = found.as_str();

            if pii_type == PiiType::CreditCard && !luhn_valid(original) {
                continue;
            }
            if pii_type == PiiType::Email && self.is_safe_email(original) {
                continue;
            }

            let context = context_window(text, found.start(), found.end());
            if is_suppressed_context(&context, original) {
                continue;
            }

            out.push(PiiMatch {
                pii_type,
                original: original.to_string(),
                replacement: self.replacement_for(pii_type),
                start: found.start(),
                end: found.end(),
                confidence,
                context,
            });
        }
    }

    fn is_safe_email(&self, email: &str) -> bool {
        email
            .rsplit('@')
            .next()
            .map(|domain| self.safe_domains.contains(&domain.to_lowercase()))
            .unwrap_or(false)
    }

    fn replacement_for(&self, pii_type: PiiType) -> String {
        if self.config.use_placeholders {
            pii_type.placeholder().to_string()
        } else {
            // anonymous stand-ins that keep sentence structure
            match pii_type {
                PiiType::Email => "anon@redacted.invalid".to_string(),
                PiiType::Phone => "(000) 000-0000".to_string(),
                PiiType::Ssn => "XXX-XX-XXXX".to_string(),
                PiiType::CreditCard => "XXXX-XXXX-XXXX-XXXX".to_string(),
                PiiType::IpAddress => "0.0.0.0".to_string(),
                PiiType::PhysicalAddress => "[address removed]".to_string(),
                PiiType::PersonName => "A. Person".to_string(),
                PiiType::Custom => "[redacted]".to_string(),
            }
        }
    }

    /// Apply replacements right-to-left so offsets never invalidate.
    pub fn sanitize_text(&self, text: &str, matches: &[PiiMatch]) -> String {
        let mut result = text.to_string();
        for m in matches.iter().rev() {
            result.replace_range(m.start..m.end, &m.replacement);
        }
        result
    }
}

fn context_window(text: &str, start: usize, end: usize) -> String {
    let from = floor_char_boundary(text, start.saturating_sub(CONTEXT_WINDOW));
    let to = ceil_char_boundary(text, (end + CONTEXT_WINDOW).min(text.len()));
    text[from..to].to_string()
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// True when the surrounding context marks the match as illustrative.
/// The match text itself is excluded so that, e.g., `test@test.com`
/// does not suppress itself via its own characters.
fn is_suppressed_context(context: &str, original: &str) -> bool {
    let lower = context.to_lowercase().replace(&original.to_lowercase(), " ");
    SUPPRESSION_PHRASES.iter().any(|p| lower.contains(p))
}

impl Default for PiiFilter {
    fn default() -> Self {
        Self::new(PiiFilterConfig::default()).expect("empty custom pattern list compiles")
    }
}

impl Filter for PiiFilter {
    fn name(&self) -> &str {
        "pii"
    }

    fn configure(&mut self, config: &CurationConfig) -> Result<()> {
        let mut pii_config = config.pii.clone();
        pii_config.sanitize = pii_config.sanitize || config.sanitize_mode;
        *self = Self::new(pii_config)?;
        Ok(())
    }

    fn evaluate(&self, doc: &Document) -> FilterDecision {
        let matches = self.find_matches(&doc.text);
        if matches.is_empty() {
            return FilterDecision::keep(0.95, "no PII detected");
        }

        let mut types: Vec<PiiType> = Vec::new();
        for m in &matches {
            if !types.contains(&m.pii_type) {
                types.push(m.pii_type);
            }
        }
        let max_confidence = matches.iter().map(|m| m.confidence).fold(0.0f64, f64::max);

        let mut decision = if self.config.sanitize {
            let sanitized = self.sanitize_text(&doc.text, &matches);
            let removed: Vec<String> = matches
                .iter()
                .map(|m| format!("{}: {} -> {}", m.pii_type.as_str(), m.original, m.replacement))
                .collect();
            FilterDecision::sanitize(
                sanitized,
                removed,
                max_confidence,
                format!("{} PII matches replaced", matches.len()),
            )
        } else {
            FilterDecision::reject(
                RejectReason::PiiDetected,
                max_confidence,
                format!("{} PII matches found", matches.len()),
            )
        };
        decision.pii_types = types;
        decision.metrics.insert("pii_matches".to_string(), matches.len() as f64);
        decision
    }
}
