//! Stateless text utilities consumed by every filter
//!
//! These helpers operate on raw strings and carry no configuration of
//! their own; anything tunable lives in the calling filter's config.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();
static PUNCTUATION_RE: OnceLock<Regex> = OnceLock::new();
static TAG_RE: OnceLock<Regex> = OnceLock::new();
static NUMERIC_ENTITY_RE: OnceLock<Regex> = OnceLock::new();
static DOMAIN_RE: OnceLock<Regex> = OnceLock::new();

fn whitespace_re() -> &'static Regex {
    WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"))
}

fn punctuation_re() -> &'static Regex {
    PUNCTUATION_RE.get_or_init(|| Regex::new(r"[^\w\s]").expect("punctuation regex"))
}

/// Collapse runs of whitespace to a single space and trim the ends.
/// Idempotent.
pub fn normalize_whitespace(text: &str) -> String {
    whitespace_re().replace_all(text, " ").trim().to_string()
}

/// Split into maximal alphanumeric runs, stripping leading/trailing
/// punctuation from each token. Empty input yields an empty vector.
pub fn split_words(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect()
}

/// Split into trimmed lines, dropping blanks (the default used for
/// repetition counting).
pub fn split_lines(text: &str) -> Vec<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
}

/// Split into trimmed lines, keeping blanks.
pub fn split_lines_keep_blank(text: &str) -> Vec<&str> {
    text.lines().map(str::trim).collect()
}

/// N-gram granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NgramKind {
    /// Overlapping n-token windows joined by single spaces
    Word,
    /// Length-n character substrings
    Char,
}

/// Generate overlapping n-grams. Input with fewer than `n` units yields
/// an empty vector.
pub fn generate_ngrams(text: &str, n: usize, kind: NgramKind) -> Vec<String> {
    if n == 0 {
        return Vec::new();
    }
    match kind {
        NgramKind::Word => {
            let words: Vec<&str> = text.split_whitespace().collect();
            if words.len() < n {
                return Vec::new();
            }
            words.windows(n).map(|w| w.join(" ")).collect()
        }
        NgramKind::Char => {
            let chars: Vec<char> = text.chars().collect();
            if chars.len() < n {
                return Vec::new();
            }
            chars.windows(n).map(|w| w.iter().collect()).collect()
        }
    }
}

/// Shannon entropy in bits over the byte distribution. 0 for empty input.
pub fn character_entropy(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }

    let mut freq = [0usize; 256];
    for &b in text.as_bytes() {
        freq[b as usize] += 1;
    }

    let len = text.len() as f64;
    freq.iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Fraction of bytes that are ASCII alphabetic. 0 for empty input.
pub fn alpha_ratio(text: &str) -> f64 {
    byte_ratio(text, |b| b.is_ascii_alphabetic())
}

/// Fraction of bytes that are ASCII digits. 0 for empty input.
pub fn digit_ratio(text: &str) -> f64 {
    byte_ratio(text, |b| b.is_ascii_digit())
}

/// Fraction of bytes that are neither alphanumeric nor whitespace.
/// 0 for empty input.
pub fn symbol_ratio(text: &str) -> f64 {
    byte_ratio(text, |b| !b.is_ascii_alphanumeric() && !b.is_ascii_whitespace())
}

fn byte_ratio(text: &str, pred: impl Fn(u8) -> bool) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let count = text.bytes().filter(|&b| pred(b)).count();
    count as f64 / text.len() as f64
}

/// Fraction of ASCII letters that are vowels. 0 when there are no letters.
pub fn vowel_ratio(text: &str) -> f64 {
    let mut vowels = 0usize;
    let mut letters = 0usize;
    for b in text.bytes() {
        if b.is_ascii_alphabetic() {
            letters += 1;
            if matches!(b.to_ascii_lowercase(), b'a' | b'e' | b'i' | b'o' | b'u') {
                vowels += 1;
            }
        }
    }
    if letters == 0 {
        0.0
    } else {
        vowels as f64 / letters as f64
    }
}

/// Length of the longest run of a single repeated character.
pub fn longest_char_run(text: &str) -> usize {
    let mut longest = 0usize;
    let mut current = 0usize;
    let mut prev: Option<char> = None;
    for c in text.chars() {
        if Some(c) == prev {
            current += 1;
        } else {
            current = 1;
            prev = Some(c);
        }
        longest = longest.max(current);
    }
    longest
}

pub fn is_ascii(text: &str) -> bool {
    text.is_ascii()
}

/// Scheme-stripped authority with a leading `www.` removed, lowercased.
/// Returns an empty string for anything that does not look like an
/// http(s) URL.
pub fn extract_domain(url: &str) -> String {
    let re = DOMAIN_RE
        .get_or_init(|| Regex::new(r"(?i)^https?://(?:www\.)?([^/\s:?#]+)").expect("domain regex"));
    re.captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_default()
}

/// The label after the final dot of a domain, lowercased.
pub fn extract_tld(domain: &str) -> String {
    domain.rsplit('.').next().unwrap_or("").to_lowercase()
}

/// True when the host is a bare IPv4 literal.
pub fn is_ip_literal(host: &str) -> bool {
    let octets: Vec<&str> = host.split('.').collect();
    octets.len() == 4
        && octets
            .iter()
            .all(|o| !o.is_empty() && o.len() <= 3 && o.bytes().all(|b| b.is_ascii_digit()) && o.parse::<u16>().map(|v| v <= 255).unwrap_or(false))
}

/// Canonical named entities decoded by [`strip_html`] and the extractor.
pub(crate) fn html_entities() -> &'static [(&'static str, &'static str)] {
    &[
        ("&amp;", "&"),
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&apos;", "'"),
        ("&nbsp;", " "),
        ("&copy;", "\u{a9}"),
        ("&reg;", "\u{ae}"),
        ("&trade;", "\u{2122}"),
        ("&mdash;", "\u{2014}"),
        ("&ndash;", "\u{2013}"),
        ("&hellip;", "\u{2026}"),
        ("&laquo;", "\u{ab}"),
        ("&raquo;", "\u{bb}"),
        ("&ldquo;", "\u{201c}"),
        ("&rdquo;", "\u{201d}"),
        ("&lsquo;", "\u{2018}"),
        ("&rsquo;", "\u{2019}"),
    ]
}

/// Decode the canonical entity set plus decimal `&#NNN;` references.
/// Numeric references outside printable ASCII are dropped.
pub fn decode_entities(text: &str) -> String {
    let mut result = text.to_string();
    for (entity, replacement) in html_entities() {
        if result.contains(entity) {
            result = result.replace(entity, replacement);
        }
    }

    let numeric = NUMERIC_ENTITY_RE.get_or_init(|| Regex::new(r"&#(\d+);").expect("entity regex"));
    numeric
        .replace_all(&result, |caps: &regex::Captures| {
            match caps[1].parse::<u32>() {
                Ok(code) if (32..=126).contains(&code) => {
                    char::from_u32(code).map(String::from).unwrap_or_default()
                }
                _ => String::new(),
            }
        })
        .into_owned()
}

/// Remove `<...>` tags, decode entities, and normalize whitespace.
/// Idempotent.
pub fn strip_html(text: &str) -> String {
    let tag_re = TAG_RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag regex"));
    let stripped = tag_re.replace_all(text, " ");
    normalize_whitespace(&decode_entities(&stripped))
}

/// Per-character frequency map, used by repetition heuristics.
pub fn char_frequencies(text: &str) -> HashMap<char, usize> {
    let mut freq = HashMap::new();
    for c in text.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }
    freq
}

/// Text normalization presets shared by near-dedup shingling and
/// decontamination n-gram generation.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    pub lowercase: bool,
    pub strip_punctuation: bool,
    pub collapse_whitespace: bool,
    pub unicode_normalize: bool,
}

impl TextNormalizer {
    /// All normalizations on. Highest recall, more false positives.
    pub fn aggressive() -> Self {
        Self {
            lowercase: true,
            strip_punctuation: true,
            collapse_whitespace: true,
            unicode_normalize: true,
        }
    }

    /// Lowercase + punctuation strip + whitespace collapse (default).
    pub fn balanced() -> Self {
        Self {
            lowercase: true,
            strip_punctuation: true,
            collapse_whitespace: true,
            unicode_normalize: false,
        }
    }

    /// Lowercase + whitespace collapse only.
    pub fn conservative() -> Self {
        Self {
            lowercase: true,
            strip_punctuation: false,
            collapse_whitespace: true,
            unicode_normalize: false,
        }
    }

    pub fn normalize(&self, text: &str) -> String {
        let mut result = if self.unicode_normalize {
            text.nfkd().collect::<String>()
        } else {
            text.to_string()
        };

        if self.lowercase {
            result = result.to_lowercase();
        }
        if self.strip_punctuation {
            result = punctuation_re().replace_all(&result, " ").into_owned();
        }
        if self.collapse_whitespace {
            result = normalize_whitespace(&result);
        }
        result
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::balanced()
    }
}
