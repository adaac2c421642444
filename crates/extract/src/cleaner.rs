//! Post-extraction text cleaning
//!
//! Entity decoding, mojibake repair, whitespace normalization, and
//! newline collapsing for text assembled from the element tree.

use regex::Regex;
use std::sync::OnceLock;

use rapidsift_core::text::decode_entities;

/// UTF-8 text mis-decoded as Latin-1 and re-encoded. The table covers
/// the accented Latin letters that dominate real crawl data.
const MOJIBAKE_FIXES: &[(&str, &str)] = &[
    ("\u{c3}\u{a1}", "á"),
    ("\u{c3}\u{a9}", "é"),
    ("\u{c3}\u{ad}", "í"),
    ("\u{c3}\u{b3}", "ó"),
    ("\u{c3}\u{ba}", "ú"),
    ("\u{c3}\u{a0}", "à"),
    ("\u{c3}\u{a8}", "è"),
    ("\u{c3}\u{ac}", "ì"),
    ("\u{c3}\u{b2}", "ò"),
    ("\u{c3}\u{b9}", "ù"),
    ("\u{c3}\u{a2}", "â"),
    ("\u{c3}\u{aa}", "ê"),
    ("\u{c3}\u{ae}", "î"),
    ("\u{c3}\u{b4}", "ô"),
    ("\u{c3}\u{bb}", "û"),
    ("\u{c3}\u{a3}", "ã"),
    ("\u{c3}\u{b1}", "ñ"),
    ("\u{c3}\u{a7}", "ç"),
];

/// Longest run of a single non-whitespace character kept in output
const MAX_CHAR_RUN: usize = 80;

static MULTI_NEWLINE_RE: OnceLock<Regex> = OnceLock::new();
static LINE_SPACE_RE: OnceLock<Regex> = OnceLock::new();

/// Cleaning configuration, a slice of the extractor config
#[derive(Debug, Clone)]
pub struct CleanerConfig {
    pub decode_entities: bool,
    pub fix_mojibake: bool,
    pub normalize_whitespace: bool,
    pub collapse_newlines: bool,
    pub trim_lines: bool,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            decode_entities: true,
            fix_mojibake: true,
            normalize_whitespace: true,
            collapse_newlines: true,
            trim_lines: true,
        }
    }
}

/// Text cleaner applying the configured passes in a fixed order
#[derive(Debug, Default)]
pub struct TextCleaner {
    config: CleanerConfig,
}

impl TextCleaner {
    pub fn new(config: CleanerConfig) -> Self {
        Self { config }
    }

    pub fn clean(&self, text: &str) -> String {
        let mut result = text.to_string();

        if self.config.decode_entities {
            result = decode_entities(&result);
        }
        if self.config.fix_mojibake {
            result = fix_mojibake(&result);
        }
        if self.config.normalize_whitespace {
            result = collapse_line_whitespace(&result);
        }
        if self.config.trim_lines {
            result = result
                .lines()
                .map(str::trim)
                .collect::<Vec<_>>()
                .join("\n");
        }
        if self.config.collapse_newlines {
            let re = MULTI_NEWLINE_RE
                .get_or_init(|| Regex::new(r"\n{3,}").expect("newline regex"));
            result = re.replace_all(&result, "\n\n").into_owned();
        }

        cap_char_runs(result.trim(), MAX_CHAR_RUN)
    }
}

/// Replace known mojibake byte pairs with the intended characters.
pub fn fix_mojibake(text: &str) -> String {
    let mut result = text.to_string();
    for (broken, fixed) in MOJIBAKE_FIXES {
        if result.contains(broken) {
            result = result.replace(broken, fixed);
        }
    }
    result
}

/// Collapse runs of spaces and tabs within lines, leaving newlines alone.
fn collapse_line_whitespace(text: &str) -> String {
    let re = LINE_SPACE_RE.get_or_init(|| Regex::new(r"[ \t]+").expect("space regex"));
    re.replace_all(text, " ").into_owned()
}

/// Cap runs of a repeated non-whitespace character (separator art,
/// pathological fills) at `max` occurrences.
fn cap_char_runs(text: &str, max: usize) -> String {
    let mut result = String::with_capacity(text.len());
    let mut run_char: Option<char> = None;
    let mut run_len = 0usize;

    for c in text.chars() {
        if Some(c) == run_char && !c.is_whitespace() {
            run_len += 1;
            if run_len > max {
                continue;
            }
        } else {
            run_char = Some(c);
            run_len = 1;
        }
        result.push(c);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_decoding() {
        let cleaner = TextCleaner::default();
        assert_eq!(cleaner.clean("Fish &amp; Chips"), "Fish & Chips");
    }

    #[test]
    fn test_mojibake_repair() {
        assert_eq!(fix_mojibake("caf\u{c3}\u{a9}"), "café");
        assert_eq!(fix_mojibake("ma\u{c3}\u{b1}ana"), "mañana");
        assert_eq!(fix_mojibake("clean text"), "clean text");
    }

    #[test]
    fn test_newline_collapse() {
        let cleaner = TextCleaner::default();
        assert_eq!(cleaner.clean("a\n\n\n\n\nb"), "a\n\nb");
        // exactly two newlines survive
        assert_eq!(cleaner.clean("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_line_trimming_and_space_collapse() {
        let cleaner = TextCleaner::default();
        assert_eq!(cleaner.clean("  a   b  \n   c\t\td  "), "a b\nc d");
    }

    #[test]
    fn test_char_run_cap() {
        let long_run = "-".repeat(200);
        let capped = cap_char_runs(&long_run, 80);
        assert_eq!(capped.len(), 80);
        // whitespace runs are newline-collapse territory, not capped here
        assert_eq!(cap_char_runs("ab", 80), "ab");
    }

    #[test]
    fn test_clean_idempotent() {
        let cleaner = TextCleaner::default();
        let once = cleaner.clean("  Fish &amp; Chips\n\n\n\nmore   text ");
        assert_eq!(cleaner.clean(&once), once);
    }

    #[test]
    fn test_disabled_passes() {
        let cleaner = TextCleaner::new(CleanerConfig {
            decode_entities: false,
            fix_mojibake: false,
            normalize_whitespace: false,
            collapse_newlines: false,
            trim_lines: false,
        });
        assert_eq!(cleaner.clean("a &amp; b"), "a &amp; b");
    }
}
