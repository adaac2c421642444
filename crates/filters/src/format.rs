//! Format and structure filtering
//!
//! Rejects documents that are markup dumps, source code, navigation or
//! error pages, forms, or otherwise not running prose.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::config::CurationConfig;
use crate::decision::{FilterDecision, RejectReason};
use crate::{Filter, Result};
use rapidsift_core::text::{split_lines, split_words};
use rapidsift_core::Document;

/// Configuration for the format filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatFilterConfig {
    /// Maximum fraction of bytes inside HTML tags
    pub max_html_ratio: f64,
    /// Maximum fraction of lines that look like source code
    pub max_code_ratio: f64,
    /// Maximum fraction of short standalone lines
    pub max_single_line_ratio: f64,
    pub allow_lists: bool,
    pub allow_poetry: bool,
    /// Custom rejection patterns, compiled at configure time
    pub unwanted_patterns: Vec<String>,
}

impl Default for FormatFilterConfig {
    fn default() -> Self {
        Self {
            max_html_ratio: 0.1,
            max_code_ratio: 0.2,
            max_single_line_ratio: 0.8,
            allow_lists: true,
            allow_poetry: false,
            unwanted_patterns: Vec::new(),
        }
    }
}

static HTML_TAG_RE: OnceLock<Regex> = OnceLock::new();
static CODE_KEYWORD_RE: OnceLock<Regex> = OnceLock::new();
static CODE_ASSIGN_RE: OnceLock<Regex> = OnceLock::new();
static LIST_MARKER_RE: OnceLock<Regex> = OnceLock::new();

fn html_tag_re() -> &'static Regex {
    HTML_TAG_RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("tag regex"))
}

fn code_keyword_re() -> &'static Regex {
    CODE_KEYWORD_RE.get_or_init(|| {
        Regex::new(
            r"\b(function|class|import|from|def|var|let|const|public|private|protected|static)\b",
        )
        .expect("keyword regex")
    })
}

fn code_assign_re() -> &'static Regex {
    CODE_ASSIGN_RE
        .get_or_init(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*\s*=\s*[^;]+;").expect("assign regex"))
}

fn list_marker_re() -> &'static Regex {
    LIST_MARKER_RE
        .get_or_init(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+").expect("list regex"))
}

const ERROR_PAGE_MARKERS: &[&str] = &[
    "404 not found",
    "403 forbidden",
    "500 internal server error",
    "page not found",
    "access denied",
    "an error occurred",
];

const FORM_MARKERS: &[&str] = &[
    "username",
    "password",
    "submit",
    "required field",
    "log in",
    "sign in",
    "email address",
];

/// Rejects documents with poor formatting
pub struct FormatFilter {
    config: FormatFilterConfig,
    unwanted: Vec<Regex>,
}

impl FormatFilter {
    pub fn new(config: FormatFilterConfig) -> Result<Self> {
        let unwanted = config
            .unwanted_patterns
            .iter()
            .map(|p| Ok(Regex::new(p)?))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { config, unwanted })
    }
}

impl Default for FormatFilter {
    fn default() -> Self {
        Self::new(FormatFilterConfig::default()).expect("empty pattern list compiles")
    }
}

impl Filter for FormatFilter {
    fn name(&self) -> &str {
        "format"
    }

    fn configure(&mut self, config: &CurationConfig) -> Result<()> {
        *self = Self::new(config.format.clone())?;
        Ok(())
    }

    fn evaluate(&self, doc: &Document) -> FilterDecision {
        let text = &doc.text;
        if text.is_empty() {
            return FilterDecision::keep(0.9, "empty text has no formatting");
        }

        let lines = split_lines(text);
        let mut violations: Vec<String> = Vec::new();

        let html_ratio = html_tag_re()
            .find_iter(text)
            .map(|m| m.as_str().len())
            .sum::<usize>() as f64
            / text.len() as f64;
        if html_ratio > self.config.max_html_ratio {
            violations.push(format!("html markup ({html_ratio:.2})"));
        }

        let code_ratio = code_line_ratio(&lines);
        if code_ratio > self.config.max_code_ratio {
            violations.push(format!("source code ({code_ratio:.2})"));
        }

        // List-marker lines are judged by the list rule, not the
        // fragment rule, when lists are allowed.
        let fragment_lines: Vec<&&str> = lines
            .iter()
            .filter(|l| !(self.config.allow_lists && list_marker_re().is_match(l)))
            .collect();
        let short_line_ratio = if fragment_lines.is_empty() {
            0.0
        } else {
            fragment_lines.iter().filter(|l| l.chars().count() < 40).count() as f64
                / fragment_lines.len() as f64
        };
        if short_line_ratio > self.config.max_single_line_ratio
            && lines.len() > 3
            && !(self.config.allow_poetry && is_poetry_like(&lines))
        {
            violations.push(format!("fragmented short lines ({short_line_ratio:.2})"));
        }

        let list_ratio = if lines.is_empty() {
            0.0
        } else {
            lines.iter().filter(|l| list_marker_re().is_match(l)).count() as f64
                / lines.len() as f64
        };
        if !self.config.allow_lists && list_ratio > 0.5 {
            violations.push(format!("list-dominated ({list_ratio:.2})"));
        }

        if is_navigation_page(text) {
            violations.push("navigation page".to_string());
        }
        let lower = text.to_lowercase();
        if ERROR_PAGE_MARKERS.iter().any(|m| lower.contains(m)) {
            violations.push("error page".to_string());
        }
        let form_hits = FORM_MARKERS.iter().filter(|m| lower.contains(*m)).count();
        if form_hits >= 3 && split_words(text).len() < 100 {
            violations.push("form-dominated page".to_string());
        }

        for pattern in &self.unwanted {
            if pattern.is_match(text) {
                violations.push(format!("matched unwanted pattern {}", pattern.as_str()));
                break;
            }
        }

        let decision = if violations.is_empty() {
            FilterDecision::keep(0.9, "formatting looks like prose")
        } else {
            let confidence = (0.5 + 0.1 * violations.len() as f64).min(0.95);
            FilterDecision::reject(RejectReason::PoorFormatting, confidence, violations.join("; "))
        };

        decision
            .with_metric("html_ratio", html_ratio)
            .with_metric("code_ratio", code_ratio)
            .with_metric("short_line_ratio", short_line_ratio)
            .with_metric("list_ratio", list_ratio)
    }
}

/// Fraction of lines that carry code signals: keywords, brace blocks,
/// preprocessor directives, or semicolon-terminated assignments.
fn code_line_ratio(lines: &[&str]) -> f64 {
    if lines.is_empty() {
        return 0.0;
    }
    let code_lines = lines
        .iter()
        .filter(|line| {
            code_keyword_re().is_match(line)
                || line.contains("#include")
                || line.contains("#define")
                || line.trim_end().ends_with('{')
                || line.trim() == "}"
                || code_assign_re().is_match(line)
        })
        .count();
    code_lines as f64 / lines.len() as f64
}

/// Many short lines without terminal punctuation
fn is_poetry_like(lines: &[&str]) -> bool {
    if lines.len() < 4 {
        return false;
    }
    let avg_len =
        lines.iter().map(|l| l.chars().count()).sum::<usize>() as f64 / lines.len() as f64;
    let unterminated = lines
        .iter()
        .filter(|l| !l.trim_end().ends_with(['.', '!', '?', ':', ';']))
        .count();
    avg_len < 60.0 && unterminated as f64 / lines.len() as f64 > 0.5
}

/// Pipe- or bullet-separated link stubs with very few words
fn is_navigation_page(text: &str) -> bool {
    let words = split_words(text);
    if words.is_empty() || words.len() > 50 {
        return false;
    }
    let separators = text.matches('|').count() + text.matches('»').count();
    separators >= 2 && (separators as f64 / words.len() as f64) > 0.2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::FilterResult;

    #[test]
    fn test_prose_kept() {
        let filter = FormatFilter::default();
        let text = "This paragraph reads like ordinary prose. It has sentences of \
                    reasonable length, normal punctuation, and no markup at all.";
        let decision = filter.evaluate(&Document::new("x", text));
        assert_eq!(decision.result, FilterResult::Keep, "{}", decision.details);
    }

    #[test]
    fn test_html_dump_rejected() {
        let filter = FormatFilter::default();
        let text = "<div class=\"row\"><span>a</span><span>b</span></div> tiny bit of text";
        let decision = filter.evaluate(&Document::new("x", text));
        assert_eq!(decision.result, FilterResult::Reject);
        assert_eq!(decision.reason, Some(RejectReason::PoorFormatting));
        assert!(decision.metrics["html_ratio"] > 0.1);
    }

    #[test]
    fn test_source_code_rejected() {
        let filter = FormatFilter::default();
        let text = "function add(a, b) {\n  const sum = a + b;\n  return sum;\n}\n\
                    class Calculator {\n  static create() {\n    let x = 1;\n  }\n}";
        let decision = filter.evaluate(&Document::new("x", text));
        assert_eq!(decision.result, FilterResult::Reject);
        assert!(decision.metrics["code_ratio"] > 0.2);
    }

    #[test]
    fn test_navigation_page_rejected() {
        let filter = FormatFilter::default();
        let decision = filter.evaluate(&Document::new(
            "x",
            "Home | Products | Services | About Us | Contact | Blog",
        ));
        assert_eq!(decision.result, FilterResult::Reject);
        assert!(decision.details.contains("navigation"));
    }

    #[test]
    fn test_error_page_rejected() {
        let filter = FormatFilter::default();
        let decision = filter.evaluate(&Document::new(
            "x",
            "404 Not Found. The page you requested could not be located on this server.",
        ));
        assert_eq!(decision.result, FilterResult::Reject);
        assert!(decision.details.contains("error page"));
    }

    #[test]
    fn test_form_page_rejected() {
        let filter = FormatFilter::default();
        let decision = filter.evaluate(&Document::new(
            "x",
            "Username: \nPassword: \nEmail address: \nSubmit",
        ));
        assert_eq!(decision.result, FilterResult::Reject);
        assert!(decision.details.contains("form"));
    }

    #[test]
    fn test_poetry_allowed_when_configured() {
        let poem = "Roses climbing up the wall\n\
                    Shadows stretching long and tall\n\
                    Morning light on dewy grass\n\
                    Watching seasons slowly pass\n\
                    Winter whispers through the trees";

        let strict = FormatFilter::default();
        assert_eq!(
            strict.evaluate(&Document::new("x", poem)).result,
            FilterResult::Reject
        );

        let lenient = FormatFilter::new(FormatFilterConfig {
            allow_poetry: true,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            lenient.evaluate(&Document::new("x", poem)).result,
            FilterResult::Keep
        );
    }

    #[test]
    fn test_lists_rejected_when_disallowed() {
        let list = "- first item here\n- second item here\n- third item here\n- fourth item here";

        let permissive = FormatFilter::default();
        assert_eq!(
            permissive.evaluate(&Document::new("x", list)).result,
            FilterResult::Keep
        );

        let strict = FormatFilter::new(FormatFilterConfig {
            allow_lists: false,
            max_single_line_ratio: 1.1,
            ..Default::default()
        })
        .unwrap();
        let decision = strict.evaluate(&Document::new("x", list));
        assert_eq!(decision.result, FilterResult::Reject);
        assert!(decision.details.contains("list"));
    }

    #[test]
    fn test_unwanted_pattern() {
        let filter = FormatFilter::new(FormatFilterConfig {
            unwanted_patterns: vec!["(?i)lorem ipsum".to_string()],
            ..Default::default()
        })
        .unwrap();
        let decision = filter.evaluate(&Document::new(
            "x",
            "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod tempor.",
        ));
        assert_eq!(decision.result, FilterResult::Reject);
    }
}
