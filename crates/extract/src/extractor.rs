//! Main text-extraction pipeline
//!
//! parse → title/meta → boilerplate removal → main-content selection →
//! text assembly → cleaning → quality metrics.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::boilerplate::BoilerplateScorer;
use crate::cleaner::{CleanerConfig, TextCleaner};
use crate::parser::{extract_meta, extract_title, Dom, ElementId, HtmlParser};
use rapidsift_core::text::split_words;

/// Configuration for text extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextExtractionConfig {
    /// Drop script/style/noscript/iframe/embed/object subtrees
    pub remove_scripts: bool,
    /// Drop nav/menu/aside and navigation-classed subtrees
    pub remove_navigation: bool,
    /// Drop header and footer subtrees
    pub remove_headers_footers: bool,
    /// Drop advertisement-classed subtrees
    pub remove_ads: bool,
    /// Drop form controls
    pub remove_forms: bool,
    /// Restrict output to the best-scoring content subtree
    pub extract_main_content: bool,
    /// Collect heading texts into the result
    pub preserve_headings: bool,
    /// Collect link targets into the result
    pub preserve_links: bool,
    pub decode_html_entities: bool,
    pub fix_mojibake: bool,
    pub normalize_whitespace: bool,
    /// Validity floor on text/HTML ratio reported to callers
    pub min_text_ratio: f64,
}

impl Default for TextExtractionConfig {
    fn default() -> Self {
        Self {
            remove_scripts: true,
            remove_navigation: true,
            remove_headers_footers: true,
            remove_ads: true,
            remove_forms: true,
            extract_main_content: true,
            preserve_headings: true,
            preserve_links: false,
            decode_html_entities: true,
            fix_mojibake: true,
            normalize_whitespace: true,
            min_text_ratio: 0.1,
        }
    }
}

impl TextExtractionConfig {
    fn cleaner_config(&self) -> CleanerConfig {
        CleanerConfig {
            decode_entities: self.decode_html_entities,
            fix_mojibake: self.fix_mojibake,
            normalize_whitespace: self.normalize_whitespace,
            collapse_newlines: true,
            trim_lines: true,
        }
    }
}

/// Result of one extraction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextExtractionResult {
    pub extracted_text: String,
    pub title: String,
    pub url: Option<String>,
    pub headings: Vec<String>,
    pub links: Vec<String>,
    pub metadata: HashMap<String, String>,

    pub original_html_length: usize,
    pub extracted_text_length: usize,
    /// extracted length / HTML length
    pub text_ratio: f64,
    pub paragraph_count: usize,
    pub link_count: usize,
    /// links per 100 words
    pub link_density: f64,
}

impl TextExtractionResult {
    /// A result is usable when it has at least 50 characters of text and
    /// a text/HTML ratio of at least 0.1.
    pub fn is_valid(&self) -> bool {
        self.extracted_text_length >= 50 && self.text_ratio >= 0.1
    }

    /// Composite quality in [0, 1]: 40% text ratio, 30% paragraph
    /// structure, 30% low link density.
    pub fn quality_score(&self) -> f64 {
        let mut score = 0.0;
        score += (self.text_ratio * 2.0).min(1.0) * 0.4;
        score += (self.paragraph_count as f64 / 10.0).min(1.0) * 0.3;
        score += (1.0 - (self.link_density / 10.0).min(1.0)) * 0.3;
        score
    }
}

/// HTML-to-text extractor
pub struct TextExtractor {
    config: TextExtractionConfig,
    cleaner: TextCleaner,
}

impl TextExtractor {
    pub fn new(config: TextExtractionConfig) -> Self {
        let cleaner = TextCleaner::new(config.cleaner_config());
        Self { config, cleaner }
    }

    pub fn config(&self) -> &TextExtractionConfig {
        &self.config
    }

    /// Extract cleaned text and metrics from one HTML document.
    pub fn extract(&self, html: &str, url: Option<&str>) -> TextExtractionResult {
        let mut result = TextExtractionResult {
            original_html_length: html.len(),
            url: url.map(str::to_string),
            ..Default::default()
        };
        if html.trim().is_empty() {
            return result;
        }

        // Title and meta come from regex so malformed pages still yield
        // metadata even when tree parsing degrades.
        result.title = extract_title(html);
        result.metadata = extract_meta(html);

        let dom = HtmlParser::new(html).parse();
        let removed = self.removed_set(&dom);

        let root = if self.config.extract_main_content {
            best_subtree_filtered(&dom, &removed)
        } else {
            dom.root()
        };

        let mut assembled = String::new();
        assemble_text(&dom, root, &removed, &mut assembled);
        result.extracted_text = self.cleaner.clean(&assembled);
        result.extracted_text_length = result.extracted_text.len();

        if self.config.preserve_headings {
            collect_headings(&dom, root, &removed, &mut result.headings);
        }
        let mut link_targets = Vec::new();
        result.link_count = collect_links(&dom, root, &removed, &mut link_targets);
        if self.config.preserve_links {
            result.links = link_targets;
        }

        result.text_ratio = if html.is_empty() {
            0.0
        } else {
            result.extracted_text_length as f64 / html.len() as f64
        };
        result.paragraph_count = result
            .extracted_text
            .split("\n\n")
            .filter(|block| !block.trim().is_empty())
            .count();
        let words = split_words(&result.extracted_text).len();
        result.link_density = if words == 0 {
            0.0
        } else {
            result.link_count as f64 / words as f64 * 100.0
        };

        debug!(
            "Extracted {} chars from {} bytes of HTML (ratio {:.3})",
            result.extracted_text_length, result.original_html_length, result.text_ratio
        );
        result
    }

    /// Extract a batch in parallel, preserving input order. `urls`, when
    /// given, must parallel `documents`.
    pub fn extract_batch(
        &self,
        documents: &[String],
        urls: Option<&[String]>,
        progress: Option<&(dyn Fn(usize, usize) + Sync)>,
    ) -> Vec<TextExtractionResult> {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let done = AtomicUsize::new(0);

        documents
            .par_iter()
            .enumerate()
            .map(|(i, html)| {
                let url = urls.and_then(|u| u.get(i)).map(String::as_str);
                let result = self.extract(html, url);
                if let Some(cb) = progress {
                    cb(done.fetch_add(1, Ordering::Relaxed) + 1, documents.len());
                }
                result
            })
            .collect()
    }

    /// Element ids whose subtrees are excluded by the removal flags.
    fn removed_set(&self, dom: &Dom) -> HashSet<ElementId> {
        let mut removed = HashSet::new();
        for id in dom.ids() {
            let element = dom.get(id);
            let drop = match element.tag.as_str() {
                "script" | "style" | "noscript" | "iframe" | "embed" | "object" => {
                    self.config.remove_scripts
                }
                "nav" | "menu" | "aside" => self.config.remove_navigation,
                "header" | "footer" => self.config.remove_headers_footers,
                _ => {
                    (self.config.remove_navigation && BoilerplateScorer::is_navigation(element))
                        || (self.config.remove_ads && BoilerplateScorer::is_advertisement(element))
                        || (self.config.remove_forms && BoilerplateScorer::is_form(element))
                }
            };
            if drop {
                removed.insert(id);
            }
        }
        removed
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new(TextExtractionConfig::default())
    }
}

fn in_removed(dom: &Dom, removed: &HashSet<ElementId>, mut id: ElementId) -> bool {
    loop {
        if removed.contains(&id) {
            return true;
        }
        match dom.get(id).parent {
            Some(parent) => id = parent,
            None => return false,
        }
    }
}

/// Best-scoring subtree over the non-removed elements.
fn best_subtree_filtered(dom: &Dom, removed: &HashSet<ElementId>) -> ElementId {
    let mut best = dom.root();
    let mut best_score = f64::MIN;
    for id in dom.ids() {
        if dom.get(id).tag == "document" || in_removed(dom, removed, id) {
            continue;
        }
        let score = BoilerplateScorer::content_score(dom, id);
        if score > best_score {
            best = id;
            best_score = score;
        }
    }
    if best_score <= 0.0 {
        dom.root()
    } else {
        best
    }
}

/// Depth-first text assembly.
///
/// Paragraphs and headings end with a blank line; divs and explicit
/// breaks end with a single newline.
fn assemble_text(dom: &Dom, id: ElementId, removed: &HashSet<ElementId>, out: &mut String) {
    let element = dom.get(id);
    if !element.text.is_empty() {
        if !out.is_empty() && !out.ends_with('\n') && !out.ends_with(' ') {
            out.push(' ');
        }
        out.push_str(&element.text);
    }

    for &child in &element.children {
        if removed.contains(&child) {
            continue;
        }
        let tag = dom.get(child).tag.as_str();
        match tag {
            "br" => out.push('\n'),
            "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                assemble_text(dom, child, removed, out);
                out.push_str("\n\n");
            }
            "div" => {
                assemble_text(dom, child, removed, out);
                out.push('\n');
            }
            _ => assemble_text(dom, child, removed, out),
        }
    }
}

fn collect_headings(
    dom: &Dom,
    id: ElementId,
    removed: &HashSet<ElementId>,
    out: &mut Vec<String>,
) {
    let element = dom.get(id);
    if matches!(element.tag.as_str(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6") {
        let mut text = String::new();
        assemble_text(dom, id, removed, &mut text);
        let text = text.trim().to_string();
        if !text.is_empty() {
            out.push(text);
        }
    }
    for &child in &element.children {
        if !removed.contains(&child) {
            collect_headings(dom, child, removed, out);
        }
    }
}

/// Collect link targets under `id`; returns the total `<a>` count.
fn collect_links(
    dom: &Dom,
    id: ElementId,
    removed: &HashSet<ElementId>,
    out: &mut Vec<String>,
) -> usize {
    let element = dom.get(id);
    let mut count = 0usize;
    if element.tag == "a" {
        count += 1;
        if let Some(href) = element.attribute("href") {
            if !href.is_empty() {
                out.push(href.to_string());
            }
        }
    }
    for &child in &element.children {
        if !removed.contains(&child) {
            count += collect_links(dom, child, removed, out);
        }
    }
    count
}
