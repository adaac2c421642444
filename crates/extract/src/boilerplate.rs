//! Boilerplate detection and content scoring
//!
//! Scores each element by how likely it is to hold main content versus
//! navigation, chrome, or advertising. Scores drive both boilerplate
//! removal and main-content subtree selection.

use crate::parser::{Dom, Element, ElementId};

const CONTENT_TAGS: &[&str] = &[
    "article", "main", "section", "div", "p", "h1", "h2", "h3", "h4", "h5", "h6",
];

const BOILERPLATE_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "embed", "object", "nav", "header", "footer",
    "aside", "menu",
];

const CONTENT_CLASS_KEYWORDS: &[&str] =
    &["content", "article", "main", "body", "text", "post", "entry"];

const NAVIGATION_CLASS_KEYWORDS: &[&str] =
    &["nav", "navigation", "menu", "sidebar", "footer", "header"];

const AD_CLASS_KEYWORDS: &[&str] = &["ad", "ads", "advertisement", "banner", "sponsor"];

const FORM_TAGS: &[&str] = &["form", "input", "button", "select", "textarea", "label"];

/// Content scorer over a parsed DOM
pub struct BoilerplateScorer;

impl BoilerplateScorer {
    /// Content score of one element.
    ///
    /// Positive signals: content tag (+10), content class keyword (+10),
    /// subtree text length capped at 20 points. Negative: boilerplate
    /// tag (−20), navigation class/id (−15), advertisement marker
    /// (−25), and a link-density penalty once links exceed 5 per 100
    /// text bytes.
    pub fn content_score(dom: &Dom, id: ElementId) -> f64 {
        let element = dom.get(id);
        let mut score = 0.0;

        if CONTENT_TAGS.contains(&element.tag.as_str()) {
            score += 10.0;
        }
        if BOILERPLATE_TAGS.contains(&element.tag.as_str()) {
            score -= 20.0;
        }

        let markers = element.class_and_id();
        if has_keyword(&markers, CONTENT_CLASS_KEYWORDS) {
            score += 10.0;
        }
        if has_keyword(&markers, NAVIGATION_CLASS_KEYWORDS) {
            score -= 15.0;
        }
        if has_keyword(&markers, AD_CLASS_KEYWORDS) {
            score -= 25.0;
        }

        let text_len = dom.subtree_text_len(id);
        score += (text_len as f64 / 10.0).min(20.0);

        if text_len > 0 {
            let links = dom.subtree_tag_count(id, "a");
            let density = links as f64 / text_len as f64 * 100.0;
            if density > 5.0 {
                score -= density;
            }
        }

        score
    }

    /// True when the element (ignoring its subtree) is boilerplate:
    /// chrome tags, navigation markers, or ad markers.
    pub fn is_boilerplate(element: &Element) -> bool {
        if BOILERPLATE_TAGS.contains(&element.tag.as_str()) {
            return true;
        }
        let markers = element.class_and_id();
        has_keyword(&markers, NAVIGATION_CLASS_KEYWORDS) || has_keyword(&markers, AD_CLASS_KEYWORDS)
    }

    pub fn is_navigation(element: &Element) -> bool {
        matches!(element.tag.as_str(), "nav" | "menu")
            || has_keyword(&element.class_and_id(), NAVIGATION_CLASS_KEYWORDS)
    }

    pub fn is_advertisement(element: &Element) -> bool {
        has_keyword(&element.class_and_id(), AD_CLASS_KEYWORDS)
    }

    pub fn is_form(element: &Element) -> bool {
        FORM_TAGS.contains(&element.tag.as_str())
    }

    /// Id of the best-scoring subtree, used as the extraction root when
    /// main-content selection is enabled. Falls back to the document
    /// root when nothing scores positive.
    pub fn best_subtree(dom: &Dom) -> ElementId {
        let mut best = dom.root();
        let mut best_score = f64::MIN;
        for id in dom.ids() {
            if dom.get(id).tag == "document" {
                continue;
            }
            let score = Self::content_score(dom, id);
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
}

/// Keyword check over the class/id token list.
///
/// Short markers ("ad", "ads", "nav") must match a whole token so that
/// "shadow" or "navy" do not trip them; longer keywords match as
/// substrings ("post-body" hits "post").
fn has_keyword(markers: &str, keywords: &[&str]) -> bool {
    if markers.is_empty() {
        return false;
    }
    let tokens: Vec<&str> = markers
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|t| !t.is_empty())
        .collect();

    keywords.iter().any(|keyword| {
        if keyword.len() <= 3 {
            tokens.iter().any(|t| t == keyword)
        } else {
            markers.contains(keyword)
        }
    })
}
