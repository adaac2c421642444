//! Permissive HTML parser producing an arena-backed element tree
//!
//! Elements live in a flat arena indexed by `ElementId`; the parent link
//! is just an optional index, which avoids reference-counted cycles and
//! keeps traversal cheap.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

pub type ElementId = usize;

/// Tags that never contain content
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// One element in the arena
#[derive(Debug, Clone, Default)]
pub struct Element {
    /// Lowercased tag name; the synthetic root uses `document`
    pub tag: String,
    pub attributes: HashMap<String, String>,
    /// Direct text content, concatenated in document order
    pub text: String,
    pub children: Vec<ElementId>,
    pub parent: Option<ElementId>,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Space-joined class and id attributes, lowercased, for keyword checks
    pub fn class_and_id(&self) -> String {
        let mut combined = String::new();
        if let Some(class) = self.attribute("class") {
            combined.push_str(class);
        }
        if let Some(id) = self.attribute("id") {
            if !combined.is_empty() {
                combined.push(' ');
            }
            combined.push_str(id);
        }
        combined.to_lowercase()
    }
}

/// Parsed document: an arena of elements rooted at a synthetic
/// `document` node
#[derive(Debug, Default)]
pub struct Dom {
    elements: Vec<Element>,
    root: ElementId,
}

impl Dom {
    pub fn root(&self) -> ElementId {
        self.root
    }

    pub fn get(&self, id: ElementId) -> &Element {
        &self.elements[id]
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// All element ids in arena (document) order
    pub fn ids(&self) -> impl Iterator<Item = ElementId> {
        0..self.elements.len()
    }

    /// Total text length of the subtree rooted at `id`
    pub fn subtree_text_len(&self, id: ElementId) -> usize {
        let element = self.get(id);
        element.text.len()
            + element
                .children
                .iter()
                .map(|&child| self.subtree_text_len(child))
                .sum::<usize>()
    }

    /// Count of subtree elements matching a tag
    pub fn subtree_tag_count(&self, id: ElementId, tag: &str) -> usize {
        let element = self.get(id);
        let own = usize::from(element.tag == tag);
        own + element
            .children
            .iter()
            .map(|&child| self.subtree_tag_count(child, tag))
            .sum::<usize>()
    }
}

/// Permissive HTML parser.
///
/// Malformed input never fails: unclosed tags are absorbed by the
/// containing element when a mismatched closing tag is seen, text
/// outside any element attaches to the synthetic root, and `<foo/>`
/// self-closing syntax is honored.
pub struct HtmlParser<'a> {
    html: &'a str,
    pos: usize,
}

impl<'a> HtmlParser<'a> {
    pub fn new(html: &'a str) -> Self {
        Self { html, pos: 0 }
    }

    pub fn parse(mut self) -> Dom {
        let mut dom = Dom {
            elements: vec![Element {
                tag: "document".to_string(),
                ..Default::default()
            }],
            root: 0,
        };
        let mut stack: Vec<ElementId> = vec![0];
        let bytes = self.html.as_bytes();

        while self.pos < bytes.len() {
            match self.html[self.pos..].find('<') {
                Some(offset) => {
                    if offset > 0 {
                        let text = &self.html[self.pos..self.pos + offset];
                        append_text(&mut dom, *stack.last().unwrap(), text);
                    }
                    self.pos += offset;
                    self.consume_markup(&mut dom, &mut stack);
                }
                None => {
                    let text = &self.html[self.pos..];
                    append_text(&mut dom, *stack.last().unwrap(), text);
                    break;
                }
            }
        }

        dom
    }

    /// Consume one `<...>` construct starting at `self.pos`
    fn consume_markup(&mut self, dom: &mut Dom, stack: &mut Vec<ElementId>) {
        let rest = &self.html[self.pos..];

        if rest.starts_with("<!--") {
            self.pos += match rest.find("-->") {
                Some(end) => end + 3,
                None => rest.len(),
            };
            return;
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            self.pos += match rest.find('>') {
                Some(end) => end + 1,
                None => rest.len(),
            };
            return;
        }

        if let Some(close) = rest.strip_prefix("</") {
            let (name, consumed) = match close.find('>') {
                Some(gt) => (close[..gt].trim().to_lowercase(), 2 + gt + 1),
                None => (close.trim().to_lowercase(), rest.len()),
            };
            self.pos += consumed;

            // Pop up to and including the matching open element; an
            // unmatched close is ignored and its unclosed children are
            // absorbed by the ancestor that does match.
            if let Some(depth) = stack.iter().rposition(|&id| dom.elements[id].tag == name) {
                if depth > 0 {
                    stack.truncate(depth);
                }
            }
            return;
        }

        // Opening tag
        let Some(tag_end) = rest.find('>') else {
            // trailing junk; attach as text to the current element
            append_text(dom, *stack.last().unwrap(), rest);
            self.pos = self.html.len();
            return;
        };
        let inner = &rest[1..tag_end];
        let self_closing = inner.ends_with('/');
        let inner = inner.trim_end_matches('/');

        let (name, attr_str) = match inner.find(char::is_whitespace) {
            Some(split) => (&inner[..split], &inner[split..]),
            None => (inner, ""),
        };
        let tag = name.trim().to_lowercase();
        self.pos += tag_end + 1;

        if tag.is_empty() {
            return;
        }

        let parent = *stack.last().unwrap();
        let id = dom.elements.len();
        dom.elements.push(Element {
            tag: tag.clone(),
            attributes: parse_attributes(attr_str),
            text: String::new(),
            children: Vec::new(),
            parent: Some(parent),
        });
        dom.elements[parent].children.push(id);

        if !self_closing && !VOID_TAGS.contains(&tag.as_str()) {
            stack.push(id);
        }
    }
}

fn append_text(dom: &mut Dom, id: ElementId, text: &str) {
    if text.trim().is_empty() {
        return;
    }
    let buffer = &mut dom.elements[id].text;
    if !buffer.is_empty() {
        buffer.push(' ');
    }
    buffer.push_str(text.trim());
}

/// Parse `name="value"`, `name='value'`, `name=value`, and bare `name`
/// attribute forms. Names are lowercased.
fn parse_attributes(input: &str) -> HashMap<String, String> {
    let mut attributes = HashMap::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        // attribute name
        let mut end = start;
        while let Some(&(i, c)) = chars.peek() {
            if c.is_whitespace() || c == '=' {
                break;
            }
            end = i + c.len_utf8();
            chars.next();
        }
        let name = input[start..end].to_lowercase();
        if name.is_empty() {
            chars.next();
            continue;
        }

        // skip whitespace before a possible '='
        while matches!(chars.peek(), Some(&(_, c)) if c.is_whitespace()) {
            chars.next();
        }

        let value = if matches!(chars.peek(), Some(&(_, '='))) {
            chars.next();
            while matches!(chars.peek(), Some(&(_, c)) if c.is_whitespace()) {
                chars.next();
            }
            match chars.peek() {
                Some(&(vstart, quote)) if quote == '"' || quote == '\'' => {
                    chars.next();
                    let vstart = vstart + 1;
                    let mut vend = vstart;
                    for (i, c) in chars.by_ref() {
                        if c == quote {
                            break;
                        }
                        vend = i + c.len_utf8();
                    }
                    input[vstart..vend].to_string()
                }
                Some(&(vstart, _)) => {
                    let mut vend = vstart;
                    while let Some(&(i, c)) = chars.peek() {
                        if c.is_whitespace() {
                            break;
                        }
                        vend = i + c.len_utf8();
                        chars.next();
                    }
                    input[vstart..vend].to_string()
                }
                None => String::new(),
            }
        } else {
            String::new()
        };

        attributes.insert(name, value);
    }

    attributes
}

static TITLE_RE: OnceLock<Regex> = OnceLock::new();
static META_RE: OnceLock<Regex> = OnceLock::new();

/// Page title pulled by regex so malformed pages still yield metadata.
pub fn extract_title(html: &str) -> String {
    let re = TITLE_RE
        .get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title regex"));
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| rapidsift_core::text::strip_html(m.as_str()))
        .unwrap_or_default()
}

/// `<meta name=... content=...>` values keyed by name, pulled by regex.
pub fn extract_meta(html: &str) -> HashMap<String, String> {
    let re = META_RE.get_or_init(|| {
        Regex::new(
            r#"(?is)<meta\s+[^>]*name\s*=\s*["']([^"']+)["'][^>]*content\s*=\s*["']([^"']*)["']"#,
        )
        .expect("meta regex")
    });
    re.captures_iter(html)
        .map(|c| (c[1].to_lowercase(), c[2].to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_nesting() {
        let dom = HtmlParser::new("<html><body><p>Hello</p></body></html>").parse();
        let root = dom.get(dom.root());
        assert_eq!(root.tag, "document");
        assert_eq!(root.children.len(), 1);

        let html = dom.get(root.children[0]);
        assert_eq!(html.tag, "html");
        let body = dom.get(html.children[0]);
        assert_eq!(body.tag, "body");
        let p = dom.get(body.children[0]);
        assert_eq!(p.tag, "p");
        assert_eq!(p.text, "Hello");
        assert_eq!(p.parent, Some(html.children[0]));
    }

    #[test]
    fn test_attributes() {
        let dom =
            HtmlParser::new(r#"<div class="main content" id=primary data-x='1'>text</div>"#).parse();
        let div = dom.get(dom.get(dom.root()).children[0]);
        assert_eq!(div.attribute("class"), Some("main content"));
        assert_eq!(div.attribute("id"), Some("primary"));
        assert_eq!(div.attribute("data-x"), Some("1"));
        assert_eq!(div.class_and_id(), "main content primary");
    }

    #[test]
    fn test_unclosed_tag_absorbed() {
        // <b> is never closed; </div> pops both
        let dom = HtmlParser::new("<div><b>bold text</div><p>after</p>").parse();
        let root = dom.get(dom.root());
        assert_eq!(root.children.len(), 2);
        assert_eq!(dom.get(root.children[1]).tag, "p");
        assert_eq!(dom.get(root.children[1]).text, "after");
    }

    #[test]
    fn test_text_outside_elements_attaches_to_root() {
        let dom = HtmlParser::new("stray text <p>para</p> more stray").parse();
        let root = dom.get(dom.root());
        assert_eq!(root.text, "stray text more stray");
    }

    #[test]
    fn test_self_closing() {
        let dom = HtmlParser::new("<div><foo/><p>x</p></div>").parse();
        let div = dom.get(dom.get(dom.root()).children[0]);
        assert_eq!(div.children.len(), 2);
        // foo took no children despite p following it
        assert!(dom.get(div.children[0]).children.is_empty());
    }

    #[test]
    fn test_void_tags_take_no_children() {
        let dom = HtmlParser::new("<p>a<br>b</p>").parse();
        let p = dom.get(dom.get(dom.root()).children[0]);
        assert_eq!(p.text, "a b");
        assert_eq!(dom.get(p.children[0]).tag, "br");
    }

    #[test]
    fn test_comments_and_doctype_skipped() {
        let dom = HtmlParser::new("<!DOCTYPE html><!-- hidden --><p>visible</p>").parse();
        let root = dom.get(dom.root());
        assert_eq!(root.children.len(), 1);
        assert_eq!(dom.get(root.children[0]).text, "visible");
    }

    #[test]
    fn test_mismatched_close_ignored() {
        let dom = HtmlParser::new("<div>content</span></div>").parse();
        let div = dom.get(dom.get(dom.root()).children[0]);
        assert_eq!(div.text, "content");
    }

    #[test]
    fn test_empty_input() {
        let dom = HtmlParser::new("").parse();
        assert_eq!(dom.len(), 1);
        assert!(dom.get(dom.root()).children.is_empty());
    }

    #[test]
    fn test_subtree_measures() {
        let dom = HtmlParser::new("<div><p>four</p><p>chars</p><a>link</a></div>").parse();
        let div_id = dom.get(dom.root()).children[0];
        assert_eq!(dom.subtree_text_len(div_id), "four".len() + "chars".len() + "link".len());
        assert_eq!(dom.subtree_tag_count(div_id, "p"), 2);
        assert_eq!(dom.subtree_tag_count(div_id, "a"), 1);
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(
            extract_title("<html><head><title>My &amp; Page</title></head><body></html>"),
            "My & Page"
        );
        assert_eq!(extract_title("<p>no title</p>"), "");
        // malformed page, title still found
        assert_eq!(extract_title("<title>Broken<body><<<"), "");
        assert_eq!(extract_title("<title>OK</title><body><<<"), "OK");
    }

    #[test]
    fn test_extract_meta() {
        let meta = extract_meta(
            r#"<meta name="description" content="A page"><meta name="Author" content="Jo">"#,
        );
        assert_eq!(meta.get("description").map(String::as_str), Some("A page"));
        assert_eq!(meta.get("author").map(String::as_str), Some("Jo"));
    }
}
