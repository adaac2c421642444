//! HTML-to-text extraction for web corpora
//!
//! Converts raw HTML into cleaned main-content text plus quality
//! metrics. The parser is deliberately permissive: real crawl data is
//! full of unclosed tags, stray text, and broken markup, and a page
//! that fails to parse is a page lost from the corpus.

pub mod parser;
pub mod boilerplate;
pub mod cleaner;
pub mod extractor;

pub use extractor::{TextExtractionConfig, TextExtractionResult, TextExtractor};
