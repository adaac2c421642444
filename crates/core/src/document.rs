//! Document model shared by every curation stage

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// A single text document with optional provenance metadata.
///
/// Documents are owned by the caller's input batch; curation stages
/// borrow them for the duration of a run and only clone when a
/// sanitizing filter produces a replacement text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Opaque identity, unique within a batch
    pub id: String,
    /// UTF-8 document body
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document from an id and body text
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    /// Create a document carrying a source URL
    pub fn with_url(id: impl Into<String>, text: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        let domain = crate::text::extract_domain(&url);
        Self {
            id: id.into(),
            text: text.into(),
            domain: (!domain.is_empty()).then_some(domain),
            url: Some(url),
            ..Default::default()
        }
    }

    /// Effective domain: the explicit field, or one derived from the URL
    pub fn effective_domain(&self) -> Option<String> {
        if let Some(d) = &self.domain {
            return Some(d.clone());
        }
        self.url
            .as_deref()
            .map(crate::text::extract_domain)
            .filter(|d| !d.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }
}

/// Outcome of a deduplication run.
///
/// Unique documents are listed in input order; `original_indices[i]` is
/// the position the i-th survivor held in the input batch.
#[derive(Debug, Clone, Default)]
pub struct DedupResult {
    pub unique_documents: Vec<Document>,
    pub original_indices: Vec<usize>,
    /// Groups of input indices that collapsed into one survivor.
    /// Singleton documents do not appear here.
    pub duplicate_groups: Vec<Vec<usize>>,
    pub original_count: usize,
    pub processing_time: Duration,
}

impl DedupResult {
    pub fn unique_count(&self) -> usize {
        self.unique_documents.len()
    }

    pub fn duplicates_removed(&self) -> usize {
        self.original_count - self.unique_count()
    }

    pub fn reduction_percentage(&self) -> f64 {
        if self.original_count == 0 {
            0.0
        } else {
            (self.duplicates_removed() as f64 / self.original_count as f64) * 100.0
        }
    }
}
