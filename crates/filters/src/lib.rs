//! Quality, content-safety, license, and language filters
//!
//! Every filter implements the same small contract and the
//! [`pipeline::FilterPipeline`] composes them into a single verdict per
//! document. Filters never panic: internal failures surface as neutral
//! `Unknown` decisions that the orchestrator ignores for scoring.

pub mod error;
pub mod decision;
pub mod config;
pub mod pipeline;

pub mod contamination;
pub mod length;
pub mod gibberish;
pub mod repetition;
pub mod format;
pub mod metadata;
pub mod toxicity;
pub mod pii;
pub mod license;
pub mod model;
pub mod language;

pub use config::{CurationConfig, PipelineMode};
pub use decision::{Assessment, FilterDecision, FilterResult, PiiType, RejectReason, ToxicityCategory};
pub use error::{Error, Result};
pub use pipeline::{CurationStats, FilterPipeline};

use rapidsift_core::Document;

/// The uniform filter contract.
///
/// `configure` rebuilds compiled patterns from the global configuration;
/// it is called once before a run, never per document.
pub trait Filter: Send + Sync {
    fn evaluate(&self, doc: &Document) -> FilterDecision;

    fn name(&self) -> &str;

    fn configure(&mut self, _config: &CurationConfig) -> Result<()> {
        Ok(())
    }
}
