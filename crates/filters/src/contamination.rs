//! Benchmark-contamination filter
//!
//! Adapts the core decontamination engine to the filter contract so the
//! orchestrator can run it alongside the quality battery.

use std::sync::Arc;

use crate::decision::{FilterDecision, RejectReason};
use crate::Filter;
use rapidsift_core::decontam::DecontaminationFilter;
use rapidsift_core::Document;

/// Rejects documents that overlap loaded evaluation benchmarks
pub struct ContaminationFilter {
    engine: Arc<DecontaminationFilter>,
}

impl ContaminationFilter {
    pub fn new(engine: Arc<DecontaminationFilter>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &DecontaminationFilter {
        &self.engine
    }
}

impl Filter for ContaminationFilter {
    fn name(&self) -> &str {
        "contamination"
    }

    fn evaluate(&self, doc: &Document) -> FilterDecision {
        if !self.engine.is_loaded() {
            return FilterDecision::unknown("no benchmark datasets loaded");
        }

        let assessment = self.engine.assess_document(doc);
        let decision = if assessment.is_contaminated {
            let source = assessment
                .most_likely_source
                .as_deref()
                .unwrap_or("unknown");
            FilterDecision::reject(
                RejectReason::Contamination,
                (0.5 + assessment.contamination_score).min(0.95),
                format!(
                    "{} benchmark n-grams matched (likely source: {source})",
                    assessment.matches.len()
                ),
            )
        } else {
            FilterDecision::keep(
                1.0 - assessment.contamination_score,
                "no benchmark overlap above threshold",
            )
        };

        decision
            .with_metric("contamination_score", assessment.contamination_score)
            .with_metric("ngrams_checked", assessment.total_ngrams_checked as f64)
            .with_metric("ngrams_matched", assessment.matches.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::FilterResult;
    use rapidsift_core::decontam::DecontaminationConfig;

    fn engine_with(lines: &[&str]) -> Arc<DecontaminationFilter> {
        let mut engine = DecontaminationFilter::new(DecontaminationConfig {
            ngram_size: 8,
            ..Default::default()
        })
        .unwrap();
        let ngrams: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        engine.add_benchmark_ngrams(&ngrams, "evalset");
        engine.rebuild_bloom();
        Arc::new(engine)
    }

    #[test]
    fn test_contaminated_rejected() {
        let filter = ContaminationFilter::new(engine_with(&[
            "the capital of france is paris everyone",
        ]));
        let decision = filter.evaluate(&Document::new(
            "d",
            "the capital of france is paris everyone knows that much already",
        ));
        assert_eq!(decision.result, FilterResult::Reject);
        assert_eq!(decision.reason, Some(RejectReason::Contamination));
        assert!(decision.details.contains("evalset"));
        assert!(decision.metrics["contamination_score"] > 0.0);
    }

    #[test]
    fn test_clean_kept() {
        let filter = ContaminationFilter::new(engine_with(&[
            "the capital of france is paris everyone",
        ]));
        let decision = filter.evaluate(&Document::new(
            "d",
            "rust programs compile to efficient native machine code with no runtime overhead",
        ));
        assert_eq!(decision.result, FilterResult::Keep);
    }

    #[test]
    fn test_unloaded_engine_is_neutral() {
        let engine = Arc::new(
            DecontaminationFilter::new(DecontaminationConfig::default()).unwrap(),
        );
        let filter = ContaminationFilter::new(engine);
        let decision = filter.evaluate(&Document::new("d", "any text at all"));
        assert_eq!(decision.result, FilterResult::Unknown);
    }
}
