//! Filter orchestrator
//!
//! Runs an ordered set of filters over documents, fuses their decisions
//! into one verdict per document, and processes batches in parallel
//! chunks with order-preserving output.

use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::{CurationConfig, PipelineMode};
use crate::decision::{Assessment, FilterDecision, FilterResult, PiiType, RejectReason};
use crate::{Filter, Result};
use rapidsift_core::batch::CancelToken;
use rapidsift_core::Document;

/// Running statistics for a curation run.
///
/// Counters are eventually consistent while a batch is in flight
/// (updated at chunk boundaries) and exact when the run completes.
/// `kept + rejected + sanitized == total_processed` always holds.
#[derive(Debug, Clone, Default)]
pub struct CurationStats {
    pub total_processed: usize,
    pub kept: usize,
    pub rejected: usize,
    pub sanitized: usize,
    pub rejection_counts: HashMap<RejectReason, usize>,
    pub removed_pii: HashMap<PiiType, usize>,
    /// Cumulative per-filter evaluation time in milliseconds
    pub filter_timings_ms: HashMap<String, f64>,
    /// Filters disabled after repeated failures
    pub degraded_filters: Vec<String>,
}

impl CurationStats {
    pub fn rejection_rate(&self) -> f64 {
        if self.total_processed == 0 {
            0.0
        } else {
            self.rejected as f64 / self.total_processed as f64
        }
    }

    pub fn keep_rate(&self) -> f64 {
        if self.total_processed == 0 {
            0.0
        } else {
            self.kept as f64 / self.total_processed as f64
        }
    }

    fn fold_assessment(&mut self, assessment: &Assessment) {
        self.total_processed += 1;
        match assessment.final_result {
            FilterResult::Reject => {
                self.rejected += 1;
                if let Some(reason) = assessment.rejection_reason() {
                    *self.rejection_counts.entry(reason).or_insert(0) += 1;
                }
            }
            FilterResult::Sanitize => {
                self.sanitized += 1;
                for (_, decision) in &assessment.decisions {
                    if decision.result == FilterResult::Sanitize {
                        for element in &decision.removed_elements {
                            if let Some(kind) = element.split(':').next() {
                                if let Some(pii) = pii_type_from_str(kind) {
                                    *self.removed_pii.entry(pii).or_insert(0) += 1;
                                }
                            }
                        }
                    }
                }
            }
            // Unknown never escapes fusion; count it as kept defensively
            FilterResult::Keep | FilterResult::Unknown => self.kept += 1,
        }
    }
}

fn pii_type_from_str(s: &str) -> Option<PiiType> {
    match s {
        "email" => Some(PiiType::Email),
        "phone" => Some(PiiType::Phone),
        "ssn" => Some(PiiType::Ssn),
        "credit_card" => Some(PiiType::CreditCard),
        "ip_address" => Some(PiiType::IpAddress),
        "physical_address" => Some(PiiType::PhysicalAddress),
        "person_name" => Some(PiiType::PersonName),
        "custom" => Some(PiiType::Custom),
        _ => None,
    }
}

/// Progress callback: `(processed, total, stats)`. Runs on a worker
/// thread at chunk boundaries; must not block.
pub type ProgressCallback<'a> = &'a (dyn Fn(usize, usize, &CurationStats) + Sync);

struct FilterSlot {
    filter: Box<dyn Filter>,
    consecutive_errors: AtomicUsize,
    disabled: AtomicBool,
}

/// Orchestrates an ordered vector of filters
pub struct FilterPipeline {
    slots: Vec<FilterSlot>,
    config: CurationConfig,
    stats: Mutex<CurationStats>,
}

impl FilterPipeline {
    /// Pipeline over the given filters, configured from `config`.
    pub fn new(mut filters: Vec<Box<dyn Filter>>, config: CurationConfig) -> Result<Self> {
        config.validate()?;
        for filter in &mut filters {
            filter.configure(&config)?;
        }
        let slots = filters
            .into_iter()
            .map(|filter| FilterSlot {
                filter,
                consecutive_errors: AtomicUsize::new(0),
                disabled: AtomicBool::new(false),
            })
            .collect();
        info!("Created filter pipeline in {:?} mode", config.mode());
        Ok(Self {
            slots,
            config,
            stats: Mutex::new(CurationStats::default()),
        })
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.filter.name()).collect()
    }

    /// Evaluate one document through every enabled filter.
    pub fn process_document(&self, doc: &Document) -> Assessment {
        self.process_inner(doc).0
    }

    fn process_inner(&self, doc: &Document) -> (Assessment, Vec<(String, f64)>) {
        let mode = self.config.mode();
        let mut working = doc.clone();
        let mut final_sanitized: Option<String> = None;
        let mut decisions: Vec<(String, FilterDecision)> = Vec::with_capacity(self.slots.len());
        let mut timings: Vec<(String, f64)> = Vec::with_capacity(self.slots.len());
        let mut early_reject = false;

        for slot in &self.slots {
            if slot.disabled.load(Ordering::Relaxed) {
                continue;
            }

            let start = Instant::now();
            let decision = slot.filter.evaluate(&working);
            timings.push((
                slot.filter.name().to_string(),
                start.elapsed().as_secs_f64() * 1000.0,
            ));

            self.track_filter_health(slot, &decision, &doc.id);

            let is_reject = decision.is_reject();
            if decision.result == FilterResult::Sanitize {
                if let Some(text) = &decision.sanitized_text {
                    // later filters see the sanitized copy
                    working.text = text.clone();
                    final_sanitized = Some(text.clone());
                }
            }
            decisions.push((slot.filter.name().to_string(), decision));

            // strict and sanitize modes short-circuit on rejection
            if is_reject && matches!(mode, PipelineMode::Strict | PipelineMode::Sanitize) {
                early_reject = true;
                break;
            }
        }

        let (final_result, overall_score) =
            self.fuse(&decisions, early_reject, final_sanitized.is_some());

        let mut feature_scores = HashMap::new();
        for (name, decision) in &decisions {
            for (metric, value) in &decision.metrics {
                feature_scores.insert(format!("{name}.{metric}"), *value);
            }
        }

        let assessment = Assessment {
            document: doc.clone(),
            decisions,
            final_result,
            overall_score,
            final_sanitized_text: if final_result == FilterResult::Reject {
                None
            } else {
                final_sanitized
            },
            feature_scores,
        };
        (assessment, timings)
    }

    /// Fuse per-filter decisions into the final verdict.
    ///
    /// Keep and Sanitize contribute their confidence to the weighted
    /// quality average; a rejection contributes `1 − confidence` to the
    /// average and its confidence to the danger accumulator. Unknown is
    /// neutral. The document is rejected when any rejection reaches the
    /// critical confidence or the danger share exceeds the rejection
    /// threshold; exact ties fall back to keeping.
    fn fuse(
        &self,
        decisions: &[(String, FilterDecision)],
        early_reject: bool,
        any_sanitized: bool,
    ) -> (FilterResult, f64) {
        let mut weighted_quality = 0.0;
        let mut weight_total = 0.0;
        let mut danger = 0.0;
        let mut critical_reject = false;

        for (name, decision) in decisions {
            let weight = self.config.weight_for(name);
            match decision.result {
                FilterResult::Keep | FilterResult::Sanitize => {
                    weighted_quality += weight * decision.confidence;
                    weight_total += weight;
                }
                FilterResult::Reject => {
                    weighted_quality += weight * (1.0 - decision.confidence);
                    weight_total += weight;
                    danger += weight * decision.confidence;
                    if decision.confidence >= self.config.critical_confidence {
                        critical_reject = true;
                    }
                }
                FilterResult::Unknown => {}
            }
        }

        let overall = if weight_total > 0.0 {
            weighted_quality / weight_total
        } else {
            1.0
        };
        let danger_share = if weight_total > 0.0 {
            danger / weight_total
        } else {
            0.0
        };

        let rejected =
            early_reject || critical_reject || danger_share > self.config.rejection_threshold;

        let final_result = if rejected {
            FilterResult::Reject
        } else if any_sanitized {
            FilterResult::Sanitize
        } else {
            FilterResult::Keep
        };
        (final_result, overall.clamp(0.0, 1.0))
    }

    /// Count consecutive neutral failures and disable filters that keep
    /// failing.
    fn track_filter_health(&self, slot: &FilterSlot, decision: &FilterDecision, doc_id: &str) {
        if decision.result == FilterResult::Unknown {
            let errors = slot.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                "Filter {} returned neutral for document {}: {}",
                slot.filter.name(),
                doc_id,
                decision.details
            );
            if errors >= self.config.max_consecutive_filter_errors
                && !slot.disabled.swap(true, Ordering::Relaxed)
            {
                warn!(
                    "Disabling filter {} after {} consecutive errors",
                    slot.filter.name(),
                    errors
                );
                self.stats
                    .lock()
                    .unwrap()
                    .degraded_filters
                    .push(slot.filter.name().to_string());
            }
        } else {
            slot.consecutive_errors.store(0, Ordering::Relaxed);
        }
    }

    /// Process a batch in parallel chunks, returning assessments in
    /// input order. Statistics are folded once per chunk under a single
    /// lock; the progress callback fires at the same boundaries.
    pub fn process_batch(
        &self,
        documents: &[Document],
        progress: Option<ProgressCallback<'_>>,
        cancel: Option<&CancelToken>,
    ) -> Vec<Assessment> {
        let total = documents.len();
        let mut results: Vec<Assessment> = Vec::with_capacity(total);

        for chunk in documents.chunks(self.config.chunk_size.max(1)) {
            if cancel.map(|c| c.load(Ordering::Relaxed)).unwrap_or(false) {
                info!("Batch cancelled after {} documents", results.len());
                break;
            }

            let chunk_results: Vec<(Assessment, Vec<(String, f64)>)> =
                chunk.par_iter().map(|doc| self.process_inner(doc)).collect();

            {
                let mut stats = self.stats.lock().unwrap();
                for (assessment, timings) in &chunk_results {
                    stats.fold_assessment(assessment);
                    for (name, ms) in timings {
                        *stats.filter_timings_ms.entry(name.clone()).or_insert(0.0) += ms;
                    }
                }
            }

            results.extend(chunk_results.into_iter().map(|(a, _)| a));

            if let Some(cb) = progress {
                let snapshot = self.stats.lock().unwrap().clone();
                cb(results.len(), total, &snapshot);
            }
        }

        results
    }

    pub fn stats(&self) -> CurationStats {
        self.stats.lock().unwrap().clone()
    }

    pub fn reset_stats(&self) {
        *self.stats.lock().unwrap() = CurationStats::default();
    }

    pub fn config(&self) -> &CurationConfig {
        &self.config
    }
}

/// The standard quality battery in evaluation order.
pub fn quality_filters() -> Vec<Box<dyn Filter>> {
    vec![
        Box::new(crate::length::LengthFilter::default()),
        Box::new(crate::gibberish::GibberishFilter::default()),
        Box::new(crate::repetition::RepetitionFilter::default()),
        Box::new(crate::format::FormatFilter::default()),
        Box::new(crate::model::ModelQualityFilter::new(Default::default())),
    ]
}

/// The content-safety battery in evaluation order.
pub fn content_filters() -> Vec<Box<dyn Filter>> {
    vec![
        Box::new(crate::metadata::MetadataFilter::new(Default::default()).expect("default metadata config")),
        Box::new(crate::toxicity::ToxicityFilter::default()),
        Box::new(crate::pii::PiiFilter::default()),
        Box::new(crate::license::LicenseFilter::default()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::FilterDecision;

    struct AlwaysKeep;
    impl Filter for AlwaysKeep {
        fn name(&self) -> &str {
            "always_keep"
        }
        fn evaluate(&self, _doc: &Document) -> FilterDecision {
            FilterDecision::keep(0.9, "ok")
        }
    }

    struct AlwaysReject {
        confidence: f64,
    }
    impl Filter for AlwaysReject {
        fn name(&self) -> &str {
            "always_reject"
        }
        fn evaluate(&self, _doc: &Document) -> FilterDecision {
            FilterDecision::reject(RejectReason::Custom, self.confidence, "no")
        }
    }

    struct AlwaysUnknown;
    impl Filter for AlwaysUnknown {
        fn name(&self) -> &str {
            "always_unknown"
        }
        fn evaluate(&self, _doc: &Document) -> FilterDecision {
            FilterDecision::unknown("broken")
        }
    }

    struct UppercaseSanitizer;
    impl Filter for UppercaseSanitizer {
        fn name(&self) -> &str {
            "upper"
        }
        fn evaluate(&self, doc: &Document) -> FilterDecision {
            if doc.text.contains("dirty") {
                FilterDecision::sanitize(
                    doc.text.replace("dirty", "[CLEAN]"),
                    vec!["custom: dirty -> [CLEAN]".to_string()],
                    0.9,
                    "cleaned",
                )
            } else {
                FilterDecision::keep(0.9, "nothing to do")
            }
        }
    }

    /// Sees the text the previous filter produced
    struct RecordText;
    impl Filter for RecordText {
        fn name(&self) -> &str {
            "record"
        }
        fn evaluate(&self, doc: &Document) -> FilterDecision {
            FilterDecision::keep(0.9, doc.text.clone())
        }
    }

    fn balanced_config() -> CurationConfig {
        CurationConfig {
            strict_mode: false,
            sanitize_mode: false,
            ..Default::default()
        }
    }

    fn docs(n: usize) -> Vec<Document> {
        (0..n)
            .map(|i| Document::new(format!("doc-{i}"), format!("document body {i}")))
            .collect()
    }

    #[test]
    fn test_every_document_gets_one_assessment() {
        let pipeline =
            FilterPipeline::new(vec![Box::new(AlwaysKeep)], balanced_config()).unwrap();
        let input = docs(25);
        let assessments = pipeline.process_batch(&input, None, None);

        assert_eq!(assessments.len(), 25);
        for assessment in &assessments {
            assert!(matches!(
                assessment.final_result,
                FilterResult::Keep | FilterResult::Reject | FilterResult::Sanitize
            ));
            assert!((0.0..=1.0).contains(&assessment.overall_score));
        }
    }

    #[test]
    fn test_counters_sum_to_total() {
        let pipeline = FilterPipeline::new(
            vec![Box::new(UppercaseSanitizer), Box::new(AlwaysKeep)],
            CurationConfig::default(),
        )
        .unwrap();

        let mut input = docs(10);
        input[3].text = "some dirty text".to_string();
        input[7].text = "more dirty text".to_string();
        pipeline.process_batch(&input, None, None);

        let stats = pipeline.stats();
        assert_eq!(stats.total_processed, 10);
        assert_eq!(stats.kept + stats.rejected + stats.sanitized, stats.total_processed);
        assert_eq!(stats.sanitized, 2);
    }

    #[test]
    fn test_strict_mode_short_circuits() {
        let config = CurationConfig {
            strict_mode: true,
            ..Default::default()
        };
        let pipeline = FilterPipeline::new(
            vec![
                Box::new(AlwaysReject { confidence: 0.6 }),
                Box::new(AlwaysKeep),
            ],
            config,
        )
        .unwrap();

        let assessment = pipeline.process_document(&Document::new("x", "text"));
        assert_eq!(assessment.final_result, FilterResult::Reject);
        // the second filter never ran
        assert_eq!(assessment.decisions.len(), 1);
    }

    #[test]
    fn test_balanced_mode_runs_all_filters() {
        let pipeline = FilterPipeline::new(
            vec![
                Box::new(AlwaysReject { confidence: 0.6 }),
                Box::new(AlwaysKeep),
            ],
            balanced_config(),
        )
        .unwrap();

        let assessment = pipeline.process_document(&Document::new("x", "text"));
        assert_eq!(assessment.decisions.len(), 2);
    }

    #[test]
    fn test_critical_rejection_wins_in_balanced() {
        let pipeline = FilterPipeline::new(
            vec![
                Box::new(AlwaysReject { confidence: 0.95 }),
                Box::new(AlwaysKeep),
                Box::new(AlwaysKeep),
            ],
            balanced_config(),
        )
        .unwrap();
        let assessment = pipeline.process_document(&Document::new("x", "text"));
        assert_eq!(assessment.final_result, FilterResult::Reject);
    }

    #[test]
    fn test_low_confidence_rejection_outvoted() {
        // one hesitant rejection among confident keeps: danger share
        // stays below the threshold
        let pipeline = FilterPipeline::new(
            vec![
                Box::new(AlwaysReject { confidence: 0.55 }),
                Box::new(AlwaysKeep),
                Box::new(AlwaysKeep),
                Box::new(AlwaysKeep),
            ],
            balanced_config(),
        )
        .unwrap();
        let assessment = pipeline.process_document(&Document::new("x", "text"));
        assert_eq!(assessment.final_result, FilterResult::Keep);
    }

    #[test]
    fn test_sanitized_text_forwarded_to_later_filters() {
        let pipeline = FilterPipeline::new(
            vec![Box::new(UppercaseSanitizer), Box::new(RecordText)],
            CurationConfig::default(),
        )
        .unwrap();

        let assessment = pipeline.process_document(&Document::new("x", "very dirty text"));
        assert_eq!(assessment.final_result, FilterResult::Sanitize);
        assert_eq!(
            assessment.final_sanitized_text.as_deref(),
            Some("very [CLEAN] text")
        );
        // the second filter saw the sanitized copy
        let record_details = &assessment.decisions[1].1.details;
        assert_eq!(record_details, "very [CLEAN] text");
        // the original document is untouched
        assert_eq!(assessment.document.text, "very dirty text");
    }

    #[test]
    fn test_unknown_is_neutral() {
        let pipeline = FilterPipeline::new(
            vec![Box::new(AlwaysUnknown), Box::new(AlwaysKeep)],
            balanced_config(),
        )
        .unwrap();
        let assessment = pipeline.process_document(&Document::new("x", "text"));
        assert_eq!(assessment.final_result, FilterResult::Keep);
        // unknown contributes nothing to the score
        assert!((assessment.overall_score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_failing_filter_disabled_after_threshold() {
        let config = CurationConfig {
            max_consecutive_filter_errors: 3,
            strict_mode: false,
            sanitize_mode: false,
            ..Default::default()
        };
        let pipeline = FilterPipeline::new(
            vec![Box::new(AlwaysUnknown), Box::new(AlwaysKeep)],
            config,
        )
        .unwrap();

        for doc in docs(5) {
            pipeline.process_document(&doc);
        }
        // disabled after the third consecutive failure
        let assessment = pipeline.process_document(&Document::new("x", "text"));
        assert_eq!(assessment.decisions.len(), 1);
        assert_eq!(
            pipeline.stats().degraded_filters,
            vec!["always_unknown".to_string()]
        );
    }

    #[test]
    fn test_batch_order_preserved() {
        let pipeline =
            FilterPipeline::new(vec![Box::new(AlwaysKeep)], balanced_config()).unwrap();
        let input = docs(100);
        let assessments = pipeline.process_batch(&input, None, None);
        for (i, assessment) in assessments.iter().enumerate() {
            assert_eq!(assessment.document.id, format!("doc-{i}"));
        }
    }

    #[test]
    fn test_progress_fires_per_chunk() {
        let config = CurationConfig {
            chunk_size: 10,
            ..balanced_config()
        };
        let pipeline = FilterPipeline::new(vec![Box::new(AlwaysKeep)], config).unwrap();

        let calls = AtomicUsize::new(0);
        pipeline.process_batch(
            &docs(35),
            Some(&|processed, total, stats| {
                calls.fetch_add(1, Ordering::Relaxed);
                assert!(processed <= total);
                assert_eq!(stats.kept, processed);
            }),
            None,
        );
        assert_eq!(calls.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_cancellation_stops_between_chunks() {
        use std::sync::atomic::AtomicBool;
        use std::sync::Arc;

        let config = CurationConfig {
            chunk_size: 5,
            ..balanced_config()
        };
        let pipeline = FilterPipeline::new(vec![Box::new(AlwaysKeep)], config).unwrap();

        let cancel: CancelToken = Arc::new(AtomicBool::new(false));
        let cancel_clone = cancel.clone();
        let results = pipeline.process_batch(
            &docs(100),
            Some(&move |_, _, _| {
                cancel_clone.store(true, Ordering::Relaxed);
            }),
            Some(&cancel),
        );

        // first chunk completes, cancellation observed before the second
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn test_rejected_document_has_no_sanitized_output() {
        let config = CurationConfig {
            strict_mode: false,
            sanitize_mode: true,
            ..Default::default()
        };
        let pipeline = FilterPipeline::new(
            vec![
                Box::new(UppercaseSanitizer),
                Box::new(AlwaysReject { confidence: 0.95 }),
            ],
            config,
        )
        .unwrap();
        let assessment = pipeline.process_document(&Document::new("x", "dirty stuff"));
        assert_eq!(assessment.final_result, FilterResult::Reject);
        assert!(assessment.final_sanitized_text.is_none());
    }
}
