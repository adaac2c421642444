//! End-to-end curation demo: quality battery + PII sanitization over an
//! in-memory corpus.
//!
//! Run with: cargo run --example curate_demo

use rapidsift_core::Document;
use rapidsift_filters::pii::PiiFilter;
use rapidsift_filters::pipeline::quality_filters;
use rapidsift_filters::{CurationConfig, Filter, FilterPipeline, FilterResult};

fn main() -> anyhow::Result<()> {
    let documents = vec![
        Document::new(
            "article",
            "The research team spent three seasons cataloguing alpine flora. \
             Their survey covered forty ridgelines and produced a public dataset \
             that other ecologists have already started to build on.",
        ),
        Document::new("stub", "Click here"),
        Document::new(
            "contact",
            "For reprint questions write to editor@dailyherald.net or call 555-867-5309 today. \
             The editorial desk answers most messages within two business days.",
        ),
        Document::new(
            "junk",
            "zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz",
        ),
    ];

    let mut filters = quality_filters();
    filters.push(Box::new(PiiFilter::default()) as Box<dyn Filter>);

    let pipeline = FilterPipeline::new(filters, CurationConfig::default())?;
    let assessments = pipeline.process_batch(&documents, None, None);

    for assessment in &assessments {
        match assessment.final_result {
            FilterResult::Keep => println!("KEEP     {}", assessment.document.id),
            FilterResult::Sanitize => println!(
                "SANITIZE {} -> {}",
                assessment.document.id,
                assessment.output_text()
            ),
            FilterResult::Reject => {
                let reason = assessment
                    .rejection_reason()
                    .map(|r| r.as_str())
                    .unwrap_or("fused");
                println!("REJECT   {} ({reason})", assessment.document.id);
            }
            FilterResult::Unknown => unreachable!("fusion never emits Unknown"),
        }
    }

    let stats = pipeline.stats();
    println!(
        "\n{} processed: {} kept, {} sanitized, {} rejected",
        stats.total_processed, stats.kept, stats.sanitized, stats.rejected
    );
    Ok(())
}
