//! RapidSift corpus-curation CLI
//!
//! High-throughput quality filtering, content safety, deduplication,
//! decontamination, language identification, and HTML extraction for
//! LLM training corpora.

mod config;
mod progress;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use rapidsift_core::decontam::{DecontaminationConfig, DecontaminationFilter};
use rapidsift_core::exact::{ExactDedupConfig, ExactDeduplicator, KeepPolicy};
use rapidsift_core::hashing::HashAlgorithm;
use rapidsift_core::near::{NearDedupConfig, NearDedupMethod, NearDeduplicator};
use rapidsift_core::Document;
use rapidsift_extract::{TextExtractionConfig, TextExtractor};
use rapidsift_filters::language::{LanguageFilter, LanguageFilterConfig};
use rapidsift_filters::license::LicenseFilter;
use rapidsift_filters::metadata::MetadataFilter;
use rapidsift_filters::pii::PiiFilter;
use rapidsift_filters::pipeline::quality_filters;
use rapidsift_filters::toxicity::ToxicityFilter;
use rapidsift_filters::{CurationConfig, Filter, FilterPipeline, FilterResult};
use rapidsift_formats::lists::{load_opt_out_list, parse_domain_arg};
use rapidsift_formats::stats::StatsReport;
use rapidsift_formats::{read_documents, write_documents, CorpusFormat};

use config::load_config;
use progress::{print_summary, ProgressReporter};

#[derive(Parser)]
#[command(name = "rapidsift")]
#[command(version, about = "High-throughput corpus curation for LLM training data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the quality filter battery (length, gibberish, repetition, format)
    Quality {
        /// Input corpus (text, JSON, or JSONL; .gz supported)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for surviving documents
        #[arg(short, long)]
        output: PathBuf,

        /// Corpus format (text or json); inferred from the extension by default
        #[arg(short, long)]
        format: Option<String>,

        /// Configuration file (YAML, TOML, or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write run statistics to this JSON file
        #[arg(long)]
        stats: Option<PathBuf>,

        #[arg(long)]
        min_words: Option<usize>,

        #[arg(long)]
        max_words: Option<usize>,

        #[arg(long)]
        min_chars: Option<usize>,

        #[arg(long)]
        max_chars: Option<usize>,

        /// Maximum non-alphabetic character ratio
        #[arg(long)]
        max_non_alpha: Option<f64>,

        /// Minimum character entropy in bits
        #[arg(long)]
        min_entropy: Option<f64>,

        /// Worker threads (0 = auto)
        #[arg(long)]
        threads: Option<usize>,

        /// Print each rejection with its reasons
        #[arg(long)]
        analyze: bool,

        /// Print throughput after the run
        #[arg(long)]
        benchmark: bool,
    },

    /// Run the content-safety battery (domains, toxicity, PII, license)
    Content {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long)]
        format: Option<String>,

        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Blocked domains: a list file or comma-separated values
        #[arg(long)]
        blocked_domains: Option<String>,

        /// Allowed domains: a list file or comma-separated values
        #[arg(long)]
        allowed_domains: Option<String>,

        /// Reject documents whose URL host is an IP literal
        #[arg(long)]
        block_ip_urls: bool,

        #[arg(long)]
        toxicity_threshold: Option<f64>,

        #[arg(long)]
        hate_threshold: Option<f64>,

        #[arg(long)]
        nsfw_threshold: Option<f64>,

        #[arg(long)]
        remove_emails: bool,

        #[arg(long)]
        remove_phones: bool,

        #[arg(long)]
        remove_ssn: bool,

        /// Replace PII with [EMAIL]-style placeholders
        #[arg(long)]
        use_placeholders: bool,

        /// Sanitize instead of rejecting where possible
        #[arg(long)]
        sanitize_mode: bool,

        /// Reject on any violation
        #[arg(long)]
        strict_mode: bool,

        /// Publisher opt-out list (domain or domain<TAB>reason per line)
        #[arg(long)]
        opt_out: Option<PathBuf>,

        #[arg(long)]
        stats: Option<PathBuf>,
    },

    /// Remove exact or near duplicates
    Dedup {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long)]
        format: Option<String>,

        /// Deduplication mode
        #[arg(long, default_value = "exact", value_parser = ["exact", "near"])]
        mode: String,

        /// Hash algorithm for exact mode
        #[arg(long, default_value = "xxhash", value_parser = ["md5", "sha1", "sha256", "xxhash"])]
        algorithm: String,

        /// Signature method for near mode
        #[arg(long, default_value = "minhash", value_parser = ["minhash", "simhash"])]
        method: String,

        /// Similarity threshold for near mode
        #[arg(short, long, default_value = "0.8")]
        threshold: f64,

        /// Keep the last occurrence of each duplicate group instead of the first
        #[arg(long)]
        keep_last: bool,

        #[arg(long)]
        stats: Option<PathBuf>,
    },

    /// Keep documents in the target languages
    Language {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long)]
        format: Option<String>,

        /// Comma-separated ISO 639 codes to keep
        #[arg(long, default_value = "eng")]
        languages: String,

        #[arg(long, default_value = "0.65")]
        min_confidence: f64,

        /// Minimum text length for reliable detection
        #[arg(long, default_value = "10")]
        min_length: usize,

        /// Keep documents that mix writing scripts
        #[arg(long)]
        mixed_languages: bool,

        /// Write per-language counts to this JSON file
        #[arg(long)]
        lang_stats: Option<PathBuf>,
    },

    /// Extract main text from HTML documents
    Extract {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long)]
        format: Option<String>,

        /// Treat the whole input file as one HTML document
        #[arg(long)]
        html_input: bool,

        /// Store the page title in document metadata
        #[arg(long)]
        extract_title: bool,

        /// Drop navigation, ads, headers, and footers
        #[arg(long)]
        remove_boilerplate: bool,

        /// Minimum text/HTML ratio for a usable extraction
        #[arg(long, default_value = "0.1")]
        min_text_ratio: f64,

        /// Minimum extraction quality score to keep a document
        #[arg(long, default_value = "0.3")]
        quality_threshold: f64,

        /// Write per-document extraction metrics to this JSON file
        #[arg(long)]
        extraction_report: Option<PathBuf>,
    },

    /// Remove documents contaminated with benchmark data
    Decontaminate {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long)]
        format: Option<String>,

        /// Benchmark files or directories (.txt/.json/.csv)
        #[arg(short, long, required = true, num_args = 1..)]
        benchmarks: Vec<PathBuf>,

        /// Word n-gram size (8-50)
        #[arg(long, default_value = "13")]
        ngram_size: usize,

        /// Contaminated n-gram fraction at which a document is dropped
        #[arg(short, long, default_value = "0.1")]
        threshold: f64,

        /// Write contamination statistics to this JSON file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("set tracing subscriber");

    let outcome = match cli.command {
        command @ Commands::Quality { .. } => run_quality(command),
        command @ Commands::Content { .. } => run_content(command),
        command @ Commands::Dedup { .. } => run_dedup(command),
        command @ Commands::Language { .. } => run_language(command),
        command @ Commands::Extract { .. } => run_extract(command),
        command @ Commands::Decontaminate { .. } => run_decontaminate(command),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "rapidsift", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(err) = outcome {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn parse_format(format: Option<&str>, path: &Path) -> Result<CorpusFormat> {
    match format {
        Some(f) => Ok(f.parse()?),
        None => Ok(rapidsift_formats::detect_format(path)),
    }
}

/// A domain argument is either a list file or comma-separated values.
fn resolve_domains(arg: &str) -> Result<std::collections::HashSet<String>> {
    let path = Path::new(arg);
    if path.is_file() {
        Ok(rapidsift_formats::lists::load_domain_list(path)?)
    } else {
        Ok(parse_domain_arg(arg))
    }
}

/// Run a pipeline over a corpus and write survivors to `output`.
fn run_pipeline_command(
    pipeline: &FilterPipeline,
    input: &Path,
    output: &Path,
    format: CorpusFormat,
    stats_path: Option<&Path>,
    analyze: bool,
) -> Result<()> {
    let documents = read_documents(input, Some(format))
        .with_context(|| format!("failed to read corpus {}", input.display()))?;
    info!("Loaded {} documents from {}", documents.len(), input.display());

    let reporter = ProgressReporter::new(documents.len() as u64);
    let assessments = pipeline.process_batch(
        &documents,
        Some(&|processed, _total, stats| {
            reporter.update(processed, stats.kept, stats.rejected, stats.sanitized);
        }),
        None,
    );
    reporter.finish();

    if analyze {
        for assessment in &assessments {
            if assessment.final_result == FilterResult::Reject {
                let reasons: Vec<String> = assessment
                    .decisions
                    .iter()
                    .filter(|(_, d)| d.is_reject())
                    .map(|(name, d)| format!("{name}: {}", d.details))
                    .collect();
                println!("REJECT {} - {}", assessment.document.id, reasons.join("; "));
            }
        }
    }

    let survivors: Vec<Document> = assessments
        .iter()
        .filter(|a| a.final_result != FilterResult::Reject)
        .map(|a| {
            let mut doc = a.document.clone();
            if let Some(sanitized) = &a.final_sanitized_text {
                doc.text = sanitized.clone();
            }
            doc
        })
        .collect();

    write_documents(output, &survivors, format)?;

    let stats = pipeline.stats();
    if let Some(path) = stats_path {
        StatsReport::from(&stats).write(path)?;
    }
    print_summary(
        input,
        Some(output),
        stats.total_processed,
        stats.kept,
        stats.rejected,
        stats.sanitized,
    );
    Ok(())
}

fn run_quality(command: Commands) -> Result<()> {
    let Commands::Quality {
        input,
        output,
        format,
        config,
        stats,
        min_words,
        max_words,
        min_chars,
        max_chars,
        max_non_alpha,
        min_entropy,
        threads,
        analyze,
        benchmark,
    } = command
    else {
        unreachable!()
    };

    let mut curation = match config {
        Some(path) => load_config(&path)?,
        None => CurationConfig::default(),
    };
    if let Some(v) = min_words {
        curation.length.min_words = v;
    }
    if let Some(v) = max_words {
        curation.length.max_words = v;
    }
    if let Some(v) = min_chars {
        curation.length.min_chars = v;
    }
    if let Some(v) = max_chars {
        curation.length.max_chars = v;
    }
    if let Some(v) = max_non_alpha {
        curation.gibberish.max_non_alpha_ratio = v;
    }
    if let Some(v) = min_entropy {
        curation.gibberish.min_entropy = v;
    }
    if let Some(v) = threads {
        curation.num_threads = v;
    }
    curation.validate().context("invalid quality configuration")?;

    let format = parse_format(format.as_deref(), &input)?;
    let pipeline = FilterPipeline::new(quality_filters(), curation)?;

    let start = Instant::now();
    run_pipeline_command(&pipeline, &input, &output, format, stats.as_deref(), analyze)?;

    if benchmark {
        let elapsed = start.elapsed().as_secs_f64();
        let total = pipeline.stats().total_processed;
        println!(
            "Throughput: {:.0} documents/second ({total} documents in {elapsed:.2}s)",
            total as f64 / elapsed.max(1e-9)
        );
    }
    Ok(())
}

fn run_content(command: Commands) -> Result<()> {
    let Commands::Content {
        input,
        output,
        format,
        config,
        blocked_domains,
        allowed_domains,
        block_ip_urls,
        toxicity_threshold,
        hate_threshold,
        nsfw_threshold,
        remove_emails,
        remove_phones,
        remove_ssn,
        use_placeholders,
        sanitize_mode,
        strict_mode,
        opt_out,
        stats,
    } = command
    else {
        unreachable!()
    };

    let mut curation = match config {
        Some(path) => load_config(&path)?,
        None => CurationConfig::default(),
    };

    if let Some(arg) = blocked_domains {
        curation.metadata.blocked_domains = resolve_domains(&arg)?;
        curation.license.blocked_domains = curation.metadata.blocked_domains.clone();
    }
    if let Some(arg) = allowed_domains {
        curation.metadata.allowed_domains = resolve_domains(&arg)?;
    }
    curation.metadata.block_ip_urls |= block_ip_urls;
    if let Some(v) = toxicity_threshold {
        curation.toxicity.toxicity_threshold = v;
    }
    if let Some(v) = hate_threshold {
        curation.toxicity.hate_speech_threshold = v;
    }
    if let Some(v) = nsfw_threshold {
        curation.toxicity.nsfw_threshold = v;
    }
    curation.pii.remove_emails |= remove_emails;
    curation.pii.remove_phones |= remove_phones;
    curation.pii.remove_ssn |= remove_ssn;
    curation.pii.use_placeholders |= use_placeholders;
    curation.sanitize_mode = sanitize_mode || (!strict_mode && curation.sanitize_mode);
    curation.strict_mode = strict_mode;
    curation.validate().context("invalid content configuration")?;

    let mut license = LicenseFilter::default();
    if let Some(path) = &opt_out {
        for (domain, reason) in load_opt_out_list(path)? {
            license.add_opt_out(domain, reason);
        }
    }

    let filters: Vec<Box<dyn Filter>> = vec![
        Box::new(MetadataFilter::new(curation.metadata.clone())?),
        Box::new(ToxicityFilter::default()),
        Box::new(PiiFilter::default()),
        Box::new(license),
    ];

    let format = parse_format(format.as_deref(), &input)?;
    let pipeline = FilterPipeline::new(filters, curation)?;
    run_pipeline_command(&pipeline, &input, &output, format, stats.as_deref(), false)
}

fn run_dedup(command: Commands) -> Result<()> {
    let Commands::Dedup {
        input,
        output,
        format,
        mode,
        algorithm,
        method,
        threshold,
        keep_last,
        stats,
    } = command
    else {
        unreachable!()
    };

    let format = parse_format(format.as_deref(), &input)?;
    let documents = read_documents(&input, Some(format))?;
    info!("Loaded {} documents", documents.len());

    let result = match mode.as_str() {
        "exact" => {
            let algorithm: HashAlgorithm = algorithm.parse()?;
            let dedup = ExactDeduplicator::new(ExactDedupConfig {
                algorithm,
                keep: if keep_last { KeepPolicy::Last } else { KeepPolicy::First },
                parallel: true,
            });
            dedup.deduplicate(&documents)
        }
        "near" => {
            let method = match method.as_str() {
                "simhash" => NearDedupMethod::SimHash,
                _ => NearDedupMethod::MinHash,
            };
            let dedup = NearDeduplicator::new(NearDedupConfig {
                method,
                threshold,
                ..Default::default()
            })?;
            let reporter = ProgressReporter::new(documents.len() as u64);
            let result = dedup.deduplicate(
                &documents,
                Some(&|current, _total, _stage| reporter.set_position(current)),
            );
            reporter.finish();
            result
        }
        other => anyhow::bail!("unknown dedup mode: {other}"),
    };

    write_documents(&output, &result.unique_documents, format)?;

    if let Some(path) = stats {
        let report = serde_json::json!({
            "total_processed": result.original_count,
            "kept": result.unique_count(),
            "rejected": result.duplicates_removed(),
            "sanitized": 0,
            "duplicate_groups": result.duplicate_groups.len(),
            "reduction_percentage": result.reduction_percentage(),
        });
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
    }

    print_summary(
        &input,
        Some(&output),
        result.original_count,
        result.unique_count(),
        result.duplicates_removed(),
        0,
    );
    Ok(())
}

fn run_language(command: Commands) -> Result<()> {
    let Commands::Language {
        input,
        output,
        format,
        languages,
        min_confidence,
        min_length,
        mixed_languages,
        lang_stats,
    } = command
    else {
        unreachable!()
    };

    let format = parse_format(format.as_deref(), &input)?;
    let documents = read_documents(&input, Some(format))?;

    let filter = LanguageFilter::new(LanguageFilterConfig {
        target_languages: languages.split(',').map(|s| s.trim().to_string()).collect(),
        min_confidence,
        min_text_length: min_length,
        reject_mixed_scripts: !mixed_languages,
        model_path: None,
    })?;

    let reporter = ProgressReporter::new(documents.len() as u64);
    let mut kept = Vec::new();
    let mut language_counts: BTreeMap<String, usize> = BTreeMap::new();
    for (index, doc) in documents.iter().enumerate() {
        let detection = filter.detect_adjusted(&doc.text);
        *language_counts.entry(detection.language).or_insert(0) += 1;

        if filter.evaluate(doc).result == FilterResult::Keep {
            kept.push(doc.clone());
        }
        reporter.set_position(index + 1);
    }
    reporter.finish();

    write_documents(&output, &kept, format)?;

    if let Some(path) = lang_stats {
        let report = StatsReport {
            total_processed: documents.len(),
            kept: kept.len(),
            rejected: documents.len() - kept.len(),
            sanitized: 0,
            ..Default::default()
        }
        .with_languages(language_counts);
        report.write(&path)?;
    }

    print_summary(
        &input,
        Some(&output),
        documents.len(),
        kept.len(),
        documents.len() - kept.len(),
        0,
    );
    Ok(())
}

fn run_extract(command: Commands) -> Result<()> {
    let Commands::Extract {
        input,
        output,
        format,
        html_input,
        extract_title,
        remove_boilerplate,
        min_text_ratio,
        quality_threshold,
        extraction_report,
    } = command
    else {
        unreachable!()
    };

    let format = parse_format(format.as_deref(), &input)?;
    let documents: Vec<Document> = if html_input {
        let html = std::fs::read_to_string(&input)
            .with_context(|| format!("failed to read HTML file {}", input.display()))?;
        vec![Document::new("doc-0", html)]
    } else {
        read_documents(&input, Some(format))?
    };

    let extractor = TextExtractor::new(TextExtractionConfig {
        remove_navigation: remove_boilerplate,
        remove_headers_footers: remove_boilerplate,
        remove_ads: remove_boilerplate,
        extract_main_content: remove_boilerplate,
        min_text_ratio,
        ..Default::default()
    });

    let reporter = ProgressReporter::new(documents.len() as u64);
    let htmls: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
    let urls: Vec<String> = documents
        .iter()
        .map(|d| d.url.clone().unwrap_or_default())
        .collect();
    let results = extractor.extract_batch(
        &htmls,
        Some(&urls),
        Some(&|done, _total| reporter.set_position(done)),
    );
    reporter.finish();

    let mut kept = Vec::new();
    let mut report_entries = Vec::new();
    for (doc, result) in documents.iter().zip(&results) {
        let usable = result.is_valid() && result.quality_score() >= quality_threshold;
        report_entries.push(serde_json::json!({
            "id": doc.id,
            "is_valid": result.is_valid(),
            "quality_score": result.quality_score(),
            "text_ratio": result.text_ratio,
            "paragraph_count": result.paragraph_count,
            "link_density": result.link_density,
            "title": result.title,
        }));
        if usable {
            let mut extracted = doc.clone();
            extracted.text = result.extracted_text.clone();
            if extract_title && !result.title.is_empty() {
                extracted
                    .metadata
                    .insert("title".to_string(), result.title.clone());
            }
            kept.push(extracted);
        }
    }

    write_documents(&output, &kept, format)?;

    if let Some(path) = extraction_report {
        std::fs::write(&path, serde_json::to_string_pretty(&report_entries)?)?;
    }

    print_summary(
        &input,
        Some(&output),
        documents.len(),
        kept.len(),
        documents.len() - kept.len(),
        0,
    );
    Ok(())
}

fn run_decontaminate(command: Commands) -> Result<()> {
    let Commands::Decontaminate {
        input,
        output,
        format,
        benchmarks,
        ngram_size,
        threshold,
        report,
    } = command
    else {
        unreachable!()
    };

    let (files, dirs): (Vec<_>, Vec<_>) = benchmarks.iter().partition(|p| p.is_file());
    let decontam_config = DecontaminationConfig {
        ngram_size,
        contamination_threshold: threshold,
        benchmark_files: files.iter().map(|p| p.display().to_string()).collect(),
        benchmark_directories: dirs.iter().map(|p| p.display().to_string()).collect(),
        ..Default::default()
    };
    let filter = DecontaminationFilter::new(decontam_config)?;
    if !filter.is_loaded() {
        anyhow::bail!("no benchmark n-grams could be loaded");
    }
    info!(
        "Loaded {} benchmark n-grams from {} datasets",
        filter.benchmark_ngram_count(),
        filter.benchmark_datasets().len()
    );

    let format = parse_format(format.as_deref(), &input)?;
    let documents = read_documents(&input, Some(format))?;

    let reporter = ProgressReporter::new(documents.len() as u64);
    let mut kept = Vec::new();
    for (index, doc) in documents.iter().enumerate() {
        let assessment = filter.assess_document(doc);
        if !assessment.is_contaminated {
            kept.push(doc.clone());
        }
        reporter.set_position(index + 1);
    }
    reporter.finish();

    write_documents(&output, &kept, format)?;

    let stats = filter.stats();
    if let Some(path) = report {
        let report = StatsReport {
            total_processed: stats.documents_processed,
            kept: kept.len(),
            rejected: stats.contaminated_documents,
            sanitized: 0,
            ..Default::default()
        }
        .with_contamination(stats.contamination_by_dataset.clone());
        report.write(&path)?;
    }

    print_summary(
        &input,
        Some(&output),
        documents.len(),
        kept.len(),
        stats.contaminated_documents,
        0,
    );
    Ok(())
}
