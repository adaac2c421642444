//! Benchmarks for hashing, exact dedup, and MinHash signatures

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rapidsift_core::document::Document;
use rapidsift_core::exact::{ExactDedupConfig, ExactDeduplicator};
use rapidsift_core::hashing::HashAlgorithm;
use rapidsift_core::minhash::MinHasher;
use rapidsift_core::near::{NearDedupConfig, NearDeduplicator};

fn sample_documents(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| {
            // every third document repeats an earlier body
            let key = if i % 3 == 0 { i / 3 } else { i };
            Document::new(
                format!("doc-{i}"),
                format!(
                    "Document body number {key} with enough words to resemble a \
                     realistic web paragraph for throughput measurement purposes."
                ),
            )
        })
        .collect()
}

fn bench_hash_algorithms(c: &mut Criterion) {
    let text = "The quick brown fox jumps over the lazy dog. ".repeat(50);
    let mut group = c.benchmark_group("hash_algorithms");
    group.throughput(Throughput::Bytes(text.len() as u64));

    for algorithm in [
        HashAlgorithm::XxHash64,
        HashAlgorithm::Md5,
        HashAlgorithm::Sha256,
    ] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{algorithm:?}")),
            &algorithm,
            |b, algo| b.iter(|| algo.hash(black_box(&text))),
        );
    }
    group.finish();
}

fn bench_exact_dedup(c: &mut Criterion) {
    let documents = sample_documents(10_000);
    let dedup = ExactDeduplicator::new(ExactDedupConfig::default());

    let mut group = c.benchmark_group("exact_dedup");
    group.throughput(Throughput::Elements(documents.len() as u64));
    group.bench_function("10k_docs", |b| {
        b.iter(|| dedup.deduplicate(black_box(&documents)))
    });
    group.finish();
}

fn bench_minhash_signature(c: &mut Criterion) {
    let hasher = MinHasher::with_seed(128, 5, 42);
    let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);

    c.bench_function("minhash_signature_128", |b| {
        b.iter(|| hasher.compute_signature(black_box(&text)))
    });
}

fn bench_near_dedup(c: &mut Criterion) {
    let documents = sample_documents(1_000);
    let dedup = NearDeduplicator::new(NearDedupConfig::default()).unwrap();

    let mut group = c.benchmark_group("near_dedup");
    group.sample_size(10);
    group.throughput(Throughput::Elements(documents.len() as u64));
    group.bench_function("minhash_1k_docs", |b| {
        b.iter(|| dedup.deduplicate(black_box(&documents), None))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_hash_algorithms,
    bench_exact_dedup,
    bench_minhash_signature,
    bench_near_dedup
);
criterion_main!(benches);
