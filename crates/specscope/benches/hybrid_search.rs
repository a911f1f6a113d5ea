//! Criterion benchmarks for the retrieval hot path.
//!
//! - BM25 search over 1K / 10K chunks
//! - Brute-force cosine search over 10K vectors (384 dims)
//! - Candidate blending and ranking (200 + 200 candidates)
//! - Conflict extraction over 1K chunks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use uuid::Uuid;

use specscope::conflict::ConflictDetector;
use specscope::embeddings::HashEmbedder;
use specscope::index::{KeywordIndex, VectorIndex};
use specscope::retrieval::{rank_candidates, Normalization};
use specscope::Chunk;

const TOPICS: [&str; 8] = [
    "Fire rating of hollow metal doors shall be 90 minutes.",
    "Roof insulation R-value shall be R-30 minimum.",
    "Concrete compressive strength: 4000 psi at 28 days.",
    "Liquidated damages are $2,000 per calendar day.",
    "Submittals are due 14 days after notice to proceed.",
    "Frames shall be aluminum with thermal breaks.",
    "Performance bonds are required for 100% of the contract sum.",
    "Gypsum board shall be 5/8 in. type X on exterior walls.",
];

fn chunk_text(i: usize) -> String {
    format!(
        "SECTION {:02} {:02} 00 ITEM {}\n{} Coordinate with item {}.",
        i % 48,
        i % 90,
        i,
        TOPICS[i % TOPICS.len()],
        i * 7
    )
}

fn keyword_index(n: usize) -> KeywordIndex {
    let index = KeywordIndex::new(1.2, 0.75);
    for i in 0..n {
        index.index(&format!("c{:05}", i), &chunk_text(i));
    }
    index
}

fn bench_bm25(c: &mut Criterion) {
    let mut group = c.benchmark_group("bm25_search");
    for n in [1_000usize, 10_000] {
        let index = keyword_index(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &index, |b, index| {
            b.iter(|| index.search(black_box("fire rating hollow metal doors"), 40, |_| true));
        });
    }
    group.finish();
}

fn bench_vector(c: &mut Criterion) {
    let embedder = HashEmbedder::new(384);
    let index = VectorIndex::new(384);
    for i in 0..10_000 {
        let _ = index.upsert(&format!("c{:05}", i), embedder.embed_sync(&chunk_text(i)));
    }
    let query = embedder.embed_sync("roof insulation R-value");

    c.bench_function("vector_search_10k", |b| {
        b.iter(|| index.search(black_box(&query), 40, |_| true));
    });
}

fn bench_rank(c: &mut Criterion) {
    let keyword: Vec<(String, f32)> = (0..200)
        .map(|i| (format!("c{:05}", i), 20.0 - i as f32 * 0.1))
        .collect();
    let vector: Vec<(String, f32)> = (100..300)
        .map(|i| (format!("c{:05}", i), 1.0 - i as f32 * 0.002))
        .collect();

    let mut group = c.benchmark_group("rank_candidates");
    for norm in [Normalization::MinMax, Normalization::Rank] {
        group.bench_function(format!("{:?}", norm), |b| {
            b.iter(|| rank_candidates(black_box(&keyword), black_box(&vector), 0.5, norm));
        });
    }
    group.finish();
}

fn bench_conflicts(c: &mut Criterion) {
    let doc_a = Uuid::new_v4();
    let doc_b = Uuid::new_v4();
    let chunks: Vec<Chunk> = (0..1_000)
        .map(|i| {
            let text = chunk_text(i);
            let len = text.len();
            let doc = if i % 2 == 0 { doc_a } else { doc_b };
            Chunk::new(doc, text, 1, 0, len, i as u32)
        })
        .collect();
    let detector = ConflictDetector::default();

    c.bench_function("detect_conflicts_1k", |b| {
        b.iter(|| detector.detect_conflicts(black_box(&chunks), &Default::default()));
    });
}

criterion_group!(benches, bench_bm25, bench_vector, bench_rank, bench_conflicts);
criterion_main!(benches);
