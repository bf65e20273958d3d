//! Brute-force vs partial-selection search over a 1536-dim matrix.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use swatch::similarity::{BruteForce, IndexAccelerated, Matrix, SimilaritySearch, normalized};

const DIM: usize = 1536;

fn generate_embedding(dim: usize, seed: u64) -> Vec<f32> {
    let v: Vec<f32> = (0..dim)
        .map(|i| ((i as f64 + seed as f64) * 0.1).sin() as f32)
        .collect();
    normalized(&v)
}

fn generate_matrix(rows: usize, dim: usize) -> Matrix {
    let data = (0..rows)
        .flat_map(|r| generate_embedding(dim, r as u64 * 7 + 3))
        .collect();
    Matrix::new(dim, data).expect("well-formed matrix")
}

fn bench_top_n(c: &mut Criterion) {
    let query = generate_embedding(DIM, 42);
    let mut group = c.benchmark_group("top_n");

    for rows in [64usize, 512, 4096] {
        let matrix = generate_matrix(rows, DIM);
        group.throughput(Throughput::Elements(rows as u64));

        let searches: [&dyn SimilaritySearch; 2] = [&BruteForce, &IndexAccelerated];
        for search in searches {
            group.bench_with_input(BenchmarkId::new(search.name(), rows), &matrix, |b, m| {
                b.iter(|| search.top_n(black_box(m), black_box(&query), 12))
            });
        }
    }
    group.finish();
}

fn bench_best_score(c: &mut Criterion) {
    let query = generate_embedding(DIM, 42);
    let matrix = generate_matrix(40, DIM);
    let mut group = c.benchmark_group("best_score_40_samples");

    let searches: [&dyn SimilaritySearch; 2] = [&BruteForce, &IndexAccelerated];
    for search in searches {
        group.bench_function(search.name(), |b| {
            b.iter(|| search.best_score(black_box(&matrix), black_box(&query)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_top_n, bench_best_score);
criterion_main!(benches);
