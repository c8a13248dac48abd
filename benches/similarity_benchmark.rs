use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rec_algebra::neighborhood::NeighborhoodPredictor;
use std::time::Duration;

fn create_rating_matrix(rows: usize, cols: usize, density: f64, seed: u64) -> CsrMatrix<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut coo = CooMatrix::new(rows, cols);
    let total_elements = ((rows * cols) as f64 * density) as usize;
    for _ in 0..total_elements {
        let row = rng.random_range(0..rows);
        let col = rng.random_range(0..cols);
        let value = rng.random_range(1..=5) as f64;
        coo.push(row, col, value);
    }
    CsrMatrix::from(&coo)
}

fn similarity_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("row_similarity");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(10);

    for &rows in &[100usize, 500, 1000] {
        let matrix = create_rating_matrix(rows, rows * 2, 0.05, 42);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &matrix, |b, m| {
            b.iter(|| NeighborhoodPredictor::similarity(m).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, similarity_benchmark);
criterion_main!(benches);
