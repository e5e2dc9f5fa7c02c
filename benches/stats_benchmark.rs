//! Statistics Benchmarks
//!
//! Benchmarks for the exact Mann-Whitney distribution, ranking, weighted
//! frequencies and OLS regression.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use statsuite::data::Variable;
use statsuite::stats;
use statsuite::stats::nonparametric::exact_u_distribution;
use statsuite::stats::rank::rank_groups;

/// Deterministic pseudo-random values in `[0, 1)`
fn synthetic(n: usize, seed: u64) -> Vec<f64> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            (state >> 33) as f64 / (1u64 << 31) as f64
        })
        .collect()
}

fn bench_exact_distribution(c: &mut Criterion) {
    let mut group = c.benchmark_group("exact_u_distribution");
    for &(n1, n2) in &[(5, 5), (10, 15), (19, 20)] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", n1, n2)),
            &(n1, n2),
            |b, &(n1, n2)| b.iter(|| exact_u_distribution(std::hint::black_box(n1), n2)),
        );
    }
    group.finish();
}

fn bench_ranking(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank_groups");
    for &size in &[100, 1_000, 10_000] {
        // coarse buckets produce plenty of ties
        let a: Vec<f64> = synthetic(size, 1).iter().map(|v| (v * 50.0).floor()).collect();
        let b: Vec<f64> = synthetic(size, 2).iter().map(|v| (v * 50.0).floor()).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |bench, _| {
            bench.iter(|| rank_groups(std::hint::black_box(&[a.as_slice(), b.as_slice()])))
        });
    }
    group.finish();
}

fn bench_frequencies(c: &mut Criterion) {
    let mut group = c.benchmark_group("frequencies");
    for &size in &[1_000, 10_000] {
        let values: Vec<f64> = synthetic(size, 3).iter().map(|v| (v * 20.0).floor()).collect();
        let weights: Vec<f64> = synthetic(size, 4).iter().map(|v| v + 0.5).collect();
        let variable = Variable::numeric("x", &values);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| stats::frequencies(std::hint::black_box(&variable), Some(&weights)).unwrap())
        });
    }
    group.finish();
}

fn bench_regression(c: &mut Criterion) {
    let mut group = c.benchmark_group("linear_regression");
    for &predictors in &[1, 3, 6] {
        let n = 500;
        let x: Vec<Vec<f64>> = (0..predictors).map(|p| synthetic(n, 10 + p as u64)).collect();
        let noise = synthetic(n, 99);
        let y: Vec<f64> = (0..n)
            .map(|i| x.iter().enumerate().map(|(p, col)| (p + 1) as f64 * col[i]).sum::<f64>() + noise[i])
            .collect();
        let columns: Vec<&[f64]> = x.iter().map(|c| c.as_slice()).collect();
        group.bench_with_input(BenchmarkId::from_parameter(predictors), &predictors, |b, _| {
            b.iter(|| stats::linear_regression(std::hint::black_box(y.as_slice()), &columns).unwrap())
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_exact_distribution,
    bench_ranking,
    bench_frequencies,
    bench_regression,
);

criterion_main!(benches);
