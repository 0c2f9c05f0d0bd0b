//! Benchmarks comparing loops and reductions against a sequential baseline
//! and against `rayon`.

use divan::Bencher;
use rayon::prelude::*;
use stride::{Range, ThreadPool};

// -----------------------------------------------------------------------------
// Workload

const SIZES: &[i64] = &[1_000, 100_000, 10_000_000];

#[inline]
fn work(i: i64) -> f64 {
    (i as f64).sqrt().sin()
}

// -----------------------------------------------------------------------------
// Flat reduction

#[divan::bench(args = SIZES)]
fn flat_baseline(bencher: Bencher, n: i64) {
    bencher.bench_local(move || (0..n).map(work).sum::<f64>());
}

#[divan::bench(args = SIZES)]
fn flat_stride(bencher: Bencher, n: i64) {
    let pool = ThreadPool::global();
    let range = Range::upto(n).unwrap();
    bencher.bench_local(move || pool.reduce(range, work, |a, b| a + b).unwrap());
}

#[divan::bench(args = SIZES)]
fn flat_stride_chunked(bencher: Bencher, n: i64) {
    let pool = ThreadPool::global();
    let range = Range::new(0, n, 1, 1024).unwrap();
    bencher.bench_local(move || pool.reduce(range, work, |a, b| a + b).unwrap());
}

#[divan::bench(args = SIZES)]
fn flat_rayon(bencher: Bencher, n: i64) {
    bencher.bench_local(move || (0..n).into_par_iter().map(work).sum::<f64>());
}

// -----------------------------------------------------------------------------
// Nested loops

const ROWS: i64 = 512;
const COLS: i64 = 2048;

#[divan::bench]
fn nested_baseline(bencher: Bencher) {
    bencher.bench_local(|| {
        (0..ROWS)
            .map(|r| (0..COLS).map(|c| work(r * COLS + c)).sum::<f64>())
            .sum::<f64>()
    });
}

#[divan::bench]
fn nested_stride(bencher: Bencher) {
    let pool = ThreadPool::global();
    let rows = Range::upto(ROWS).unwrap();
    let cols = Range::upto(COLS).unwrap();
    bencher.bench_local(move || {
        pool.reduce(
            rows,
            |r| pool.reduce(cols, |c| work(r * COLS + c), |a, b| a + b).unwrap(),
            |a, b| a + b,
        )
        .unwrap()
    });
}

#[divan::bench]
fn nested_rayon(bencher: Bencher) {
    bencher.bench_local(|| {
        (0..ROWS)
            .into_par_iter()
            .map(|r| (0..COLS).into_par_iter().map(|c| work(r * COLS + c)).sum::<f64>())
            .sum::<f64>()
    });
}

fn main() {
    divan::main();
}
