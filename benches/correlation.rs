use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fov_align::engine::classify;
use fov_align::imaging::fft::{fft_2d, to_complex};
use fov_align::imaging::gaussian_filter;
use fov_align::HitThresholdPolicy;
use ndarray::Array2;

/// Deterministic pseudo-random points in a `side`×`side` square.
fn scatter(n: usize, side: f64, seed: u64) -> Vec<(f64, f64)> {
    let mut rng = seed;
    let mut next = move || {
        rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (rng >> 11) as f64 / (1u64 << 53) as f64
    };
    (0..n).map(|_| (next() * side, next() * side)).collect()
}

fn bench_fft(c: &mut Criterion) {
    let mut group = c.benchmark_group("fft_2d");
    for side in [256usize, 512, 1024] {
        let grid = Array2::from_shape_fn((side, side), |(r, c)| ((r * 31 + c * 17) % 13) as f64);
        let complex = to_complex(&grid);
        group.bench_with_input(BenchmarkId::from_parameter(side), &complex, |b, input| {
            b.iter(|| fft_2d(black_box(input)))
        });
    }
    group.finish();
}

fn bench_raster_smoothing(c: &mut Criterion) {
    let mut canvas = Array2::zeros((512, 512));
    for (r, col) in scatter(4000, 511.0, 7) {
        canvas[[r as usize, col as usize]] = 1.0;
    }
    c.bench_function("gaussian_filter_512", |b| {
        b.iter(|| gaussian_filter(black_box(&canvas), 0.9375))
    });
}

fn bench_classify(c: &mut Criterion) {
    let clusters = scatter(5000, 2048.0, 11);
    let reads: Vec<(f64, f64)> = clusters
        .iter()
        .map(|&(r, col)| (r + 0.3, col - 0.2))
        .chain(scatter(1000, 2048.0, 13))
        .collect();
    let policy = HitThresholdPolicy::Fixed { pixels: 5.0 };
    c.bench_function("classify_5000", |b| {
        b.iter(|| classify(black_box(&clusters), black_box(&reads), policy, 16.0 / 60.0))
    });
}

criterion_group!(benches, bench_fft, bench_raster_smoothing, bench_classify);
criterion_main!(benches);
