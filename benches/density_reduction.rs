use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use orbpost::density::{DensityConfig, DensityInput};

/// `n` samples of `m` correlated variables.
fn random_input(n: usize, m: usize, seed: u64) -> DensityInput {
    let mut rng = StdRng::seed_from_u64(seed);
    let matrix = DMatrix::from_fn(n, m, |i, j| {
        let base = (i as f64 * 0.001).sin();
        base * (j as f64 + 1.0) + rng.random::<f64>()
    });
    let names = (0..m).map(|j| format!("v{j}")).collect();
    DensityInput::new(names, matrix).expect("valid density input")
}

fn bench_reduce(c: &mut Criterion) {
    let input = random_input(20_000, 8, 0xBADF00D);
    let config = DensityConfig::default();

    c.bench_function("density/reduce_20k_x_8", |b| {
        b.iter(|| black_box(input.reduce(black_box(&config))))
    });

    let no_pairs = DensityConfig::builder()
        .pairs(false)
        .build()
        .expect("valid config");
    c.bench_function("density/reduce_20k_x_8_no_pairs", |b| {
        b.iter(|| black_box(input.reduce(black_box(&no_pairs))))
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = bench_reduce
);
criterion_main!(benches);
