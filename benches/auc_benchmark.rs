use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use indicatif::ProgressBar;
use mutgather::metrics::auc::auc;
use mutgather::metrics::bootstrap::{bootstrap_mean_auc, draw_bootstrap_masks};
use mutgather::metrics::worker_pool;
use mutgather::types::{MutationType, PhenotypeTable};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

fn random_scores(n: usize, mean: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dist = Normal::new(mean, 1.0).unwrap();
    (0..n).map(|_| dist.sample(&mut rng)).collect()
}

fn benchmark_auc(c: &mut Criterion) {
    let sizes = [100_usize, 1_000, 10_000];
    let mut group = c.benchmark_group("auc");
    for &size in &sizes {
        let neg = random_scores(size, 0.0, 0x5EED + size as u64);
        let pos = random_scores(size, 0.5, 0xF00D + size as u64);
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::new("strict_pairs", size), &(neg, pos), |b, (neg, pos)| {
            b.iter(|| black_box(auc(black_box(neg), black_box(pos))));
        });
    }
    group.finish();
}

fn benchmark_bootstrap(c: &mut Criterion) {
    let (types, samples) = (64_usize, 400_usize);
    let mut rng = StdRng::seed_from_u64(7);
    let means = Array2::from_shape_fn((types, samples), |_| rng.r#gen::<f64>());
    let pheno = PhenotypeTable {
        rows: (0..types).map(|k| MutationType::new(format!("type{k}"))).collect(),
        samples: (0..samples).map(|s| format!("sample{s}")).collect(),
        values: Array2::from_shape_fn((types, samples), |_| rng.gen_bool(0.2)),
    };
    let masks = draw_bootstrap_masks(samples, 1000, 7609);
    let pool = worker_pool(12).unwrap();

    let mut group = c.benchmark_group("bootstrap");
    group.sample_size(10);
    group.bench_function("mean_auc_1000_draws", |b| {
        b.iter(|| {
            let dist = bootstrap_mean_auc(&pool, &means, &pheno, &masks, &ProgressBar::hidden()).unwrap();
            black_box(dist);
        });
    });
    group.finish();
}

criterion_group!(benches, benchmark_auc, benchmark_bootstrap);
criterion_main!(benches);
