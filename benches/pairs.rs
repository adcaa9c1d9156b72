use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array, Array1};
use preflearn::pairs::{label_pairs, PairRecord};
use preflearn::{extract_segments, Dataset, LabelPolicy, PairSampler, PreferenceLoader, Prng};
use rand::SeedableRng;
use tch::Device;

/// 200 trajectories of lengths between 50 and 149 steps.
fn dataset() -> Dataset {
    let lengths: Vec<usize> = (0..200).map(|i| 50 + (i * 37) % 100).collect();
    let total: usize = lengths.iter().sum();
    let obs_dim = 4;
    let mut observations = Vec::with_capacity(total * obs_dim);
    let mut rewards = Vec::with_capacity(total);
    let mut timeouts = Vec::with_capacity(total);
    for (i, &len) in lengths.iter().enumerate() {
        for t in 0..len {
            let x = (i * len + t) as f32 * 1e-3;
            observations.extend_from_slice(&[x, x.sin(), x.cos(), 1.0]);
            rewards.push(x.sin());
            timeouts.push(t + 1 == len);
        }
    }
    Dataset::new(
        Array::from_shape_vec((total, obs_dim), observations).unwrap(),
        Array::zeros((total, 2)),
        Array1::from(rewards),
        vec![false; total],
        timeouts,
    )
    .unwrap()
}

fn sample_pairs(c: &mut Criterion) {
    let dataset = dataset();
    let sampler = PairSampler::new(&dataset, extract_segments(&dataset), 10).unwrap();
    let mut rng = Prng::seed_from_u64(0);
    c.bench_function("sample_pairs_1000", |b| {
        b.iter(|| sampler.sample_pairs(black_box(1000), &mut rng))
    });
}

fn label(c: &mut Criterion) {
    let dataset = dataset();
    let sampler = PairSampler::new(&dataset, extract_segments(&dataset), 10).unwrap();
    let pairs = sampler.sample_pairs(1000, &mut Prng::seed_from_u64(0));

    let mut group = c.benchmark_group("label_pairs_1000");
    for policy in [
        LabelPolicy::Binary,
        LabelPolicy::Continuous,
        LabelPolicy::Sigmoid,
        LabelPolicy::SigmoidQuantized { step: 0.1 },
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(policy), &policy, |b, &policy| {
            b.iter(|| label_pairs(black_box(&pairs), policy))
        });
    }
    group.finish();
}

fn materialize_batches(c: &mut Criterion) {
    let dataset = dataset();
    let sampler = PairSampler::new(&dataset, extract_segments(&dataset), 10).unwrap();
    let pairs = sampler.sample_pairs(256, &mut Prng::seed_from_u64(0));
    let records: Vec<PairRecord> = label_pairs(&pairs, LabelPolicy::Binary)
        .unwrap()
        .iter()
        .map(PairRecord::from)
        .collect();

    let mut group = c.benchmark_group("materialize_256_pairs");
    for batch_size in [16, 64, 256] {
        let loader = PreferenceLoader::new(&dataset, records.clone(), batch_size, Device::Cpu)
            .unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &loader,
            |b, loader| b.iter(|| loader.batches().count()),
        );
    }
    group.finish();
}

criterion_group!(benches, sample_pairs, label, materialize_batches);
criterion_main!(benches);
