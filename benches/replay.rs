//! Trace replay throughput for every engine.
//!
//! Each benchmark replays a pre-generated synthetic trace into a freshly
//! built engine. Hit ratios for the same traces are printed once per run so
//! throughput numbers can be read next to policy quality.

use std::hint::black_box;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use evictsim::builder::{PolicyBuilder, PolicyKind};
use evictsim::{AccessType, BlockKey, ReplacementPolicy, replay};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Zipf};

const CAPACITY: usize = 4096;
const UNIVERSE: u64 = 65_536;
const TRACE_LEN: usize = 100_000;
const WRITE_FRACTION: f64 = 0.3;

#[derive(Debug, Clone, Copy)]
enum TraceShape {
    /// Uniform keys in `[0, UNIVERSE)`.
    Uniform,
    /// Zipfian keys, exponent 1.0.
    Zipfian,
    /// Zipfian keys with every fourth access taken from a sequential scan.
    ScanMix,
}

impl TraceShape {
    fn label(self) -> &'static str {
        match self {
            TraceShape::Uniform => "uniform",
            TraceShape::Zipfian => "zipfian",
            TraceShape::ScanMix => "scan_mix",
        }
    }
}

fn generate_trace(shape: TraceShape, seed: u64) -> Vec<(BlockKey, AccessType)> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let zipf = Zipf::new(UNIVERSE as f64, 1.0).expect("valid zipf parameters");
    let mut scan_pos = 0u64;

    let zipf_key = |rng: &mut SmallRng| {
        let sample: f64 = zipf.sample(rng);
        (sample as u64).saturating_sub(1).min(UNIVERSE - 1)
    };

    let mut trace = Vec::with_capacity(TRACE_LEN);
    for i in 0..TRACE_LEN {
        let key = match shape {
            TraceShape::Uniform => rng.random_range(0..UNIVERSE),
            TraceShape::Zipfian => zipf_key(&mut rng),
            TraceShape::ScanMix if i % 4 == 0 => {
                scan_pos = (scan_pos + 1) % UNIVERSE;
                scan_pos
            },
            TraceShape::ScanMix => zipf_key(&mut rng),
        };
        let access = if rng.random::<f64>() < WRITE_FRACTION {
            AccessType::Write
        } else {
            AccessType::Read
        };
        trace.push((key, access));
    }
    trace
}

fn bench_replay(c: &mut Criterion) {
    let shapes = [
        TraceShape::Uniform,
        TraceShape::Zipfian,
        TraceShape::ScanMix,
    ];

    for shape in shapes {
        let trace = generate_trace(shape, 42);
        let mut group = c.benchmark_group(format!("replay_{}", shape.label()));
        group.throughput(Throughput::Elements(trace.len() as u64));

        for kind in PolicyKind::defaults() {
            let mut quality = PolicyBuilder::new(CAPACITY).build(kind);
            replay(&mut quality, trace.iter().copied()).expect("replay succeeds");
            println!("{}: {}", shape.label(), quality.hit_stats());

            group.bench_with_input(BenchmarkId::from_parameter(kind.name()), &trace, |b, trace| {
                b.iter_batched(
                    || PolicyBuilder::new(CAPACITY).build(kind),
                    |mut policy| {
                        let applied = replay(&mut policy, trace.iter().copied());
                        black_box((applied, policy.counters().hits))
                    },
                    BatchSize::LargeInput,
                )
            });
        }
        group.finish();
    }
}

fn bench_hit_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("hit_path");
    group.throughput(Throughput::Elements(CAPACITY as u64));

    for kind in PolicyKind::defaults() {
        group.bench_function(kind.name(), |b| {
            b.iter_batched(
                || {
                    let mut policy = PolicyBuilder::new(CAPACITY).build(kind);
                    for key in 0..CAPACITY as u64 {
                        policy
                            .reference(key, AccessType::Read)
                            .expect("warmup reference");
                    }
                    policy
                },
                |mut policy| {
                    for key in 0..CAPACITY as u64 {
                        let _ = policy.reference(black_box(key), AccessType::Read);
                    }
                    policy
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_replay, bench_hit_path);
criterion_main!(benches);
