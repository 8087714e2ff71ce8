use criterion::{black_box, BatchSize, BenchmarkId};
use criterion::{criterion_group, criterion_main, Criterion};
use mallows_smc::data::{RawTimeSeries, TimeSeries};
use mallows_smc::{EngineBuilder, Metric, Prior, SmcOptions};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

fn timeseries(n_items: usize, n_users: usize) -> TimeSeries {
    let mut rng = Xoshiro256Plus::seed_from_u64(1337);
    let step = (0..n_users)
        .map(|user| {
            let mut ranking: Vec<u32> = (1..=n_items as u32).collect();
            ranking.shuffle(&mut rng);
            // hide the bottom half
            ranking
                .iter_mut()
                .filter(|r| **r as usize > n_items / 2)
                .for_each(|r| *r = 0);
            (format!("user_{user}"), ranking)
        })
        .collect();
    let raw = RawTimeSeries::Rankings {
        n_items,
        steps: vec![step],
    };
    TimeSeries::from_raw(raw, 1).unwrap()
}

fn bench_first_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("SMC step");
    for metric in [Metric::Footrule, Metric::Kendall] {
        let id = BenchmarkId::new(metric.to_string(), 8);
        group.bench_function(id, |b| {
            b.iter_batched(
                || {
                    let options = SmcOptions::new()
                        .metric(metric)
                        .n_particles(100)
                        .n_particle_filters(10)
                        .max_rejuvenation_steps(2);
                    EngineBuilder::new(timeseries(8, 20), Prior::new(8))
                        .options(options)
                        .seed_from_u64(1337)
                        .build()
                        .unwrap()
                },
                |mut engine| black_box(engine.step().unwrap()),
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

criterion_group!(smc_benches, bench_first_step);
criterion_main!(smc_benches);
