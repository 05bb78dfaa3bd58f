use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ctqueue::arrivals::generate_population;
use ctqueue::experiment::{run_scenario, AnalysisOptions, Scenario};
use ctqueue::parameters::Parameters;
use ctqueue::policy::Policy;
use ctqueue::random::RandomStreams;
use ctqueue::simulator::QueueSimulator;

static SEED: u64 = 123;
static MEAN_RATE: f64 = 200.0;

fn parameters(policy: Policy) -> Parameters {
    Parameters {
        seed: SEED,
        mean_rate: MEAN_RATE,
        capacity_ratio: 0.9,
        proportion_cases_vaccinated: 0.5,
        prop_time_delay: 0.2,
        policy,
        ..Parameters::default()
    }
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue simulation");
    for policy in Policy::ALL {
        let parameters = parameters(policy);
        let cases = generate_population(&mut RandomStreams::new(SEED), &parameters)
            .expect("failed to generate population");
        group.bench_with_input(
            BenchmarkId::from_parameter(policy),
            &cases,
            |bencher, cases| {
                bencher.iter_with_large_drop(|| {
                    let mut streams = RandomStreams::new(SEED);
                    let mut simulator =
                        QueueSimulator::from_parameters(cases.clone(), &parameters, &policy);
                    simulator.run(&mut streams).expect("simulation failed");
                    simulator.into_parts()
                });
            },
        );
    }
    group.finish();

    let scenario = Scenario {
        index: 0,
        replicate: 0,
        parameters: parameters(Policy::Random),
    };
    let options = AnalysisOptions {
        bootstrap_resamples: 200,
        confidence_level: 0.95,
    };
    c.bench_function("full scenario with bootstrap", |bencher| {
        bencher.iter_with_large_drop(|| run_scenario(black_box(&scenario), &options));
    });
}

criterion_group!(simulation_benches, criterion_benchmark);
criterion_main!(simulation_benches);
