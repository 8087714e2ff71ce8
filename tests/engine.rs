use approx::*;
use maplit::btreemap;
use mallows_smc::data::{
    LatentRankProposal, ObservedUsers, Observation, RawTimeSeries, TimeSeries,
};
use mallows_smc::stats::PartitionFunction;
use mallows_smc::update_handler::UpdateHandler;
use mallows_smc::utils::{is_permutation, logsumexp};
use mallows_smc::{
    run_engine, Engine, EngineBuilder, Metric, Particle, Prior, Resampler,
    SmcOptions, SmcResults, StepReport,
};

fn rankings(n_items: usize, steps: Vec<Vec<(&str, Vec<u32>)>>) -> TimeSeries {
    let raw = RawTimeSeries::Rankings {
        n_items,
        steps: steps
            .into_iter()
            .map(|step| {
                step.into_iter()
                    .map(|(user, ranking)| (user.to_owned(), ranking))
                    .collect()
            })
            .collect(),
    };
    TimeSeries::from_raw(raw, 1_000).unwrap()
}

fn sushi_like() -> TimeSeries {
    rankings(
        5,
        vec![
            vec![("u1", vec![1, 2, 3, 4, 5]), ("u2", vec![2, 1, 3, 0, 0])],
            vec![("u3", vec![1, 3, 2, 5, 4]), ("u4", vec![0, 0, 1, 0, 2])],
            vec![("u2", vec![2, 1, 3, 5, 4]), ("u5", vec![1, 2, 0, 0, 0])],
            vec![("u6", vec![5, 4, 3, 2, 1])],
        ],
    )
}

fn options() -> SmcOptions {
    SmcOptions::new()
        .n_particles(16)
        .n_particle_filters(3)
        .max_particle_filters(12)
        .max_rejuvenation_steps(3)
}

fn engine(
    timeseries: TimeSeries,
    prior: Prior,
    options: SmcOptions,
    seed: u64,
) -> Engine {
    EngineBuilder::new(timeseries, prior)
        .options(options)
        .seed_from_u64(seed)
        .build()
        .unwrap()
}

fn assert_valid_results(results: &SmcResults) {
    results
        .rho
        .iter()
        .flatten()
        .for_each(|rho| assert!(is_permutation(rho)));
    results
        .alpha
        .iter()
        .flatten()
        .for_each(|&alpha| assert!(alpha > 0.0));
    results.tau.iter().for_each(|tau| {
        assert_relative_eq!(tau.iter().sum::<f64>(), 1.0, epsilon = 1E-10);
        assert!(tau.iter().all(|&w| w >= 0.0));
    });
    assert_relative_eq!(
        results.importance_weights.iter().sum::<f64>(),
        1.0,
        epsilon = 1E-10
    );
    assert!(results.diagnostics.log_marginal_likelihood.is_finite());
}

#[test]
fn single_complete_observation_gives_exact_likelihood() {
    let timeseries = rankings(3, vec![vec![("a", vec![2, 1, 3])]]);
    let options = SmcOptions::new()
        .metric(Metric::Kendall)
        .n_particles(5)
        .n_particle_filters(2)
        .resampling_threshold(0.0);
    let mut engine = engine(timeseries, Prior::new(3), options, 1337);
    let report = engine.step().unwrap();
    assert!(report.rejuvenation.is_none());

    let partition = PartitionFunction::new(Metric::Kendall, 3, None).unwrap();
    let log_liks: Vec<f64> = engine
        .particles
        .iter()
        .map(|p| {
            let alpha = p.parameters.alpha[0];
            let d = Metric::Kendall.distance(&[2, 1, 3], &p.parameters.rho[0]);
            let expected = -alpha * d as f64 - partition.logz(alpha);
            assert_relative_eq!(
                p.log_incremental_likelihood[0],
                expected,
                epsilon = 1E-10
            );
            expected
        })
        .collect();

    let expected_ml = logsumexp(&log_liks) - 5.0_f64.ln();
    assert_relative_eq!(
        engine.diagnostics.log_marginal_likelihood,
        expected_ml,
        epsilon = 1E-10
    );
}

#[test]
fn one_missing_item_completes_deterministically() {
    let timeseries = rankings(3, vec![vec![("a", vec![1, 2, 0])]]);
    let options = SmcOptions::new()
        .n_particles(4)
        .n_particle_filters(3)
        .resampling_threshold(0.0);
    let mut engine = engine(timeseries, Prior::new(3), options, 7);
    engine.step().unwrap();
    engine.particles.iter().for_each(|p| {
        p.filters.iter().for_each(|f| {
            let draw = f.latent(0).unwrap();
            assert_eq!(draw.ranking, vec![1, 2, 3]);
            assert_eq!(draw.log_proposal, 0.0);
            assert_relative_eq!(
                f.log_weight[0],
                draw.log_likelihood,
                epsilon = 1E-12
            );
        });
    });
}

#[test]
fn forced_resampling_at_first_step_keeps_population_size() {
    let options = options()
        .resampling_threshold(1_000.0)
        .doubling_threshold(0.0);
    let mut engine = engine(sushi_like(), Prior::new(5), options, 11);
    let report = engine.step().unwrap();

    assert!(report.rejuvenation.is_some());
    assert_eq!(engine.n_particles(), 16);
    assert_eq!(engine.diagnostics.resampled, vec![true]);
    assert_eq!(engine.n_particle_filters, 3);
    engine
        .particles
        .iter()
        .for_each(|p| assert_eq!(p.log_importance_weight, 0.0));
}

#[test]
fn same_seed_gives_identical_results() {
    let run = |seed| {
        let engine = engine(sushi_like(), Prior::new(5), options(), seed);
        run_engine(engine, ()).unwrap()
    };
    let results_1 = run(8_675_309);
    let results_2 = run(8_675_309);
    assert_eq!(results_1, results_2);

    let results_3 = run(42);
    assert_ne!(results_1.alpha, results_3.alpha);
}

#[test]
fn full_run_keeps_parameters_valid_for_every_metric() {
    for metric in [
        Metric::Cayley,
        Metric::Footrule,
        Metric::Hamming,
        Metric::Kendall,
        Metric::Spearman,
        Metric::Ulam,
    ] {
        let options = options().metric(metric);
        let engine = engine(sushi_like(), Prior::new(5), options, 3);
        let results = run_engine(engine, ()).unwrap();
        assert!(results.complete);
        assert_eq!(results.n_steps, 4);
        assert_eq!(results.diagnostics.ess.len(), 4);
        assert_valid_results(&results);
    }
}

#[test]
fn every_resampler_runs() {
    for resampler in [
        Resampler::Multinomial,
        Resampler::Residual,
        Resampler::Stratified,
        Resampler::Systematic,
    ] {
        let options = options().resampler(resampler);
        let engine = engine(sushi_like(), Prior::new(5), options, 5);
        let results = run_engine(engine, ()).unwrap();
        assert_valid_results(&results);
    }
}

#[test]
fn pseudo_proposal_completes_partial_rankings() {
    let options = options()
        .latent_rank_proposal(LatentRankProposal::Pseudo)
        .trace_latent(true);
    let timeseries = sushi_like();
    let engine = engine(timeseries.clone(), Prior::new(5), options, 17);
    let results = run_engine(engine, ()).unwrap();
    assert_valid_results(&results);

    let traces = results.traces.unwrap();
    let last = traces.latent_rankings.last().unwrap();
    // u2 was last observed completely at step 2
    let u2 = timeseries.users().iter().position(|u| u == "u2").unwrap();
    let ix = last.users.iter().position(|&u| u == u2).unwrap();
    last.rankings.iter().for_each(|rankings| {
        assert_eq!(rankings[ix], vec![2, 1, 3, 5, 4]);
    });
}

#[test]
fn pairwise_preferences_run() {
    let raw = RawTimeSeries::Pairwise {
        n_items: 4,
        steps: vec![
            btreemap! {
                "a".to_owned() => vec![(1, 2), (2, 3)],
                "b".to_owned() => vec![(4, 1)],
            },
            btreemap! { "c".to_owned() => vec![(1, 2), (1, 3), (1, 4)] },
            btreemap! { "a".to_owned() => vec![(1, 2), (2, 3), (4, 3)] },
        ],
    };
    let timeseries = TimeSeries::from_raw(raw, 1_000).unwrap();
    let options = options().trace_latent(true);
    let engine = engine(timeseries.clone(), Prior::new(4), options, 23);
    let results = run_engine(engine, ()).unwrap();
    assert_valid_results(&results);

    // every latent ranking satisfies the user's latest preferences
    let traces = results.traces.unwrap();
    let last = traces.latent_rankings.last().unwrap();
    let latest: Vec<Option<&Observation>> = (0..timeseries.n_users())
        .map(|user| {
            (0..timeseries.n_steps())
                .rev()
                .flat_map(|t| timeseries.step(t))
                .find(|obs| obs.user == user)
                .map(|obs| &obs.observation)
        })
        .collect();
    last.rankings.iter().for_each(|rankings| {
        last.users.iter().zip(rankings.iter()).for_each(|(&user, r)| {
            assert!(latest[user].unwrap().is_consistent(r));
        });
    });
}

#[test]
fn mixture_reports_cluster_probabilities() {
    let prior = Prior::new(5).n_clusters(2);
    let engine = engine(sushi_like(), prior, options(), 29);
    let results = run_engine(engine, ()).unwrap();
    assert_valid_results(&results);
    assert!(results.tau.iter().all(|tau| tau.len() == 2));

    // users in order of first appearance, and the step they first appear
    let first_step = [0, 0, 1, 1, 2, 3];
    let probs = results.cluster_probabilities.unwrap();
    assert_eq!(probs.len(), 16);
    probs.iter().for_each(|draws| {
        assert!(draws.len() >= results.users.len());
        assert!(draws.windows(2).all(|w| w[0].t <= w[1].t));
        draws.iter().for_each(|draw| {
            assert!(draw.t < results.n_steps);
            assert!(draw.t >= first_step[draw.user]);
            assert_eq!(draw.probabilities.len(), 2);
            assert_relative_eq!(
                draw.probabilities.iter().sum::<f64>(),
                1.0,
                epsilon = 1E-10
            );
        });
        (0..results.users.len()).for_each(|user| {
            let first = draws.iter().find(|d| d.user == user).unwrap();
            assert_eq!(first.t, first_step[user]);
        });
    });
}

#[test]
fn changed_observation_adds_cluster_probabilities_over_time() {
    let timeseries = rankings(
        4,
        vec![
            vec![("a", vec![1, 2, 3, 4]), ("b", vec![2, 1, 0, 0])],
            vec![("a", vec![4, 3, 2, 1])],
            vec![("c", vec![1, 2, 4, 3])],
        ],
    );
    let prior = Prior::new(4).n_clusters(2);
    let engine = engine(timeseries, prior, options(), 53);
    let results = run_engine(engine, ()).unwrap();
    assert_eq!(results.users, vec!["a", "b", "c"]);

    // a complete ranking that changes is always drawn again
    results
        .cluster_probabilities
        .unwrap()
        .iter()
        .for_each(|draws| {
            let a_steps: Vec<usize> = draws
                .iter()
                .filter(|d| d.user == 0)
                .map(|d| d.t)
                .collect();
            assert_eq!(a_steps, vec![0, 1]);
            let c_steps: Vec<usize> = draws
                .iter()
                .filter(|d| d.user == 2)
                .map(|d| d.t)
                .collect();
            assert_eq!(c_steps, vec![2]);
        });
}

#[test]
fn single_cluster_omits_cluster_probabilities() {
    let engine = engine(sushi_like(), Prior::new(5), options(), 31);
    let results = run_engine(engine, ()).unwrap();
    assert!(results.cluster_probabilities.is_none());
    assert!(results.traces.is_none());
}

#[test]
fn parameter_traces_cover_every_step() {
    let options = options().trace(true);
    let engine = engine(sushi_like(), Prior::new(5), options, 37);
    let results = run_engine(engine, ()).unwrap();
    let traces = results.traces.unwrap();
    assert_eq!(traces.parameters.len(), 4);
    assert!(traces.latent_rankings.is_empty());
    traces.parameters.iter().enumerate().for_each(|(t, snapshot)| {
        assert_eq!(snapshot.t, t);
        assert_eq!(snapshot.alpha.len(), 16);
        assert_eq!(snapshot.log_importance_weights.len(), 16);
    });
    assert_eq!(traces.parameters.last().unwrap().alpha, results.alpha);
}

#[test]
fn low_acceptance_expands_filters() {
    let options = options()
        .resampling_threshold(1_000.0)
        .doubling_threshold(1.0);
    let engine = engine(sushi_like(), Prior::new(5), options, 41);
    let results = run_engine(engine, ()).unwrap();
    assert_eq!(results.diagnostics.n_particle_filters, vec![6, 12, 12, 12]);
    assert_valid_results(&results);
}

struct StopAfter {
    steps: usize,
    limit: usize,
}

impl UpdateHandler for StopAfter {
    fn step_complete(
        &mut self,
        _report: &StepReport,
        _particles: &[Particle],
        _observed_users: &ObservedUsers,
    ) {
        self.steps += 1;
    }

    fn stop_engine(&self) -> bool {
        self.steps >= self.limit
    }
}

#[test]
fn stopped_run_returns_partial_results() {
    let engine = engine(sushi_like(), Prior::new(5), options(), 43);
    let results = run_engine(engine, StopAfter { steps: 0, limit: 2 }).unwrap();
    assert!(!results.complete);
    assert_eq!(results.n_steps, 2);
    assert_eq!(results.diagnostics.ess.len(), 2);
    assert_eq!(results.users, vec!["u1", "u2", "u3", "u4"]);
}

#[test]
fn zero_timeout_stops_before_any_step() {
    let options = options().timeout(Some(0));
    let engine = engine(sushi_like(), Prior::new(5), options, 47);
    let results = run_engine(engine, ()).unwrap();
    assert!(!results.complete);
    assert!(results.n_steps < 4);
}
