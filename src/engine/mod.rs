mod builder;
pub mod update_handler;

pub use builder::EngineBuilder;

use log::debug;
use mallows_consts::MIN_ALPHA_STEP;
use mallows_data::ObservedUsers;
use mallows_utils::{ln_normalize, logsumexp, n_unique_f64, std_dev};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::SmcError;
use crate::particle::{rejuvenate, Model, Particle};
use crate::results::SmcResults;

use self::update_handler::UpdateHandler;

/// Per-step diagnostics of a run
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Diagnostics {
    /// Effective sample size of the particles after each step's update
    pub ess: Vec<f64>,
    /// Whether the particles were resampled and rejuvenated at each step
    pub resampled: Vec<bool>,
    /// Particle filters per particle at the end of each step
    pub n_particle_filters: Vec<usize>,
    /// Rejuvenation acceptance rate, for steps that resampled
    pub acceptance_rate: Vec<Option<f64>>,
    pub log_marginal_likelihood: f64,
}

/// Outcome of the rejuvenation that follows a resampling
#[derive(Clone, Debug, PartialEq)]
pub struct RejuvenationReport {
    pub sweeps: usize,
    pub n_accepted: usize,
    pub acceptance_rate: f64,
    /// Number of distinct first-cluster dispersions after the last sweep
    pub n_unique_alpha: usize,
    /// Whether the particle filters were doubled afterwards
    pub expanded: bool,
}

/// What happened during one time step
#[derive(Clone, Debug, PartialEq)]
pub struct StepReport {
    pub t: usize,
    pub ess: f64,
    /// Log marginal likelihood of the data up to and including this step
    pub log_marginal_likelihood: f64,
    pub rejuvenation: Option<RejuvenationReport>,
    pub n_particle_filters: usize,
}

/// The SMC² sampler. Each particle carries one hypothesis about the static
/// parameters and runs its own particle filters over the latent rankings.
#[derive(Clone, Debug)]
pub struct Engine {
    pub model: Model,
    pub particles: Vec<Particle>,
    /// Particle filters per particle; shared by every particle
    pub n_particle_filters: usize,
    pub observed_users: ObservedUsers,
    pub diagnostics: Diagnostics,
    t: usize,
    rng: Xoshiro256Plus,
}

impl Engine {
    /// Draw the particles from the prior
    pub fn new(model: Model, mut rng: Xoshiro256Plus) -> Self {
        let n_particle_filters = model.options.n_particle_filters;
        let particles = (0..model.options.n_particles)
            .map(|_| {
                Particle::from_prior(&model, n_particle_filters, &mut rng)
            })
            .collect();
        let observed_users = ObservedUsers::new(model.timeseries.n_users());
        Self {
            model,
            particles,
            n_particle_filters,
            observed_users,
            diagnostics: Diagnostics::default(),
            t: 0,
            rng,
        }
    }

    pub fn n_particles(&self) -> usize {
        self.particles.len()
    }

    pub fn n_steps(&self) -> usize {
        self.model.n_steps()
    }

    /// Number of time steps processed
    pub fn steps_completed(&self) -> usize {
        self.t
    }

    /// Whether every time step has been processed
    pub fn is_complete(&self) -> bool {
        self.t >= self.n_steps()
    }

    /// Normalized importance weights of the particles
    pub fn importance_weights(&self) -> Vec<f64> {
        ln_normalize(&self.log_importance_weights())
            .iter()
            .map(|w| w.exp())
            .collect()
    }

    fn log_importance_weights(&self) -> Vec<f64> {
        self.particles
            .iter()
            .map(|p| p.log_importance_weight)
            .collect()
    }

    /// One generator per particle, seeded from the engine's generator
    fn task_rngs(&mut self) -> Vec<Xoshiro256Plus> {
        (0..self.particles.len())
            .map(|_| Xoshiro256Plus::seed_from_u64(self.rng.gen()))
            .collect()
    }

    /// Process the next time step
    pub fn step(&mut self) -> Result<StepReport, SmcError> {
        if self.is_complete() {
            return Err(SmcError::NoStepsRemaining {
                n_steps: self.n_steps(),
            });
        }
        let t = self.t;

        let prev_ln_weights = ln_normalize(&self.log_importance_weights());
        let mut rngs = self.task_rngs();
        let model = &self.model;
        let increments = self
            .particles
            .par_iter_mut()
            .zip(rngs.par_iter_mut())
            .map(|(particle, rng)| particle.advance(model, t, rng))
            .collect::<Result<Vec<f64>, SmcError>>()?;

        let log_ml_increment: Vec<f64> = prev_ln_weights
            .iter()
            .zip(increments.iter())
            .map(|(w, inc)| w + inc)
            .collect();
        self.diagnostics.log_marginal_likelihood +=
            logsumexp(&log_ml_increment);

        let weights = self.importance_weights();
        let ess = 1.0 / weights.iter().map(|w| w * w).sum::<f64>();
        debug!("t = {t}: ESS = {ess:.2}");

        let rejuvenation = if ess < self.model.options.ess_threshold() {
            self.resample(&weights)?;
            Some(self.rejuvenate(t)?)
        } else {
            None
        };

        self.observed_users.update(self.model.timeseries.step(t));
        self.diagnostics.ess.push(ess);
        self.diagnostics.resampled.push(rejuvenation.is_some());
        self.diagnostics
            .n_particle_filters
            .push(self.n_particle_filters);
        self.diagnostics
            .acceptance_rate
            .push(rejuvenation.as_ref().map(|r| r.acceptance_rate));
        self.t += 1;

        Ok(StepReport {
            t,
            ess,
            log_marginal_likelihood: self.diagnostics.log_marginal_likelihood,
            rejuvenation,
            n_particle_filters: self.n_particle_filters,
        })
    }

    /// Replace the particles by copies drawn in proportion to `weights`,
    /// resetting the importance weights
    fn resample(&mut self, weights: &[f64]) -> Result<(), SmcError> {
        let n = self.particles.len();
        let indices =
            self.model
                .options
                .resampler
                .indices(n, weights, &mut self.rng)?;
        let mut particles: Vec<Particle> = indices
            .iter()
            .map(|&ix| self.particles[ix].clone())
            .collect();
        particles
            .iter_mut()
            .for_each(|p| p.log_importance_weight = 0.0);
        self.particles = particles;
        Ok(())
    }

    /// Sweep the particle Metropolis-Hastings move over every particle until
    /// the first-cluster dispersions are diverse enough, then double the
    /// particle filters if too few moves were accepted.
    fn rejuvenate(&mut self, t: usize) -> Result<RejuvenationReport, SmcError> {
        let n = self.particles.len();
        let n_clusters = self.model.prior.n_clusters;
        let alpha_sd: Vec<f64> = (0..n_clusters)
            .map(|c| {
                let alphas: Vec<f64> = self
                    .particles
                    .iter()
                    .map(|p| p.parameters.alpha[c])
                    .collect();
                std_dev(&alphas).max(MIN_ALPHA_STEP)
            })
            .collect();

        let max_sweeps = self.model.options.max_rejuvenation_steps.max(1);
        let mut n_accepted = 0;
        let mut sweeps = 0;
        let mut n_unique_alpha;
        loop {
            let mut rngs = self.task_rngs();
            let model = &self.model;
            let alpha_sd = &alpha_sd;
            n_accepted += self
                .particles
                .par_iter_mut()
                .zip(rngs.par_iter_mut())
                .map(|(particle, rng)| {
                    rejuvenate(particle, model, t, alpha_sd, rng)
                })
                .collect::<Result<Vec<bool>, SmcError>>()?
                .iter()
                .filter(|&&accepted| accepted)
                .count();
            sweeps += 1;

            let alphas: Vec<f64> = self
                .particles
                .iter()
                .map(|p| p.parameters.alpha[0])
                .collect();
            n_unique_alpha = n_unique_f64(&alphas);
            debug!(
                "t = {t}: rejuvenation sweep {sweeps}, {n_unique_alpha} \
                distinct alpha"
            );
            if 2 * n_unique_alpha > n || sweeps >= max_sweeps {
                break;
            }
        }

        let acceptance_rate = acceptance_rate(n_accepted, n, sweeps);
        let expanded_count = expanded_filter_count(
            acceptance_rate,
            self.model.options.doubling_threshold,
            self.n_particle_filters,
            self.model.options.max_particle_filters,
        );
        let expanded = expanded_count.is_some();
        if let Some(n_filters) = expanded_count {
            self.expand(n_filters)?;
        }

        Ok(RejuvenationReport {
            sweeps,
            n_accepted,
            acceptance_rate,
            n_unique_alpha,
            expanded,
        })
    }

    /// Resample every particle's filters up to `n_filters`
    fn expand(&mut self, n_filters: usize) -> Result<(), SmcError> {
        debug!(
            "expanding particle filters from {} to {n_filters}",
            self.n_particle_filters
        );
        let mut rngs = self.task_rngs();
        let model = &self.model;
        self.particles
            .par_iter_mut()
            .zip(rngs.par_iter_mut())
            .try_for_each(|(particle, rng)| {
                particle.expand(model, n_filters, rng)
            })?;
        self.n_particle_filters = n_filters;
        Ok(())
    }

    /// Process the remaining time steps, reporting to `update_handler`
    pub fn run<U>(&mut self, mut update_handler: U) -> Result<(), SmcError>
    where
        U: UpdateHandler,
    {
        update_handler.global_init(&self.model.options, self.n_steps());
        while !self.is_complete() && !update_handler.stop_engine() {
            let report = self.step()?;
            if let Some(rejuvenation) = &report.rejuvenation {
                update_handler.rejuvenated(report.t, rejuvenation);
                if rejuvenation.expanded {
                    update_handler
                        .filters_expanded(report.t, self.n_particle_filters);
                }
            }
            update_handler.step_complete(
                &report,
                &self.particles,
                &self.observed_users,
            );
        }
        update_handler.finalize();
        Ok(())
    }

    /// The posterior summary of the steps processed so far
    pub fn results(&self) -> SmcResults {
        SmcResults::from_engine(self)
    }
}

/// Fraction of the particle moves accepted over `sweeps` sweeps
fn acceptance_rate(
    n_accepted: usize,
    n_particles: usize,
    sweeps: usize,
) -> f64 {
    n_accepted as f64 / (n_particles * sweeps) as f64
}

/// The doubled filter count when the acceptance rate falls strictly below
/// `threshold`, or `None` if the filters stay as they are
fn expanded_filter_count(
    acceptance_rate: f64,
    threshold: f64,
    n_filters: usize,
    max_filters: usize,
) -> Option<usize> {
    (acceptance_rate < threshold && n_filters < max_filters)
        .then(|| (2 * n_filters).min(max_filters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Prior, SmcOptions};
    use approx::*;
    use maplit::btreemap;
    use mallows_data::{RawTimeSeries, TimeSeries};
    use mallows_stats::Metric;

    fn timeseries() -> TimeSeries {
        let raw = RawTimeSeries::Rankings {
            n_items: 4,
            steps: vec![
                btreemap! {
                    "a".to_owned() => vec![1, 2, 3, 4],
                    "b".to_owned() => vec![1, 3, 2, 0],
                },
                btreemap! { "c".to_owned() => vec![2, 1, 0, 0] },
                btreemap! { "b".to_owned() => vec![1, 3, 2, 4] },
            ],
        };
        TimeSeries::from_raw(raw, 100).unwrap()
    }

    fn engine(options: SmcOptions, seed: u64) -> Engine {
        EngineBuilder::new(timeseries(), Prior::new(4))
            .options(options.metric(Metric::Kendall))
            .seed_from_u64(seed)
            .build()
            .unwrap()
    }

    fn small_options() -> SmcOptions {
        SmcOptions::new()
            .n_particles(12)
            .n_particle_filters(3)
            .max_particle_filters(12)
            .max_rejuvenation_steps(2)
    }

    #[test]
    fn step_records_diagnostics() {
        let mut engine = engine(small_options(), 1337);
        let report = engine.step().unwrap();
        assert_eq!(report.t, 0);
        assert_eq!(engine.steps_completed(), 1);
        assert_eq!(engine.diagnostics.ess.len(), 1);
        assert_eq!(engine.observed_users.users(), &[0, 1]);
        assert!(report.ess > 0.0 && report.ess <= 12.0 + 1E-9);
        assert!(report.log_marginal_likelihood.is_finite());
    }

    #[test]
    fn stepping_past_the_end_is_an_error() {
        let mut engine = engine(small_options(), 1);
        for _ in 0..3 {
            engine.step().unwrap();
        }
        assert!(engine.is_complete());
        assert_eq!(
            engine.step().unwrap_err(),
            SmcError::NoStepsRemaining { n_steps: 3 }
        );
    }

    #[test]
    fn forced_resampling_resets_weights() {
        let options = small_options()
            .resampling_threshold(100.0)
            .doubling_threshold(0.0);
        let mut engine = engine(options, 2);
        let report = engine.step().unwrap();
        let rejuvenation = report.rejuvenation.unwrap();
        assert!(!rejuvenation.expanded);
        assert!(rejuvenation.sweeps >= 1);
        assert_eq!(engine.n_particles(), 12);
        engine.particles.iter().for_each(|p| {
            assert_eq!(p.log_importance_weight, 0.0);
            assert!(p.parameters.is_valid());
        });
        let weights = engine.importance_weights();
        weights
            .iter()
            .for_each(|&w| assert_relative_eq!(w, 1.0 / 12.0, epsilon = 1E-12));
    }

    #[test]
    fn low_acceptance_doubles_filters_up_to_the_cap() {
        let options = small_options()
            .resampling_threshold(100.0)
            .doubling_threshold(1.0);
        let mut engine = engine(options, 3);
        engine.step().unwrap();
        assert_eq!(engine.n_particle_filters, 6);
        engine.step().unwrap();
        assert_eq!(engine.n_particle_filters, 12);
        engine.step().unwrap();
        assert_eq!(engine.n_particle_filters, 12);
        engine
            .particles
            .iter()
            .for_each(|p| assert_eq!(p.n_filters(), 12));
        assert_eq!(engine.diagnostics.n_particle_filters, vec![6, 12, 12]);
    }

    #[test]
    fn acceptance_rate_counts_every_move_of_every_sweep() {
        assert_relative_eq!(acceptance_rate(6, 12, 2), 0.25);
        assert_relative_eq!(acceptance_rate(0, 5, 3), 0.0);
        assert_relative_eq!(acceptance_rate(15, 5, 3), 1.0);
    }

    #[test]
    fn expansion_needs_rate_strictly_below_threshold() {
        assert_eq!(expanded_filter_count(0.25, 0.25, 4, 100), None);
        assert_eq!(expanded_filter_count(0.249, 0.25, 4, 100), Some(8));
        assert_eq!(expanded_filter_count(0.0, 0.0, 4, 100), None);
    }

    #[test]
    fn expansion_is_capped() {
        assert_eq!(expanded_filter_count(0.1, 0.5, 6, 10), Some(10));
        assert_eq!(expanded_filter_count(0.1, 0.5, 10, 10), None);
    }

    #[test]
    fn report_rate_matches_accepted_moves() {
        let options = small_options()
            .resampling_threshold(100.0)
            .max_rejuvenation_steps(3);
        let mut engine = engine(options, 5);
        let report = engine.step().unwrap();
        let rejuvenation = report.rejuvenation.unwrap();
        assert_relative_eq!(
            rejuvenation.acceptance_rate,
            rejuvenation.n_accepted as f64 / (12 * rejuvenation.sweeps) as f64
        );
        let threshold = engine.model.options.doubling_threshold;
        assert_eq!(
            rejuvenation.expanded,
            rejuvenation.acceptance_rate < threshold
        );
    }

    #[test]
    fn importance_weights_sum_to_one() {
        let mut engine = engine(small_options(), 4);
        engine.run(()).unwrap();
        let total: f64 = engine.importance_weights().iter().sum();
        assert_relative_eq!(total, 1.0, epsilon = 1E-10);
    }
}
