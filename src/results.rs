use std::time::Duration;

use mallows_data::{ObservedUsers, TimeSeries};
use serde::{Deserialize, Serialize};

use crate::config::{Prior, SmcOptions};
use crate::engine::update_handler::{
    ParameterTracer, ProgressBar, Reporter, Timeout, UpdateHandler,
};
use crate::engine::{Diagnostics, Engine, EngineBuilder};
use crate::error::SmcError;
use crate::particle::{Particle, ParticleFilter};

/// The static parameters and importance weights of every particle after one
/// step
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ParameterSnapshot {
    pub t: usize,
    pub alpha: Vec<Vec<f64>>,
    pub rho: Vec<Vec<Vec<u32>>>,
    pub tau: Vec<Vec<f64>>,
    pub log_importance_weights: Vec<f64>,
}

impl ParameterSnapshot {
    pub fn new(t: usize, particles: &[Particle]) -> Self {
        Self {
            t,
            alpha: particles
                .iter()
                .map(|p| p.parameters.alpha.clone())
                .collect(),
            rho: particles.iter().map(|p| p.parameters.rho.clone()).collect(),
            tau: particles.iter().map(|p| p.parameters.tau.clone()).collect(),
            log_importance_weights: particles
                .iter()
                .map(|p| p.log_importance_weight)
                .collect(),
        }
    }
}

/// The latent rankings of every particle's conditioned filter after one
/// step
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LatentSnapshot {
    pub t: usize,
    /// Indices of the users observed so far
    pub users: Vec<usize>,
    /// `rankings[particle][i]` is the latent ranking of `users[i]`
    pub rankings: Vec<Vec<Vec<u32>>>,
}

impl LatentSnapshot {
    pub fn new(
        t: usize,
        particles: &[Particle],
        observed_users: &ObservedUsers,
    ) -> Self {
        let users = observed_users.users().to_vec();
        let rankings = particles
            .iter()
            .map(|particle| {
                let filter = particle.conditioned();
                users
                    .iter()
                    .map(|&user| {
                        filter
                            .latent(user)
                            .map(|draw| draw.ranking.clone())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();
        Self { t, users, rankings }
    }
}

/// Cluster membership probabilities of one latent ranking draw
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ClusterProbabilities {
    /// Time step at which the latent ranking was drawn
    pub t: usize,
    /// Position of the user in [`SmcResults::users`]
    pub user: usize,
    /// `probabilities[cluster]`
    pub probabilities: Vec<f64>,
}

impl ClusterProbabilities {
    /// Every draw `filter` has made, in time order. `positions[user]` is the
    /// position of a time series user among the observed users.
    fn from_filter(
        filter: &ParticleFilter,
        positions: &[Option<usize>],
    ) -> Vec<Self> {
        (0..filter.n_steps())
            .flat_map(move |t| {
                filter.draws_at(t).iter().filter_map(move |draw| {
                    positions[draw.user].map(|user| Self {
                        t,
                        user,
                        probabilities: draw.cluster_probabilities.clone(),
                    })
                })
            })
            .collect()
    }
}

/// Per-step snapshots recorded with the `trace` and `trace_latent` options
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Traces {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterSnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub latent_rankings: Vec<LatentSnapshot>,
}

/// The particle approximation of the posterior after a run
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SmcResults {
    /// Number of time steps processed
    pub n_steps: usize,
    /// False if the run stopped early
    pub complete: bool,
    /// Names of the users observed so far, in order of first appearance
    pub users: Vec<String>,
    /// `alpha[particle][cluster]`
    pub alpha: Vec<Vec<f64>>,
    /// `rho[particle][cluster]`
    pub rho: Vec<Vec<Vec<u32>>>,
    /// `tau[particle][cluster]`
    pub tau: Vec<Vec<f64>>,
    /// `cluster_probabilities[particle]` holds one entry for every latent
    /// ranking the particle's conditioned filter drew, over all time steps.
    /// A user whose observation changed gets an entry for each redraw. Only
    /// recorded with more than one cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_probabilities: Option<Vec<Vec<ClusterProbabilities>>>,
    /// Normalized importance weights of the particles
    pub importance_weights: Vec<f64>,
    #[serde(flatten)]
    pub diagnostics: Diagnostics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traces: Option<Traces>,
}

impl SmcResults {
    pub(crate) fn from_engine(engine: &Engine) -> Self {
        let observed = engine.observed_users.users();
        let names = engine.model.timeseries.users();
        let particles = &engine.particles;

        let cluster_probabilities = (engine.model.prior.n_clusters > 1)
            .then(|| {
                let mut positions = vec![None; names.len()];
                observed
                    .iter()
                    .enumerate()
                    .for_each(|(pos, &user)| positions[user] = Some(pos));
                particles
                    .iter()
                    .map(|particle| {
                        ClusterProbabilities::from_filter(
                            particle.conditioned(),
                            &positions,
                        )
                    })
                    .collect()
            });

        Self {
            n_steps: engine.steps_completed(),
            complete: engine.is_complete(),
            users: observed.iter().map(|&user| names[user].clone()).collect(),
            alpha: particles
                .iter()
                .map(|p| p.parameters.alpha.clone())
                .collect(),
            rho: particles.iter().map(|p| p.parameters.rho.clone()).collect(),
            tau: particles.iter().map(|p| p.parameters.tau.clone()).collect(),
            cluster_probabilities,
            importance_weights: engine.importance_weights(),
            diagnostics: engine.diagnostics.clone(),
            traces: None,
        }
    }

    /// Posterior mean of each cluster's dispersion
    pub fn posterior_mean_alpha(&self) -> Vec<f64> {
        let n_clusters = self.alpha.first().map_or(0, |alpha| alpha.len());
        (0..n_clusters)
            .map(|c| {
                self.alpha
                    .iter()
                    .zip(self.importance_weights.iter())
                    .map(|(alpha, w)| w * alpha[c])
                    .sum()
            })
            .collect()
    }
}

/// Run `engine` to the end of its time series, or until `update_handler` or
/// the configured timeout stops it.
///
/// The options attach a `Reporter` when `verbose` and record traces when
/// `trace` or `trace_latent`.
pub fn run_engine<U>(
    mut engine: Engine,
    update_handler: U,
) -> Result<SmcResults, SmcError>
where
    U: UpdateHandler,
{
    let options = engine.model.options.clone();
    let mut tracer = ParameterTracer::new(options.trace, options.trace_latent);
    let timeout = options
        .timeout
        .map(|secs| Timeout::new(Duration::from_secs(secs)));
    let reporter = options.verbose.then(Reporter::new);

    engine.run((update_handler, &mut tracer, timeout, reporter))?;

    let mut results = engine.results();
    if tracer.is_active() {
        results.traces = Some(tracer.into_traces());
    }
    Ok(results)
}

/// Run the sampler over `timeseries` from an entropy-seeded generator
pub fn run_smc(
    timeseries: TimeSeries,
    prior: Prior,
    options: SmcOptions,
) -> Result<SmcResults, SmcError> {
    let engine = EngineBuilder::new(timeseries, prior)
        .options(options)
        .build()?;
    run_engine(engine, ())
}

/// Like [`run_engine`], with a progress bar on the terminal
pub fn run_engine_with_progress(
    engine: Engine,
) -> Result<SmcResults, SmcError> {
    run_engine(engine, ProgressBar::new())
}
