use std::sync::Arc;

use mallows_data::{LatentRankProposal, UserObservation};
use mallows_utils::{is_permutation, ln_normalize, log_mean_exp};
use rand::Rng;

use super::parameters::{MixtureLikelihood, StaticParameters};
use super::Model;
use crate::error::SmcError;

/// The latent complete ranking of one user in one particle filter
#[derive(Clone, Debug, PartialEq)]
pub struct LatentDraw {
    pub user: usize,
    pub ranking: Vec<u32>,
    pub cluster: usize,
    /// Posterior cluster membership probabilities of `ranking`
    pub cluster_probabilities: Vec<f64>,
    /// Log density of the proposal that produced `ranking`
    pub log_proposal: f64,
    /// Log mixture likelihood of `ranking`
    pub log_likelihood: f64,
}

/// One trajectory of latent rankings and cluster labels.
///
/// The draws made at each step are shared between the copies made by
/// resampling, so cloning a filter does not copy its history.
#[derive(Clone, Debug, Default)]
pub struct ParticleFilter {
    history: Vec<Arc<Vec<LatentDraw>>>,
    /// `(step, position)` of each user's current draw in `history`
    current: Vec<Option<(usize, usize)>>,
    /// Log weight increment of each step
    pub log_weight: Vec<f64>,
}

impl ParticleFilter {
    pub fn new(n_users: usize) -> Self {
        Self {
            history: Vec::new(),
            current: vec![None; n_users],
            log_weight: Vec::new(),
        }
    }

    /// The current latent draw of `user`, if they have been observed
    pub fn latent(&self, user: usize) -> Option<&LatentDraw> {
        self.current
            .get(user)
            .copied()
            .flatten()
            .map(|(t, pos)| &self.history[t][pos])
    }

    /// The draws made at step `t`
    pub fn draws_at(&self, t: usize) -> &[LatentDraw] {
        match self.history.get(t) {
            Some(draws) => draws.as_slice(),
            None => &[],
        }
    }

    /// Number of steps the filter has been run for
    pub fn n_steps(&self) -> usize {
        self.history.len()
    }

    /// The log weight of the last step, zero before the first
    pub fn last_log_weight(&self) -> f64 {
        self.log_weight.last().copied().unwrap_or(0.0)
    }

    /// Reset the log weight of the last step
    pub(crate) fn reset_last_log_weight(&mut self) {
        if let Some(w) = self.log_weight.last_mut() {
            *w = 0.0;
        }
    }

    /// Number of observed users currently assigned to each cluster
    pub fn cluster_frequencies(&self, n_clusters: usize) -> Vec<usize> {
        let mut freqs = vec![0; n_clusters];
        (0..self.current.len())
            .filter_map(|user| self.latent(user))
            .for_each(|draw| freqs[draw.cluster] += 1);
        freqs
    }

    fn push_step(&mut self, draws: Vec<LatentDraw>, log_weight: f64) {
        let t = self.history.len();
        draws.iter().enumerate().for_each(|(pos, draw)| {
            self.current[draw.user] = Some((t, pos));
        });
        self.history.push(Arc::new(draws));
        self.log_weight.push(log_weight);
    }

    /// Propose latent rankings for the new users and for the users whose
    /// latent ranking no longer agrees with their observation. Returns the
    /// log weight increment.
    fn extend<R: Rng>(
        &mut self,
        step: &[UserObservation],
        likelihood: &MixtureLikelihood,
        parameters: &StaticParameters,
        proposal: LatentRankProposal,
        rng: &mut R,
    ) -> Result<f64, SmcError> {
        let mut draws = Vec::new();
        let mut increment = 0.0;

        for obs in step {
            let old_contribution = match self.latent(obs.user) {
                Some(draw) if obs.observation.is_consistent(&draw.ranking) => {
                    continue
                }
                Some(draw) => draw.log_likelihood - draw.log_proposal,
                None => 0.0,
            };

            let completion = obs.observation.propose(
                proposal,
                parameters.alpha[0],
                &parameters.rho[0],
                rng,
            );
            if !is_permutation(&completion.ranking) {
                return Err(SmcError::NotAPermutation {
                    origin: "latent rank proposal",
                    ranking: completion.ranking,
                });
            }

            let draw = likelihood.draw(obs.user, completion, rng);
            increment += draw.log_likelihood - draw.log_proposal;
            increment -= old_contribution;
            draws.push(draw);
        }

        self.push_step(draws, increment);
        Ok(increment)
    }

    /// Repeat the draws `reference` made at step `t`, scored under the
    /// current parameters. Returns the log weight increment.
    fn replay(
        &mut self,
        reference: &ParticleFilter,
        t: usize,
        likelihood: &MixtureLikelihood,
    ) -> f64 {
        let mut increment = 0.0;
        let draws: Vec<LatentDraw> = reference
            .draws_at(t)
            .iter()
            .map(|ref_draw| {
                let old_contribution = self
                    .latent(ref_draw.user)
                    .map_or(0.0, |d| d.log_likelihood - d.log_proposal);
                let draw = likelihood.rescore(ref_draw);
                increment +=
                    draw.log_likelihood - draw.log_proposal - old_contribution;
                draw
            })
            .collect();
        self.push_step(draws, increment);
        increment
    }
}

/// Normalized weights of the last step of each filter
pub(crate) fn filter_probabilities(filters: &[ParticleFilter]) -> Vec<f64> {
    let log_weights: Vec<f64> =
        filters.iter().map(|f| f.last_log_weight()).collect();
    ln_normalize(&log_weights)
        .iter()
        .map(|w| w.exp())
        .collect()
}

/// Replicate filters in proportion to their last weights. With `pinned`, the
/// first filter is kept in the first slot and only the other slots are
/// resampled.
pub(crate) fn resample_filters<R: Rng>(
    model: &Model,
    filters: &[ParticleFilter],
    n_filters: usize,
    pinned: bool,
    rng: &mut R,
) -> Result<Vec<ParticleFilter>, SmcError> {
    let probs = filter_probabilities(filters);
    let n_free = if pinned { n_filters - 1 } else { n_filters };
    let indices = model.options.resampler.indices(n_free, &probs, rng)?;
    let mut resampled = Vec::with_capacity(n_filters);
    if pinned {
        resampled.push(filters[0].clone());
    }
    resampled.extend(indices.iter().map(|&ix| filters[ix].clone()));
    Ok(resampled)
}

/// Advance copies of `filters` through step `t`. Returns the new filters and
/// the particle's log likelihood increment, the log mean of the filter
/// increments.
///
/// With a `reference` trajectory, the first filter repeats the reference's
/// draws instead of proposing new ones.
pub(crate) fn advance_filters<R: Rng>(
    model: &Model,
    parameters: &StaticParameters,
    filters: &[ParticleFilter],
    t: usize,
    reference: Option<&ParticleFilter>,
    rng: &mut R,
) -> Result<(Vec<ParticleFilter>, f64), SmcError> {
    let n_filters = filters.len();
    let mut filters = if t > 0 {
        resample_filters(model, filters, n_filters, reference.is_some(), rng)?
    } else {
        filters.to_vec()
    };

    let likelihood = MixtureLikelihood::new(
        parameters,
        model.options.metric,
        &model.partition,
    );
    let step = model.timeseries.step(t);
    let proposal = model.options.latent_rank_proposal;

    let increments = filters
        .iter_mut()
        .enumerate()
        .map(|(slot, filter)| match reference {
            Some(reference) if slot == 0 => {
                Ok(filter.replay(reference, t, &likelihood))
            }
            _ => filter.extend(step, &likelihood, parameters, proposal, rng),
        })
        .collect::<Result<Vec<f64>, SmcError>>()?;

    Ok((filters, log_mean_exp(&increments)))
}

/// A population of filters run from the first step
pub(crate) struct FilterRun {
    pub(crate) filters: Vec<ParticleFilter>,
    pub(crate) log_incremental_likelihood: Vec<f64>,
}

/// Run `n_filters` fresh filters through steps `0..=t`
pub(crate) fn run_particle_filter<R: Rng>(
    model: &Model,
    parameters: &StaticParameters,
    t: usize,
    n_filters: usize,
    reference: Option<&ParticleFilter>,
    rng: &mut R,
) -> Result<FilterRun, SmcError> {
    let n_users = model.timeseries.n_users();
    let mut filters = vec![ParticleFilter::new(n_users); n_filters];
    let mut log_incremental_likelihood = Vec::with_capacity(t + 1);
    for s in 0..=t {
        let (advanced, increment) =
            advance_filters(model, parameters, &filters, s, reference, rng)?;
        filters = advanced;
        log_incremental_likelihood.push(increment);
    }
    Ok(FilterRun {
        filters,
        log_incremental_likelihood,
    })
}
