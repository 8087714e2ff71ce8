use mallows_consts::rv::dist::Gamma;
use mallows_consts::rv::traits::Rv;
use mallows_stats::leap_and_shift;
use mallows_stats::mh::{ln_gamma_ratio, mh_accept};
use mallows_utils::is_permutation;
use rand::Rng;
use rand_distr::StandardNormal;

use super::filter::run_particle_filter;
use super::{Model, Particle, StaticParameters};
use crate::error::SmcError;

/// Particle marginal Metropolis-Hastings move on the static parameters of
/// `particle`, given the data up to step `t`. Returns whether the move was
/// accepted.
///
/// `alpha` takes a log-normal random walk with step size `alpha_sd` and
/// `rho` a leap-and-shift move, both scored by a fresh set of filters. With
/// more than one cluster, the cluster weights are then redrawn given the
/// conditioned trajectory.
pub(crate) fn rejuvenate<R: Rng>(
    particle: &mut Particle,
    model: &Model,
    t: usize,
    alpha_sd: &[f64],
    rng: &mut R,
) -> Result<bool, SmcError> {
    let prior = &model.prior;
    let current = &particle.parameters;

    let mut ln_ratio = 0.0;

    let alpha: Vec<f64> = current
        .alpha
        .iter()
        .zip(alpha_sd.iter())
        .map(|(&a, &sd)| {
            let z: f64 = rng.sample(StandardNormal);
            let a_new = sd.mul_add(z, a.ln()).exp();
            // log-normal proposal correction
            ln_ratio += a_new.ln() - a.ln();
            ln_ratio +=
                ln_gamma_ratio(a_new, a, prior.alpha_shape, prior.alpha_rate);
            a_new
        })
        .collect();

    let rho = current
        .rho
        .iter()
        .map(|rho| {
            let proposal = leap_and_shift(rho, model.options.leap_size, rng);
            if !is_permutation(&proposal.ranking) {
                return Err(SmcError::NotAPermutation {
                    origin: "leap-and-shift",
                    ranking: proposal.ranking,
                });
            }
            ln_ratio += proposal.ln_correction();
            Ok(proposal.ranking)
        })
        .collect::<Result<Vec<_>, SmcError>>()?;

    let proposed = StaticParameters {
        alpha,
        rho,
        tau: current.tau.clone(),
    };

    let n_filters = particle.n_filters();
    let run = run_particle_filter(model, &proposed, t, n_filters, None, rng)?;

    let ln_lik_new: f64 = run.log_incremental_likelihood.iter().sum();
    let ln_lik_old: f64 = particle.log_incremental_likelihood.iter().sum();
    ln_ratio += ln_lik_new - ln_lik_old;

    let accepted = mh_accept(ln_ratio, rng);
    if accepted {
        particle.parameters = proposed;
        particle.filters = run.filters;
        particle.log_incremental_likelihood = run.log_incremental_likelihood;
        particle.refresh_filter_weights(rng);
    }

    if particle.parameters.n_clusters() > 1 {
        update_cluster_weights(particle, model, t, rng)?;
    }

    Ok(accepted)
}

/// Draw the cluster weights given the cluster labels of the conditioned
/// trajectory, then rerun the filters with that trajectory held fixed.
fn update_cluster_weights<R: Rng>(
    particle: &mut Particle,
    model: &Model,
    t: usize,
    rng: &mut R,
) -> Result<(), SmcError> {
    let k = particle.parameters.n_clusters();
    let concentration = model.prior.cluster_concentration;
    let reference = particle.conditioned().clone();

    let draws: Vec<f64> = reference
        .cluster_frequencies(k)
        .iter()
        .map(|&freq| {
            Gamma::new_unchecked(freq as f64 + concentration, 1.0).draw(rng)
        })
        .collect();
    let total: f64 = draws.iter().sum();

    let parameters = StaticParameters {
        tau: draws.iter().map(|x| x / total).collect(),
        ..particle.parameters.clone()
    };

    let run = run_particle_filter(
        model,
        &parameters,
        t,
        particle.n_filters(),
        Some(&reference),
        rng,
    )?;

    particle.parameters = parameters;
    particle.filters = run.filters;
    particle.log_incremental_likelihood = run.log_incremental_likelihood;
    particle.refresh_filter_weights(rng);
    Ok(())
}
