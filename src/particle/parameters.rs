use mallows_consts::rv::dist::{Gamma, SymmetricDirichlet};
use mallows_consts::rv::traits::Rv;
use mallows_stats::{Metric, PartitionFunction};
use mallows_utils::{is_permutation, ln_pflip, logsumexp};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::filter::LatentDraw;
use crate::config::Prior;
use mallows_data::Completion;

/// The static parameters of a mixture of Mallows models
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StaticParameters {
    /// Dispersion of each cluster
    pub alpha: Vec<f64>,
    /// Consensus ranking of each cluster
    pub rho: Vec<Vec<u32>>,
    /// Cluster weights
    pub tau: Vec<f64>,
}

impl StaticParameters {
    /// Draw from the prior
    pub fn from_prior<R: Rng>(prior: &Prior, rng: &mut R) -> Self {
        let k = prior.n_clusters;
        let alpha_prior =
            Gamma::new_unchecked(prior.alpha_shape, prior.alpha_rate);
        let alpha: Vec<f64> = (0..k).map(|_| alpha_prior.draw(rng)).collect();

        let rho = (0..k)
            .map(|_| {
                let mut rho = mallows_utils::identity(prior.n_items);
                rho.shuffle(rng);
                rho
            })
            .collect();

        let tau: Vec<f64> = if k == 1 {
            vec![1.0]
        } else {
            SymmetricDirichlet::new_unchecked(prior.cluster_concentration, k)
                .draw(rng)
        };

        Self { alpha, rho, tau }
    }

    pub fn n_clusters(&self) -> usize {
        self.alpha.len()
    }

    /// Every `alpha` positive, every `rho` a permutation, and `tau` on the
    /// simplex
    pub fn is_valid(&self) -> bool {
        let k = self.n_clusters();
        let tau_sum: f64 = self.tau.iter().sum();
        self.rho.len() == k
            && self.tau.len() == k
            && self.alpha.iter().all(|&a| a > 0.0 && a.is_finite())
            && self.rho.iter().all(|rho| is_permutation(rho))
            && self.tau.iter().all(|&w| w >= 0.0)
            && (tau_sum - 1.0).abs() < 1E-10
    }
}

/// The mixture likelihood of complete rankings under one set of static
/// parameters
pub(crate) struct MixtureLikelihood<'a> {
    parameters: &'a StaticParameters,
    metric: Metric,
    /// `ln tau_c - ln Z(alpha_c)`
    log_offsets: Vec<f64>,
}

impl<'a> MixtureLikelihood<'a> {
    pub(crate) fn new(
        parameters: &'a StaticParameters,
        metric: Metric,
        partition: &PartitionFunction,
    ) -> Self {
        let log_offsets = parameters
            .alpha
            .iter()
            .zip(parameters.tau.iter())
            .map(|(&alpha, &tau)| tau.ln() - partition.logz(alpha))
            .collect();
        Self {
            parameters,
            metric,
            log_offsets,
        }
    }

    /// `ln tau_c + ln Mallows(ranking | alpha_c, rho_c)` for every cluster
    pub(crate) fn log_cluster_terms(&self, ranking: &[u32]) -> Vec<f64> {
        self.log_offsets
            .iter()
            .zip(self.parameters.alpha.iter())
            .zip(self.parameters.rho.iter())
            .map(|((offset, alpha), rho)| {
                offset - alpha * self.metric.distance(ranking, rho) as f64
            })
            .collect()
    }

    /// Score a proposed ranking and sample its cluster
    pub(crate) fn draw<R: Rng>(
        &self,
        user: usize,
        completion: Completion,
        rng: &mut R,
    ) -> LatentDraw {
        let terms = self.log_cluster_terms(&completion.ranking);
        let cluster = if terms.len() > 1 {
            ln_pflip(&terms, rng)
        } else {
            0
        };
        let (log_likelihood, cluster_probabilities) = summarize(&terms);
        LatentDraw {
            user,
            ranking: completion.ranking,
            cluster,
            cluster_probabilities,
            log_proposal: completion.log_proposal,
            log_likelihood,
        }
    }

    /// Score an existing draw, keeping its ranking, cluster and proposal
    /// density
    pub(crate) fn rescore(&self, draw: &LatentDraw) -> LatentDraw {
        let terms = self.log_cluster_terms(&draw.ranking);
        let (log_likelihood, cluster_probabilities) = summarize(&terms);
        LatentDraw {
            log_likelihood,
            cluster_probabilities,
            ..draw.clone()
        }
    }
}

fn summarize(terms: &[f64]) -> (f64, Vec<f64>) {
    let log_likelihood = logsumexp(terms);
    let probs = terms
        .iter()
        .map(|term| (term - log_likelihood).exp())
        .collect();
    (log_likelihood, probs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    #[test]
    fn prior_draws_are_valid() {
        let mut rng = Xoshiro256Plus::seed_from_u64(1337);
        for n_clusters in 1..4 {
            let prior = Prior::new(6).n_clusters(n_clusters);
            for _ in 0..20 {
                let params = StaticParameters::from_prior(&prior, &mut rng);
                assert_eq!(params.n_clusters(), n_clusters);
                assert!(params.is_valid());
            }
        }
    }

    #[test]
    fn single_cluster_likelihood_is_mallows_density() {
        let params = StaticParameters {
            alpha: vec![0.5],
            rho: vec![vec![1, 2, 3]],
            tau: vec![1.0],
        };
        let partition =
            PartitionFunction::new(Metric::Kendall, 3, None).unwrap();
        let likelihood =
            MixtureLikelihood::new(&params, Metric::Kendall, &partition);
        let mut rng = Xoshiro256Plus::seed_from_u64(1);
        let completion = Completion {
            ranking: vec![3, 2, 1],
            log_proposal: -1.0,
        };
        let draw = likelihood.draw(4, completion, &mut rng);
        let expected = -0.5 * 3.0 - partition.logz(0.5);
        assert_relative_eq!(draw.log_likelihood, expected, epsilon = 1E-12);
        assert_eq!(draw.cluster, 0);
        assert_eq!(draw.cluster_probabilities, vec![1.0]);
        assert_eq!(draw.user, 4);
        assert_eq!(draw.log_proposal, -1.0);
    }

    #[test]
    fn cluster_probabilities_sum_to_one() {
        let params = StaticParameters {
            alpha: vec![1.0, 2.0],
            rho: vec![vec![1, 2, 3, 4], vec![4, 3, 2, 1]],
            tau: vec![0.3, 0.7],
        };
        let partition =
            PartitionFunction::new(Metric::Footrule, 4, None).unwrap();
        let likelihood =
            MixtureLikelihood::new(&params, Metric::Footrule, &partition);
        let mut rng = Xoshiro256Plus::seed_from_u64(2);
        let draw = likelihood.draw(
            0,
            Completion {
                ranking: vec![1, 2, 4, 3],
                log_proposal: 0.0,
            },
            &mut rng,
        );
        let total: f64 = draw.cluster_probabilities.iter().sum();
        assert_relative_eq!(total, 1.0, epsilon = 1E-12);
        // much closer to the first consensus
        assert!(draw.cluster_probabilities[0] > 0.9);
    }

    #[test]
    fn rescore_keeps_ranking_and_cluster() {
        let params = StaticParameters {
            alpha: vec![1.0, 2.0],
            rho: vec![vec![1, 2, 3], vec![3, 2, 1]],
            tau: vec![0.5, 0.5],
        };
        let partition =
            PartitionFunction::new(Metric::Cayley, 3, None).unwrap();
        let likelihood =
            MixtureLikelihood::new(&params, Metric::Cayley, &partition);
        let draw = LatentDraw {
            user: 2,
            ranking: vec![2, 1, 3],
            cluster: 1,
            cluster_probabilities: vec![0.5, 0.5],
            log_proposal: -0.7,
            log_likelihood: 0.0,
        };
        let rescored = likelihood.rescore(&draw);
        assert_eq!(rescored.cluster, 1);
        assert_eq!(rescored.ranking, draw.ranking);
        assert_eq!(rescored.log_proposal, -0.7);
        assert!(rescored.log_likelihood < 0.0);
    }
}
