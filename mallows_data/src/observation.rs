use mallows_utils::{ln_pflip, logsumexp};
use rand::seq::SliceRandom;
use rand::Rng;
use special::Gamma;

use crate::{DataError, LatentRankProposal};

/// A complete ranking proposed for a user, with the log density of the
/// proposal that produced it
#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
    pub ranking: Vec<u32>,
    pub log_proposal: f64,
}

/// What one user reported at one time step
#[derive(Clone, Debug, PartialEq)]
pub enum Observation {
    /// Every item ranked
    Complete(Vec<u32>),
    /// Some items ranked. `ranking[i] == 0` marks item `i` as unranked.
    Partial {
        ranking: Vec<u32>,
        /// Items without a rank
        missing_items: Vec<usize>,
        /// Ranks not given to any item
        missing_ranks: Vec<u32>,
    },
    /// Pairwise preferences together with every ranking consistent with them
    Pairwise {
        /// 0-based `(above, below)` item pairs
        preferences: Vec<(usize, usize)>,
        sorts: Vec<Vec<u32>>,
    },
}

impl Observation {
    /// Classify a ranking with zeros for unranked items as complete or
    /// partial. The ranking is checked by [`Observation::validate`].
    pub fn from_ranking(ranking: Vec<u32>) -> Self {
        let missing_items: Vec<usize> = ranking
            .iter()
            .enumerate()
            .filter_map(|(ix, &r)| if r == 0 { Some(ix) } else { None })
            .collect();

        if missing_items.is_empty() {
            return Self::Complete(ranking);
        }

        let mut taken = vec![false; ranking.len()];
        ranking
            .iter()
            .filter(|&&r| r > 0 && r as usize <= ranking.len())
            .for_each(|&r| taken[r as usize - 1] = true);
        let missing_ranks = taken
            .iter()
            .enumerate()
            .filter_map(|(ix, &t)| if t { None } else { Some(ix as u32 + 1) })
            .collect();

        Self::Partial {
            ranking,
            missing_items,
            missing_ranks,
        }
    }

    /// Check lengths and ranges against `n_items` for the given user and
    /// step.
    pub fn validate(
        &self,
        n_items: usize,
        user: &str,
        step: usize,
    ) -> Result<(), DataError> {
        match self {
            Self::Complete(ranking) | Self::Partial { ranking, .. } => {
                validate_ranking(ranking, n_items, user, step)
            }
            Self::Pairwise { preferences, sorts } => {
                let in_range = preferences
                    .iter()
                    .all(|&(a, b)| a < n_items && b < n_items);
                let consistent = in_range
                    && sorts.iter().all(|sort| {
                    sort.len() == n_items
                        && mallows_utils::is_permutation(sort)
                        && satisfies(sort, preferences)
                    });
                if consistent && !sorts.is_empty() {
                    Ok(())
                } else {
                    Err(DataError::InconsistentSort {
                        user: user.to_owned(),
                        step,
                    })
                }
            }
        }
    }

    /// Whether every item is ranked
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    /// Whether a complete ranking agrees with everything observed
    pub fn is_consistent(&self, latent: &[u32]) -> bool {
        match self {
            Self::Complete(ranking) => ranking.as_slice() == latent,
            Self::Partial { ranking, .. } => ranking
                .iter()
                .zip(latent.iter())
                .all(|(&r, &x)| r == 0 || r == x),
            Self::Pairwise { preferences, .. } => {
                satisfies(latent, preferences)
            }
        }
    }

    /// Propose a complete ranking consistent with the observation.
    ///
    /// `alpha` and `rho` are the dispersion and consensus used by the pseudo
    /// proposal; the uniform proposal ignores them. Complete observations
    /// propose themselves with log density zero and pairwise observations
    /// always draw uniformly from their consistent rankings.
    pub fn propose<R: Rng>(
        &self,
        proposal: LatentRankProposal,
        alpha: f64,
        rho: &[u32],
        rng: &mut R,
    ) -> Completion {
        match self {
            Self::Complete(ranking) => Completion {
                ranking: ranking.clone(),
                log_proposal: 0.0,
            },
            Self::Pairwise { sorts, .. } => {
                let ix = rng.gen_range(0..sorts.len());
                Completion {
                    ranking: sorts[ix].clone(),
                    log_proposal: -(sorts.len() as f64).ln(),
                }
            }
            Self::Partial {
                ranking,
                missing_items,
                missing_ranks,
            } => match proposal {
                LatentRankProposal::Uniform => {
                    propose_uniform(ranking, missing_items, missing_ranks, rng)
                }
                LatentRankProposal::Pseudo => propose_pseudo(
                    ranking,
                    missing_items,
                    missing_ranks,
                    alpha,
                    rho,
                    rng,
                ),
            },
        }
    }
}

fn validate_ranking(
    ranking: &[u32],
    n_items: usize,
    user: &str,
    step: usize,
) -> Result<(), DataError> {
    if ranking.len() != n_items {
        return Err(DataError::RankingLengthMismatch {
            user: user.to_owned(),
            step,
            expected: n_items,
            found: ranking.len(),
        });
    }
    let mut taken = vec![false; n_items];
    ranking.iter().filter(|&&r| r > 0).try_for_each(|&r| {
        let ix = r as usize;
        if ix > n_items {
            Err(DataError::RankOutOfRange {
                user: user.to_owned(),
                step,
                rank: r,
                n_items,
            })
        } else if taken[ix - 1] {
            Err(DataError::DuplicateRank {
                user: user.to_owned(),
                step,
                rank: r,
            })
        } else {
            taken[ix - 1] = true;
            Ok(())
        }
    })
}

fn satisfies(ranking: &[u32], preferences: &[(usize, usize)]) -> bool {
    preferences
        .iter()
        .all(|&(above, below)| ranking[above] < ranking[below])
}

fn propose_uniform<R: Rng>(
    ranking: &[u32],
    missing_items: &[usize],
    missing_ranks: &[u32],
    rng: &mut R,
) -> Completion {
    let mut ranks = missing_ranks.to_vec();
    ranks.shuffle(rng);

    let mut completed = ranking.to_vec();
    missing_items
        .iter()
        .zip(ranks.iter())
        .for_each(|(&item, &r)| completed[item] = r);

    let k = missing_items.len() as f64;
    Completion {
        ranking: completed,
        log_proposal: -Gamma::ln_gamma(k + 1.0).0,
    }
}

/// Place the unranked items one at a time, in random order, choosing among
/// the free ranks with probability proportional to
/// `exp(-alpha * |rho[item] - rank|)`.
fn propose_pseudo<R: Rng>(
    ranking: &[u32],
    missing_items: &[usize],
    missing_ranks: &[u32],
    alpha: f64,
    rho: &[u32],
    rng: &mut R,
) -> Completion {
    let mut items = missing_items.to_vec();
    items.shuffle(rng);

    let mut free_ranks = missing_ranks.to_vec();
    let mut completed = ranking.to_vec();
    let mut log_proposal = 0.0;

    for item in items {
        let ln_weights: Vec<f64> = free_ranks
            .iter()
            .map(|&r| -alpha * f64::from(rho[item].abs_diff(r)))
            .collect();
        let ix = ln_pflip(&ln_weights, rng);
        log_proposal += ln_weights[ix] - logsumexp(&ln_weights);
        completed[item] = free_ranks.swap_remove(ix);
    }

    Completion {
        ranking: completed,
        log_proposal,
    }
}
