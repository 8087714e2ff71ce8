//! Resampling schemes for particle populations
use std::fmt;
use std::str::FromStr;

use mallows_utils::cumsum;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ParseError;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ResampleError {
    #[error("Cannot resample from an empty probability vector")]
    EmptyProbabilities,
    #[error(
        "Probability {probability} at index {index} is negative or not finite"
    )]
    InvalidProbability { index: usize, probability: f64 },
    #[error("Probabilities sum to zero")]
    ZeroMass,
}

/// The scheme used to replicate particles in proportion to their weights
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Resampler {
    /// Independent categorical draws
    Multinomial,
    /// Deterministic `floor(n * p)` copies plus a multinomial top-up
    Residual,
    /// One uniform draw inside each of `n` equal strata
    Stratified,
    /// One uniform offset shared by `n` equally spaced points
    Systematic,
}

impl Default for Resampler {
    fn default() -> Self {
        Self::Multinomial
    }
}

impl fmt::Display for Resampler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Multinomial => "multinomial",
            Self::Residual => "residual",
            Self::Stratified => "stratified",
            Self::Systematic => "systematic",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Resampler {
    type Err = ParseError<String>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multinomial" => Ok(Self::Multinomial),
            "residual" => Ok(Self::Residual),
            "stratified" => Ok(Self::Stratified),
            "systematic" => Ok(Self::Systematic),
            _ => Err(ParseError(s.to_owned())),
        }
    }
}

impl Resampler {
    /// The number of copies of each input to keep so that the copies add up
    /// to `n_samples`. `probs` need not be normalized.
    pub fn counts<R: Rng>(
        self,
        n_samples: usize,
        probs: &[f64],
        rng: &mut R,
    ) -> Result<Vec<usize>, ResampleError> {
        let probs = normalize(probs)?;
        let counts = match self {
            Self::Multinomial => multinomial(n_samples, &probs, rng),
            Self::Residual => residual(n_samples, &probs, rng),
            Self::Stratified => {
                let n = n_samples as f64;
                let points =
                    (0..n_samples).map(|i| (i as f64 + rng.gen::<f64>()) / n);
                count_points(points, n_samples, &probs)
            }
            Self::Systematic => {
                let n = n_samples as f64;
                let jitter: f64 = rng.gen();
                let points = (0..n_samples).map(|i| (i as f64 + jitter) / n);
                count_points(points, n_samples, &probs)
            }
        };
        debug_assert_eq!(counts.iter().sum::<usize>(), n_samples);
        Ok(counts)
    }

    /// The indices of the resampled inputs, in ascending order
    pub fn indices<R: Rng>(
        self,
        n_samples: usize,
        probs: &[f64],
        rng: &mut R,
    ) -> Result<Vec<usize>, ResampleError> {
        self.counts(n_samples, probs, rng)
            .map(|counts| counts_to_indices(&counts))
    }
}

/// Expand replication counts into indices.
///
/// # Example
///
/// ```rust
/// # use mallows_stats::counts_to_indices;
/// assert_eq!(counts_to_indices(&[2, 0, 1]), vec![0, 0, 2]);
/// ```
pub fn counts_to_indices(counts: &[usize]) -> Vec<usize> {
    counts
        .iter()
        .enumerate()
        .flat_map(|(ix, &count)| std::iter::repeat(ix).take(count))
        .collect()
}

fn normalize(probs: &[f64]) -> Result<Vec<f64>, ResampleError> {
    if probs.is_empty() {
        return Err(ResampleError::EmptyProbabilities);
    }
    if let Some((index, &probability)) = probs
        .iter()
        .enumerate()
        .find(|(_, p)| !(p.is_finite() && **p >= 0.0))
    {
        return Err(ResampleError::InvalidProbability { index, probability });
    }
    let total: f64 = probs.iter().sum();
    if total <= 0.0 {
        return Err(ResampleError::ZeroMass);
    }
    Ok(probs.iter().map(|p| p / total).collect())
}

/// Count how many of the ascending `points` in [0, 1) land in each interval
/// of the cumulative distribution of `probs`.
fn count_points<I>(points: I, n_points: usize, probs: &[f64]) -> Vec<usize>
where
    I: Iterator<Item = f64>,
{
    let cdf = cumsum(probs);
    let last = probs.iter().rposition(|&p| p > 0.0).unwrap_or(0);
    let mut counts = vec![0; probs.len()];
    let mut ix = 0;
    for u in points.take(n_points) {
        // the last interval with mass absorbs round-off in the cdf
        while ix < last && u >= cdf[ix] {
            ix += 1;
        }
        counts[ix] += 1;
    }
    counts
}

fn multinomial<R: Rng>(
    n_samples: usize,
    probs: &[f64],
    rng: &mut R,
) -> Vec<usize> {
    let mut points: Vec<f64> = (0..n_samples).map(|_| rng.gen()).collect();
    points.sort_unstable_by(|a, b| a.total_cmp(b));
    count_points(points.into_iter(), n_samples, probs)
}

fn residual<R: Rng>(
    n_samples: usize,
    probs: &[f64],
    rng: &mut R,
) -> Vec<usize> {
    let n = n_samples as f64;
    let mut counts: Vec<usize> =
        probs.iter().map(|p| (n * p).floor() as usize).collect();
    let n_kept: usize = counts.iter().sum();
    let n_residual = n_samples.saturating_sub(n_kept);
    if n_residual == 0 {
        return counts;
    }

    let residuals: Vec<f64> = probs
        .iter()
        .zip(counts.iter())
        .map(|(p, &c)| (n * p - c as f64).max(0.0))
        .collect();
    let total: f64 = residuals.iter().sum();
    let top_up = if total > 0.0 {
        let residuals: Vec<f64> =
            residuals.iter().map(|r| r / total).collect();
        multinomial(n_residual, &residuals, rng)
    } else {
        multinomial(n_residual, probs, rng)
    };
    counts
        .iter_mut()
        .zip(top_up.iter())
        .for_each(|(c, t)| *c += t);
    counts
}
