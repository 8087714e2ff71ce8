//! Permutation distances
//!
//! Rankings are slices of 1-based ranks indexed by item, so `r[i]` is the rank
//! of item `i`. Every metric is symmetric and zero only on identical rankings.
use std::fmt;
use std::str::FromStr;

use mallows_utils::inverse;
use serde::{Deserialize, Serialize};

use crate::ParseError;

/// The distance used in the Mallows likelihood
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Minimum number of transpositions turning one ranking into the other
    Cayley,
    /// Sum of absolute rank differences
    Footrule,
    /// Number of items with different ranks
    Hamming,
    /// Number of discordant item pairs
    Kendall,
    /// Sum of squared rank differences
    Spearman,
    /// Number of items that must be moved (n minus the longest common
    /// increasing subsequence)
    Ulam,
}

impl Metric {
    /// The distance between two rankings of the same items
    pub fn distance(self, r1: &[u32], r2: &[u32]) -> u64 {
        debug_assert_eq!(r1.len(), r2.len(), "rankings differ in length");
        match self {
            Self::Cayley => cayley(r1, r2),
            Self::Footrule => footrule(r1, r2),
            Self::Hamming => hamming(r1, r2),
            Self::Kendall => kendall(r1, r2),
            Self::Spearman => spearman(r1, r2),
            Self::Ulam => ulam(r1, r2),
        }
    }

    /// Whether the partition function of this metric has a closed form
    pub fn has_closed_form(self) -> bool {
        matches!(self, Self::Cayley | Self::Hamming | Self::Kendall)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Cayley => "cayley",
            Self::Footrule => "footrule",
            Self::Hamming => "hamming",
            Self::Kendall => "kendall",
            Self::Spearman => "spearman",
            Self::Ulam => "ulam",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Metric {
    type Err = ParseError<String>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cayley" => Ok(Self::Cayley),
            "footrule" => Ok(Self::Footrule),
            "hamming" => Ok(Self::Hamming),
            "kendall" => Ok(Self::Kendall),
            "spearman" => Ok(Self::Spearman),
            "ulam" => Ok(Self::Ulam),
            _ => Err(ParseError(s.to_owned())),
        }
    }
}

fn cayley(r1: &[u32], r2: &[u32]) -> u64 {
    // n minus the number of cycles in r1 composed with the inverse of r2
    let order = inverse(r2);
    let n = r1.len();
    let mut visited = vec![false; n];
    let mut n_cycles = 0;
    for start in 0..n {
        if visited[start] {
            continue;
        }
        n_cycles += 1;
        let mut k = start;
        while !visited[k] {
            visited[k] = true;
            k = r1[order[k]] as usize - 1;
        }
    }
    (n - n_cycles) as u64
}

fn footrule(r1: &[u32], r2: &[u32]) -> u64 {
    r1.iter()
        .zip(r2.iter())
        .map(|(&a, &b)| u64::from(a.abs_diff(b)))
        .sum()
}

fn hamming(r1: &[u32], r2: &[u32]) -> u64 {
    r1.iter().zip(r2.iter()).filter(|(a, b)| a != b).count() as u64
}

fn kendall(r1: &[u32], r2: &[u32]) -> u64 {
    let n = r1.len();
    let mut distance = 0;
    for i in 0..n {
        for j in 0..i {
            if (r1[j] > r1[i]) != (r2[j] > r2[i]) {
                distance += 1;
            }
        }
    }
    distance
}

fn spearman(r1: &[u32], r2: &[u32]) -> u64 {
    r1.iter()
        .zip(r2.iter())
        .map(|(&a, &b)| {
            let d = u64::from(a.abs_diff(b));
            d * d
        })
        .sum()
}

/// Length of the longest strictly increasing subsequence (patience sorting)
fn longest_increasing_subsequence(xs: &[u32]) -> usize {
    let mut tails: Vec<u32> = Vec::with_capacity(xs.len());
    for &x in xs {
        match tails.binary_search(&x) {
            Ok(_) => (),
            Err(ix) if ix == tails.len() => tails.push(x),
            Err(ix) => tails[ix] = x,
        }
    }
    tails.len()
}

fn ulam(r1: &[u32], r2: &[u32]) -> u64 {
    let order = inverse(r2);
    let reordered: Vec<u32> = order.iter().map(|&item| r1[item]).collect();
    (r1.len() - longest_increasing_subsequence(&reordered)) as u64
}
