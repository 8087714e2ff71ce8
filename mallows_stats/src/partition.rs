//! Log partition functions of the Mallows model
//!
//! The Mallows density of a ranking `r` with consensus `rho` and dispersion
//! `alpha` is `exp(-alpha * d(r, rho)) / Z(alpha)`. `Z` does not depend on
//! `rho` because every distance here is right-invariant.
use std::collections::BTreeMap;

use itertools::Itertools;
use mallows_consts::MAX_ENUMERATED_ITEMS;
use mallows_utils::{identity, logsumexp};
use serde::{Deserialize, Serialize};
use special::Gamma;
use thiserror::Error;

use crate::Metric;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum PartitionFunctionError {
    /// The metric has no closed form and there are too many items to
    /// enumerate
    #[error(
        "The {metric} partition function over {n_items} items needs a \
        cardinality table"
    )]
    MissingTable { metric: Metric, n_items: usize },
    /// A table was supplied for another problem
    #[error(
        "Cardinality table is for {table_metric} over {table_n_items} items \
        but {metric} over {n_items} items was requested"
    )]
    TableMismatch {
        metric: Metric,
        n_items: usize,
        table_metric: Metric,
        table_n_items: usize,
    },
    #[error(
        "Cardinality table has {n_distances} distances but \
        {n_cardinalities} cardinalities"
    )]
    TableLengthMismatch {
        n_distances: usize,
        n_cardinalities: usize,
    },
    #[error("Cardinality table is empty")]
    EmptyTable,
    #[error("Cardinality {cardinality} at distance {distance} is not positive")]
    NonPositiveCardinality { distance: u64, cardinality: f64 },
}

/// The number of permutations at each distance from a fixed permutation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CardinalityTable {
    pub metric: Metric,
    pub n_items: usize,
    pub distances: Vec<u64>,
    pub cardinalities: Vec<f64>,
}

impl CardinalityTable {
    /// Build a table from its columns, checking that they line up
    pub fn new(
        metric: Metric,
        n_items: usize,
        distances: Vec<u64>,
        cardinalities: Vec<f64>,
    ) -> Result<Self, PartitionFunctionError> {
        let table = Self {
            metric,
            n_items,
            distances,
            cardinalities,
        };
        table.validate()?;
        Ok(table)
    }

    /// Count the permutations of `n_items` at every distance from the
    /// identity by visiting all `n_items!` of them.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use mallows_stats::{CardinalityTable, Metric};
    /// let table = CardinalityTable::enumerate(Metric::Footrule, 3);
    /// assert_eq!(table.distances, vec![0, 2, 4]);
    /// assert_eq!(table.cardinalities, vec![1.0, 2.0, 3.0]);
    /// ```
    pub fn enumerate(metric: Metric, n_items: usize) -> Self {
        let reference = identity(n_items);
        let mut counts: BTreeMap<u64, f64> = BTreeMap::new();
        reference
            .iter()
            .copied()
            .permutations(n_items)
            .for_each(|perm| {
                let d = metric.distance(&perm, &reference);
                *counts.entry(d).or_insert(0.0) += 1.0;
            });

        let (distances, cardinalities) = counts.into_iter().unzip();
        Self {
            metric,
            n_items,
            distances,
            cardinalities,
        }
    }

    pub fn validate(&self) -> Result<(), PartitionFunctionError> {
        if self.distances.len() != self.cardinalities.len() {
            return Err(PartitionFunctionError::TableLengthMismatch {
                n_distances: self.distances.len(),
                n_cardinalities: self.cardinalities.len(),
            });
        }
        if self.distances.is_empty() {
            return Err(PartitionFunctionError::EmptyTable);
        }
        self.distances
            .iter()
            .zip(self.cardinalities.iter())
            .try_for_each(|(&distance, &cardinality)| {
                if cardinality > 0.0 && cardinality.is_finite() {
                    Ok(())
                } else {
                    Err(PartitionFunctionError::NonPositiveCardinality {
                        distance,
                        cardinality,
                    })
                }
            })
    }
}

/// `log Z(alpha)` for one metric and number of items
#[derive(Clone, Debug, PartialEq)]
pub enum PartitionFunction {
    Cayley {
        n_items: usize,
    },
    Hamming {
        n_items: usize,
    },
    Kendall {
        n_items: usize,
    },
    /// `ln sum_k cardinality_k * exp(-alpha * distance_k)`, stored as log
    /// cardinalities
    Cardinalities {
        distances: Vec<f64>,
        ln_cardinalities: Vec<f64>,
    },
}

impl PartitionFunction {
    /// Select the partition function for `metric`.
    ///
    /// Cayley, Hamming, and Kendall have closed forms and ignore `table`. The
    /// remaining metrics use `table` if given, otherwise enumerate the
    /// permutations when there are at most `MAX_ENUMERATED_ITEMS` items.
    pub fn new(
        metric: Metric,
        n_items: usize,
        table: Option<&CardinalityTable>,
    ) -> Result<Self, PartitionFunctionError> {
        match metric {
            Metric::Cayley => Ok(Self::Cayley { n_items }),
            Metric::Hamming => Ok(Self::Hamming { n_items }),
            Metric::Kendall => Ok(Self::Kendall { n_items }),
            Metric::Footrule | Metric::Spearman | Metric::Ulam => {
                match table {
                    Some(table) => {
                        if table.metric != metric || table.n_items != n_items
                        {
                            return Err(
                                PartitionFunctionError::TableMismatch {
                                    metric,
                                    n_items,
                                    table_metric: table.metric,
                                    table_n_items: table.n_items,
                                },
                            );
                        }
                        table.validate()?;
                        Ok(Self::from_table(table))
                    }
                    None if n_items <= MAX_ENUMERATED_ITEMS => Ok(
                        Self::from_table(&CardinalityTable::enumerate(
                            metric, n_items,
                        )),
                    ),
                    None => Err(PartitionFunctionError::MissingTable {
                        metric,
                        n_items,
                    }),
                }
            }
        }
    }

    fn from_table(table: &CardinalityTable) -> Self {
        Self::Cardinalities {
            distances: table.distances.iter().map(|&d| d as f64).collect(),
            ln_cardinalities: table
                .cardinalities
                .iter()
                .map(|c| c.ln())
                .collect(),
        }
    }

    /// The log partition function at dispersion `alpha`
    pub fn logz(&self, alpha: f64) -> f64 {
        match self {
            Self::Cayley { n_items } => (1..*n_items)
                .map(|i| (i as f64 * (-alpha).exp()).ln_1p())
                .sum(),
            Self::Kendall { n_items } => {
                let ln_denom = (-(-alpha).exp_m1()).ln();
                (1..=*n_items)
                    .map(|i| (-(-(i as f64) * alpha).exp_m1()).ln() - ln_denom)
                    .sum()
            }
            Self::Hamming { n_items } => {
                let n = *n_items as f64;
                // ln(e^alpha - 1)
                let ln_base = alpha + (-(-alpha).exp_m1()).ln();
                let terms: Vec<f64> = std::iter::once(0.0)
                    .chain((1..=*n_items).map(|i| {
                        let i = i as f64;
                        i * ln_base - Gamma::ln_gamma(i + 1.0).0
                    }))
                    .collect();
                Gamma::ln_gamma(n + 1.0).0 - alpha * n + logsumexp(&terms)
            }
            Self::Cardinalities {
                distances,
                ln_cardinalities,
            } => {
                let terms: Vec<f64> = distances
                    .iter()
                    .zip(ln_cardinalities.iter())
                    .map(|(d, ln_c)| ln_c - alpha * d)
                    .collect();
                logsumexp(&terms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::*;

    const TOL: f64 = 1E-10;

    /// Brute force `ln sum_r exp(-alpha * d(r, id))`
    fn brute_force_logz(metric: Metric, n_items: usize, alpha: f64) -> f64 {
        let reference = identity(n_items);
        let terms: Vec<f64> = reference
            .iter()
            .copied()
            .permutations(n_items)
            .map(|perm| -alpha * metric.distance(&perm, &reference) as f64)
            .collect();
        logsumexp(&terms)
    }

    #[test]
    fn cayley_two_items() {
        let pf = PartitionFunction::new(Metric::Cayley, 2, None).unwrap();
        for alpha in [0.1, 1.0, 3.5] {
            let expected = (1.0 + (-alpha as f64).exp()).ln();
            assert_relative_eq!(pf.logz(alpha), expected, epsilon = TOL);
        }
    }

    #[test]
    fn closed_forms_match_brute_force() {
        for metric in [Metric::Cayley, Metric::Hamming, Metric::Kendall] {
            for n_items in 1..=6 {
                let pf = PartitionFunction::new(metric, n_items, None).unwrap();
                for alpha in [0.05, 0.7, 2.0, 6.0] {
                    assert_relative_eq!(
                        pf.logz(alpha),
                        brute_force_logz(metric, n_items, alpha),
                        epsilon = 1E-8
                    );
                }
            }
        }
    }

    #[test]
    fn enumerated_tables_match_brute_force() {
        for metric in [Metric::Footrule, Metric::Spearman, Metric::Ulam] {
            let pf = PartitionFunction::new(metric, 5, None).unwrap();
            for alpha in [0.05, 1.3] {
                assert_relative_eq!(
                    pf.logz(alpha),
                    brute_force_logz(metric, 5, alpha),
                    epsilon = 1E-8
                );
            }
        }
    }

    #[test]
    fn enumerated_cardinalities_sum_to_n_factorial() {
        let table = CardinalityTable::enumerate(Metric::Ulam, 6);
        let total: f64 = table.cardinalities.iter().sum();
        assert_relative_eq!(total, 720.0, epsilon = TOL);
    }

    #[test]
    fn logz_at_zero_dispersion_is_ln_n_factorial() {
        let pf = PartitionFunction::new(Metric::Spearman, 4, None).unwrap();
        assert_relative_eq!(pf.logz(0.0), 24.0_f64.ln(), epsilon = TOL);
    }

    #[test]
    fn large_table_metric_without_table_fails() {
        let err = PartitionFunction::new(Metric::Footrule, 40, None);
        assert_eq!(
            err,
            Err(PartitionFunctionError::MissingTable {
                metric: Metric::Footrule,
                n_items: 40
            })
        );
    }

    #[test]
    fn supplied_table_is_used() {
        let table = CardinalityTable::new(
            Metric::Footrule,
            3,
            vec![0, 2, 4],
            vec![1.0, 2.0, 3.0],
        )
        .unwrap();
        let pf =
            PartitionFunction::new(Metric::Footrule, 3, Some(&table)).unwrap();
        let alpha: f64 = 0.4;
        let expected =
            (1.0 + 2.0 * (-2.0 * alpha).exp() + 3.0 * (-4.0 * alpha).exp())
                .ln();
        assert_relative_eq!(pf.logz(alpha), expected, epsilon = TOL);
    }

    #[test]
    fn table_for_wrong_metric_is_rejected() {
        let table = CardinalityTable::enumerate(Metric::Ulam, 3);
        let res = PartitionFunction::new(Metric::Footrule, 3, Some(&table));
        assert!(matches!(
            res,
            Err(PartitionFunctionError::TableMismatch { .. })
        ));
    }

    #[test]
    fn ragged_table_is_rejected() {
        let res =
            CardinalityTable::new(Metric::Ulam, 3, vec![0, 1], vec![1.0]);
        assert_eq!(
            res,
            Err(PartitionFunctionError::TableLengthMismatch {
                n_distances: 2,
                n_cardinalities: 1
            })
        );
    }

    #[test]
    fn table_deserializes_from_json() {
        let json = r#"{
            "metric": "ulam",
            "n_items": 3,
            "distances": [0, 1, 2],
            "cardinalities": [1.0, 4.0, 1.0]
        }"#;
        let table: CardinalityTable = serde_json::from_str(json).unwrap();
        assert_eq!(table, CardinalityTable::enumerate(Metric::Ulam, 3));
    }
}
