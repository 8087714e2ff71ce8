use thiserror::Error;

use crate::TopologicalSortError;

/// Errors found while ingesting a time series
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataError {
    /// The time series declares zero items
    #[error("the time series must rank at least one item")]
    NoItems,
    /// A ranking has the wrong number of entries
    #[error(
        "user '{user}' at step {step} ranks {found} items, expected {expected}"
    )]
    RankingLengthMismatch {
        user: String,
        step: usize,
        expected: usize,
        found: usize,
    },
    /// A rank is larger than the number of items
    #[error("user '{user}' at step {step} has rank {rank} of {n_items} items")]
    RankOutOfRange {
        user: String,
        step: usize,
        rank: u32,
        n_items: usize,
    },
    /// Two items share a rank
    #[error("user '{user}' at step {step} gives rank {rank} to two items")]
    DuplicateRank {
        user: String,
        step: usize,
        rank: u32,
    },
    /// A user's pairwise preferences cannot be turned into rankings
    #[error("user '{user}' at step {step} has invalid preferences: {source}")]
    Preferences {
        user: String,
        step: usize,
        source: TopologicalSortError,
    },
    /// Supplied topological sorts are not consistent with the preferences
    #[error(
        "user '{user}' at step {step} has a ranking that violates their \
        preferences"
    )]
    InconsistentSort { user: String, step: usize },
    /// Item numbers in pairwise preferences are 1-based
    #[error("user '{user}' at step {step} refers to item 0; items start at 1")]
    ZeroItem { user: String, step: usize },
}
