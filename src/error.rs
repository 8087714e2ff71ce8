use mallows_data::DataError;
use mallows_stats::{PartitionFunctionError, ResampleError};
use thiserror::Error;

/// Errors in the sampler configuration, found before any work is done
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("n_particles must be at least 1")]
    ZeroParticles,
    #[error("n_particle_filters must be at least 1")]
    ZeroParticleFilters,
    #[error(
        "n_particle_filters ({n_particle_filters}) exceeds \
        max_particle_filters ({max_particle_filters})"
    )]
    TooManyParticleFilters {
        n_particle_filters: usize,
        max_particle_filters: usize,
    },
    #[error("resampling_threshold must be non-negative, got {0}")]
    InvalidResamplingThreshold(f64),
    #[error("doubling_threshold must be in [0, 1], got {0}")]
    InvalidDoublingThreshold(f64),
    #[error("leap_size must be at least 1")]
    ZeroLeapSize,
    #[error("max_topological_sorts must be at least 1")]
    ZeroTopologicalSorts,
    #[error("the prior must have at least one item")]
    ZeroItems,
    #[error("the prior must have at least one cluster")]
    ZeroClusters,
    #[error("prior hyperparameter {name} must be positive, got {value}")]
    NonPositiveHyperparameter { name: &'static str, value: f64 },
    /// The pseudo proposal is defined for a single consensus ranking
    #[error(
        "the pseudo latent rank proposal needs one cluster, but the prior has \
        {n_clusters}"
    )]
    PseudoProposalWithClusters { n_clusters: usize },
    #[error(
        "the prior ranks {n_items_prior} items but the data rank \
        {n_items_data}"
    )]
    ItemCountMismatch {
        n_items_prior: usize,
        n_items_data: usize,
    },
    #[error("partition function error: {0}")]
    PartitionFunction(#[from] PartitionFunctionError),
}

/// Errors that stop the sampler
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SmcError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("resampling error: {0}")]
    Resample(#[from] ResampleError),
    /// A proposed consensus or completed latent ranking is not a permutation
    #[error("{origin} produced {ranking:?}, which is not a permutation")]
    NotAPermutation {
        origin: &'static str,
        ranking: Vec<u32>,
    },
    #[error("all {n_steps} time steps have been processed")]
    NoStepsRemaining { n_steps: usize },
}
