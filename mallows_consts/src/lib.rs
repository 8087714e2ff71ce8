#![warn(
    clippy::all,
    clippy::imprecise_flops,
    clippy::suboptimal_flops,
    clippy::unseparated_literal_suffix,
    clippy::unreadable_literal,
    clippy::option_option,
    clippy::implicit_clone
)]
//! Default values for priors and inference-type things
pub use rv;

/// Default number of outer (parameter) particles
pub const DEFAULT_N_PARTICLES: usize = 1000;

/// Default number of inner particle filters per outer particle
pub const DEFAULT_N_PARTICLE_FILTERS: usize = 50;

/// Default cap on the inner particle filter count
pub const DEFAULT_MAX_PARTICLE_FILTERS: usize = 10_000;

/// Default number of rejuvenation sweeps before giving up on diversity
pub const DEFAULT_MAX_REJUVENATION_STEPS: usize = 20;

/// The inner filter count doubles if the rejuvenation acceptance rate falls
/// below this value
pub const DEFAULT_DOUBLING_THRESHOLD: f64 = 0.2;

/// Default leap size in the leap-and-shift proposal for rho
pub const DEFAULT_LEAP_SIZE: usize = 1;

/// Smallest step size of the log-normal random walk on alpha
pub const MIN_ALPHA_STEP: f64 = 0.001;

/// Upper bound on the number of topological sorts enumerated per user
pub const DEFAULT_MAX_TOPOLOGICAL_SORTS: usize = 100_000;

/// Largest number of items for which distance cardinalities are enumerated
/// rather than read from a table
pub const MAX_ENUMERATED_ITEMS: usize = 9;

/// Largest number of items `mallows tabulate` enumerates a cardinality table
/// for. The enumeration visits every one of the `n!` permutations.
pub const MAX_TABULATED_ITEMS: usize = 12;

/// Default shape of the Gamma prior on the Mallows dispersion
pub const DEFAULT_ALPHA_SHAPE: f64 = 1.0;

/// Default rate of the Gamma prior on the Mallows dispersion
pub const DEFAULT_ALPHA_RATE: f64 = 0.5;

/// Default Dirichlet concentration on the cluster weights
pub const DEFAULT_CLUSTER_CONCENTRATION: f64 = 10.0;

