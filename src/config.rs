use mallows_consts::{
    DEFAULT_ALPHA_RATE, DEFAULT_ALPHA_SHAPE, DEFAULT_CLUSTER_CONCENTRATION,
    DEFAULT_DOUBLING_THRESHOLD, DEFAULT_LEAP_SIZE,
    DEFAULT_MAX_PARTICLE_FILTERS, DEFAULT_MAX_REJUVENATION_STEPS,
    DEFAULT_MAX_TOPOLOGICAL_SORTS, DEFAULT_N_PARTICLES,
    DEFAULT_N_PARTICLE_FILTERS,
};
use mallows_data::LatentRankProposal;
use mallows_stats::{Metric, Resampler};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Prior on the static parameters of the mixture of Mallows models
///
/// `alpha_c ~ Gamma(alpha_shape, alpha_rate)`, `rho_c` is uniform over
/// permutations, and `tau ~ Dirichlet(cluster_concentration)`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Prior {
    /// Number of ranked items
    pub n_items: usize,
    /// Number of mixture components
    #[serde(default = "default_n_clusters")]
    pub n_clusters: usize,
    #[serde(default = "default_alpha_shape")]
    pub alpha_shape: f64,
    #[serde(default = "default_alpha_rate")]
    pub alpha_rate: f64,
    /// Symmetric Dirichlet concentration on the cluster weights
    #[serde(default = "default_cluster_concentration")]
    pub cluster_concentration: f64,
}

fn default_n_clusters() -> usize {
    1
}

fn default_alpha_shape() -> f64 {
    DEFAULT_ALPHA_SHAPE
}

fn default_alpha_rate() -> f64 {
    DEFAULT_ALPHA_RATE
}

fn default_cluster_concentration() -> f64 {
    DEFAULT_CLUSTER_CONCENTRATION
}

impl Prior {
    /// Default prior over `n_items` items with one cluster
    pub fn new(n_items: usize) -> Self {
        Self {
            n_items,
            n_clusters: default_n_clusters(),
            alpha_shape: DEFAULT_ALPHA_SHAPE,
            alpha_rate: DEFAULT_ALPHA_RATE,
            cluster_concentration: DEFAULT_CLUSTER_CONCENTRATION,
        }
    }

    #[must_use]
    pub fn n_clusters(mut self, n_clusters: usize) -> Self {
        self.n_clusters = n_clusters;
        self
    }

    #[must_use]
    pub fn alpha_gamma(mut self, shape: f64, rate: f64) -> Self {
        self.alpha_shape = shape;
        self.alpha_rate = rate;
        self
    }

    #[must_use]
    pub fn cluster_concentration(mut self, concentration: f64) -> Self {
        self.cluster_concentration = concentration;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_items == 0 {
            return Err(ConfigError::ZeroItems);
        }
        if self.n_clusters == 0 {
            return Err(ConfigError::ZeroClusters);
        }
        [
            ("alpha_shape", self.alpha_shape),
            ("alpha_rate", self.alpha_rate),
            ("cluster_concentration", self.cluster_concentration),
        ]
        .iter()
        .try_for_each(|&(name, value)| {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::NonPositiveHyperparameter { name, value })
            }
        })
    }
}

/// Configuration of the SMC² sampler
///
/// Every field has a default, so an empty YAML or JSON map is a valid
/// configuration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SmcOptions {
    /// The distance in the Mallows likelihood
    #[serde(default = "default_metric")]
    pub metric: Metric,
    /// The resampling scheme for both the outer and inner populations
    #[serde(default)]
    pub resampler: Resampler,
    /// Proposal for the latent rankings of partially ranked users
    #[serde(default)]
    pub latent_rank_proposal: LatentRankProposal,
    /// Number of static-parameter particles
    #[serde(default = "default_n_particles")]
    pub n_particles: usize,
    /// Initial number of particle filters per particle
    #[serde(default = "default_n_particle_filters")]
    pub n_particle_filters: usize,
    /// The particle filter count never doubles past this value
    #[serde(default = "default_max_particle_filters")]
    pub max_particle_filters: usize,
    /// Resample when the effective sample size falls below this value.
    /// Defaults to half the number of particles.
    #[serde(default)]
    pub resampling_threshold: Option<f64>,
    /// Maximum number of rejuvenation sweeps after a resampling
    #[serde(default = "default_max_rejuvenation_steps")]
    pub max_rejuvenation_steps: usize,
    /// Double the particle filters when the rejuvenation acceptance rate is
    /// below this value
    #[serde(default = "default_doubling_threshold")]
    pub doubling_threshold: f64,
    /// Largest rank change in the leap-and-shift proposal
    #[serde(default = "default_leap_size")]
    pub leap_size: usize,
    /// Largest number of rankings enumerated for one user's pairwise
    /// preferences
    #[serde(default = "default_max_topological_sorts")]
    pub max_topological_sorts: usize,
    /// Stop after this many seconds, returning the steps completed so far
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Log progress at the info level
    #[serde(default)]
    pub verbose: bool,
    /// Record the static parameters and importance weights after each step
    #[serde(default)]
    pub trace: bool,
    /// Record the latent rankings of each particle's conditioned filter after
    /// each step
    #[serde(default)]
    pub trace_latent: bool,
}

fn default_metric() -> Metric {
    Metric::Footrule
}

fn default_n_particles() -> usize {
    DEFAULT_N_PARTICLES
}

fn default_n_particle_filters() -> usize {
    DEFAULT_N_PARTICLE_FILTERS
}

fn default_max_particle_filters() -> usize {
    DEFAULT_MAX_PARTICLE_FILTERS
}

fn default_max_rejuvenation_steps() -> usize {
    DEFAULT_MAX_REJUVENATION_STEPS
}

fn default_doubling_threshold() -> f64 {
    DEFAULT_DOUBLING_THRESHOLD
}

fn default_leap_size() -> usize {
    DEFAULT_LEAP_SIZE
}

fn default_max_topological_sorts() -> usize {
    DEFAULT_MAX_TOPOLOGICAL_SORTS
}

impl SmcOptions {
    pub fn new() -> Self {
        Self {
            metric: default_metric(),
            resampler: Resampler::default(),
            latent_rank_proposal: LatentRankProposal::default(),
            n_particles: DEFAULT_N_PARTICLES,
            n_particle_filters: DEFAULT_N_PARTICLE_FILTERS,
            max_particle_filters: DEFAULT_MAX_PARTICLE_FILTERS,
            resampling_threshold: None,
            max_rejuvenation_steps: DEFAULT_MAX_REJUVENATION_STEPS,
            doubling_threshold: DEFAULT_DOUBLING_THRESHOLD,
            leap_size: DEFAULT_LEAP_SIZE,
            max_topological_sorts: DEFAULT_MAX_TOPOLOGICAL_SORTS,
            timeout: None,
            verbose: false,
            trace: false,
            trace_latent: false,
        }
    }

    #[must_use]
    pub fn metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    #[must_use]
    pub fn resampler(mut self, resampler: Resampler) -> Self {
        self.resampler = resampler;
        self
    }

    #[must_use]
    pub fn latent_rank_proposal(
        mut self,
        proposal: LatentRankProposal,
    ) -> Self {
        self.latent_rank_proposal = proposal;
        self
    }

    #[must_use]
    pub fn n_particles(mut self, n_particles: usize) -> Self {
        self.n_particles = n_particles;
        self
    }

    #[must_use]
    pub fn n_particle_filters(mut self, n_particle_filters: usize) -> Self {
        self.n_particle_filters = n_particle_filters;
        self
    }

    #[must_use]
    pub fn max_particle_filters(mut self, max_particle_filters: usize) -> Self {
        self.max_particle_filters = max_particle_filters;
        self
    }

    #[must_use]
    pub fn resampling_threshold(mut self, threshold: f64) -> Self {
        self.resampling_threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn max_rejuvenation_steps(mut self, steps: usize) -> Self {
        self.max_rejuvenation_steps = steps;
        self
    }

    #[must_use]
    pub fn doubling_threshold(mut self, threshold: f64) -> Self {
        self.doubling_threshold = threshold;
        self
    }

    #[must_use]
    pub fn leap_size(mut self, leap_size: usize) -> Self {
        self.leap_size = leap_size;
        self
    }

    #[must_use]
    pub fn timeout(mut self, seconds: Option<u64>) -> Self {
        self.timeout = seconds;
        self
    }

    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    #[must_use]
    pub fn trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    #[must_use]
    pub fn trace_latent(mut self, trace_latent: bool) -> Self {
        self.trace_latent = trace_latent;
        self
    }

    /// The effective sample size below which the particles are resampled
    pub fn ess_threshold(&self) -> f64 {
        self.resampling_threshold
            .unwrap_or(self.n_particles as f64 / 2.0)
    }

    /// Check the options on their own and against the prior
    pub fn validate(&self, prior: &Prior) -> Result<(), ConfigError> {
        if self.n_particles == 0 {
            return Err(ConfigError::ZeroParticles);
        }
        if self.n_particle_filters == 0 {
            return Err(ConfigError::ZeroParticleFilters);
        }
        if self.n_particle_filters > self.max_particle_filters {
            return Err(ConfigError::TooManyParticleFilters {
                n_particle_filters: self.n_particle_filters,
                max_particle_filters: self.max_particle_filters,
            });
        }
        if let Some(threshold) = self.resampling_threshold {
            if !(threshold >= 0.0 && threshold.is_finite()) {
                return Err(ConfigError::InvalidResamplingThreshold(threshold));
            }
        }
        if !(0.0..=1.0).contains(&self.doubling_threshold) {
            return Err(ConfigError::InvalidDoublingThreshold(
                self.doubling_threshold,
            ));
        }
        if self.leap_size == 0 {
            return Err(ConfigError::ZeroLeapSize);
        }
        if self.max_topological_sorts == 0 {
            return Err(ConfigError::ZeroTopologicalSorts);
        }
        if self.latent_rank_proposal == LatentRankProposal::Pseudo
            && prior.n_clusters > 1
        {
            return Err(ConfigError::PseudoProposalWithClusters {
                n_clusters: prior.n_clusters,
            });
        }
        Ok(())
    }
}

impl Default for SmcOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// A prior and sampler options, as read from a configuration file
///
/// ```rust
/// # use mallows_smc::config::RunConfig;
/// let yaml = "
/// prior:
///   n_items: 4
///   n_clusters: 2
/// options:
///   metric: kendall
///   n_particles: 200
/// ";
/// let config: RunConfig = serde_yaml::from_str(yaml).unwrap();
/// assert_eq!(config.prior.n_clusters, 2);
/// assert_eq!(config.options.n_particles, 200);
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub prior: Prior,
    #[serde(default)]
    pub options: SmcOptions,
}
