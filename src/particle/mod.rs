//! Static-parameter particles and the particle filters they carry
mod filter;
mod parameters;
mod rejuvenate;

pub use filter::{LatentDraw, ParticleFilter};
pub use parameters::StaticParameters;

pub(crate) use filter::{advance_filters, resample_filters};
pub(crate) use rejuvenate::rejuvenate;

use mallows_data::TimeSeries;
use mallows_stats::{CardinalityTable, PartitionFunction};
use mallows_utils::{ln_normalize, ln_pflip, log_mean_exp};
use rand::Rng;

use crate::config::{Prior, SmcOptions};
use crate::error::{ConfigError, SmcError};

/// Everything about the problem that stays fixed while the sampler runs
#[derive(Clone, Debug)]
pub struct Model {
    pub timeseries: TimeSeries,
    pub prior: Prior,
    pub options: SmcOptions,
    pub partition: PartitionFunction,
}

impl Model {
    /// Validate the configuration against the data and build the partition
    /// function. `table` is needed only for table-based metrics over more
    /// items than can be enumerated.
    pub fn new(
        timeseries: TimeSeries,
        prior: Prior,
        options: SmcOptions,
        table: Option<&CardinalityTable>,
    ) -> Result<Self, ConfigError> {
        prior.validate()?;
        options.validate(&prior)?;
        if prior.n_items != timeseries.n_items() {
            return Err(ConfigError::ItemCountMismatch {
                n_items_prior: prior.n_items,
                n_items_data: timeseries.n_items(),
            });
        }
        let partition =
            PartitionFunction::new(options.metric, prior.n_items, table)?;
        Ok(Self {
            timeseries,
            prior,
            options,
            partition,
        })
    }

    pub fn n_steps(&self) -> usize {
        self.timeseries.n_steps()
    }
}

/// One hypothesis about the static parameters, with the particle filters
/// that estimate its likelihood
#[derive(Clone, Debug)]
pub struct Particle {
    pub parameters: StaticParameters,
    pub filters: Vec<ParticleFilter>,
    /// Reset to zero whenever the particles are resampled
    pub log_importance_weight: f64,
    /// The log likelihood estimate of each step so far
    pub log_incremental_likelihood: Vec<f64>,
    pub log_normalized_filter_weights: Vec<f64>,
    /// Index of the filter whose trajectory drives the cluster weight update
    pub conditioned_filter: usize,
}

impl Particle {
    /// Draw the parameters from the prior, with `n_filters` empty filters
    pub fn from_prior<R: Rng>(
        model: &Model,
        n_filters: usize,
        rng: &mut R,
    ) -> Self {
        let n_users = model.timeseries.n_users();
        Self {
            parameters: StaticParameters::from_prior(&model.prior, rng),
            filters: vec![ParticleFilter::new(n_users); n_filters],
            log_importance_weight: 0.0,
            log_incremental_likelihood: Vec::new(),
            log_normalized_filter_weights: vec![
                -(n_filters as f64).ln();
                n_filters
            ],
            conditioned_filter: 0,
        }
    }

    pub fn n_filters(&self) -> usize {
        self.filters.len()
    }

    /// The filter selected by the last weight refresh
    pub fn conditioned(&self) -> &ParticleFilter {
        &self.filters[self.conditioned_filter]
    }

    /// Run the filters through step `t`, returning the log likelihood
    /// increment added to the importance weight
    pub fn advance<R: Rng>(
        &mut self,
        model: &Model,
        t: usize,
        rng: &mut R,
    ) -> Result<f64, SmcError> {
        let (filters, increment) = advance_filters(
            model,
            &self.parameters,
            &self.filters,
            t,
            None,
            rng,
        )?;
        self.filters = filters;
        self.log_importance_weight += increment;
        self.log_incremental_likelihood.push(increment);
        self.refresh_filter_weights(rng);
        Ok(increment)
    }

    /// Resample the filters up to `n_filters` copies, correcting the
    /// importance weight by the change in the likelihood estimate
    pub fn expand<R: Rng>(
        &mut self,
        model: &Model,
        n_filters: usize,
        rng: &mut R,
    ) -> Result<(), SmcError> {
        let log_z_old = self.log_likelihood_estimate();
        self.filters =
            resample_filters(model, &self.filters, n_filters, false, rng)?;
        let log_z_new = self.log_likelihood_estimate();
        self.log_importance_weight += log_z_new - log_z_old;
        self.filters
            .iter_mut()
            .for_each(|filter| filter.reset_last_log_weight());
        self.refresh_filter_weights(rng);
        Ok(())
    }

    /// `Σ_s log mean_f exp(w_fs)` over the steps run so far
    pub fn log_likelihood_estimate(&self) -> f64 {
        let n_steps = self.filters.first().map_or(0, |f| f.n_steps());
        (0..n_steps)
            .map(|s| {
                let ws: Vec<f64> =
                    self.filters.iter().map(|f| f.log_weight[s]).collect();
                log_mean_exp(&ws)
            })
            .sum()
    }

    /// Normalize the last filter weights and pick a new conditioned filter
    pub(crate) fn refresh_filter_weights<R: Rng>(&mut self, rng: &mut R) {
        let log_weights: Vec<f64> =
            self.filters.iter().map(|f| f.last_log_weight()).collect();
        self.conditioned_filter = ln_pflip(&log_weights, rng);
        self.log_normalized_filter_weights = ln_normalize(&log_weights);
    }
}
