use mallows_data::TimeSeries;
use mallows_stats::CardinalityTable;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

use super::Engine;
use crate::config::{Prior, SmcOptions};
use crate::error::ConfigError;
use crate::particle::Model;

/// Builds `Engine`s
pub struct EngineBuilder {
    timeseries: TimeSeries,
    prior: Prior,
    options: Option<SmcOptions>,
    cardinality_table: Option<CardinalityTable>,
    seed: Option<u64>,
}

impl EngineBuilder {
    #[must_use]
    pub fn new(timeseries: TimeSeries, prior: Prior) -> Self {
        Self {
            timeseries,
            prior,
            options: None,
            cardinality_table: None,
            seed: None,
        }
    }

    /// With specific sampler options
    #[must_use]
    pub fn options(mut self, options: SmcOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// With a distance cardinality table for the partition function
    #[must_use]
    pub fn cardinality_table(mut self, table: CardinalityTable) -> Self {
        self.cardinality_table = Some(table);
        self
    }

    /// With a given random number generator
    #[must_use]
    pub fn seed_from_u64(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    // Build the `Engine`; consume the `Builder`.
    pub fn build(self) -> Result<Engine, ConfigError> {
        let rng = match self.seed {
            Some(s) => Xoshiro256Plus::seed_from_u64(s),
            None => Xoshiro256Plus::from_entropy(),
        };
        let model = Model::new(
            self.timeseries,
            self.prior,
            self.options.unwrap_or_default(),
            self.cardinality_table.as_ref(),
        )?;
        Ok(Engine::new(model, rng))
    }
}
