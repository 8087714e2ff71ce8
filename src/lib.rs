//! Online Bayesian inference for mixtures of Mallows ranking models with
//! SMC².
//!
//! Users report complete rankings, partial rankings, or pairwise preferences
//! over a fixed set of items, a few at a time. An outer population of
//! particles carries hypotheses about the static parameters: the dispersion
//! `alpha`, the consensus ranking `rho` of each cluster, and the cluster
//! weights `tau`. Every particle runs its own particle filters over the
//! users' latent complete rankings to estimate its likelihood, and is
//! resampled and rejuvenated by a particle Metropolis-Hastings move when the
//! population degenerates.
//!
//! # Example
//!
//! ```rust
//! use mallows_smc::data::{RawTimeSeries, TimeSeries};
//! use mallows_smc::{run_engine, EngineBuilder, Prior, SmcOptions};
//!
//! let raw: RawTimeSeries = serde_json::from_str(r#"{
//!     "kind": "rankings",
//!     "n_items": 4,
//!     "steps": [
//!         {"ann": [1, 2, 3, 4], "bob": [2, 1, 0, 0]},
//!         {"cat": [1, 3, 2, 4]}
//!     ]
//! }"#).unwrap();
//! let timeseries = TimeSeries::from_raw(raw, 1_000).unwrap();
//!
//! let options = SmcOptions::new().n_particles(20).n_particle_filters(4);
//! let engine = EngineBuilder::new(timeseries, Prior::new(4))
//!     .options(options)
//!     .seed_from_u64(1337)
//!     .build()
//!     .unwrap();
//!
//! let results = run_engine(engine, ()).unwrap();
//! assert!(results.complete);
//! assert_eq!(results.users, vec!["ann", "bob", "cat"]);
//! assert_eq!(results.alpha.len(), 20);
//! ```
#![warn(unused_extern_crates)]
#![warn(
    clippy::all,
    clippy::imprecise_flops,
    clippy::suboptimal_flops,
    clippy::unseparated_literal_suffix,
    clippy::unreadable_literal,
    clippy::option_option,
    clippy::implicit_clone,
    clippy::perf
)]

pub mod config;
mod engine;
pub mod error;
pub mod io;
mod particle;
mod results;

pub use config::{Prior, RunConfig, SmcOptions};
pub use engine::{
    update_handler, Diagnostics, Engine, EngineBuilder, RejuvenationReport,
    StepReport,
};
pub use error::{ConfigError, SmcError};
pub use particle::{
    LatentDraw, Model, Particle, ParticleFilter, StaticParameters,
};
pub use results::{
    run_engine, run_engine_with_progress, run_smc, ClusterProbabilities,
    LatentSnapshot, ParameterSnapshot, SmcResults, Traces,
};

pub use mallows_data::ObservedUsers;
pub use mallows_stats::{CardinalityTable, Metric, Resampler};

pub mod consts {
    pub use mallows_consts::*;
}

pub mod data {
    pub use mallows_data::*;
}

pub mod stats {
    pub use mallows_stats::*;
}

pub mod utils {
    pub use mallows_utils::*;
}
