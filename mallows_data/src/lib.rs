#![warn(unused_extern_crates)]
#![warn(
    clippy::all,
    clippy::imprecise_flops,
    clippy::suboptimal_flops,
    clippy::unseparated_literal_suffix,
    clippy::unreadable_literal,
    clippy::option_option,
    clippy::implicit_clone
)]
//! Observed rankings and preferences, and the time series that feeds them to
//! the sampler one step at a time.
mod error;
mod observation;
mod proposal;
mod timeseries;
mod topological;

pub use error::DataError;
pub use observation::{Completion, Observation};
pub use proposal::LatentRankProposal;
pub use timeseries::{
    DataKind, ObservedUsers, RawTimeSeries, TimeSeries, UserObservation,
};
pub use topological::{topological_sorts, TopologicalSortError};
